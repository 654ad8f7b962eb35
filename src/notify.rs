// Copyright 2018 Google Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! User-visible notification sink.
//!
//! Some events happen far away from any process that could print them: a
//! buffer with broken JSON is only discovered when the kernel flushes it,
//! long after the editor that wrote it checked for errors.  Such events are
//! reported through a `Notifier` injected at mount time.

/// Receiver of user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Notifier that forwards notifications to the log.  Used by the command
/// line.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        warn!("{}: {}", title, message);
    }
}

/// Notifier that discards everything.  Useful when embedding the filesystem
/// and in tests.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _message: &str) {}
}
