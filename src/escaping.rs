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

//! Reversible escaping of MongoDB identifiers into filename components.
//!
//! Database names, collection names, field names and encoded field values can
//! all contain characters that are not representable in a path component:
//! `/` is the path separator, `.` and `..` are reserved, and names starting
//! with a dot are hidden by most shells.  Every identifier crossing the
//! filesystem boundary goes through `escape`/`unescape`.

/// The character used in place of `/` in escaped names (division slash).
const SLASH_STANDIN: char = '\u{2215}';

/// The escape prefix (zero-width space).  Invisible in directory listings.
const ESCAPE: char = '\u{200B}';

/// An escaped component that cannot be decoded back into an identifier.
#[derive(Debug, Eq, Fail, PartialEq)]
pub enum NameError {
    /// The component ends with an escape prefix that escapes nothing.
    #[fail(display = "component {:?} ends with a dangling escape", name)]
    DanglingEscape { name: String },
}

/// Escapes an arbitrary identifier into a legal filename component.
///
/// The mapping is reversible: `/` becomes a division slash, and a leading
/// `.` or a literal occurrence of either marker character is prefixed with a
/// zero-width space.
pub fn escape(name: &str) -> String {
    let mut ret = String::with_capacity(name.len());
    for ch in name.chars() {
        if (ch == '.' && ret.is_empty()) || ch == ESCAPE || ch == SLASH_STANDIN {
            ret.push(ESCAPE);
            ret.push(ch);
        } else if ch == '/' {
            ret.push(SLASH_STANDIN);
        } else {
            ret.push(ch);
        }
    }
    ret
}

/// Decodes a filename component produced by `escape` back into the original
/// identifier.
///
/// Callers surface `NameError` as `EINVAL`, or treat the component as
/// referring to a node that does not exist.
pub fn unescape(name: &str) -> Result<String, NameError> {
    let mut ret = String::with_capacity(name.len());
    let mut escaped = false;
    for ch in name.chars() {
        if escaped {
            ret.push(ch);
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == SLASH_STANDIN {
            ret.push('/');
        } else {
            ret.push(ch);
        }
    }
    if escaped {
        return Err(NameError::DanglingEscape { name: name.to_owned() });
    }
    Ok(ret)
}
