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

//! Refcounted cache of open document buffers.
//!
//! The kernel's open/read/write/close lifecycle does not line up with the
//! store's one-document-at-a-time replace semantics, and `truncate` arrives
//! with no file handle at all.  All handles onto one document therefore share
//! a single buffered entry, keyed by node identity: concurrent opens see each
//! other's writes, `getattr` can report the live size, and the write-back
//! happens once, when the last reference goes away.
//!
//! Lock discipline: the map mutex is acquired before any entry mutex, and
//! reference-count changes hold both.  Write-back works on the entry alone
//! and must never re-acquire the map lock.

use bson::Bson;
use nix::errno::Errno;
use nodes::{KernelError, NodeKey, NodeResult};
use std::cmp;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-wide mapping from node identity to its shared open entry.
pub struct OpenFileCache {
    entries: Mutex<HashMap<NodeKey, Arc<OpenFile>>>,
}

/// The buffer and bookkeeping shared by every handle onto one document.
#[derive(Debug)]
pub struct OpenFile {
    state: Mutex<OpenFileState>,
}

/// Mutable state of an open entry, guarded by the entry mutex.
#[derive(Debug)]
pub struct OpenFileState {
    /// Rendered document bytes as the user sees them.
    pub buffer: Vec<u8>,

    /// Primary key of the backing record; absent for a freshly created file
    /// until the first flush inserts it.
    pub id: Option<Bson>,

    /// Whether the buffer diverged from the store since the last flush.
    pub dirty: bool,

    /// Outstanding opens; the entry leaves the cache when this drops to zero.
    refs: u32,

    /// Sticky error of the most recent failed flush.
    flush_error: Option<Errno>,
}

impl OpenFileState {
    /// Reports the outcome of the most recent flush.
    pub fn last_flush_result(&self) -> NodeResult<()> {
        match self.flush_error {
            None => Ok(()),
            Some(errno) => Err(KernelError::from_errno(errno)),
        }
    }

    /// Stashes an I/O error as the sticky flush outcome and returns it.
    pub fn record_flush_error(&mut self) -> NodeResult<()> {
        self.flush_error = Some(Errno::EIO);
        Err(KernelError::from_errno(Errno::EIO))
    }

    pub fn record_flush_ok(&mut self) {
        self.flush_error = None;
    }
}

impl OpenFile {
    fn new(buffer: Vec<u8>, id: Option<Bson>) -> Arc<OpenFile> {
        Arc::new(OpenFile {
            state: Mutex::new(OpenFileState {
                buffer: buffer,
                id: id,
                dirty: false,
                refs: 1,
                flush_error: None,
            }),
        })
    }

    /// Locks and returns the entry state for multi-field operations.
    pub fn state(&self) -> MutexGuard<OpenFileState> {
        self.state.lock().unwrap()
    }

    /// Current buffer length, as reported by `getattr` while open.
    pub fn size(&self) -> u64 {
        self.state().buffer.len() as u64
    }

    /// Reads up to `size` bytes at `offset`; short reads happen at the end of
    /// the buffer.
    pub fn read(&self, offset: i64, size: u32) -> Vec<u8> {
        let state = self.state();
        let offset = offset as usize;
        if offset >= state.buffer.len() {
            return Vec::new();
        }
        let end = cmp::min(offset + size as usize, state.buffer.len());
        state.buffer[offset..end].to_vec()
    }

    /// Writes `data` at `offset`, zero-filling any gap, and marks the entry
    /// dirty.
    pub fn write(&self, offset: i64, data: &[u8]) -> u32 {
        let mut state = self.state();
        let offset = offset as usize;
        let end = offset + data.len();
        if state.buffer.len() < end {
            state.buffer.resize(end, 0);
        }
        state.buffer[offset..end].copy_from_slice(data);
        state.dirty = true;
        data.len() as u32
    }

    /// Shrinks the buffer to at most `size` bytes and marks the entry dirty.
    pub fn truncate(&self, size: u64) {
        let mut state = self.state();
        state.buffer.truncate(size as usize);
        state.dirty = true;
    }
}

impl OpenFileCache {
    pub fn new() -> OpenFileCache {
        OpenFileCache { entries: Mutex::new(HashMap::new()) }
    }

    /// Peeks at the entry for a node without taking a reference.
    pub fn lookup(&self, key: &NodeKey) -> Option<Arc<OpenFile>> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).cloned()
    }

    /// Returns the entry for `key`, creating it through `init` on first open.
    ///
    /// `init` yields the initial buffer and the bound primary key.  It runs
    /// with the map locked: concurrent first opens of the same document must
    /// not race to insert two entries.
    pub fn open<F>(&self, key: &NodeKey, init: F) -> NodeResult<Arc<OpenFile>>
        where F: FnOnce() -> NodeResult<(Vec<u8>, Option<Bson>)> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            entry.state.lock().unwrap().refs += 1;
            return Ok(entry.clone());
        }

        let (buffer, id) = init()?;
        let entry = OpenFile::new(buffer, id);
        entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }

    /// Inserts a fresh, empty entry for a document that does not exist yet.
    pub fn create(&self, key: &NodeKey) -> Arc<OpenFile> {
        let mut entries = self.entries.lock().unwrap();
        let entry = OpenFile::new(Vec::new(), None);
        if entries.insert(key.clone(), entry.clone()).is_some() {
            info!("Created {:?} over an entry that was still open", key);
        }
        entry
    }

    /// Drops one reference to `entry`.
    ///
    /// Returns true when that was the last reference: the entry has left the
    /// cache and the caller must write it back.
    pub fn release(&self, key: &NodeKey, entry: &Arc<OpenFile>) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let last = {
            let mut state = entry.state.lock().unwrap();
            debug_assert!(state.refs > 0, "More releases than opens");
            state.refs -= 1;
            state.refs == 0
        };
        if last {
            // A create may have displaced this entry; only unmap it if the
            // cache still points at it.
            let displaced = match entries.get(key) {
                Some(current) => !Arc::ptr_eq(current, entry),
                None => true,
            };
            if !displaced {
                entries.remove(key);
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> NodeKey {
        NodeKey::new(vec!["db".to_owned(), "coll".to_owned(), name.to_owned()])
    }

    #[test]
    fn read_write_roundtrip() {
        let entry = OpenFile::new(b"hello".to_vec(), None);
        assert_eq!(b"hello".to_vec(), entry.read(0, 100));
        assert_eq!(b"ell".to_vec(), entry.read(1, 3));
        assert!(entry.read(10, 4).is_empty());

        assert_eq!(5, entry.write(5, b" worl"));
        assert_eq!(b"hello worl".to_vec(), entry.read(0, 100));
        assert!(entry.state().dirty);
    }

    #[test]
    fn write_zero_fills_gaps() {
        let entry = OpenFile::new(Vec::new(), None);
        assert_eq!(2, entry.write(3, b"xy"));
        assert_eq!(b"\0\0\0xy".to_vec(), entry.read(0, 100));
    }

    #[test]
    fn truncate_shrinks_and_dirties() {
        let entry = OpenFile::new(b"abcdef".to_vec(), None);
        entry.truncate(3);
        assert_eq!(b"abc".to_vec(), entry.read(0, 100));
        assert!(entry.state().dirty);

        // Truncating past the end does not extend the buffer.
        entry.truncate(100);
        assert_eq!(3, entry.size());
    }

    #[test]
    fn open_shares_one_entry() {
        let cache = OpenFileCache::new();
        let first = cache.open(&key("a"), || Ok((b"{}".to_vec(), None))).unwrap();
        let second = cache.open(&key("a"), || panic!("should reuse the entry")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        second.write(0, b"x");
        assert_eq!(b"x}".to_vec(), first.read(0, 100));
    }

    #[test]
    fn refcount_conservation() {
        let cache = OpenFileCache::new();
        let k = key("a");
        let first = cache.open(&k, || Ok((Vec::new(), None))).unwrap();
        let second = cache.open(&k, || unreachable!()).unwrap();

        assert!(!cache.release(&k, &first));
        assert!(cache.lookup(&k).is_some());
        assert!(cache.release(&k, &second));
        assert!(cache.lookup(&k).is_none());
    }

    #[test]
    fn open_failure_inserts_nothing() {
        let cache = OpenFileCache::new();
        let k = key("a");
        let result = cache.open(&k, || Err(KernelError::from_errno(Errno::ENOENT)));
        assert!(result.is_err());
        assert!(cache.lookup(&k).is_none());
    }

    #[test]
    fn create_displaces_open_entry() {
        let cache = OpenFileCache::new();
        let k = key("a");
        let old = cache.open(&k, || Ok((b"old".to_vec(), None))).unwrap();
        let new = cache.create(&k);
        assert!(!Arc::ptr_eq(&old, &new));

        // Releasing the displaced entry must not unmap the new one.
        assert!(cache.release(&k, &old));
        assert!(Arc::ptr_eq(&cache.lookup(&k).unwrap(), &new));
        assert!(cache.release(&k, &new));
        assert!(cache.lookup(&k).is_none());
    }

    #[test]
    fn sticky_flush_result() {
        let entry = OpenFile::new(Vec::new(), None);
        assert!(entry.state().last_flush_result().is_ok());
        assert!(entry.state().record_flush_error().is_err());
        assert!(entry.state().last_flush_result().is_err());
        entry.state().record_flush_ok();
        assert!(entry.state().last_flush_result().is_ok());
    }
}
