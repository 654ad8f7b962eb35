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

//! Bounded, time-expiring memoization of directory listings.
//!
//! `readdir` and `getattr` storms (a single `ls -l` issues one stat per
//! entry) would otherwise hit the database once per call.  Listings are
//! memoized per node identity for a few seconds; any mutation wipes the
//! whole cache rather than tracking which listings a given write can
//! invalidate.

use nodes::NodeKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bounded mapping from node identity to a recent listing outcome.
pub struct DirCache {
    entries: Mutex<HashMap<NodeKey, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

struct CacheEntry {
    /// The memoized listing; `None` records a failed enumeration, which is
    /// just as worth remembering as a successful one.
    listing: Option<Vec<String>>,
    stored: Instant,
}

impl DirCache {
    pub fn new(capacity: usize, ttl: Duration) -> DirCache {
        DirCache {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity,
            ttl: ttl,
        }
    }

    /// Returns the memoized outcome for `key` if it is still fresh.
    ///
    /// The outer `Option` distinguishes a cache miss from a memoized failed
    /// enumeration.
    pub fn lookup(&self, key: &NodeKey) -> Option<Option<Vec<String>>> {
        let mut entries = self.entries.lock().unwrap();
        let expired = match entries.get(key) {
            Some(entry) => {
                if entry.stored.elapsed() < self.ttl {
                    return Some(entry.listing.clone());
                }
                true
            },
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Memoizes an enumeration outcome, evicting the stalest entry when the
    /// cache is full.
    pub fn insert(&self, key: NodeKey, listing: Option<Vec<String>>) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries.iter()
                .min_by_key(|&(_, entry)| entry.stored)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CacheEntry { listing: listing, stored: Instant::now() });
    }

    /// Drops every memoized listing.  Called by all mutating operations.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key(name: &str) -> NodeKey {
        NodeKey::new(vec![name.to_owned()])
    }

    fn listing(names: &[&str]) -> Option<Vec<String>> {
        Some(names.iter().map(|name| (*name).to_owned()).collect())
    }

    #[test]
    fn lookup_hit_and_miss() {
        let cache = DirCache::new(10, Duration::from_secs(10));
        assert_eq!(None, cache.lookup(&key("a")));

        cache.insert(key("a"), listing(&["x", "y"]));
        assert_eq!(Some(listing(&["x", "y"])), cache.lookup(&key("a")));
        assert_eq!(None, cache.lookup(&key("b")));
    }

    #[test]
    fn failed_enumerations_are_memoized() {
        let cache = DirCache::new(10, Duration::from_secs(10));
        cache.insert(key("a"), None);
        assert_eq!(Some(None), cache.lookup(&key("a")));
    }

    #[test]
    fn entries_expire() {
        let cache = DirCache::new(10, Duration::from_millis(20));
        cache.insert(key("a"), listing(&["x"]));
        assert_eq!(Some(listing(&["x"])), cache.lookup(&key("a")));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(None, cache.lookup(&key("a")));
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = DirCache::new(2, Duration::from_secs(10));
        cache.insert(key("a"), listing(&["1"]));
        thread::sleep(Duration::from_millis(2));
        cache.insert(key("b"), listing(&["2"]));
        thread::sleep(Duration::from_millis(2));
        cache.insert(key("c"), listing(&["3"]));

        // The oldest entry must have been evicted to make room.
        assert_eq!(None, cache.lookup(&key("a")));
        assert_eq!(Some(listing(&["2"])), cache.lookup(&key("b")));
        assert_eq!(Some(listing(&["3"])), cache.lookup(&key("c")));
    }

    #[test]
    fn reinserting_does_not_evict() {
        let cache = DirCache::new(2, Duration::from_secs(10));
        cache.insert(key("a"), listing(&["1"]));
        cache.insert(key("b"), listing(&["2"]));
        cache.insert(key("a"), listing(&["1b"]));

        assert_eq!(Some(listing(&["1b"])), cache.lookup(&key("a")));
        assert_eq!(Some(listing(&["2"])), cache.lookup(&key("b")));
    }

    #[test]
    fn clear_wipes_everything() {
        let cache = DirCache::new(10, Duration::from_secs(10));
        cache.insert(key("a"), listing(&["1"]));
        cache.insert(key("b"), None);
        cache.clear();
        assert_eq!(None, cache.lookup(&key("a")));
        assert_eq!(None, cache.lookup(&key("b")));
    }
}
