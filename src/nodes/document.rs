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

use bson::{Bson, Document};
use fuse;
use json::{dumps_value, loads_value};
use nix::errno::Errno;
use nodes::{collection_handle, file_attr, FilterNode, KernelError, Node, NodeKey, NodeResult};
use openfiles::OpenFile;
use std::sync::Arc;

use Context;

/// Size reported for a document that is not open.
///
/// The accurate size is only known after rendering the document, which would
/// cost a database round trip per stat; the parent listing already proves
/// existence.  Mount with `fetch_file_length` to trade the round trip for
/// accurate sizes.
const SENTINEL_SIZE: u64 = 1;

/// Representation of a single document, reached through a filter that
/// matches it uniquely.
#[derive(Debug, PartialEq)]
pub struct DocumentNode {
    pub database: String,
    pub collection: String,
    pub filter: Document,
}

impl DocumentNode {
    pub fn new(database: String, collection: String, filter: Document) -> DocumentNode {
        DocumentNode { database: database, collection: collection, filter: filter }
    }

    pub fn cache_key(&self) -> NodeKey {
        let mut segments = vec![self.database.clone(), self.collection.clone()];
        for (key, value) in self.filter.iter() {
            segments.push(key.clone());
            segments.push(dumps_value(value));
        }
        NodeKey::new(segments)
    }

    /// The filter node that lists this document's parent directory: the same
    /// filter minus its last pair, pivoted on that pair's field.
    fn parent(&self) -> Option<(FilterNode, Bson)> {
        let (field, leaf) = match self.filter.iter().last() {
            Some((field, leaf)) => (field.clone(), leaf.clone()),
            None => return None,
        };
        let mut parent_filter = self.filter.clone();
        parent_filter.remove(&field);
        let parent = FilterNode::new(
            self.database.clone(), self.collection.clone(), parent_filter, Some(field));
        Some((parent, leaf))
    }

    pub fn getattr(&self, ctx: &Context, inode: u64) -> NodeResult<fuse::FileAttr> {
        if ctx.config.fetch_file_length {
            // Open and immediately release the document to learn its
            // rendered size.
            if let Ok(entry) = self.open(ctx) {
                let size = entry.size();
                let _ = self.release(ctx, &entry);
                return Ok(file_attr(inode, size, ctx));
            }
        } else if let Some(entry) = ctx.open_files.lookup(&self.cache_key()) {
            return Ok(file_attr(inode, entry.size(), ctx));
        }

        // Consulting the parent's cached listing proves existence without a
        // database round trip per stat.
        if let Some((parent, leaf)) = self.parent() {
            if let Some(entries) = Node::Filter(parent).list_files(ctx) {
                for entry in entries {
                    if !entry.ends_with(".json") {
                        continue;
                    }
                    let encoded = &entry[..entry.len() - ".json".len()];
                    if let Ok(value) = loads_value(encoded) {
                        if value == leaf {
                            return Ok(file_attr(inode, SENTINEL_SIZE, ctx));
                        }
                    }
                }
            }
        }

        Err(KernelError::from_errno(Errno::ENOENT))
    }

    /// Opens the document, fetching and rendering it on the first open and
    /// sharing the buffer with any other outstanding handle.
    pub fn open(&self, ctx: &Context) -> NodeResult<Arc<OpenFile>> {
        ctx.open_files.open(&self.cache_key(), || {
            let coll = collection_handle(ctx, &self.database, &self.collection);
            let mut doc = match coll.find_one(self.filter.clone(), None)? {
                Some(doc) => doc,
                None => return Err(KernelError::from_errno(Errno::ENOENT)),
            };

            // The primary key is remembered even when hidden from the
            // rendered text so that flushes replace the same record.
            let id = if ctx.config.hide_id {
                doc.remove("_id")
            } else {
                doc.get("_id").cloned()
            };

            Ok((ctx.json.render_document(&doc), id))
        })
    }

    /// Materializes a brand-new document as an empty open buffer.  Nothing is
    /// stored until the first flush, which inserts and binds the primary key.
    pub fn create(&self, ctx: &Context) -> Arc<OpenFile> {
        ctx.open_files.create(&self.cache_key())
    }

    pub fn unlink(&self, ctx: &Context) -> NodeResult<()> {
        let coll = collection_handle(ctx, &self.database, &self.collection);
        coll.delete_one(self.filter.clone(), None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    /// Truncation arrives without a file handle, which is why the open-file
    /// entry is shared per document rather than per handle.
    pub fn truncate(&self, ctx: &Context, size: u64) -> NodeResult<()> {
        let entry = self.open(ctx)?;
        entry.truncate(size);
        self.release(ctx, &entry)
    }

    /// Drops one reference to the shared entry; the last release removes it
    /// from the cache and writes it back.
    pub fn release(&self, ctx: &Context, entry: &Arc<OpenFile>) -> NodeResult<()> {
        if ctx.open_files.release(&self.cache_key(), entry) {
            return self.flush(ctx, entry);
        }
        Ok(())
    }

    /// Writes the buffer back to the store if it changed since the last
    /// flush.  A clean buffer reports the outcome of the previous flush.
    pub fn flush(&self, ctx: &Context, entry: &Arc<OpenFile>) -> NodeResult<()> {
        let mut state = entry.state();
        if !state.dirty {
            return state.last_flush_result();
        }

        let mut doc = match ctx.json.parse_document(&state.buffer) {
            Ok(doc) => doc,
            Err(e) => {
                ctx.notifier.notify("Invalid mongofs document", &e.to_string());
                state.dirty = false;
                return state.record_flush_error();
            },
        };

        // Merge the path's facets back in so the document keeps matching the
        // filter it was reached through.
        for (key, value) in self.filter.iter() {
            doc.insert(key.clone(), value.clone());
        }

        let coll = collection_handle(ctx, &self.database, &self.collection);
        let outcome = match state.id {
            None => coll.insert_one(&doc, None).map(|result| Some(result.inserted_id)),
            Some(ref id) => {
                coll.replace_one(doc! {"_id": id.clone()}, &doc, None).map(|_| None)
            },
        };
        match outcome {
            Ok(new_id) => {
                if let Some(id) = new_id {
                    state.id = Some(id);
                }
                ctx.dir_cache.clear();
                state.dirty = false;
                state.record_flush_ok();
                Ok(())
            },
            Err(e) => {
                warn!("Write-back of {}.{} failed: {}", self.database, self.collection, e);
                state.record_flush_error()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dircache::DirCache;
    use json::JsonFormat;
    use mongodb::sync::Client;
    use notify::NullNotifier;
    use openfiles::OpenFileCache;
    use routing::route;
    use std::time::Duration;
    use {Config, Context};

    fn document(path: &str) -> DocumentNode {
        match route(path) {
            Some(Node::Document(node)) => node,
            other => panic!("{} did not route to a document: {:?}", path, other),
        }
    }

    fn test_context() -> Context {
        let config = Config::default();
        Context {
            mongo: Client::with_uri_str(
                "mongodb://localhost/?connectTimeoutMS=2000&serverSelectionTimeoutMS=2000")
                .unwrap(),
            json: JsonFormat::new(config.json_indent, config.json_escaping,
                config.json_encoding),
            dir_cache: DirCache::new(100, Duration::from_secs(10)),
            open_files: OpenFileCache::new(),
            notifier: Box::new(NullNotifier),
            mount_time: ::time::get_time(),
            uid: 0,
            gid: 0,
            config: config,
        }
    }

    #[test]
    fn cache_key_uses_decoded_values() {
        // Two spellings of the same value address the same entry.
        let first = document("/db/coll/name/\"A\".json");
        let second = document("/db/coll/name/\"\\u0041\".json");
        assert_eq!(first.cache_key(), second.cache_key());

        let third = document("/db/coll/name/\"B\".json");
        assert_ne!(first.cache_key(), third.cache_key());
    }

    #[test]
    fn parent_is_pivoted_on_the_last_facet() {
        let node = document("/db/coll/a/1/b/2.json");
        let (parent, leaf) = node.parent().unwrap();
        assert_eq!(doc! {"a": 1}, parent.filter);
        assert_eq!(Some("b".to_owned()), parent.pivot);
        assert_eq!(leaf, *node.filter.get("b").unwrap());
    }

    #[test]
    fn empty_filter_has_no_parent() {
        let node = DocumentNode::new("db".to_owned(), "coll".to_owned(), Document::new());
        assert!(node.parent().is_none());
    }

    // The tests below need a MongoDB server on localhost and are skipped by
    // default; run them with `cargo test -- --ignored`.

    #[test]
    #[ignore]
    fn create_write_release_round_trip() {
        let ctx = test_context();
        let coll = collection_handle(&ctx, "mongofs_test", "docs");
        let _ = coll.drop(None);

        let node = document("/mongofs_test/docs/name/\"x\".json");
        let entry = node.create(&ctx);
        assert_eq!(8, entry.write(0, b"{\"k\": 1}"));
        node.release(&ctx, &entry).unwrap();

        let stored = coll.find_one(doc! {"name": "x"}, None).unwrap().unwrap();
        assert_eq!("1", dumps_value(stored.get("k").unwrap()));
        assert_eq!("\"x\"", dumps_value(stored.get("name").unwrap()));
    }

    #[test]
    #[ignore]
    fn open_missing_document_is_enoent() {
        let ctx = test_context();
        let coll = collection_handle(&ctx, "mongofs_test", "docs");
        let _ = coll.drop(None);

        let node = document("/mongofs_test/docs/name/\"nope\".json");
        let err = node.open(&ctx).unwrap_err();
        assert_eq!(Errno::ENOENT as i32, err.errno_as_i32());
    }

    #[test]
    #[ignore]
    fn flush_of_broken_json_is_sticky() {
        let ctx = test_context();
        let coll = collection_handle(&ctx, "mongofs_test", "docs");
        let _ = coll.drop(None);

        let node = document("/mongofs_test/docs/name/\"x\".json");
        let entry = node.create(&ctx);
        entry.write(0, b"{broken");
        assert_eq!(Errno::EIO as i32,
            node.flush(&ctx, &entry).unwrap_err().errno_as_i32());
        // The buffer is clean now; the next flush reports the stashed error.
        assert_eq!(Errno::EIO as i32,
            node.flush(&ctx, &entry).unwrap_err().errno_as_i32());
        assert!(coll.find_one(None, None).unwrap().is_none());
    }
}
