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
use json::dumps_value;
use mongodb::options::FindOptions;
use nix::errno::Errno;
use nodes::{collection_handle, directory_attr, KernelError, NodeKey, NodeResult};
use std::collections::BTreeSet;

use Context;

/// How many matching documents are sampled when discovering facet fields.
const FIELD_SAMPLE_LIMIT: i64 = 50;

/// Representation of a faceted navigation step within a collection.
///
/// `filter` is the ordered conjunction of the `(field, value)` pairs bound by
/// the path so far.  When `pivot` is set the path ends in a field name and
/// listing the node enumerates that field's distinct values; otherwise
/// listing enumerates the fields usable as the next pivot.
#[derive(Debug, PartialEq)]
pub struct FilterNode {
    pub database: String,
    pub collection: String,
    pub filter: Document,
    pub pivot: Option<String>,
}

impl FilterNode {
    pub fn new(database: String, collection: String, filter: Document,
        pivot: Option<String>) -> FilterNode {
        FilterNode {
            database: database,
            collection: collection,
            filter: filter,
            pivot: pivot,
        }
    }

    pub fn cache_key(&self) -> NodeKey {
        let mut segments = vec![self.database.clone(), self.collection.clone()];
        for (key, value) in self.filter.iter() {
            segments.push(key.clone());
            segments.push(dumps_value(value));
        }
        if let Some(ref pivot) = self.pivot {
            segments.push(pivot.clone());
        }
        NodeKey::new(segments)
    }

    pub fn getattr(&self, ctx: &Context, inode: u64) -> NodeResult<fuse::FileAttr> {
        // Every filter exists, listed or not: any facet combination is a
        // valid (possibly empty) query.
        Ok(directory_attr(inode, ctx))
    }

    pub fn mkdir(&self, _ctx: &Context) -> NodeResult<()> {
        Err(KernelError::from_errno(Errno::EEXIST))
    }

    /// Removing a filter directory bulk-edits the matching documents: with no
    /// pivot it deletes them all, with a pivot it unsets the pivot field.
    pub fn rmdir(&self, ctx: &Context) -> NodeResult<()> {
        let coll = collection_handle(ctx, &self.database, &self.collection);
        match self.pivot {
            None => {
                coll.delete_many(self.filter.clone(), None)?;
            },
            Some(ref pivot) => {
                let mut unset = Document::new();
                unset.insert(pivot.as_str(), 1);
                coll.update_many(self.filter.clone(), doc! {"$unset": unset}, None)?;
            },
        }
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn list_files_impl(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        match self.pivot {
            None => self.discover_fields(ctx),
            Some(ref pivot) => self.enumerate_values(ctx, pivot),
        }
    }

    /// Samples matching documents and returns the fields usable as the next
    /// facet.
    fn discover_fields(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        let coll = collection_handle(ctx, &self.database, &self.collection);
        let options = FindOptions::builder().limit(FIELD_SAMPLE_LIMIT).build();
        let cursor = coll.find(self.filter.clone(), options)?;
        let mut docs = Vec::new();
        for doc in cursor {
            docs.push(doc?);
        }
        Ok(field_candidates(&docs, &self.filter))
    }

    /// Enumerates the distinct values of the pivot field among matching
    /// documents, with per-value match counts computed server-side.
    fn enumerate_values(&self, ctx: &Context, pivot: &str) -> NodeResult<Vec<String>> {
        let mut match_filter = self.filter.clone();
        match_filter.insert(pivot, doc! {"$exists": true});
        let pipeline = vec![
            doc! {"$match": match_filter},
            doc! {"$group": {"_id": format!("${}", pivot), "count": {"$sum": 1}}},
            doc! {"$sort": {"_id": 1}},
        ];

        let coll = collection_handle(ctx, &self.database, &self.collection);
        let cursor = coll.aggregate(pipeline, None)?;
        let mut names = Vec::new();
        for row in cursor {
            if let Some(name) = value_entry(&row?) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Computes the candidate facet fields over a sample of documents: every key
/// holding a scalar value, minus the keys the filter already binds.
///
/// The result is sorted so a fixed database state always lists the same way.
pub fn field_candidates(docs: &[Document], filter: &Document) -> Vec<String> {
    let mut fields = BTreeSet::new();
    for doc in docs {
        for (key, value) in doc.iter() {
            match *value {
                Bson::Document(_) | Bson::Array(_) => continue,
                _ => (),
            }
            if !filter.contains_key(key) {
                fields.insert(key.clone());
            }
        }
    }
    fields.into_iter().collect()
}

/// Formats one aggregation row as a directory entry.
///
/// The entry is the encoded value, suffixed with `.json` when exactly one
/// document matches (the subpath then resolves to a unique document leaf).
/// Rows whose grouped value is an object or an array yield no entry.
pub fn value_entry(row: &Document) -> Option<String> {
    let value = match row.get("_id") {
        None | Some(&Bson::Document(_)) | Some(&Bson::Array(_)) => return None,
        Some(value) => value,
    };
    let count = match row.get("count") {
        Some(&Bson::Int32(count)) => i64::from(count),
        Some(&Bson::Int64(count)) => count,
        Some(&Bson::Double(count)) => count as i64,
        _ => 0,
    };

    let mut name = dumps_value(value);
    if count == 1 {
        name.push_str(".json");
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_candidates_skips_compound_values() {
        let docs = [
            doc! {"a": 1, "b": 2},
            doc! {"a": 1, "nested": {"x": 1}, "list": [1, 2]},
        ];
        let filter = Document::new();
        assert_eq!(vec!["a".to_owned(), "b".to_owned()], field_candidates(&docs, &filter));
    }

    #[test]
    fn field_candidates_subtracts_bound_fields() {
        let docs = [doc! {"a": 1, "b": 2}, doc! {"b": 3, "c": 4}];
        let filter = doc! {"a": 1};
        assert_eq!(vec!["b".to_owned(), "c".to_owned()], field_candidates(&docs, &filter));
    }

    #[test]
    fn field_candidates_is_deterministic() {
        let docs = [doc! {"zeta": 1}, doc! {"alpha": 1}, doc! {"mid": 1}];
        let filter = Document::new();
        let first = field_candidates(&docs, &filter);
        assert_eq!(first, field_candidates(&docs, &filter));
        assert_eq!(vec!["alpha".to_owned(), "mid".to_owned(), "zeta".to_owned()], first);
    }

    #[test]
    fn value_entry_unique_match_gets_suffix() {
        assert_eq!(Some("2.json".to_owned()), value_entry(&doc! {"_id": 2, "count": 1}));
        assert_eq!(Some("1".to_owned()), value_entry(&doc! {"_id": 1, "count": 2}));
    }

    #[test]
    fn value_entry_encodes_values() {
        assert_eq!(
            Some("\"x\".json".to_owned()),
            value_entry(&doc! {"_id": "x", "count": 1}));
        assert_eq!(
            Some("null".to_owned()),
            value_entry(&doc! {"_id": Bson::Null, "count": 3}));
    }

    #[test]
    fn value_entry_skips_compound_values() {
        assert_eq!(None, value_entry(&doc! {"_id": {"x": 1}, "count": 1}));
        assert_eq!(None, value_entry(&doc! {"_id": [1, 2], "count": 1}));
    }

    #[test]
    fn value_entry_count_types() {
        assert_eq!(
            Some("5.json".to_owned()),
            value_entry(&doc! {"_id": 5, "count": Bson::Int64(1)}));
        assert_eq!(
            Some("5.json".to_owned()),
            value_entry(&doc! {"_id": 5, "count": Bson::Double(1.0)}));
    }
}
