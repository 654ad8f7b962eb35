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

//! Resolution of mount-relative paths into typed nodes.
//!
//! The path grammar is:
//!
//! ```text
//! /                       the root; children are databases
//! /db                     a database; children are collections
//! /db/coll                a collection; children start the faceted listing
//! /db/coll/fp             a filter; fp alternates field names and values
//! /db/coll/fp.json        the single document matching fp
//! ```
//!
//! Resolution is total: a path that cannot be decoded simply resolves to no
//! node at all, which the callbacks report as a missing entry.

use bson::Document;
use escaping::unescape;
use json::loads_value;
use nodes::{CollectionNode, DatabaseNode, DocumentNode, FilterNode, Node, RootNode};

/// Resolves a mount-relative path into the node it addresses, or `None` when
/// any component fails to decode.
pub fn route(path: &str) -> Option<Node> {
    let relative = path.trim_matches('/');
    if relative.is_empty() {
        return Some(Node::Root(RootNode));
    }

    let components: Vec<&str> = relative.split('/').collect();
    let database = unescape(components[0]).ok()?;
    if components.len() == 1 {
        return Some(Node::Database(DatabaseNode::new(database)));
    }
    let collection = unescape(components[1]).ok()?;
    if components.len() == 2 {
        return Some(Node::Collection(CollectionNode::new(database, collection)));
    }

    // The .json suffix is stripped from the raw path before any component is
    // decoded: escaping never produces it, so there is no ambiguity.
    let mut filter_path: Vec<&str> = components[2..].to_vec();
    let mut document = false;
    let last = filter_path[filter_path.len() - 1];
    if last.ends_with(".json") {
        let pos = filter_path.len() - 1;
        filter_path[pos] = &last[..last.len() - ".json".len()];
        document = true;
    }

    let (filter, pivot) = parse_filter_path(&filter_path)?;
    if document {
        if pivot.is_some() {
            // A document path must bind a value to every field.
            return None;
        }
        Some(Node::Document(DocumentNode::new(database, collection, filter)))
    } else {
        Some(Node::Filter(FilterNode::new(database, collection, filter, pivot)))
    }
}

/// Decodes the facet components of a path into the ordered filter they
/// describe, plus the trailing pivot field when the count is odd.
fn parse_filter_path(components: &[&str]) -> Option<(Document, Option<String>)> {
    let mut filter = Document::new();
    for pair in components.chunks(2) {
        let field = unescape(pair[0]).ok()?;
        if pair.len() == 1 {
            return Some((filter, Some(field)));
        }
        let value = loads_value(&unescape(pair[1]).ok()?).ok()?;
        filter.insert(field, value);
    }
    Some((filter, None))
}
