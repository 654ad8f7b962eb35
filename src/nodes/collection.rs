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

use bson::Document;
use fuse;
use nix::errno::Errno;
use nodes::{directory_attr, listed_in, DatabaseNode, FilterNode, KernelError, Node, NodeKey,
    NodeResult};

use Context;

/// Representation of a collection directory.
///
/// Listing a collection starts the faceted navigation: it delegates to the
/// filter node with no facets bound yet.
#[derive(Debug, PartialEq)]
pub struct CollectionNode {
    pub database: String,
    pub collection: String,
}

impl CollectionNode {
    pub fn new(database: String, collection: String) -> CollectionNode {
        CollectionNode { database: database, collection: collection }
    }

    pub fn cache_key(&self) -> NodeKey {
        NodeKey::new(vec![self.database.clone(), self.collection.clone()])
    }

    fn exists(&self, ctx: &Context) -> Option<bool> {
        let parent = Node::Database(DatabaseNode::new(self.database.clone()));
        listed_in(ctx, &parent, &self.collection)
    }

    pub fn getattr(&self, ctx: &Context, inode: u64) -> NodeResult<fuse::FileAttr> {
        match self.exists(ctx) {
            Some(true) => Ok(directory_attr(inode, ctx)),
            _ => Err(KernelError::from_errno(Errno::ENOENT)),
        }
    }

    pub fn mkdir(&self, ctx: &Context) -> NodeResult<()> {
        match self.exists(ctx) {
            Some(true) => return Err(KernelError::from_errno(Errno::EEXIST)),
            Some(false) => (),
            None => return Err(KernelError::from_errno(Errno::EIO)),
        }

        ctx.mongo.database(&self.database).create_collection(&self.collection, None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn rmdir(&self, ctx: &Context) -> NodeResult<()> {
        match self.exists(ctx) {
            Some(true) => (),
            Some(false) => return Err(KernelError::from_errno(Errno::ENOENT)),
            None => return Err(KernelError::from_errno(Errno::EIO)),
        }

        ctx.mongo.database(&self.database)
            .collection::<Document>(&self.collection)
            .drop(None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn rename(&self, ctx: &Context, target: Option<&Node>) -> NodeResult<()> {
        let target = match target {
            Some(&Node::Collection(ref target)) => target,
            _ => return Err(KernelError::from_errno(Errno::EACCES)),
        };
        match self.exists(ctx) {
            Some(true) => (),
            Some(false) => return Err(KernelError::from_errno(Errno::ENOENT)),
            None => return Err(KernelError::from_errno(Errno::EIO)),
        }
        match target.exists(ctx) {
            Some(false) => (),
            Some(true) => return Err(KernelError::from_errno(Errno::EEXIST)),
            None => return Err(KernelError::from_errno(Errno::EIO)),
        }

        // Unlike databases, collections have a server-side rename that moves
        // the data atomically, even across databases.
        ctx.mongo.database("admin").run_command(
            doc! {
                "renameCollection": format!("{}.{}", self.database, self.collection),
                "to": format!("{}.{}", target.database, target.collection),
            },
            None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn list_files_impl(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        let filter = FilterNode::new(
            self.database.clone(), self.collection.clone(), Document::new(), None);
        match Node::Filter(filter).list_files(ctx) {
            Some(names) => Ok(names),
            None => Err(KernelError::from_errno(Errno::EIO)),
        }
    }
}
