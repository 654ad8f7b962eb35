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
use nodes::{directory_attr, listed_in, KernelError, Node, NodeKey, NodeResult, RootNode};

use Context;

/// Representation of a database directory.  Its children are the collections
/// of the database.
#[derive(Debug, PartialEq)]
pub struct DatabaseNode {
    pub database: String,
}

impl DatabaseNode {
    pub fn new(database: String) -> DatabaseNode {
        DatabaseNode { database: database }
    }

    pub fn cache_key(&self) -> NodeKey {
        NodeKey::new(vec![self.database.clone()])
    }

    /// Checks this database against the root's cached listing instead of
    /// querying the server on every stat.
    fn exists(&self, ctx: &Context) -> Option<bool> {
        listed_in(ctx, &Node::Root(RootNode), &self.database)
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

        // There is no explicit "createDatabase" command; creating and
        // dropping a collection inside materializes the database.
        let db = ctx.mongo.database(&self.database);
        db.create_collection("_", None)?;
        db.collection::<Document>("_").drop(None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn rmdir(&self, ctx: &Context) -> NodeResult<()> {
        match self.exists(ctx) {
            Some(true) => (),
            Some(false) => return Err(KernelError::from_errno(Errno::ENOENT)),
            None => return Err(KernelError::from_errno(Errno::EIO)),
        }

        ctx.mongo.database(&self.database).drop(None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn rename(&self, ctx: &Context, target: Option<&Node>) -> NodeResult<()> {
        let target = match target {
            Some(&Node::Database(ref target)) => target,
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

        // There is no "renameDatabase" command either: copy into the new
        // name, then drop the old one.  Not atomic; a failure of the drop
        // after a successful copy leaves both databases behind.
        ctx.mongo.database("admin").run_command(
            doc! {
                "copydb": 1,
                "fromdb": self.database.as_str(),
                "todb": target.database.as_str(),
            },
            None)?;
        ctx.mongo.database(&self.database).drop(None)?;
        ctx.dir_cache.clear();
        Ok(())
    }

    pub fn list_files_impl(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        let names = ctx.mongo.database(&self.database).list_collection_names(None)?;
        Ok(names.into_iter().filter(|name| !name.starts_with("system.")).collect())
    }
}
