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

use fuse;
use nodes::{directory_attr, NodeKey, NodeResult};

use Context;

/// Representation of the mount root.  Its children are the databases of the
/// deployment.
#[derive(Debug, PartialEq)]
pub struct RootNode;

impl RootNode {
    pub fn cache_key(&self) -> NodeKey {
        NodeKey::new(Vec::new())
    }

    pub fn getattr(&self, ctx: &Context, inode: u64) -> NodeResult<fuse::FileAttr> {
        Ok(directory_attr(inode, ctx))
    }

    pub fn list_files_impl(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        Ok(ctx.mongo.list_database_names(None, None)?)
    }
}
