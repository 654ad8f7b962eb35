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

//! Node kinds of the mongofs hierarchy and their filesystem behaviors.
//!
//! Every path in the mount resolves to one of five node kinds.  The kinds
//! form a tagged variant rather than a trait hierarchy so that the behavior
//! of each filesystem operation across all kinds is readable in one place:
//! each callback matches on the variant and delegates to the kind's module.

use bson::Document;
use fuse;
use mongodb;
use mongodb::sync::Collection;
use nix::errno::Errno;

use Context;

mod root;
mod database;
mod collection;
mod filter;
mod document;

pub use self::root::RootNode;
pub use self::database::DatabaseNode;
pub use self::collection::CollectionNode;
pub use self::filter::FilterNode;
pub use self::document::DocumentNode;

/// Generic result type for all node operations.
///
/// The error carries the errno to report to the kernel.
pub type NodeResult<T> = Result<T, KernelError>;

/// An errno-carrying error type for node operations.
#[derive(Debug)]
pub struct KernelError {
    errno: Errno,
}

impl KernelError {
    /// Constructs a new error given a raw errno code.
    pub fn from_errno(errno: Errno) -> KernelError {
        KernelError { errno: errno }
    }

    /// Obtains the errno code contained in this error as an integer.
    pub fn errno_as_i32(&self) -> i32 {
        self.errno as i32
    }
}

impl From<mongodb::error::Error> for KernelError {
    fn from(e: mongodb::error::Error) -> KernelError {
        warn!("MongoDB operation failed: {}", e);
        KernelError::from_errno(Errno::EIO)
    }
}

/// Identity of a node, used as the key of the directory and open-file caches.
///
/// The segments are the database, the collection, then alternating field
/// names and canonically encoded field values, then the pivot field if any.
/// Values are stored in their canonical compact encoding so that two path
/// spellings of the same decoded value share one identity.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NodeKey(Vec<String>);

impl NodeKey {
    pub fn new(segments: Vec<String>) -> NodeKey {
        NodeKey(segments)
    }
}

/// A path within the mount, resolved to its kind.
#[derive(Debug, PartialEq)]
pub enum Node {
    Root(RootNode),
    Database(DatabaseNode),
    Collection(CollectionNode),
    Filter(FilterNode),
    Document(DocumentNode),
}

impl Node {
    /// Returns the cache identity of this node.
    pub fn cache_key(&self) -> NodeKey {
        match *self {
            Node::Root(ref node) => node.cache_key(),
            Node::Database(ref node) => node.cache_key(),
            Node::Collection(ref node) => node.cache_key(),
            Node::Filter(ref node) => node.cache_key(),
            Node::Document(ref node) => node.cache_key(),
        }
    }

    pub fn getattr(&self, ctx: &Context, inode: u64) -> NodeResult<fuse::FileAttr> {
        match *self {
            Node::Root(ref node) => node.getattr(ctx, inode),
            Node::Database(ref node) => node.getattr(ctx, inode),
            Node::Collection(ref node) => node.getattr(ctx, inode),
            Node::Filter(ref node) => node.getattr(ctx, inode),
            Node::Document(ref node) => node.getattr(ctx, inode),
        }
    }

    /// Returns the child names of this node, memoized in the directory cache.
    ///
    /// `None` means the enumeration failed; the failure itself is memoized so
    /// that a storm of lookups against an unreachable server does not retry
    /// on every call.
    pub fn list_files(&self, ctx: &Context) -> Option<Vec<String>> {
        let key = self.cache_key();
        if let Some(listing) = ctx.dir_cache.lookup(&key) {
            return listing;
        }
        let listing = match self.list_files_impl(ctx) {
            Ok(names) => Some(names),
            Err(_) => None,
        };
        ctx.dir_cache.insert(key, listing.clone());
        listing
    }

    fn list_files_impl(&self, ctx: &Context) -> NodeResult<Vec<String>> {
        match *self {
            Node::Root(ref node) => node.list_files_impl(ctx),
            Node::Database(ref node) => node.list_files_impl(ctx),
            Node::Collection(ref node) => node.list_files_impl(ctx),
            Node::Filter(ref node) => node.list_files_impl(ctx),
            Node::Document(_) => Err(KernelError::from_errno(Errno::ENOTDIR)),
        }
    }

    pub fn mkdir(&self, ctx: &Context) -> NodeResult<()> {
        match *self {
            Node::Database(ref node) => node.mkdir(ctx),
            Node::Collection(ref node) => node.mkdir(ctx),
            Node::Filter(ref node) => node.mkdir(ctx),
            Node::Root(_) | Node::Document(_) => {
                Err(KernelError::from_errno(Errno::EACCES))
            },
        }
    }

    pub fn rmdir(&self, ctx: &Context) -> NodeResult<()> {
        match *self {
            Node::Database(ref node) => node.rmdir(ctx),
            Node::Collection(ref node) => node.rmdir(ctx),
            Node::Filter(ref node) => node.rmdir(ctx),
            Node::Root(_) | Node::Document(_) => {
                Err(KernelError::from_errno(Errno::EACCES))
            },
        }
    }

    /// Renames this node onto `target`, itself the routed destination path.
    ///
    /// `None` means the destination did not resolve to any node kind.
    pub fn rename(&self, ctx: &Context, target: Option<&Node>) -> NodeResult<()> {
        match *self {
            Node::Database(ref node) => node.rename(ctx, target),
            Node::Collection(ref node) => node.rename(ctx, target),
            // Renaming filters and documents needs a rewrite of the facet
            // fields of the affected documents; unsupported.
            _ => Err(KernelError::from_errno(Errno::EACCES)),
        }
    }

    pub fn unlink(&self, ctx: &Context) -> NodeResult<()> {
        match *self {
            Node::Document(ref node) => node.unlink(ctx),
            _ => Err(KernelError::from_errno(Errno::EACCES)),
        }
    }
}

/// Builds the attributes shared by all directory kinds.
pub fn directory_attr(inode: u64, ctx: &Context) -> fuse::FileAttr {
    fuse::FileAttr {
        ino: inode,
        kind: fuse::FileType::Directory,
        nlink: 2,
        size: 2,
        blocks: 1,
        atime: ctx.mount_time,
        mtime: ctx.mount_time,
        ctime: ctx.mount_time,
        crtime: ctx.mount_time,
        perm: 0o777,
        uid: ctx.uid,
        gid: ctx.gid,
        rdev: 0,
        flags: 0,
    }
}

/// Builds the attributes of a document file of the given size.
pub fn file_attr(inode: u64, size: u64, ctx: &Context) -> fuse::FileAttr {
    fuse::FileAttr {
        ino: inode,
        kind: fuse::FileType::RegularFile,
        nlink: 1,
        size: size,
        blocks: 1,
        atime: ctx.mount_time,
        mtime: ctx.mount_time,
        ctime: ctx.mount_time,
        crtime: ctx.mount_time,
        perm: 0o666,
        uid: ctx.uid,
        gid: ctx.gid,
        rdev: 0,
        flags: 0,
    }
}

/// Checks `name` against the cached listing of `parent`.
///
/// `None` means the parent's listing itself could not be obtained, which is
/// different from the name being absent.
fn listed_in(ctx: &Context, parent: &Node, name: &str) -> Option<bool> {
    parent.list_files(ctx).map(|names| names.iter().any(|n| n == name))
}

/// Typed handle to the collection a node operates on.
fn collection_handle(ctx: &Context, database: &str, collection: &str)
    -> Collection<Document> {
    ctx.mongo.database(database).collection::<Document>(collection)
}
