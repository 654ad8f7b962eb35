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

//! mongofs mounts a MongoDB deployment as a FUSE file system.
//!
//! Databases appear as top-level directories, collections as subdirectories,
//! and each stored document as a JSON file.  Below a collection the hierarchy
//! is synthesized by faceted navigation: path components alternate between
//! field names and JSON-encoded values, and each pair narrows an equality
//! filter.  Listing such a directory enumerates the next candidate fields or
//! the distinct values of one field; a path whose filter matches exactly one
//! document ends in a readable, writable `.json` file.

#[macro_use] extern crate bson;
extern crate encoding_rs;
#[macro_use] extern crate failure;
extern crate fuse;
#[macro_use] extern crate log;
extern crate mongodb;
extern crate nix;
extern crate serde_json;
extern crate signal_hook;
extern crate time;

use encoding_rs::Encoding;
use failure::{Error, ResultExt};
use mongodb::sync::Client;
use nix::errno::Errno;
use nix::unistd;
use signal_hook::iterator::Signals;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::Timespec;

mod dircache;
mod escaping;
mod json;
mod nodes;
pub mod notify;
mod openfiles;
mod routing;

use dircache::DirCache;
use json::JsonFormat;
use nodes::{file_attr, Node};
use notify::Notifier;
use openfiles::{OpenFile, OpenFileCache};

/// Validity period the kernel may cache attributes and entries for.  Kept
/// short because the store mutates behind the kernel's back.
pub const TTL: Timespec = Timespec { sec: 1, nsec: 0 };

/// Fixed bound on the number of memoized directory listings.
const DIR_CACHE_CAPACITY: usize = 100;

/// Maximum age of a memoized directory listing.
const DIR_CACHE_TTL: Duration = Duration::from_secs(10);

/// An error indicating an invalid mount option.
#[derive(Debug, Eq, Fail, PartialEq)]
pub enum OptionsError {
    /// The given key is not a known mount option.
    #[fail(display = "unknown mount option {:?}", key)]
    UnknownOption { key: String },

    /// The given value cannot be parsed for the given key.
    #[fail(display = "invalid value {:?} for mount option {:?}", value, key)]
    InvalidValue { key: String, value: String },

    /// The given label does not name a supported character encoding.
    #[fail(display = "unknown encoding {:?}", label)]
    UnknownEncoding { label: String },
}

/// Runtime settings, parsed from `-o` mount options.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address of the MongoDB server: a hostname, a `host:port` pair, or a
    /// full connection URI.
    pub host: String,

    /// Omit the primary key from rendered documents.
    pub hide_id: bool,

    /// Make `getattr` open and release documents to report accurate sizes
    /// instead of a placeholder, at the cost of a round trip per stat.
    pub fetch_file_length: bool,

    /// Escape all non-ASCII characters in rendered documents.
    pub json_escaping: bool,

    /// Byte encoding of rendered documents.
    pub json_encoding: &'static Encoding,

    /// Spaces of indentation in rendered documents; negative for compact
    /// single-line output.
    pub json_indent: i32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            host: "localhost".to_owned(),
            hide_id: false,
            fetch_file_length: false,
            json_escaping: false,
            json_encoding: encoding_rs::UTF_8,
            json_indent: 4,
        }
    }
}

fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, OptionsError> {
    match value {
        Some(value) => Ok(value),
        None => Err(OptionsError::InvalidValue {
            key: key.to_owned(), value: "".to_owned() }),
    }
}

fn flag(key: &str, value: Option<&str>) -> Result<bool, OptionsError> {
    match value {
        None => Ok(true),
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some("false") | Some("no") | Some("0") => Ok(false),
        Some(other) => Err(OptionsError::InvalidValue {
            key: key.to_owned(), value: other.to_owned() }),
    }
}

impl Config {
    /// Parses the `key=value` mount options given with `-o`.
    pub fn parse(options: &[String]) -> Result<Config, OptionsError> {
        let mut config = Config::default();
        for option in options {
            let mut parts = option.splitn(2, '=');
            let key = parts.next().unwrap();
            let value = parts.next();
            match key {
                "host" => config.host = required(key, value)?.to_owned(),
                "hide_id" => config.hide_id = flag(key, value)?,
                "fetch_file_length" => config.fetch_file_length = flag(key, value)?,
                "json_escaping" => config.json_escaping = flag(key, value)?,
                "json_encoding" => {
                    let label = required(key, value)?;
                    config.json_encoding = match Encoding::for_label(label.as_bytes()) {
                        Some(encoding) => encoding,
                        None => return Err(OptionsError::UnknownEncoding {
                            label: label.to_owned() }),
                    };
                },
                "json_indent" => {
                    let text = required(key, value)?;
                    config.json_indent = text.parse().map_err(|_| {
                        OptionsError::InvalidValue {
                            key: key.to_owned(), value: text.to_owned() }
                    })?;
                },
                _ => return Err(OptionsError::UnknownOption { key: key.to_owned() }),
            }
        }
        Ok(config)
    }

    /// Connection URI for the configured host.  Bare hostnames get the
    /// standard scheme and short timeouts; full URIs pass through untouched.
    fn uri(&self) -> String {
        if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("mongodb://{}/?connectTimeoutMS=2000&serverSelectionTimeoutMS=2000",
                self.host)
        }
    }
}

/// Monotonically-increasing generator of identifiers, used for inode numbers
/// and file handles.
pub struct IdGenerator {
    last_id: AtomicUsize,
}

impl IdGenerator {
    fn new(start_value: u64) -> Self {
        IdGenerator { last_id: AtomicUsize::new(start_value as usize) }
    }

    /// Obtains a new identifier.
    pub fn next(&self) -> u64 {
        let id = self.last_id.fetch_add(1, Ordering::AcqRel);
        if id >= ::std::u64::MAX as usize {
            panic!("Ran out of identifiers");
        }
        id as u64
    }
}

/// Bidirectional mapping between kernel inode numbers and mount-relative
/// paths.
///
/// The kernel speaks inodes while every node of this filesystem is addressed
/// by its path, so each path the kernel learns about gets a stable inode
/// pinned to it.  Entries are never dropped: the kernel may ask about any
/// inode it has seen at any later time.
pub struct InodeTable {
    state: Mutex<InodeTableState>,
}

struct InodeTableState {
    by_inode: HashMap<u64, String>,
    by_path: HashMap<String, u64>,
}

impl InodeTable {
    pub fn new() -> InodeTable {
        let mut by_inode = HashMap::new();
        let mut by_path = HashMap::new();
        by_inode.insert(fuse::FUSE_ROOT_ID, "/".to_owned());
        by_path.insert("/".to_owned(), fuse::FUSE_ROOT_ID);
        InodeTable {
            state: Mutex::new(InodeTableState {
                by_inode: by_inode,
                by_path: by_path,
            }),
        }
    }

    /// Returns the inode pinned to `path`, assigning a fresh one on first
    /// sight.
    pub fn pin(&self, ids: &IdGenerator, path: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        if let Some(&inode) = state.by_path.get(path) {
            return inode;
        }
        let inode = ids.next();
        state.by_inode.insert(inode, path.to_owned());
        state.by_path.insert(path.to_owned(), inode);
        inode
    }

    /// Returns the path pinned to `inode`, if the kernel ever saw it.
    pub fn path_of(&self, inode: u64) -> Option<String> {
        self.state.lock().unwrap().by_inode.get(&inode).cloned()
    }
}

/// Appends a name to a mount-relative directory path.
fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Returns the parent of a mount-relative path; the root is its own parent.
fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(pos) => path[..pos].to_owned(),
    }
}

/// Shared state handed to every node operation: the database client, the
/// caches, the codec and the mount settings.
pub(crate) struct Context {
    /// Shared MongoDB client; safe for concurrent use by contract.
    pub mongo: Client,

    pub config: Config,

    /// Document codec configured from the mount options.
    pub json: JsonFormat,

    pub dir_cache: DirCache,

    pub open_files: OpenFileCache,

    pub notifier: Box<dyn Notifier>,

    /// Timestamp reported for all synthesized attributes.
    pub mount_time: Timespec,

    pub uid: u32,
    pub gid: u32,
}

/// FUSE file system implementation of mongofs.
pub struct MongoFS {
    ctx: Context,

    /// Generator of inode numbers and file handles.
    ids: IdGenerator,

    inodes: InodeTable,

    /// Mapping of handle numbers to shared open-file entries.
    handles: Mutex<HashMap<u64, Arc<OpenFile>>>,
}

impl MongoFS {
    fn new(ctx: Context) -> MongoFS {
        MongoFS {
            ctx: ctx,
            ids: IdGenerator::new(fuse::FUSE_ROOT_ID + 1),
            inodes: InodeTable::new(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves an inode into its path and the typed node addressed by it.
    fn find_node(&self, inode: u64) -> Option<(String, Node)> {
        let path = self.inodes.path_of(inode)?;
        let node = routing::route(&path)?;
        Some((path, node))
    }

    /// Resolves the child `name` of the directory behind `parent`.
    fn find_child(&self, parent: u64, name: &OsStr) -> Option<(String, Node)> {
        let parent_path = self.inodes.path_of(parent)?;
        let name = name.to_str()?;
        let path = join_path(&parent_path, name);
        let node = routing::route(&path)?;
        Some((path, node))
    }

    /// Gets a handle given its identifier.
    ///
    /// We assume that the identifier is valid and that we have a known handle
    /// for it; otherwise, we crash.  The kernel should only ever ask us for
    /// handle numbers we have previously told it about.
    fn find_handle(&self, fh: u64) -> Arc<OpenFile> {
        let handles = self.handles.lock().unwrap();
        handles.get(&fh).expect("Kernel requested unknown handle").clone()
    }
}

impl fuse::Filesystem for MongoFS {
    fn lookup(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr,
        reply: fuse::ReplyEntry) {
        let (path, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        let inode = self.inodes.pin(&self.ids, &path);
        match node.getattr(&self.ctx, inode) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn getattr(&mut self, _req: &fuse::Request, inode: u64, reply: fuse::ReplyAttr) {
        match self.find_node(inode) {
            Some((_, node)) => match node.getattr(&self.ctx, inode) {
                Ok(attr) => reply.attr(&TTL, &attr),
                Err(e) => reply.error(e.errno_as_i32()),
            },
            None => reply.error(Errno::ENOENT as i32),
        }
    }

    fn setattr(&mut self, _req: &fuse::Request, inode: u64, _mode: Option<u32>,
        _uid: Option<u32>, _gid: Option<u32>, size: Option<u64>, _atime: Option<Timespec>,
        _mtime: Option<Timespec>, _fh: Option<u64>, _crtime: Option<Timespec>,
        _chgtime: Option<Timespec>, _bkuptime: Option<Timespec>, _flags: Option<u32>,
        reply: fuse::ReplyAttr) {
        let (_, node) = match self.find_node(inode) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };

        if let Some(size) = size {
            match node {
                Node::Document(ref document) => {
                    if let Err(e) = document.truncate(&self.ctx, size) {
                        return reply.error(e.errno_as_i32());
                    }
                },
                _ => return reply.error(Errno::EACCES as i32),
            }
        }

        // Modes, ownership and timestamps are fixed; report what we have.
        match node.getattr(&self.ctx, inode) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn mkdir(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr, _mode: u32,
        reply: fuse::ReplyEntry) {
        let (path, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        if let Err(e) = node.mkdir(&self.ctx) {
            return reply.error(e.errno_as_i32());
        }
        let inode = self.inodes.pin(&self.ids, &path);
        match node.getattr(&self.ctx, inode) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn rmdir(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr,
        reply: fuse::ReplyEmpty) {
        let (_, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        match node.rmdir(&self.ctx) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn unlink(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr,
        reply: fuse::ReplyEmpty) {
        let (_, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        match node.unlink(&self.ctx) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn rename(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr, newparent: u64,
        newname: &OsStr, reply: fuse::ReplyEmpty) {
        let (_, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        let target = self.find_child(newparent, newname).map(|(_, target)| target);
        match node.rename(&self.ctx, target.as_ref()) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno_as_i32()),
        }
    }

    fn open(&mut self, _req: &fuse::Request, inode: u64, flags: u32, reply: fuse::ReplyOpen) {
        let (_, node) = match self.find_node(inode) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        match node {
            Node::Document(ref document) => match document.open(&self.ctx) {
                Ok(entry) => {
                    let fh = self.ids.next();
                    self.handles.lock().unwrap().insert(fh, entry);
                    reply.opened(fh, flags);
                },
                Err(e) => reply.error(e.errno_as_i32()),
            },
            _ => reply.error(Errno::EISDIR as i32),
        }
    }

    fn create(&mut self, _req: &fuse::Request, parent: u64, name: &OsStr, _mode: u32,
        flags: u32, reply: fuse::ReplyCreate) {
        let (path, node) = match self.find_child(parent, name) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        match node {
            Node::Document(ref document) => {
                let entry = document.create(&self.ctx);
                let fh = self.ids.next();
                self.handles.lock().unwrap().insert(fh, entry);
                let inode = self.inodes.pin(&self.ids, &path);
                let attr = file_attr(inode, 0, &self.ctx);
                reply.created(&TTL, &attr, 0, fh, flags);
            },
            // Only .json leaves with a fully-bound filter can be created.
            _ => reply.error(Errno::EACCES as i32),
        }
    }

    fn read(&mut self, _req: &fuse::Request, _inode: u64, fh: u64, offset: i64, size: u32,
        reply: fuse::ReplyData) {
        let handle = self.find_handle(fh);
        reply.data(&handle.read(offset, size));
    }

    fn write(&mut self, _req: &fuse::Request, _inode: u64, fh: u64, offset: i64,
        data: &[u8], _flags: u32, reply: fuse::ReplyWrite) {
        let handle = self.find_handle(fh);
        reply.written(handle.write(offset, data));
    }

    fn flush(&mut self, _req: &fuse::Request, inode: u64, fh: u64, _lock_owner: u64,
        reply: fuse::ReplyEmpty) {
        let handle = self.find_handle(fh);
        match self.find_node(inode) {
            Some((_, Node::Document(ref document))) => {
                match document.flush(&self.ctx, &handle) {
                    Ok(()) => reply.ok(),
                    Err(e) => reply.error(e.errno_as_i32()),
                }
            },
            _ => reply.error(Errno::EIO as i32),
        }
    }

    fn release(&mut self, _req: &fuse::Request, inode: u64, fh: u64, _flags: u32,
        _lock_owner: u64, _flush: bool, reply: fuse::ReplyEmpty) {
        let handle = {
            let mut handles = self.handles.lock().unwrap();
            handles.remove(&fh).expect("Kernel tried to release unknown handle")
        };
        match self.find_node(inode) {
            Some((_, Node::Document(ref document))) => {
                match document.release(&self.ctx, &handle) {
                    Ok(()) => reply.ok(),
                    Err(e) => reply.error(e.errno_as_i32()),
                }
            },
            _ => reply.ok(),
        }
    }

    fn readdir(&mut self, _req: &fuse::Request, inode: u64, _fh: u64, offset: i64,
        mut reply: fuse::ReplyDirectory) {
        if offset > 0 {
            // The whole directory was returned in one go, so a nonzero
            // offset means the kernel already consumed it.
            reply.ok();
            return;
        }

        let (path, node) = match self.find_node(inode) {
            Some(found) => found,
            None => return reply.error(Errno::ENOENT as i32),
        };
        if let Node::Document(_) = node {
            return reply.error(Errno::ENOTDIR as i32);
        }

        let listing = match node.list_files(&self.ctx) {
            Some(listing) => listing,
            None => {
                // Enumeration failed: surface a directory with no entries at
                // all, not even the dot pair.
                reply.ok();
                return;
            },
        };

        let parent = self.inodes.pin(&self.ids, &parent_path(&path));
        reply.add(inode, 0, fuse::FileType::Directory, ".");
        reply.add(parent, 1, fuse::FileType::Directory, "..");
        let mut pos = 2;
        for name in listing {
            let escaped = escaping::escape(&name);
            let child = self.inodes.pin(&self.ids, &join_path(&path, &escaped));
            let kind = if escaped.ends_with(".json") {
                fuse::FileType::RegularFile
            } else {
                fuse::FileType::Directory
            };
            if reply.add(child, pos, kind, &escaped) {
                break;
            }
            pos += 1;
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &fuse::Request, _inode: u64, reply: fuse::ReplyStatfs) {
        // The backing store is not block-structured; report fixed synthetic
        // numbers.
        reply.statfs(1048576, 1048576, 1048576, 1048576, 1048576, 4096, 255, 4096);
    }
}

/// Mounts a mongofs instance configured by `config` on `mount_point` and
/// serves it until a termination signal arrives.
pub fn mount(config: Config, mount_point: &Path, notifier: Box<dyn Notifier>)
    -> Result<(), Error> {
    let mongo = Client::with_uri_str(&config.uri())
        .context(format!("Failed to set up a client for {}", config.host))?;

    let ctx = Context {
        mongo: mongo,
        json: JsonFormat::new(config.json_indent, config.json_escaping, config.json_encoding),
        dir_cache: DirCache::new(DIR_CACHE_CAPACITY, DIR_CACHE_TTL),
        open_files: OpenFileCache::new(),
        notifier: notifier,
        mount_time: time::get_time(),
        uid: unistd::getuid().as_raw(),
        gid: unistd::getgid().as_raw(),
        config: config,
    };
    ctx.notifier.notify(
        "mongofs",
        &format!("Mounted {} on {}", ctx.config.host, mount_point.display()));

    let options = ["-o", "fsname=mongofs", "-o", "allow_other"]
        .iter()
        .map(|o| o.as_ref())
        .collect::<Vec<&OsStr>>();
    let fs = MongoFS::new(ctx);
    info!("Mounting file system onto {:?}", mount_point);
    let session = unsafe { fuse::spawn_mount(fs, &mount_point, &options) }
        .context(format!("mount on {:?} failed", mount_point))?;

    let signals = Signals::new(&[signal_hook::SIGHUP, signal_hook::SIGINT,
        signal_hook::SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!("Caught signal {}; unmounting", signal);
    }
    drop(session);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(options: &[&str]) -> Result<Config, OptionsError> {
        let options: Vec<String> = options.iter().map(|o| (*o).to_owned()).collect();
        Config::parse(&options)
    }

    #[test]
    fn config_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!("localhost", config.host);
        assert!(!config.hide_id);
        assert!(!config.fetch_file_length);
        assert!(!config.json_escaping);
        assert_eq!(encoding_rs::UTF_8, config.json_encoding);
        assert_eq!(4, config.json_indent);
    }

    #[test]
    fn config_parses_values() {
        let config = parse(&[
            "host=db.example.com:27018",
            "hide_id",
            "fetch_file_length=true",
            "json_escaping=no",
            "json_encoding=latin1",
            "json_indent=-1",
        ]).unwrap();
        assert_eq!("db.example.com:27018", config.host);
        assert!(config.hide_id);
        assert!(config.fetch_file_length);
        assert!(!config.json_escaping);
        assert_eq!(encoding_rs::WINDOWS_1252, config.json_encoding);
        assert_eq!(-1, config.json_indent);
    }

    #[test]
    fn config_rejects_unknown_option() {
        assert_eq!(
            OptionsError::UnknownOption { key: "frobnicate".to_owned() },
            parse(&["frobnicate=1"]).unwrap_err());
    }

    #[test]
    fn config_rejects_bad_values() {
        assert_eq!(
            OptionsError::InvalidValue {
                key: "json_indent".to_owned(), value: "four".to_owned() },
            parse(&["json_indent=four"]).unwrap_err());
        assert_eq!(
            OptionsError::InvalidValue {
                key: "hide_id".to_owned(), value: "maybe".to_owned() },
            parse(&["hide_id=maybe"]).unwrap_err());
        assert_eq!(
            OptionsError::UnknownEncoding { label: "no-such-charset".to_owned() },
            parse(&["json_encoding=no-such-charset"]).unwrap_err());
    }

    #[test]
    fn config_uri_for_bare_host() {
        let mut config = Config::default();
        config.host = "db1:27018".to_owned();
        assert_eq!(
            "mongodb://db1:27018/?connectTimeoutMS=2000&serverSelectionTimeoutMS=2000",
            config.uri());
    }

    #[test]
    fn config_uri_passthrough() {
        let mut config = Config::default();
        config.host = "mongodb://u:p@db1/?replicaSet=rs0".to_owned();
        assert_eq!("mongodb://u:p@db1/?replicaSet=rs0", config.uri());
    }

    #[test]
    fn id_generator_ok() {
        let ids = IdGenerator::new(10);
        assert_eq!(10, ids.next());
        assert_eq!(11, ids.next());
        assert_eq!(12, ids.next());
    }

    #[test]
    fn inode_table_pins_stable_numbers() {
        let ids = IdGenerator::new(fuse::FUSE_ROOT_ID + 1);
        let inodes = InodeTable::new();

        assert_eq!(fuse::FUSE_ROOT_ID, inodes.pin(&ids, "/"));
        let a = inodes.pin(&ids, "/db");
        let b = inodes.pin(&ids, "/db/coll");
        assert_ne!(a, b);
        assert_eq!(a, inodes.pin(&ids, "/db"));
        assert_eq!(Some("/db/coll".to_owned()), inodes.path_of(b));
        assert_eq!(None, inodes.path_of(12345));
    }

    #[test]
    fn join_path_handles_root() {
        assert_eq!("/db", join_path("/", "db"));
        assert_eq!("/db/coll", join_path("/db", "coll"));
    }

    #[test]
    fn parent_path_walks_up() {
        assert_eq!("/", parent_path("/"));
        assert_eq!("/", parent_path("/db"));
        assert_eq!("/db", parent_path("/db/coll"));
        assert_eq!("/db/coll", parent_path("/db/coll/a"));
    }
}
