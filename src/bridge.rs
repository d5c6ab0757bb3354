// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Translates kernel FUSE requests into calls on [`mfs_fs::Filesystem`],
//! handling the inode⇄path mapping the core has no notion of.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem as FuseFilesystem, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use log::debug;
use mfs_ds::DataStorage;
use mfs_fs::{Attr, EntryKind};

use crate::inode::{InodeTable, ROOT_INO};

const TTL: Duration = Duration::from_secs(1);

pub struct FuseBridge<DS: DataStorage> {
    fs: mfs_fs::Filesystem<DS>,
    inodes: InodeTable,
}

impl<DS: DataStorage> FuseBridge<DS> {
    pub fn new(fs: mfs_fs::Filesystem<DS>) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.path(ino).map(str::to_string)
    }

    fn file_attr(&self, ino: u64, attr: Attr) -> FileAttr {
        let now = SystemTime::now();
        let (kind, perm, nlink) = match attr.kind {
            EntryKind::Directory => (FileType::Directory, 0o755, 2),
            EntryKind::File => (FileType::RegularFile, 0o666, 1),
        };
        FileAttr {
            ino,
            size: attr.size,
            blocks: attr.blocks(),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm,
            nlink,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl<DS: DataStorage> FuseFilesystem for FuseBridge<DS> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(&path) {
            Ok(attr) => {
                let ino = self.inodes.intern(&path);
                reply.entry(&TTL, &self.file_attr(ino, attr), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &self.file_attr(ino, attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let entries = match self.fs.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
            let child_ino = match entry.name.as_str() {
                "." => ino,
                ".." => ROOT_INO,
                name => {
                    let child_path = self
                        .inodes
                        .child_path(ino, name)
                        .unwrap_or_else(|| format!("{path}/{name}"));
                    self.inodes.intern(&child_path)
                }
            };
            let kind = match entry.kind {
                EntryKind::Directory => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            };
            if reply.add(child_ino, (i + 1) as i64, kind, entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.mkdir(&path, mode) {
            Ok(()) => match self.fs.getattr(&path) {
                Ok(attr) => {
                    let ino = self.inodes.intern(&path);
                    reply.entry(&TTL, &self.file_attr(ino, attr), 0);
                }
                Err(e) => reply.error(e.errno()),
            },
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.inodes.forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.mknod(&path, mode) {
            Ok(()) => match self.fs.getattr(&path) {
                Ok(attr) => {
                    let ino = self.inodes.intern(&path);
                    reply.entry(&TTL, &self.file_attr(ino, attr), 0);
                }
                Err(e) => reply.error(e.errno()),
            },
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        let Some(path) = self.inodes.child_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.inodes.forget_path(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.open(&path) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.fs.read(&path, &mut buf, offset as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(&path, data, offset as u64) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.flush(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size) {
                reply.error(e.errno());
                return;
            }
        }
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &self.file_attr(ino, attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        debug!("mfs filesystem mounted");
        Ok(())
    }

    fn destroy(&mut self) {
        debug!("mfs filesystem unmounted");
    }
}
