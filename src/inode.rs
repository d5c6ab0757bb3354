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

//! FUSE is inode-addressed; the filesystem core is path-addressed. This
//! table bridges the two by handing out a stable `u64` inode for every path
//! it is asked to resolve, reusing the same inode on repeat lookups.

use std::collections::HashMap;

pub const ROOT_INO: u64 = 1;

/// A two-way, append-only mapping between inode numbers and absolute paths.
///
/// Inodes are never recycled: a `remove`d path can be re-created later and
/// will be handed a fresh inode, which matches the kernel's expectation that
/// a stale inode never silently refers to a new, unrelated object.
pub struct InodeTable {
    paths: Vec<String>,
    by_path: HashMap<String, u64>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            paths: vec!["/".to_string()],
            by_path: HashMap::from([("/".to_string(), ROOT_INO)]),
        }
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get((ino - 1) as usize).map(String::as_str)
    }

    /// Looks up the inode for `path`, minting a new one if this is the first
    /// time it has been seen.
    pub fn intern(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        self.paths.push(path.to_string());
        let ino = self.paths.len() as u64;
        self.by_path.insert(path.to_string(), ino);
        ino
    }

    /// Drops the path→inode entry so a later `intern` of the same path mints
    /// a fresh inode. The retired inode's slot in `paths` is left in place
    /// (never reused), so it stays a valid, if now-dangling, index.
    pub fn forget_path(&mut self, path: &str) {
        self.by_path.remove(path);
    }

    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        let parent_path = self.path(parent)?;
        if parent_path == "/" {
            Some(format!("/{name}"))
        } else {
            Some(format!("{parent_path}/{name}"))
        }
    }
}
