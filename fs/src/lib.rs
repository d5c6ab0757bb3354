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

//! Core of the two-level 8.3 filesystem: the bitmap allocator, the
//! directory catalog, the path resolver, and the operation surface that
//! implements the FUSE-shaped operation vocabulary on top of them.
//!
//! This crate knows nothing about FUSE, `libc` errno values, or mount
//! lifecycles — it is driven by a thin bridge (see the `mfs` binary) that
//! translates kernel requests into calls on [`Filesystem`].

pub mod bitmap;
pub mod catalog;
pub mod path;

#[cfg(test)]
mod test_support;

pub use mfs_err::{Error, Result};

use bitmap::{div_ceil, BitmapAllocator, BLOCK_SIZE};
use catalog::{Catalog, DirRecord, FILES_PER_DIR};
use log::{debug, warn};
use mfs_ds::DataStorage;

/// Kind of filesystem object `getattr`/`readdir` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// The subset of POSIX `stat` fields this filesystem can fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub kind: EntryKind,
    pub size: u64,
}

impl Attr {
    fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
        }
    }

    /// `ceil(size / 512)`, the block count `getattr` reports.
    pub fn blocks(&self) -> u64 {
        div_ceil(self.size, BLOCK_SIZE)
    }
}

/// One line of a `readdir` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Ties together the block device and the directory catalog and implements
/// the filesystem operation vocabulary from `SPEC_FULL.md` §4.5.
pub struct Filesystem<DS: DataStorage> {
    device: DS,
    catalog: Catalog,
}

impl<DS: DataStorage> Filesystem<DS> {
    pub fn new(device: DS, catalog: Catalog) -> Self {
        Self { device, catalog }
    }

    pub fn getattr(&self, path: &str) -> Result<Attr> {
        if path == "/" {
            return Ok(Attr::directory());
        }
        let resolved = path::resolve(path)?;
        if resolved.name.is_empty() {
            self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
            return Ok(Attr::directory());
        }
        let (record, _) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        let idx = record
            .find_file(&resolved.name, &resolved.ext)
            .ok_or(Error::NoEntry)?;
        Ok(Attr::file(record.files[idx].size()))
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<DirListEntry>> {
        if path == "/" {
            let mut entries = vec![
                DirListEntry {
                    name: ".".to_string(),
                    kind: EntryKind::Directory,
                },
                DirListEntry {
                    name: "..".to_string(),
                    kind: EntryKind::Directory,
                },
            ];
            for record in self.catalog.all_dirs()? {
                entries.push(DirListEntry {
                    name: record.name_str(),
                    kind: EntryKind::Directory,
                });
            }
            return Ok(entries);
        }

        let resolved = path::resolve(path)?;
        if !resolved.name.is_empty() {
            return Err(Error::NotADirectory);
        }
        let (record, _) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        Ok(record
            .live_files()
            .iter()
            .map(|f| DirListEntry {
                name: f.formatted_name(),
                kind: EntryKind::File,
            })
            .collect())
    }

    pub fn mkdir(&mut self, path: &str, _mode: u32) -> Result<()> {
        let resolved = path::resolve(path)?;
        if resolved.dir.len() > 8 {
            return Err(Error::NameTooLong);
        }
        if !resolved.name.is_empty() {
            return Err(Error::NotPermitted);
        }
        if self.catalog.find_dir(&resolved.dir)?.is_some() {
            return Err(Error::Exists);
        }
        self.catalog.append_dir(&resolved.dir)?;
        debug!("mkdir /{}", resolved.dir);
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let resolved = path::resolve(path)?;
        if !resolved.name.is_empty() {
            return Err(Error::NotADirectory);
        }
        let (record, offset) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        if record.file_count() > 0 {
            return Err(Error::NotEmpty);
        }
        self.catalog.remove_dir_at(offset)?;
        debug!("rmdir /{}", resolved.dir);
        Ok(())
    }

    pub fn mknod(&mut self, path: &str, _mode: u32) -> Result<()> {
        let resolved = path::resolve(path)?;
        if resolved.name.is_empty() {
            return Err(Error::NotPermitted);
        }
        if resolved.name.len() > 8 || resolved.ext.len() > 3 {
            return Err(Error::NameTooLong);
        }
        BitmapAllocator::new(&self.device).ensure_initialized()?;

        let (mut record, offset) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        if record.find_file(&resolved.name, &resolved.ext).is_some() {
            return Err(Error::Exists);
        }
        if record.file_count() >= FILES_PER_DIR {
            return Err(Error::NotPermitted);
        }
        record.push_file(&resolved.name, &resolved.ext);
        self.catalog.write_dir_at(offset, &record)?;
        debug!("mknod /{}/{}.{}", resolved.dir, resolved.name, resolved.ext);
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let resolved = path::resolve(path)?;
        if resolved.name.is_empty() {
            return Err(Error::IsADirectory);
        }
        let (mut record, offset) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        let idx = record
            .find_file(&resolved.name, &resolved.ext)
            .ok_or(Error::NoEntry)?;

        let entry = record.files[idx];
        if let Some(start) = entry.start_block() {
            let blocks = div_ceil(entry.size(), BLOCK_SIZE);
            BitmapAllocator::new(&self.device).free(start, blocks)?;
        }
        record.remove_file(idx);
        self.catalog.write_dir_at(offset, &record)?;
        debug!("unlink /{}/{}.{}", resolved.dir, resolved.name, resolved.ext);
        Ok(())
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let resolved = path::resolve(path)?;
        let (record, _) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        let idx = record
            .find_file(&resolved.name, &resolved.ext)
            .ok_or(Error::NoEntry)?;
        let entry = &record.files[idx];
        let file_size = entry.size();

        if buf.is_empty() || offset >= file_size {
            return Ok(0);
        }
        let n = buf.len().min((file_size - offset) as usize);
        let start = entry
            .start_block()
            .expect("a file with positive size must have an extent");
        self.device.read(start * BLOCK_SIZE + offset, &mut buf[..n])?;
        Ok(n)
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let size = buf.len() as u64;
        let resolved = path::resolve(path)?;
        let (mut record, dir_offset) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        let idx = record
            .find_file(&resolved.name, &resolved.ext)
            .ok_or(Error::NoEntry)?;

        let file_size = record.files[idx].size();
        if size == 0 || offset > file_size {
            return Ok(0);
        }

        let target_size = file_size.max(offset + size);
        self.ensure_extent(&mut record, idx, target_size)?;

        let start = record.files[idx]
            .start_block()
            .expect("ensure_extent always leaves a valid extent on success");
        self.device.write(start * BLOCK_SIZE + offset, buf)?;
        self.catalog.write_dir_at(dir_offset, &record)?;
        Ok(size as usize)
    }

    pub fn open(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    pub fn flush(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    pub fn truncate(&mut self, path: &str, size: u64) -> Result<()> {
        let resolved = path::resolve(path)?;
        if resolved.name.is_empty() {
            return Err(Error::IsADirectory);
        }
        let (mut record, offset) = self.catalog.find_dir(&resolved.dir)?.ok_or(Error::NoEntry)?;
        let idx = record
            .find_file(&resolved.name, &resolved.ext)
            .ok_or(Error::NoEntry)?;
        let cur_size = record.files[idx].size();

        match size.cmp(&cur_size) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Less => {
                let cur_blocks = div_ceil(cur_size, BLOCK_SIZE);
                let new_blocks = div_ceil(size, BLOCK_SIZE);
                if let Some(start) = record.files[idx].start_block() {
                    if new_blocks < cur_blocks {
                        BitmapAllocator::new(&self.device)
                            .free(start + new_blocks, cur_blocks - new_blocks)?;
                    }
                    if size == 0 {
                        record.files[idx].set_start_block(None);
                    }
                }
                record.files[idx].set_size(size);
                self.catalog.write_dir_at(offset, &record)?;
                Ok(())
            }
            std::cmp::Ordering::Greater => {
                self.ensure_extent(&mut record, idx, size)?;
                self.catalog.write_dir_at(offset, &record)?;
                Ok(())
            }
        }
    }

    /// Grows (or leaves in place) the extent backing `record.files[idx]` so
    /// it can hold `target_size` bytes, relocating it if the current extent
    /// cannot be grown contiguously in place.
    ///
    /// On success updates `size` and `startBlock` in `record` but does not
    /// persist the record — the caller does that once, after optionally
    /// also writing payload bytes. On `out-of-space`, the original extent is
    /// re-allocated before returning so the bitmap is left exactly as it was
    /// found (the one rollback point in the whole design).
    fn ensure_extent(&self, record: &mut DirRecord, idx: usize, target_size: u64) -> Result<()> {
        let entry_size = record.files[idx].size();
        let old_start = record.files[idx].start_block();
        let cur_blocks = div_ceil(entry_size, BLOCK_SIZE);
        let available_tail = cur_blocks * BLOCK_SIZE - entry_size;
        let new_bytes = target_size.saturating_sub(entry_size);

        if new_bytes <= available_tail {
            if target_size > entry_size {
                record.files[idx].set_size(target_size);
            }
            return Ok(());
        }

        let extra_blocks = div_ceil(new_bytes - available_tail, BLOCK_SIZE);
        let total_blocks = cur_blocks + extra_blocks;
        let allocator = BitmapAllocator::new(&self.device);

        if let Some(start) = old_start {
            allocator.free(start, cur_blocks)?;
        }

        match allocator.find_free_space(total_blocks)? {
            Some(new_start) => {
                allocator.allocate(new_start, total_blocks)?;
                if let Some(old_start) = old_start {
                    if old_start != new_start && entry_size > 0 {
                        let mut tmp = vec![0u8; entry_size as usize];
                        self.device.read(old_start * BLOCK_SIZE, &mut tmp)?;
                        self.device.write(new_start * BLOCK_SIZE, &tmp)?;
                    }
                }
                record.files[idx].set_start_block(Some(new_start));
                record.files[idx].set_size(target_size);
                Ok(())
            }
            None => {
                if let Some(start) = old_start {
                    allocator.allocate(start, cur_blocks)?;
                }
                warn!("out of space growing to {total_blocks} blocks");
                Err(Error::OutOfSpace)
            }
        }
    }
}
