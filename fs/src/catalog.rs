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

//! Directory catalog: a flat table of fixed-size directory records kept in
//! an auxiliary host file, independent of the block device.

use std::{
    fs::{File, OpenOptions},
    mem::size_of,
    os::unix::fs::FileExt,
    path::Path,
};

use mfs_err::Result;
use zerocopy::{
    little_endian::{U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout,
};

/// 8 characters of base name (or directory name) plus a NUL terminator.
pub const NAME_LEN: usize = 9;
/// 3 characters of extension plus a NUL terminator.
pub const EXT_LEN: usize = 4;

/// `(512 - 9 - sizeof(int)) / (9 + 4 + sizeof(size_t) + sizeof(int64))`,
/// evaluated with 4-byte `int` and 8-byte `size_t`/`int64`: `499 / 29 = 17`.
pub const FILES_PER_DIR: usize = (512 - NAME_LEN - 4) / (NAME_LEN + EXT_LEN + 8 + 8);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FileEntry {
    name: [u8; NAME_LEN],
    ext: [u8; EXT_LEN],
    size: U64,
    /// Two's-complement bit pattern of an `i64`; `-1` (all bits set) means
    /// "no blocks allocated yet".
    start_block: U64,
}

impl FileEntry {
    fn zeroed() -> Self {
        Self {
            name: [0; NAME_LEN],
            ext: [0; EXT_LEN],
            size: U64::new(0),
            start_block: U64::new(u64::MAX),
        }
    }

    pub fn name_str(&self) -> String {
        nul_terminated_str(&self.name)
    }

    pub fn ext_str(&self) -> String {
        nul_terminated_str(&self.ext)
    }

    /// The formatted `name` or `name.ext` shown by `readdir`.
    pub fn formatted_name(&self) -> String {
        let ext = self.ext_str();
        if ext.is_empty() {
            self.name_str()
        } else {
            format!("{}.{}", self.name_str(), ext)
        }
    }

    pub fn size(&self) -> u64 {
        self.size.get()
    }

    pub fn set_size(&mut self, size: u64) {
        self.size.set(size);
    }

    /// `None` for the `-1` sentinel, i.e. no blocks allocated.
    pub fn start_block(&self) -> Option<u64> {
        let raw = self.start_block.get() as i64;
        if raw < 0 {
            None
        } else {
            Some(raw as u64)
        }
    }

    pub fn set_start_block(&mut self, block: Option<u64>) {
        let raw = match block {
            Some(b) => b as i64,
            None => -1,
        };
        self.start_block.set(raw as u64);
    }

    fn set_name(&mut self, name: &str, ext: &str) {
        write_nul_terminated(&mut self.name, name);
        write_nul_terminated(&mut self.ext, ext);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct DirRecord {
    name: [u8; NAME_LEN],
    file_count: U32,
    pub files: [FileEntry; FILES_PER_DIR],
}

impl DirRecord {
    fn zeroed() -> Self {
        Self {
            name: [0; NAME_LEN],
            file_count: U32::new(0),
            files: [FileEntry::zeroed(); FILES_PER_DIR],
        }
    }

    pub fn name_str(&self) -> String {
        nul_terminated_str(&self.name)
    }

    pub fn file_count(&self) -> usize {
        self.file_count.get() as usize
    }

    pub fn live_files(&self) -> &[FileEntry] {
        &self.files[..self.file_count()]
    }

    /// Linear scan of `files[0..fileCount)` for `(name, ext)`.
    pub fn find_file(&self, name: &str, ext: &str) -> Option<usize> {
        self.live_files()
            .iter()
            .position(|f| f.name_str() == name && f.ext_str() == ext)
    }

    /// Appends a new zero-size entry; caller must have already checked
    /// `fileCount < capacity` and uniqueness.
    pub fn push_file(&mut self, name: &str, ext: &str) {
        let idx = self.file_count();
        self.files[idx] = FileEntry::zeroed();
        self.files[idx].set_name(name, ext);
        self.file_count.set((idx + 1) as u32);
    }

    /// Swap-with-last removal within `files[]`.
    pub fn remove_file(&mut self, idx: usize) {
        let last = self.file_count() - 1;
        self.files[idx] = self.files[last];
        self.file_count.set(last as u32);
    }
}

fn nul_terminated_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn write_nul_terminated(dst: &mut [u8], src: &str) {
    dst.fill(0);
    let bytes = src.as_bytes();
    dst[..bytes.len()].copy_from_slice(bytes);
}

/// Back-to-back fixed-size [`DirRecord`]s kept in an auxiliary host file.
pub struct Catalog {
    file: File,
}

const RECORD_SIZE: u64 = size_of::<DirRecord>() as u64;

impl Catalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    fn record_count(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len() / RECORD_SIZE)
    }

    fn read_at(&self, index: u64) -> Result<DirRecord> {
        let mut record = DirRecord::zeroed();
        self.file
            .read_exact_at(record.as_mut_bytes(), index * RECORD_SIZE)?;
        Ok(record)
    }

    fn write_record_at(&self, index: u64, record: &DirRecord) -> Result<()> {
        self.file
            .write_all_at(record.as_bytes(), index * RECORD_SIZE)?;
        Ok(())
    }

    /// Linear scan from the start of the catalog.
    pub fn find_dir(&self, name: &str) -> Result<Option<(DirRecord, u64)>> {
        for index in 0..self.record_count()? {
            let record = self.read_at(index)?;
            if record.name_str() == name {
                return Ok(Some((record, index)));
            }
        }
        Ok(None)
    }

    pub fn all_dirs(&self) -> Result<Vec<DirRecord>> {
        (0..self.record_count()?).map(|i| self.read_at(i)).collect()
    }

    /// Appends a zero-file record; callers must check for duplicates first.
    pub fn append_dir(&mut self, name: &str) -> Result<u64> {
        let index = self.record_count()?;
        let mut record = DirRecord::zeroed();
        write_nul_terminated(&mut record.name, name);
        self.write_record_at(index, &record)?;
        Ok(index)
    }

    /// Swap-with-last deletion: overwrite `index` with the last record, then
    /// truncate the catalog by one record.
    pub fn remove_dir_at(&mut self, index: u64) -> Result<()> {
        let last = self.record_count()? - 1;
        if index != last {
            let last_record = self.read_at(last)?;
            self.write_record_at(index, &last_record)?;
        }
        self.file.set_len(last * RECORD_SIZE)?;
        Ok(())
    }

    pub fn write_dir_at(&mut self, index: u64, record: &DirRecord) -> Result<()> {
        self.write_record_at(index, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_per_dir_matches_original_formula() {
        assert_eq!(FILES_PER_DIR, 17);
    }

    #[test]
    fn append_find_remove_dir_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path().join("catalog")).unwrap();

        catalog.append_dir("docs").unwrap();
        catalog.append_dir("media").unwrap();

        let (record, offset) = catalog.find_dir("docs").unwrap().unwrap();
        assert_eq!(record.name_str(), "docs");
        assert_eq!(offset, 0);

        // swap-with-last: removing "docs" moves "media" into slot 0.
        catalog.remove_dir_at(offset).unwrap();
        assert!(catalog.find_dir("docs").unwrap().is_none());
        let (record, offset) = catalog.find_dir("media").unwrap().unwrap();
        assert_eq!(record.name_str(), "media");
        assert_eq!(offset, 0);
    }

    #[test]
    fn push_and_remove_file_entries() {
        let mut record = DirRecord::zeroed();
        record.push_file("a", "txt");
        record.push_file("b", "");
        assert_eq!(record.file_count(), 2);
        assert_eq!(record.find_file("a", "txt"), Some(0));
        assert_eq!(record.find_file("b", ""), Some(1));

        record.remove_file(0);
        assert_eq!(record.file_count(), 1);
        assert_eq!(record.find_file("a", "txt"), None);
        assert_eq!(record.find_file("b", ""), Some(0));
    }

    #[test]
    fn file_entry_start_block_sentinel() {
        let mut entry = FileEntry::zeroed();
        assert_eq!(entry.start_block(), None);
        entry.set_start_block(Some(42));
        assert_eq!(entry.start_block(), Some(42));
        entry.set_start_block(None);
        assert_eq!(entry.start_block(), None);
    }

    #[test]
    fn formatted_name_with_and_without_extension() {
        let mut entry = FileEntry::zeroed();
        entry.set_name("readme", "");
        assert_eq!(entry.formatted_name(), "readme");
        entry.set_name("readme", "md");
        assert_eq!(entry.formatted_name(), "readme.md");
    }
}
