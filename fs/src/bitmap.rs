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

//! Free-block bitmap, persisted at byte offset 0 of the backing device.
//!
//! Bit `i` is `1` iff block `i` is allocated. The bitmap occupies a prefix
//! of the device that is permanently marked allocated; allocation is
//! strictly contiguous first-fit over the remaining bits.

use std::io;

use log::debug;
use mfs_ds::DataStorage;
use mfs_err::{Error, Result};

pub const BLOCK_SIZE: u64 = 512;

/// Ceiling division.
pub fn div_ceil(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

fn out_of_range(index: u64) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("block index {index} out of range"),
    ))
}

/// Borrows a [`DataStorage`] and interprets its leading bytes as a
/// bit-per-block liveness map.
pub struct BitmapAllocator<'a, DS: DataStorage> {
    device: &'a DS,
}

impl<'a, DS: DataStorage> BitmapAllocator<'a, DS> {
    pub fn new(device: &'a DS) -> Self {
        Self { device }
    }

    /// `floor(deviceBytes / 512) - 1`.
    pub fn last_block_index(&self) -> Result<i64> {
        let bytes = self.device.size()?;
        Ok((bytes / BLOCK_SIZE) as i64 - 1)
    }

    /// `ceil(ceil((lastBlockIndex+1)/8)/512) + 1` — the `+1` keeps one
    /// spare accounting block, as specified.
    pub fn bitmap_blocks(&self) -> Result<u64> {
        let total_blocks = (self.last_block_index()? + 1) as u64;
        Ok(div_ceil(div_ceil(total_blocks, 8), BLOCK_SIZE) + 1)
    }

    fn total_blocks(&self) -> Result<u64> {
        Ok((self.last_block_index()? + 1) as u64)
    }

    fn read_byte(&self, byte_index: u64) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.device.read(byte_index, &mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&self, byte_index: u64, value: u8) -> Result<()> {
        self.device.write(byte_index, &[value])?;
        Ok(())
    }

    pub fn get_state(&self, index: u64) -> Result<bool> {
        if index as i64 > self.last_block_index()? {
            return Err(out_of_range(index));
        }
        let byte = self.read_byte(index / 8)?;
        Ok(byte & (1 << (index % 8)) != 0)
    }

    fn set_bit(&self, index: u64, value: bool) -> Result<()> {
        if index as i64 > self.last_block_index()? {
            return Err(out_of_range(index));
        }
        let byte_index = index / 8;
        let mask = 1u8 << (index % 8);
        let byte = self.read_byte(byte_index)?;
        let byte = if value { byte | mask } else { byte & !mask };
        self.write_byte(byte_index, byte)
    }

    pub fn set(&self, index: u64) -> Result<()> {
        self.set_bit(index, true)
    }

    pub fn unset(&self, index: u64) -> Result<()> {
        self.set_bit(index, false)
    }

    pub fn allocate(&self, start: u64, n: u64) -> Result<()> {
        for i in start..start + n {
            self.set(i)?;
        }
        Ok(())
    }

    pub fn free(&self, start: u64, n: u64) -> Result<()> {
        for i in start..start + n {
            self.unset(i)?;
        }
        Ok(())
    }

    /// Scans left-to-right for the first contiguous run of `n` zero bits.
    pub fn find_free_space(&self, n: u64) -> Result<Option<u64>> {
        if n == 0 {
            return Ok(Some(0));
        }
        let total = self.total_blocks()?;
        let mut run_start = 0u64;
        let mut run_len = 0u64;
        for i in 0..total {
            if self.get_state(i)? {
                run_len = 0;
                run_start = i + 1;
            } else {
                run_len += 1;
                if run_len == n {
                    return Ok(Some(run_start));
                }
            }
        }
        Ok(None)
    }

    /// A zero byte at offset 0 is unambiguous evidence the bitmap has never
    /// been initialized — block 0 always belongs to the bitmap itself, so
    /// that byte's low bit must be `1` on any initialized device.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.read_byte(0)? == 0 {
            let blocks = self.bitmap_blocks()?;
            debug!("initializing bitmap prefix of {blocks} blocks");
            self.allocate(0, blocks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStorage;

    #[test]
    fn bitmap_blocks_reserves_one_spare() {
        // 64 KiB device: 128 blocks, needs ceil(ceil(128/8)/512) + 1 = 1 + 1 = 2.
        let device = MemoryStorage::new(64 * 1024);
        let allocator = BitmapAllocator::new(&device);
        assert_eq!(allocator.bitmap_blocks().unwrap(), 2);
    }

    #[test]
    fn ensure_initialized_marks_prefix_allocated() {
        let device = MemoryStorage::new(64 * 1024);
        let allocator = BitmapAllocator::new(&device);
        allocator.ensure_initialized().unwrap();
        let blocks = allocator.bitmap_blocks().unwrap();
        for i in 0..blocks {
            assert!(allocator.get_state(i).unwrap());
        }
        assert!(!allocator.get_state(blocks).unwrap());
    }

    #[test]
    fn ensure_initialized_is_idempotent() {
        let device = MemoryStorage::new(64 * 1024);
        let allocator = BitmapAllocator::new(&device);
        allocator.ensure_initialized().unwrap();
        allocator.allocate(10, 2).unwrap();
        allocator.ensure_initialized().unwrap();
        assert!(allocator.get_state(10).unwrap());
    }

    #[test]
    fn find_free_space_returns_first_fit() {
        let device = MemoryStorage::new(64 * 1024);
        let allocator = BitmapAllocator::new(&device);
        allocator.ensure_initialized().unwrap();
        let prefix = allocator.bitmap_blocks().unwrap();
        allocator.allocate(prefix, 3).unwrap();
        allocator.free(prefix, 1).unwrap();
        // prefix is now free for 1 block, then 2 allocated blocks follow.
        assert_eq!(allocator.find_free_space(1).unwrap(), Some(prefix));
        assert_eq!(
            allocator.find_free_space(2).unwrap(),
            Some(prefix + 3)
        );
    }

    #[test]
    fn find_free_space_none_when_device_full() {
        let device = MemoryStorage::new(1024); // 2 blocks total
        let allocator = BitmapAllocator::new(&device);
        allocator.ensure_initialized().unwrap();
        let total = allocator.last_block_index().unwrap() + 1;
        let prefix = allocator.bitmap_blocks().unwrap() as i64;
        assert!(prefix <= total);
        assert_eq!(allocator.find_free_space((total - prefix + 1) as u64).unwrap(), None);
    }
}
