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

//! An in-memory [`DataStorage`] double used by unit tests so the bitmap
//! allocator and operation surface can be exercised without touching a real
//! file.

use std::cell::RefCell;

use mfs_ds::{DataStorage, Result};

pub struct MemoryStorage {
    bytes: RefCell<Vec<u8>>,
}

impl MemoryStorage {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: RefCell::new(vec![0u8; size]),
        }
    }
}

impl DataStorage for MemoryStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.borrow();
        let start = offset as usize;
        buffer.copy_from_slice(&bytes[start..start + buffer.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.borrow_mut();
        let start = offset as usize;
        bytes[start..start + buffer.len()].copy_from_slice(buffer);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.bytes.borrow().len() as u64)
    }
}
