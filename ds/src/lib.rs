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

//! Byte-addressable storage backing a filesystem.
//!
//! A [`DataStorage`] implementor is the "block device" of the system: it
//! knows nothing about bitmaps, directories or files, only bytes at offsets.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait DataStorage {
    /// Reads exactly `buffer.len()` bytes starting at `offset`.
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    /// Writes exactly `buffer.len()` bytes starting at `offset`.
    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;

    /// Total addressable size of the storage, in bytes.
    fn size(&self) -> Result<u64>;
}
