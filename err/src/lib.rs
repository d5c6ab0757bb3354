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

//! Error taxonomy for the `mfs` filesystem core, mapped directly onto the
//! POSIX error codes the FUSE driver reports back to the kernel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no such file or directory")]
    NoEntry,
    #[error("already exists")]
    Exists,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("name too long")]
    NameTooLong,
    #[error("directory not empty")]
    NotEmpty,
    #[error("no space left on device")]
    OutOfSpace,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps to the `errno` value the FUSE bridge replies to the kernel with.
    pub fn errno(&self) -> i32 {
        match self {
            Error::NoEntry => libc::ENOENT,
            Error::Exists => libc::EEXIST,
            Error::NotPermitted => libc::EPERM,
            Error::NotADirectory => libc::ENOTDIR,
            Error::IsADirectory => libc::EISDIR,
            Error::NameTooLong => libc::ENAMETOOLONG,
            Error::NotEmpty => libc::ENOTEMPTY,
            Error::OutOfSpace => libc::ENOSPC,
            Error::Io(_) => libc::EIO,
        }
    }
}

impl From<mfs_ds::Error> for Error {
    fn from(err: mfs_ds::Error) -> Self {
        match err {
            mfs_ds::Error::Io(e) => Error::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
