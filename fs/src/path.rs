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

//! Splits an absolute two-level path into `(dir, name, ext)` components.
//!
//! The original splits into fixed-width caller buffers of widths 9, 9, 4;
//! this port returns owned, bounds-checked strings instead (see
//! `SPEC_FULL.md` §4.4 — the buffer-filling calling convention is a C
//! artifact, not part of the contract).

use mfs_err::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPath {
    pub dir: String,
    pub name: String,
    pub ext: String,
}

/// Accepts `/`, `/<dir>` or `/<dir>/<name>[.<ext>]`. A path with more than
/// two components is undefined at this layer per the spec, and is rejected
/// here with `no-entry` since the operation surface is the only caller.
pub fn resolve(path: &str) -> Result<ResolvedPath> {
    let rest = path.strip_prefix('/').ok_or(Error::NoEntry)?;
    if rest.is_empty() {
        return Ok(ResolvedPath::default());
    }

    let mut parts = rest.splitn(2, '/');
    let dir = parts.next().unwrap_or_default().to_string();
    let Some(file_part) = parts.next() else {
        return Ok(ResolvedPath {
            dir,
            name: String::new(),
            ext: String::new(),
        });
    };
    if file_part.is_empty() || file_part.contains('/') {
        return Err(Error::NoEntry);
    }

    let (name, ext) = match file_part.split_once('.') {
        Some((name, ext)) => (name.to_string(), ext.to_string()),
        None => (file_part.to_string(), String::new()),
    };
    Ok(ResolvedPath { dir, name, ext })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root() {
        assert_eq!(resolve("/").unwrap(), ResolvedPath::default());
    }

    #[test]
    fn directory_only() {
        let r = resolve("/docs").unwrap();
        assert_eq!(r.dir, "docs");
        assert!(r.name.is_empty());
        assert!(r.ext.is_empty());
    }

    #[test]
    fn file_with_extension() {
        let r = resolve("/docs/a.txt").unwrap();
        assert_eq!(r.dir, "docs");
        assert_eq!(r.name, "a");
        assert_eq!(r.ext, "txt");
    }

    #[test]
    fn file_without_extension() {
        let r = resolve("/docs/a").unwrap();
        assert_eq!(r.dir, "docs");
        assert_eq!(r.name, "a");
        assert!(r.ext.is_empty());
    }

    #[test]
    fn too_deep_rejected() {
        assert!(resolve("/docs/sub/a.txt").is_err());
    }

    #[test]
    fn relative_path_rejected() {
        assert!(resolve("docs/a.txt").is_err());
    }
}
