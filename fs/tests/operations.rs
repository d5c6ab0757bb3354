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

//! Drives the full operation surface over a real, temp-file-backed device
//! and catalog, covering the concrete scenarios and boundary behaviors in
//! `SPEC_FULL.md` §8.

use mfs_ds_std::BlockDevice;
use mfs_fs::catalog::Catalog;
use mfs_fs::{EntryKind, Error, Filesystem};

fn new_fs(device_blocks: u64) -> (Filesystem<BlockDevice>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let device = BlockDevice::open(dir.path().join("backing.img")).unwrap();
    device.ensure_len(device_blocks * 512).unwrap();
    let catalog = Catalog::open(dir.path().join("catalog")).unwrap();
    (Filesystem::new(device, catalog), dir)
}

#[test]
fn mkdir_then_readdir_lists_it() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/docs", 0o755).unwrap();

    let entries = fs.readdir("/").unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec![".", "..", "docs"]);
}

#[test]
fn mknod_then_getattr_reports_empty_file() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/docs", 0o755).unwrap();
    fs.mknod("/docs/a.txt", 0o644).unwrap();

    let attr = fs.getattr("/docs/a.txt").unwrap();
    assert_eq!(attr.kind, EntryKind::File);
    assert_eq!(attr.size, 0);
}

#[test]
fn write_then_getattr_reports_size_and_blocks() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/docs", 0o755).unwrap();
    fs.mknod("/docs/a.txt", 0o644).unwrap();

    let n = fs.write("/docs/a.txt", b"hello", 0).unwrap();
    assert_eq!(n, 5);

    let attr = fs.getattr("/docs/a.txt").unwrap();
    assert_eq!(attr.size, 5);
    assert_eq!(attr.blocks(), 1);
}

#[test]
fn write_then_read_round_trips_bytes() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/docs", 0o755).unwrap();
    fs.mknod("/docs/a.txt", 0o644).unwrap();
    fs.write("/docs/a.txt", b"hello world", 0).unwrap();

    let mut buf = [0u8; 11];
    let n = fs.read("/docs/a.txt", &mut buf, 0).unwrap();
    assert_eq!(n, 11);
    assert_eq!(&buf, b"hello world");
}

#[test]
fn straddling_write_grows_file_across_blocks() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();

    let first = vec![b'A'; 512];
    fs.write("/d/a", &first, 0).unwrap();
    let second = vec![b'B'; 512];
    fs.write("/d/a", &second, 512).unwrap();

    let attr = fs.getattr("/d/a").unwrap();
    assert_eq!(attr.size, 512 + 512);
    assert_eq!(attr.blocks(), 2);

    let mut buf = vec![0u8; attr.size as usize];
    fs.read("/d/a", &mut buf, 0).unwrap();
    assert_eq!(&buf[0..512], &first[..]);
    assert_eq!(&buf[512..512 + 512], &second[..]);
}

#[test]
fn mkdir_rmdir_mkdir_succeeds_again() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.rmdir("/d").unwrap();
    fs.mkdir("/d", 0o755).unwrap();
    assert!(fs.getattr("/d").is_ok());
}

#[test]
fn rmdir_rejects_non_empty_directory() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();
    match fs.rmdir("/d") {
        Err(Error::NotEmpty) => {}
        other => panic!("expected NotEmpty, got {other:?}"),
    }
}

#[test]
fn mknod_unlink_is_a_catalog_and_bitmap_no_op() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();
    fs.write("/d/a", b"data", 0).unwrap();
    fs.unlink("/d/a").unwrap();

    assert!(matches!(fs.getattr("/d/a"), Err(Error::NoEntry)));
    // a fresh file can reuse the freed extent
    fs.mknod("/d/b", 0o644).unwrap();
    fs.write("/d/b", b"data", 0).unwrap();
    assert_eq!(fs.getattr("/d/b").unwrap().size, 4);
}

#[test]
fn directory_name_longer_than_eight_fails() {
    let (mut fs, _dir) = new_fs(64);
    assert!(fs.mkdir("/123456789", 0o755).is_err());
    fs.mkdir("/12345678", 0o755).unwrap();
}

#[test]
fn write_past_end_of_file_is_a_no_op() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();
    fs.write("/d/a", b"hi", 0).unwrap();

    let n = fs.write("/d/a", b"late", 10).unwrap();
    assert_eq!(n, 0);
    assert_eq!(fs.getattr("/d/a").unwrap().size, 2);
}

#[test]
fn mknod_rejects_when_directory_is_full() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    for i in 0..mfs_fs::catalog::FILES_PER_DIR {
        fs.mknod(&format!("/d/f{i}"), 0o644).unwrap();
    }
    match fs.mknod("/d/one_too_many", 0o644) {
        Err(Error::NotPermitted) => {}
        other => panic!("expected NotPermitted, got {other:?}"),
    }
}

#[test]
fn write_requiring_more_than_largest_free_run_returns_out_of_space() {
    // A tiny device leaves very little room beyond the bitmap prefix.
    let (mut fs, _dir) = new_fs(4);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();

    let huge = vec![0u8; 16 * 512];
    match fs.write("/d/a", &huge, 0) {
        Err(Error::OutOfSpace) => {}
        other => panic!("expected OutOfSpace, got {other:?}"),
    }
    // the file is unchanged by the failed write
    assert_eq!(fs.getattr("/d/a").unwrap().size, 0);
}

#[test]
fn truncate_shrinks_and_frees_trailing_blocks() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();
    fs.write("/d/a", &vec![1u8; 1024], 0).unwrap();

    fs.truncate("/d/a", 10).unwrap();
    assert_eq!(fs.getattr("/d/a").unwrap().size, 10);
    assert_eq!(fs.getattr("/d/a").unwrap().blocks(), 1);
}

#[test]
fn truncate_to_zero_clears_the_extent() {
    let (mut fs, _dir) = new_fs(64);
    fs.mkdir("/d", 0o755).unwrap();
    fs.mknod("/d/a", 0o644).unwrap();
    fs.write("/d/a", b"hello", 0).unwrap();

    fs.truncate("/d/a", 0).unwrap();
    assert_eq!(fs.getattr("/d/a").unwrap().size, 0);

    // writing again must not conflict with the freed blocks
    fs.write("/d/a", b"again", 0).unwrap();
    let mut buf = [0u8; 5];
    fs.read("/d/a", &mut buf, 0).unwrap();
    assert_eq!(&buf, b"again");
}
