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

//! Mounts the two-level 8.3 filesystem at a host path via FUSE.

mod bridge;
mod inode;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;
use log::info;
use mfs_ds_std::BlockDevice;
use mfs_fs::catalog::Catalog;

use bridge::FuseBridge;

/// Default backing-device size: 64 MiB, i.e. 131072 512-byte blocks.
const DEFAULT_DEVICE_BLOCKS: u64 = 131_072;

#[derive(Parser, Debug)]
#[command(name = "mfs", about = "A FUSE driver for the two-level 8.3 filesystem")]
struct Args {
    /// Host directory to mount the filesystem at.
    mountpoint: PathBuf,

    /// Backing file holding the block device image. Created if missing.
    #[arg(long, default_value = "mfs.img")]
    backing_file: PathBuf,

    /// Auxiliary file holding the directory catalog. Created if missing.
    #[arg(long, default_value = "mfs.cat")]
    catalog_file: PathBuf,

    /// Size of the backing device, in 512-byte blocks. Only takes effect
    /// the first time the backing file is created.
    #[arg(long, default_value_t = DEFAULT_DEVICE_BLOCKS)]
    device_blocks: u64,

    /// Increase log verbosity; repeat for more (e.g. -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(args) {
        log::error!("{err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: Args) -> anyhow::Result<()> {
    let device = BlockDevice::open(&args.backing_file)?;
    device.ensure_len(args.device_blocks * 512)?;
    info!(
        "backing device {} ({} blocks)",
        args.backing_file.display(),
        args.device_blocks
    );

    let catalog = Catalog::open(&args.catalog_file)?;
    info!("catalog {}", args.catalog_file.display());

    let fs = mfs_fs::Filesystem::new(device, catalog);
    let bridge = FuseBridge::new(fs);

    let options = vec![
        MountOption::FSName("mfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    info!("mounting at {}", args.mountpoint.display());
    fuser::mount2(bridge, &args.mountpoint, &options)?;
    Ok(())
}
