//! Quark is a tiny simulated block file system.
//! For simplicity, no support for permissions, timestamps, links, or other
//! advanced features; access is single-threaded and synchronous.
//!
//! Quark's linear layout:
//! - Superblock
//! - Inode Bitmap
//! - Data Bitmap
//! - Inode Table
//! - Data Blocks
//!
//! Quark's layers (from bottom to top):
//! 1. Block Device: Abstraction for low level devices.              | User implemented
//! 2. Bitmap: First-fit allocation for inodes and data blocks.      | Fs implemented
//! 3. Inode: File metadata, direct + indirect block addressing.     | Fs implemented
//! 4. File: Byte-granular read/write/truncate over one inode.       | Fs implemented
//! 5. Directory/Path: Entry records stored as ordinary file bytes.  | Fs implemented
//! 6. FileSystem: The mounted handle tying the layers together.     | User facing

mod bitmap;
mod block_dev;
mod config;
mod directory;
mod error;
mod file;
mod fs;
mod inode;
mod path;
mod superblock;

pub use block_dev::BlockDevice;
pub use config::*;
pub use directory::DirEntry;
pub use error::FsError as Error;
pub use error::Result;
pub use fs::FileSystem;
pub use inode::{Inode, Stat};
pub use superblock::SuperBlock;
