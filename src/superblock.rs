//! On-disk layout: superblock geometry, format and mount.

use log::{debug, warn};

use crate::bitmap::BitmapRegion;
use crate::config::*;
use crate::error::FsError;
use crate::{BlockDevice, Result};

/// The superblock lives in block 0. Fields are persisted in declaration
/// order. All region indices are absolute block IDs; the layout is always
/// [superblock][inode bitmap][data bitmap][inode table][data blocks].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub blocks: u32,             // Usable blocks, everything except the superblock
    pub inode_blocks: u32,       // Blocks reserved for the inode table
    pub inodes: u32,             // Total inode count
    pub inode_bitmap_start: u32,
    pub inode_table_start: u32,
    pub data_bitmap_start: u32,
    pub data_start: u32,
    pub data_blocks: u32,        // Allocatable data blocks
}

impl SuperBlock {
    /// Derives the full region layout from a device's block count.
    /// Roughly 10% of the usable blocks go to the inode table.
    pub fn compute(num_blocks: usize) -> Result<Self> {
        let m = num_blocks.saturating_sub(1);
        let inode_blocks = m / 10;
        if inode_blocks == 0 {
            return Err(FsError::InvalidFormat);
        }
        let inodes = inode_blocks * INODES_PER_BLOCK;
        let inode_bitmap_blocks = (inodes + BITS_PER_BLOCK - 1) / BITS_PER_BLOCK;
        let rest = m - inode_blocks - inode_bitmap_blocks;
        let data_bitmap_blocks = (rest + BITS_PER_BLOCK - 1) / BITS_PER_BLOCK;
        if rest <= data_bitmap_blocks {
            return Err(FsError::InvalidFormat);
        }
        let data_blocks = rest - data_bitmap_blocks;

        let inode_bitmap_start = 1;
        let data_bitmap_start = inode_bitmap_start + inode_bitmap_blocks;
        let inode_table_start = data_bitmap_start + data_bitmap_blocks;
        let data_start = inode_table_start + inode_blocks;

        Ok(SuperBlock {
            magic: MAGIC,
            blocks: m as u32,
            inode_blocks: inode_blocks as u32,
            inodes: inodes as u32,
            inode_bitmap_start: inode_bitmap_start as u32,
            inode_table_start: inode_table_start as u32,
            data_bitmap_start: data_bitmap_start as u32,
            data_start: data_start as u32,
            data_blocks: data_blocks as u32,
        })
    }

    pub(crate) fn inode_region(&self) -> BitmapRegion {
        BitmapRegion {
            bitmap_start: self.inode_bitmap_start,
            bitmap_blocks: self.data_bitmap_start - self.inode_bitmap_start,
            total_items: self.inodes,
        }
    }

    pub(crate) fn data_region(&self) -> BitmapRegion {
        BitmapRegion {
            bitmap_start: self.data_bitmap_start,
            bitmap_blocks: self.inode_table_start - self.data_bitmap_start,
            total_items: self.data_blocks,
        }
    }
}

pub fn read_superblock(device: &impl BlockDevice) -> Result<SuperBlock> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(SUPERBLOCK_ID, buf.as_mut_slice())?;
    let superblock: SuperBlock = unsafe {
        core::ptr::read_unaligned(buf.as_ptr() as *const SuperBlock)
    };

    if superblock.magic != MAGIC {
        warn!("mount rejected: magic {:#010x} does not match", superblock.magic);
        return Err(FsError::InvalidFormat);
    }

    Ok(superblock)
}

pub fn write_superblock(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    unsafe {
        core::ptr::write_unaligned(buf.as_mut_ptr() as *mut SuperBlock, *superblock);
    }
    device.write_block(SUPERBLOCK_ID, buf.as_ref())?;
    Ok(())
}

/// Formats a device: writes a fresh superblock and zeroes both bitmaps and
/// the inode table, leaving every inode and data block free.
pub fn format_device(device: &impl BlockDevice) -> Result<SuperBlock> {
    let superblock = SuperBlock::compute(device.num_blocks())?;
    write_superblock(device, &superblock)?;

    let zero_block = vec![0u8; BLOCK_SIZE];
    for block_id in superblock.inode_bitmap_start..superblock.data_start {
        device.write_block(block_id as usize, zero_block.as_ref())?;
    }

    debug!(
        "formatted: {} usable blocks, {} inodes in {} table blocks, {} data blocks from block {}",
        superblock.blocks,
        superblock.inodes,
        superblock.inode_blocks,
        superblock.data_blocks,
        superblock.data_start,
    );
    Ok(superblock)
}
