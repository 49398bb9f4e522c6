//! First-fit bitmap allocation over a contiguous region of bitmap blocks.
//! The same scan serves both the inode pool and the data-block pool; the two
//! only differ in the [`BitmapRegion`] the superblock hands out.

use log::debug;

use crate::config::*;
use crate::error::FsError;
use crate::{BlockDevice, Result};

/// Describes one allocatable pool: where its bitmap lives and how many
/// objects it actually tracks. The last bitmap block usually has trailing
/// padding bits; `total_items` is what makes them non-allocatable.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BitmapRegion {
    pub bitmap_start: u32,
    pub bitmap_blocks: u32,
    pub total_items: u32,
}

/// Scans the region's bitmap for the first clear bit, word by word, sets it
/// and persists the touched bitmap block. Returns the object index.
pub(crate) fn allocate(device: &impl BlockDevice, region: &BitmapRegion) -> Result<u32> {
    let mut buf = vec![0u8; BLOCK_SIZE];

    for i in 0..region.bitmap_blocks {
        let block_id = (region.bitmap_start + i) as usize;
        device.read_block(block_id, buf.as_mut_slice())?;

        for (w, chunk) in buf.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if word == u32::MAX {
                continue;
            }
            let bit = (!word).trailing_zeros();
            let item = i * BITS_PER_BLOCK as u32 + w as u32 * 32 + bit;
            if item >= region.total_items {
                // Only padding bits are left in the final bitmap block.
                debug!("bitmap region at block {} exhausted", region.bitmap_start);
                return Err(FsError::OutOfSpace);
            }
            let patched = word | 1 << bit;
            buf[w * 4..w * 4 + 4].copy_from_slice(&patched.to_le_bytes());
            device.write_block(block_id, buf.as_ref())?;
            return Ok(item);
        }
    }

    debug!("bitmap region at block {} exhausted", region.bitmap_start);
    Err(FsError::OutOfSpace)
}

/// Clears the bit for `item`, making it allocatable again.
pub(crate) fn free(device: &impl BlockDevice, region: &BitmapRegion, item: u32) -> Result<()> {
    if item >= region.total_items {
        return Err(FsError::NotFound);
    }

    let block_id = (region.bitmap_start + item / BITS_PER_BLOCK as u32) as usize;
    let byte_offset = (item as usize % BITS_PER_BLOCK) / 8;
    let bit_offset = item % 8;

    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(block_id, buf.as_mut_slice())?;
    buf[byte_offset] &= !(1 << bit_offset);
    device.write_block(block_id, buf.as_ref())?;

    Ok(())
}
