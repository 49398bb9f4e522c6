//! The inode table and inode lifecycle: create, remove, stat, and the
//! logical-to-physical block mapping behind file reads and writes.

use log::{debug, warn};

use crate::bitmap;
use crate::config::*;
use crate::error::FsError;
use crate::{BlockDevice, Result, SuperBlock};

/// On-disk inode, 32 bytes, 128 per table block. Block pointers are indices
/// into the data region, not absolute block IDs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub valid: u32,
    pub size: u32,
    pub direct: [u32; NUM_DIRECT_PTRS],
    pub indirect: u32,
}

impl Inode {
    pub(crate) fn empty() -> Self {
        Inode {
            valid: 1,
            size: 0,
            direct: [0; NUM_DIRECT_PTRS],
            indirect: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    /// Blocks backing the current logical size.
    pub fn block_count(&self) -> u32 {
        (self.size + BLOCK_SIZE as u32 - 1) / BLOCK_SIZE as u32
    }
}

/// Usage report for one inode, as returned by [`stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub size: u32,
    pub total_blocks: u32,
    pub direct_used: u32,
    pub indirect_used: u32,
}

pub fn get_inode(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
) -> Result<Inode> {
    if inumber >= superblock.inodes {
        return Err(FsError::NotFound);
    }

    let block_id = superblock.inode_table_start + inumber / INODES_PER_BLOCK as u32;
    let inner_offset = (inumber as usize % INODES_PER_BLOCK) * INODE_SIZE;
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(block_id as usize, buf.as_mut_slice())?;

    let inode: Inode = unsafe {
        core::ptr::read_unaligned(buf.as_ptr().add(inner_offset) as *const Inode)
    };
    Ok(inode)
}

pub fn write_inode(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
    inode: &Inode,
) -> Result<()> {
    if inumber >= superblock.inodes {
        return Err(FsError::NotFound);
    }

    let block_id = superblock.inode_table_start + inumber / INODES_PER_BLOCK as u32;
    let inner_offset = (inumber as usize % INODES_PER_BLOCK) * INODE_SIZE;
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(block_id as usize, buf.as_mut_slice())?;
    unsafe {
        core::ptr::write_unaligned(buf.as_mut_ptr().add(inner_offset) as *mut Inode, *inode);
    }
    device.write_block(block_id as usize, buf.as_ref())?;
    Ok(())
}

/// Reads a data block through its data-region index.
pub(crate) fn read_data_block(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    index: u32,
    buf: &mut [u8],
) -> Result<()> {
    device.read_block((superblock.data_start + index) as usize, buf)
}

/// Writes a data block through its data-region index.
pub(crate) fn write_data_block(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    index: u32,
    buf: &[u8],
) -> Result<()> {
    device.write_block((superblock.data_start + index) as usize, buf)
}

/// Allocates and initializes a fresh inode, returning its number.
/// The bitmap bit is released again if the table write fails.
pub fn create_inode(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<u32> {
    let inumber = bitmap::allocate(device, &superblock.inode_region())?;

    let stale = get_inode(device, superblock, inumber)?;
    if stale.is_valid() {
        // Bitmap said free but the table slot is live: on-disk state is
        // inconsistent, refuse to clobber it.
        warn!("inode {} marked free in bitmap but valid in table", inumber);
        let _ = bitmap::free(device, &superblock.inode_region(), inumber);
        return Err(FsError::IoFailure);
    }

    if let Err(e) = write_inode(device, superblock, inumber, &Inode::empty()) {
        let _ = bitmap::free(device, &superblock.inode_region(), inumber);
        return Err(e);
    }
    debug!("created inode {}", inumber);
    Ok(inumber)
}

fn free_indirect_blocks(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    indirect: u32,
    count: usize,
) -> Result<()> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    read_data_block(device, superblock, indirect, &mut buf)?;
    let region = superblock.data_region();
    for chunk in buf.chunks_exact(4).take(count) {
        let ptr = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        bitmap::free(device, &region, ptr)?;
    }
    bitmap::free(device, &region, indirect)
}

/// Releases every data block an inode references, marks it invalid, and
/// frees its bitmap bit. The slot itself is not erased. A failure partway
/// through leaves the already-freed blocks freed; there is no rollback.
pub fn remove_inode(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
) -> Result<()> {
    let mut inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }

    let n_blocks = inode.block_count() as usize;
    let region = superblock.data_region();
    for i in 0..n_blocks.min(NUM_DIRECT_PTRS) {
        bitmap::free(device, &region, inode.direct[i])?;
    }
    if n_blocks > NUM_DIRECT_PTRS {
        free_indirect_blocks(device, superblock, inode.indirect, n_blocks - NUM_DIRECT_PTRS)?;
    }

    inode.valid = 0;
    write_inode(device, superblock, inumber, &inode)?;
    bitmap::free(device, &superblock.inode_region(), inumber)?;
    debug!("removed inode {}", inumber);
    Ok(())
}

/// Reports size and pointer usage for a valid inode.
pub fn stat(device: &impl BlockDevice, superblock: &SuperBlock, inumber: u32) -> Result<Stat> {
    let inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }

    let total_blocks = inode.block_count();
    Ok(Stat {
        size: inode.size,
        total_blocks,
        direct_used: total_blocks.min(NUM_DIRECT_PTRS as u32),
        indirect_used: total_blocks.saturating_sub(NUM_DIRECT_PTRS as u32),
    })
}

/// Resolves a logical block of a file to its data-region index. Logical
/// blocks 0-4 come straight from the direct slots; anything past that goes
/// through the indirect block.
fn locate_block(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inode: &Inode,
    blocknum: usize,
) -> Result<u32> {
    if blocknum < NUM_DIRECT_PTRS {
        return Ok(inode.direct[blocknum]);
    }

    let mut buf = vec![0u8; BLOCK_SIZE];
    read_data_block(device, superblock, inode.indirect, &mut buf)?;
    let slot = (blocknum - NUM_DIRECT_PTRS) * 4;
    Ok(u32::from_le_bytes([buf[slot], buf[slot + 1], buf[slot + 2], buf[slot + 3]]))
}

/// Reads logical block `blocknum` of a file into `buf`.
pub(crate) fn get_block(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inode: &Inode,
    blocknum: usize,
    buf: &mut [u8],
) -> Result<()> {
    let index = locate_block(device, superblock, inode, blocknum)?;
    read_data_block(device, superblock, index, buf)
}

/// Writes `buf` over logical block `blocknum` of a file.
pub(crate) fn put_block(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inode: &Inode,
    blocknum: usize,
    buf: &[u8],
) -> Result<()> {
    let index = locate_block(device, superblock, inode, blocknum)?;
    write_data_block(device, superblock, index, buf)
}
