//! Byte-granular reads, writes and truncation over a single inode.

use log::{debug, warn};

use crate::bitmap;
use crate::config::*;
use crate::error::FsError;
use crate::inode::{
    get_block, get_inode, put_block, read_data_block, write_data_block, write_inode,
};
use crate::{BlockDevice, Result, SuperBlock};

/// Reads up to `buf.len()` bytes starting at `offset`, clamped to the file's
/// size. Returns the number of bytes read; an offset at or past end-of-file
/// is an error.
pub fn read_at(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
    buf: &mut [u8],
    offset: usize,
) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    let inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }
    let size = inode.size as usize;
    if offset >= size {
        return Err(FsError::OffsetOutOfRange);
    }

    let to_read = buf.len().min(size - offset);
    let mut block_buf = vec![0u8; BLOCK_SIZE];
    let mut bytes_read = 0;
    while bytes_read < to_read {
        let pos = offset + bytes_read;
        get_block(device, superblock, &inode, pos / BLOCK_SIZE, &mut block_buf)?;
        let inner = pos % BLOCK_SIZE;
        let chunk = (BLOCK_SIZE - inner).min(to_read - bytes_read);
        buf[bytes_read..bytes_read + chunk].copy_from_slice(&block_buf[inner..inner + chunk]);
        bytes_read += chunk;
    }

    Ok(bytes_read)
}

/// Writes `data` at `offset`, which must lie within the current extent or
/// exactly at its end; there are no sparse writes. New blocks are allocated
/// as the write crosses the end of allocated storage, and the write stops
/// early (returning the bytes written so far) once the device is full or the
/// file hits its block cap. The inode is persisted once, after the loop.
pub fn write_at(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
    data: &[u8],
    offset: usize,
) -> Result<usize> {
    if data.is_empty() {
        return Ok(0);
    }
    let mut inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }
    if offset > inode.size as usize {
        return Err(FsError::OffsetOutOfRange);
    }

    let region = superblock.data_region();
    let mut total_blocks = inode.block_count() as usize;
    let mut block_buf = vec![0u8; BLOCK_SIZE];
    let mut written = 0;

    while written < data.len() {
        let pos = offset + written;
        if pos == total_blocks * BLOCK_SIZE {
            // At the edge of allocated storage: grow by one block.
            if total_blocks == MAX_FILE_BLOCKS {
                warn!("inode {} reached the {} block cap", inumber, MAX_FILE_BLOCKS);
                break;
            }
            let blocknum = total_blocks;
            if blocknum == NUM_DIRECT_PTRS {
                // First block past the direct slots: the indirect block
                // itself comes first, then the data block it points at.
                let indirect = match bitmap::allocate(device, &region) {
                    Ok(b) => b,
                    Err(FsError::OutOfSpace) => break,
                    Err(e) => return Err(e),
                };
                let first = match bitmap::allocate(device, &region) {
                    Ok(b) => b,
                    Err(FsError::OutOfSpace) => {
                        let _ = bitmap::free(device, &region, indirect);
                        break;
                    }
                    Err(e) => return Err(e),
                };
                inode.indirect = indirect;
                block_buf.fill(0);
                block_buf[..4].copy_from_slice(&first.to_le_bytes());
                write_data_block(device, superblock, indirect, &block_buf)?;
            } else if blocknum > NUM_DIRECT_PTRS {
                read_data_block(device, superblock, inode.indirect, &mut block_buf)?;
                let new_block = match bitmap::allocate(device, &region) {
                    Ok(b) => b,
                    Err(FsError::OutOfSpace) => break,
                    Err(e) => return Err(e),
                };
                let slot = (blocknum - NUM_DIRECT_PTRS) * 4;
                block_buf[slot..slot + 4].copy_from_slice(&new_block.to_le_bytes());
                write_data_block(device, superblock, inode.indirect, &block_buf)?;
            } else {
                let new_block = match bitmap::allocate(device, &region) {
                    Ok(b) => b,
                    Err(FsError::OutOfSpace) => break,
                    Err(e) => return Err(e),
                };
                inode.direct[blocknum] = new_block;
            }
            total_blocks += 1;

            let chunk = BLOCK_SIZE.min(data.len() - written);
            block_buf.fill(0);
            block_buf[..chunk].copy_from_slice(&data[written..written + chunk]);
            put_block(device, superblock, &inode, blocknum, &block_buf)?;
            written += chunk;
        } else {
            // Overwriting (or finishing off) an already-allocated block.
            let blocknum = pos / BLOCK_SIZE;
            get_block(device, superblock, &inode, blocknum, &mut block_buf)?;
            let inner = pos % BLOCK_SIZE;
            let chunk = (BLOCK_SIZE - inner).min(data.len() - written);
            block_buf[inner..inner + chunk].copy_from_slice(&data[written..written + chunk]);
            put_block(device, superblock, &inode, blocknum, &block_buf)?;
            written += chunk;
        }
        // Size only ever grows; interior overwrites leave it alone.
        inode.size = inode.size.max((offset + written) as u32);
    }

    write_inode(device, superblock, inumber, &inode)?;
    if written < data.len() {
        debug!(
            "short write on inode {}: {} of {} bytes",
            inumber,
            written,
            data.len()
        );
    }
    Ok(written)
}

/// Shrinks a file to `new_size`, releasing every block past the new tail.
/// Growing is not supported here; a size at or above the current one is a
/// no-op.
pub fn fit_to_size(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
    new_size: usize,
) -> Result<()> {
    let mut inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }
    if new_size >= inode.size as usize {
        return Ok(());
    }

    let total = inode.block_count() as usize;
    let keep = (new_size + BLOCK_SIZE - 1) / BLOCK_SIZE;
    let region = superblock.data_region();

    if total > keep {
        let indirect_ptrs: Vec<u32> = if total > NUM_DIRECT_PTRS {
            let mut buf = vec![0u8; BLOCK_SIZE];
            read_data_block(device, superblock, inode.indirect, &mut buf)?;
            buf.chunks_exact(4)
                .take(total - NUM_DIRECT_PTRS)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        } else {
            Vec::new()
        };

        for i in (keep..total).rev() {
            if i > NUM_DIRECT_PTRS {
                bitmap::free(device, &region, indirect_ptrs[i - NUM_DIRECT_PTRS])?;
            } else if i == NUM_DIRECT_PTRS {
                // Last indirect-referenced block goes, and the indirect
                // block itself with it.
                bitmap::free(device, &region, indirect_ptrs[0])?;
                bitmap::free(device, &region, inode.indirect)?;
            } else {
                bitmap::free(device, &region, inode.direct[i])?;
            }
        }
    }

    inode.size = new_size as u32;
    write_inode(device, superblock, inumber, &inode)?;
    debug!("truncated inode {} to {} bytes", inumber, new_size);
    Ok(())
}

/// Returns the logical size of a valid inode.
pub fn get_filesize(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    inumber: u32,
) -> Result<u32> {
    let inode = get_inode(device, superblock, inumber)?;
    if !inode.is_valid() {
        return Err(FsError::NotFound);
    }
    Ok(inode.size)
}
