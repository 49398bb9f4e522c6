//! Common utilities for tests: an in-memory block device and logging setup.

use std::sync::Mutex;

use quark::BlockDevice;
use quark::Error;
use quark::BLOCK_SIZE;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fixed-capacity in-memory block store. Out-of-range block IDs fail, as
/// the device contract requires; there is no other logic.
pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
        }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        if block_id >= self.num_blocks {
            return Err(Error::IoFailure);
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::IoFailure);
        }
        let start = block_id * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        if block_id >= self.num_blocks {
            return Err(Error::IoFailure);
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::IoFailure);
        }
        let start = block_id * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
