use std::sync::Arc;

use log::{debug, warn};

use crate::config::*;
use crate::directory::{self, DirEntry};
use crate::error::FsError;
use crate::inode::{self, Stat};
use crate::superblock::{format_device, read_superblock};
use crate::{file, BlockDevice, Result, SuperBlock};

/// One mounted file system: a block device plus the superblock read (or
/// written) at mount time. Handles are independent, so tests can mount
/// several devices side by side. Callers wanting shared access wrap the
/// handle in a lock; nothing here synchronizes.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    dir_ready: bool,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats the device and returns a handle mounted on the fresh layout.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let superblock = format_device(&*device)?;
        Ok(FileSystem {
            device,
            superblock,
            dir_ready: false,
        })
    }

    /// Mounts an already-formatted device, validating the superblock magic.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        Ok(FileSystem {
            device,
            superblock,
            dir_ready: false,
        })
    }

    /// Brings up the directory layer by claiming inode 0 for the root
    /// directory. On a device that already has a root (a remount), the
    /// existing one is adopted. If allocation yields any other inode the
    /// directory system stays unusable and every directory operation keeps
    /// failing with `NotInitialized`.
    pub fn init_dirsys(&mut self) -> Result<()> {
        if self.dir_ready {
            return Ok(());
        }

        let existing = inode::get_inode(&*self.device, &self.superblock, ROOT_INODE_ID)?;
        if existing.is_valid() {
            debug!("adopting existing root inode");
            self.dir_ready = true;
            return Ok(());
        }

        let root = inode::create_inode(&*self.device, &self.superblock)?;
        if root != ROOT_INODE_ID {
            warn!("root allocation returned inode {}, expected {}", root, ROOT_INODE_ID);
            let _ = inode::remove_inode(&*self.device, &self.superblock, root);
            return Err(FsError::NotInitialized);
        }
        self.dir_ready = true;
        Ok(())
    }

    fn require_dirsys(&self) -> Result<()> {
        if self.dir_ready {
            Ok(())
        } else {
            Err(FsError::NotInitialized)
        }
    }

    // Inode-level operations.

    /// Allocates a fresh zero-length inode and returns its number.
    pub fn create_file(&mut self) -> Result<u32> {
        inode::create_inode(&*self.device, &self.superblock)
    }

    /// Releases an inode and every data block it references.
    pub fn remove_file(&mut self, inumber: u32) -> Result<()> {
        inode::remove_inode(&*self.device, &self.superblock, inumber)
    }

    pub fn stat(&self, inumber: u32) -> Result<Stat> {
        inode::stat(&*self.device, &self.superblock, inumber)
    }

    pub fn read_at(&self, inumber: u32, buf: &mut [u8], offset: usize) -> Result<usize> {
        file::read_at(&*self.device, &self.superblock, inumber, buf, offset)
    }

    pub fn write_at(&mut self, inumber: u32, data: &[u8], offset: usize) -> Result<usize> {
        file::write_at(&*self.device, &self.superblock, inumber, data, offset)
    }

    /// Shrinks a file to `size`; growing is a no-op.
    pub fn fit_to_size(&mut self, inumber: u32, size: usize) -> Result<()> {
        file::fit_to_size(&*self.device, &self.superblock, inumber, size)
    }

    pub fn get_filesize(&self, inumber: u32) -> Result<u32> {
        file::get_filesize(&*self.device, &self.superblock, inumber)
    }

    // Path-level operations. All of them require init_dirsys to have
    // succeeded on this handle.

    /// Resolves a path to the inode of the directory it names.
    pub fn resolve_path(&self, path: &str) -> Result<u32> {
        self.require_dirsys()?;
        directory::resolve_dir(&*self.device, &self.superblock, path)
    }

    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        self.require_dirsys()?;
        directory::create_entry(&*self.device, &self.superblock, path, true).map(|_| ())
    }

    /// Creates a plain file at `path`, returning its inode number.
    pub fn create_file_by_path(&mut self, path: &str) -> Result<u32> {
        self.require_dirsys()?;
        directory::create_entry(&*self.device, &self.superblock, path, false)
    }

    /// Removes a directory and its whole subtree.
    pub fn remove_dir(&mut self, path: &str) -> Result<()> {
        self.require_dirsys()?;
        directory::remove_dir_path(&*self.device, &self.superblock, path)
    }

    pub fn remove_file_by_path(&mut self, path: &str) -> Result<()> {
        self.require_dirsys()?;
        directory::remove_file_path(&*self.device, &self.superblock, path)
    }

    pub fn read_file(&self, path: &str, buf: &mut [u8], offset: usize) -> Result<usize> {
        self.require_dirsys()?;
        let inumber = directory::lookup_file(&*self.device, &self.superblock, path)?;
        file::read_at(&*self.device, &self.superblock, inumber, buf, offset)
    }

    pub fn write_file(&mut self, path: &str, data: &[u8], offset: usize) -> Result<usize> {
        self.require_dirsys()?;
        let inumber = directory::lookup_file(&*self.device, &self.superblock, path)?;
        file::write_at(&*self.device, &self.superblock, inumber, data, offset)
    }

    /// Lists the valid entries of the directory at `path`.
    pub fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.require_dirsys()?;
        directory::list_dir(&*self.device, &self.superblock, path)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
