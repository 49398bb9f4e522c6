//! The directory layer. A directory's content is an ordinary inode-backed
//! file holding a flat sequence of fixed-size [`DirEntry`] records, accessed
//! only through the byte-granular file operations. Removal tombstones an
//! entry in place; creation may later reuse the slot.

use log::{debug, trace};

use crate::config::*;
use crate::error::FsError;
use crate::file::{fit_to_size, get_filesize, read_at, write_at};
use crate::inode::{create_inode, remove_inode};
use crate::path;
use crate::{BlockDevice, Result, SuperBlock};

/// On-disk directory entry, fixed width.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub valid: u8,
    pub is_dir: u8,
    pub name: [u8; MAX_FILE_NAME_LEN],
    pub name_len: u8,
    pub inumber: u32,
}

pub(crate) const DIR_ENTRY_SIZE: usize = core::mem::size_of::<DirEntry>();

impl DirEntry {
    pub(crate) fn new(name: &str, is_dir: bool, inumber: u32) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() >= MAX_FILE_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        let mut arr = [0u8; MAX_FILE_NAME_LEN];
        arr[..bytes.len()].copy_from_slice(bytes);
        Ok(DirEntry {
            valid: 1,
            is_dir: is_dir as u8,
            name: arr,
            name_len: bytes.len() as u8,
            inumber,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    pub fn is_directory(&self) -> bool {
        self.is_dir != 0
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }

    pub fn name_eq(&self, other: &str) -> bool {
        self.name() == other.as_bytes()
    }

    fn name_str(&self) -> Result<&str> {
        core::str::from_utf8(self.name()).map_err(|_| FsError::IoFailure)
    }
}

fn read_entry_at(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dir_inumber: u32,
    offset: usize,
) -> Result<DirEntry> {
    let mut buf = [0u8; DIR_ENTRY_SIZE];
    let n = read_at(device, superblock, dir_inumber, &mut buf, offset)?;
    if n != DIR_ENTRY_SIZE {
        return Err(FsError::IoFailure);
    }
    Ok(unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const DirEntry) })
}

fn write_entry_at(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dir_inumber: u32,
    entry: &DirEntry,
    offset: usize,
) -> Result<()> {
    let mut buf = [0u8; DIR_ENTRY_SIZE];
    unsafe {
        core::ptr::write_unaligned(buf.as_mut_ptr() as *mut DirEntry, *entry);
    }
    let dir_size = get_filesize(device, superblock, dir_inumber)? as usize;
    let n = write_at(device, superblock, dir_inumber, &buf, offset)?;
    if n != DIR_ENTRY_SIZE {
        // A partial append would put every later record off the
        // entry-size scan grid; trim the directory back.
        fit_to_size(device, superblock, dir_inumber, dir_size)?;
        return Err(FsError::OutOfSpace);
    }
    Ok(())
}

/// Finds the first entry whose name matches, valid or not. Returns its byte
/// offset within the directory's content alongside the entry.
fn find_entry(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dir_inumber: u32,
    name: &str,
) -> Result<Option<(usize, DirEntry)>> {
    let dir_size = get_filesize(device, superblock, dir_inumber)? as usize;
    let mut offset = 0;
    while offset + DIR_ENTRY_SIZE <= dir_size {
        let entry = read_entry_at(device, superblock, dir_inumber, offset)?;
        if entry.name_eq(name) {
            return Ok(Some((offset, entry)));
        }
        offset += DIR_ENTRY_SIZE;
    }
    Ok(None)
}

fn scan_for_dir(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dir_inumber: u32,
    name: &str,
) -> Result<u32> {
    match find_entry(device, superblock, dir_inumber, name)? {
        Some((_, entry)) if entry.is_valid() && entry.is_directory() => Ok(entry.inumber),
        // A tombstoned or non-directory match loses the lookup outright.
        _ => Err(FsError::NotFound),
    }
}

/// Resolves a path to the inode of the directory it names, by recursively
/// resolving the parent and scanning its entries for the base name.
pub fn resolve_dir(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dirpath: &str,
) -> Result<u32> {
    path::check_depth(dirpath)?;
    let (parent, base) = path::split(dirpath);
    trace!("resolve {:?} -> parent {:?}, base {:?}", dirpath, parent, base);

    if path::is_root_marker(&parent) {
        if path::is_root_marker(&base) {
            return Ok(ROOT_INODE_ID);
        }
        scan_for_dir(device, superblock, ROOT_INODE_ID, &base)
    } else {
        let parent_inumber = resolve_dir(device, superblock, &parent)?;
        scan_for_dir(device, superblock, parent_inumber, &base)
    }
}

/// Creates a file or directory entry under its parent. Reuses the first
/// tombstoned slot if one exists, otherwise appends. Returns the new inode
/// number.
pub fn create_entry(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    entry_path: &str,
    is_dir: bool,
) -> Result<u32> {
    path::check_depth(entry_path)?;
    let (parent, base) = path::split(entry_path);
    if base.len() >= MAX_FILE_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    if path::is_root_marker(&base) {
        // The root always exists.
        return Err(FsError::DuplicateName);
    }
    let parent_inumber = resolve_dir(device, superblock, &parent)?;

    let dir_size = get_filesize(device, superblock, parent_inumber)? as usize;
    let mut free_slot = None;
    let mut offset = 0;
    while offset + DIR_ENTRY_SIZE <= dir_size {
        let entry = read_entry_at(device, superblock, parent_inumber, offset)?;
        if entry.name_eq(&base) {
            return Err(FsError::DuplicateName);
        }
        if !entry.is_valid() && free_slot.is_none() {
            free_slot = Some(offset);
        }
        offset += DIR_ENTRY_SIZE;
    }

    let inumber = create_inode(device, superblock)?;
    let entry = DirEntry::new(&base, is_dir, inumber)?;

    // A tombstone at offset 0 is never reclaimed; such entries append instead.
    let target = match free_slot {
        Some(slot) if slot > 0 => slot,
        _ => dir_size,
    };
    if let Err(e) = write_entry_at(device, superblock, parent_inumber, &entry, target) {
        let _ = remove_inode(device, superblock, inumber);
        return Err(e);
    }
    debug!(
        "created {} {:?} as inode {} at slot {}",
        if is_dir { "directory" } else { "file" },
        entry_path,
        inumber,
        target / DIR_ENTRY_SIZE,
    );
    Ok(inumber)
}

/// Recursively removes a directory and everything below it, then tombstones
/// its entry in the parent. The root cannot be removed.
pub fn remove_dir_path(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dirpath: &str,
) -> Result<()> {
    let (parent, base) = path::split(dirpath);
    let parent_inumber = resolve_dir(device, superblock, &parent)?;
    let target = resolve_dir(device, superblock, dirpath)?;
    if target == ROOT_INODE_ID {
        return Err(FsError::NotFound);
    }

    let dir_size = get_filesize(device, superblock, target)? as usize;
    let mut offset = 0;
    while offset + DIR_ENTRY_SIZE <= dir_size {
        let entry = read_entry_at(device, superblock, target, offset)?;
        if entry.is_valid() {
            if entry.is_directory() {
                let child = path::join(dirpath, entry.name_str()?);
                remove_dir_path(device, superblock, &child)?;
            } else {
                remove_inode(device, superblock, entry.inumber)?;
            }
        }
        offset += DIR_ENTRY_SIZE;
    }

    remove_inode(device, superblock, target)?;

    if let Some((slot, mut entry)) = find_entry(device, superblock, parent_inumber, &base)? {
        entry.valid = 0;
        write_entry_at(device, superblock, parent_inumber, &entry, slot)?;
    }
    debug!("removed directory {:?} (inode {})", dirpath, target);
    Ok(())
}

/// Removes a plain file by path: releases its inode and tombstones the
/// parent entry.
pub fn remove_file_path(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    filepath: &str,
) -> Result<()> {
    let (parent, base) = path::split(filepath);
    if base.len() >= MAX_FILE_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    let parent_inumber = resolve_dir(device, superblock, &parent)?;

    match find_entry(device, superblock, parent_inumber, &base)? {
        None => Err(FsError::NotFound),
        Some((_, entry)) if entry.is_directory() => Err(FsError::IsADirectory),
        Some((_, entry)) if !entry.is_valid() => Err(FsError::AlreadyDeleted),
        Some((slot, mut entry)) => {
            remove_inode(device, superblock, entry.inumber)?;
            entry.valid = 0;
            write_entry_at(device, superblock, parent_inumber, &entry, slot)?;
            debug!("removed file {:?} (inode {})", filepath, entry.inumber);
            Ok(())
        }
    }
}

/// Looks up the inode behind a valid entry of any type, for the path-level
/// read and write operations.
pub fn lookup_file(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    filepath: &str,
) -> Result<u32> {
    let (parent, base) = path::split(filepath);
    let parent_inumber = resolve_dir(device, superblock, &parent)?;
    match find_entry(device, superblock, parent_inumber, &base)? {
        Some((_, entry)) if entry.is_valid() => Ok(entry.inumber),
        _ => Err(FsError::NotFound),
    }
}

/// Returns the valid entries of the directory at `dirpath`.
pub fn list_dir(
    device: &impl BlockDevice,
    superblock: &SuperBlock,
    dirpath: &str,
) -> Result<Vec<DirEntry>> {
    path::check_depth(dirpath)?;
    let (parent, base) = path::split(dirpath);
    let dir_inumber = if path::is_root_marker(&parent) && path::is_root_marker(&base) {
        ROOT_INODE_ID
    } else {
        let parent_inumber = resolve_dir(device, superblock, &parent)?;
        match find_entry(device, superblock, parent_inumber, &base)? {
            Some((_, entry)) if entry.is_valid() => {
                if !entry.is_directory() {
                    return Err(FsError::NotADirectory);
                }
                entry.inumber
            }
            _ => return Err(FsError::NotFound),
        }
    };

    let dir_size = get_filesize(device, superblock, dir_inumber)? as usize;
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset + DIR_ENTRY_SIZE <= dir_size {
        let entry = read_entry_at(device, superblock, dir_inumber, offset)?;
        if entry.is_valid() {
            entries.push(entry);
        }
        offset += DIR_ENTRY_SIZE;
    }
    Ok(entries)
}
