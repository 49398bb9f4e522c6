use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("bad magic number, device is not formatted")]
    InvalidFormat,
    #[error("inode, path, or directory entry not found")]
    NotFound,
    #[error("an entry with this name already exists")]
    DuplicateName,
    #[error("file name too long")]
    NameTooLong,
    #[error("the entry is a directory")]
    IsADirectory,
    #[error("the entry is not a directory")]
    NotADirectory,
    #[error("offset is outside the file's extent")]
    OffsetOutOfRange,
    #[error("no free inodes or data blocks left")]
    OutOfSpace,
    #[error("the entry has already been deleted")]
    AlreadyDeleted,
    #[error("directory system is not initialized")]
    NotInitialized,
    #[error("path has too many components")]
    PathTooDeep,
    #[error("block device read or write failed")]
    IoFailure,
}

pub type Result<T> = core::result::Result<T, FsError>;
