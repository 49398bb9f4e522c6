pub const MAGIC: u32 = 0x5146_5331; // "QFS1" in ASCII

pub const BLOCK_SIZE: usize = 4096;
pub const SUPERBLOCK_ID: usize = 0; // Block ID for the superblock
pub const ROOT_INODE_ID: u32 = 0; // Inode ID for the root directory
pub const BITS_PER_BLOCK: usize = BLOCK_SIZE * 8; // Objects tracked per bitmap block

pub const INODE_SIZE: usize = 32;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

pub const NUM_DIRECT_PTRS: usize = 5; // Number of direct pointers in an inode
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4; // Number of pointers per block (32-bit pointers)
pub const MAX_FILE_BLOCKS: usize = NUM_DIRECT_PTRS + PTRS_PER_BLOCK; // Hard cap on blocks per file

pub const MAX_FILE_NAME_LEN: usize = 256; // Names must be strictly shorter than this
pub const MAX_PATH_DEPTH: usize = 64; // Paths with more components are rejected
