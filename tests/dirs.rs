//! Directory-layer integration tests: initialization, path resolution,
//! create/remove by path, tombstone reuse, and the path-level file I/O.

use std::sync::Arc;

mod common;

use common::{init_logger, RamDisk};
use quark::BlockDevice;
use quark::Error;
use quark::FileSystem;
use quark::BLOCK_SIZE;
use quark::ROOT_INODE_ID;

const DISK_BLOCKS: usize = 64;

fn fresh_fs() -> FileSystem<RamDisk> {
    init_logger();
    let disk = Arc::new(RamDisk::new(DISK_BLOCKS));
    let mut fs = FileSystem::format(disk).unwrap();
    fs.init_dirsys().unwrap();
    fs
}

#[test]
fn init_claims_root_inode() {
    let fs = fresh_fs();
    assert_eq!(fs.resolve_path("/").unwrap(), ROOT_INODE_ID);
    assert_eq!(fs.resolve_path(".").unwrap(), ROOT_INODE_ID);
}

#[test]
fn operations_before_init_fail() {
    init_logger();
    let disk = Arc::new(RamDisk::new(DISK_BLOCKS));
    let mut fs = FileSystem::format(disk).unwrap();
    assert_eq!(fs.resolve_path("/"), Err(Error::NotInitialized));
    assert_eq!(fs.create_dir("/a"), Err(Error::NotInitialized));
    assert_eq!(fs.create_file_by_path("/f"), Err(Error::NotInitialized));
    assert_eq!(fs.list_dir("/"), Err(Error::NotInitialized));
    let mut buf = [0u8; 4];
    assert_eq!(fs.read_file("/f", &mut buf, 0), Err(Error::NotInitialized));
}

#[test]
fn remount_adopts_existing_root() {
    init_logger();
    let disk = Arc::new(RamDisk::new(DISK_BLOCKS));
    let mut fs = FileSystem::format(Arc::clone(&disk)).unwrap();
    fs.init_dirsys().unwrap();
    fs.create_dir("/kept").unwrap();
    drop(fs);

    let mut remounted = FileSystem::mount(disk).unwrap();
    remounted.init_dirsys().unwrap();
    assert!(remounted.resolve_path("/kept").is_ok());
}

#[test]
fn path_lifecycle() {
    let mut fs = fresh_fs();
    fs.create_dir("/a").unwrap();
    let f_inumber = fs.create_file_by_path("/a/f").unwrap();

    let data = b"the quick brown fox jumps over the lazy dog";
    assert_eq!(fs.write_file("/a/f", data, 0).unwrap(), data.len());
    let mut buf = vec![0u8; data.len()];
    assert_eq!(fs.read_file("/a/f", &mut buf, 0).unwrap(), data.len());
    assert_eq!(&buf, data);

    fs.remove_dir("/a").unwrap();
    assert_eq!(fs.resolve_path("/a"), Err(Error::NotFound));
    // The file's inode went with the directory.
    assert_eq!(fs.get_filesize(f_inumber), Err(Error::NotFound));
}

#[test]
fn nested_directories_resolve_and_remove() {
    let mut fs = fresh_fs();
    fs.create_dir("/a").unwrap();
    fs.create_dir("/a/b").unwrap();
    fs.create_dir("/a/b/c").unwrap();
    let f1 = fs.create_file_by_path("/a/one").unwrap();
    let f2 = fs.create_file_by_path("/a/b/two").unwrap();
    let f3 = fs.create_file_by_path("/a/b/c/three").unwrap();
    fs.write_file("/a/b/c/three", b"deep", 0).unwrap();

    assert!(fs.resolve_path("/a/b/c").is_ok());
    // Trailing slashes are tolerated.
    assert!(fs.resolve_path("/a/b/").is_ok());

    fs.remove_dir("/a").unwrap();
    assert_eq!(fs.resolve_path("/a/b/c"), Err(Error::NotFound));
    assert_eq!(fs.resolve_path("/a/b"), Err(Error::NotFound));
    for inumber in [f1, f2, f3] {
        assert_eq!(fs.get_filesize(inumber), Err(Error::NotFound));
    }
}

#[test]
fn duplicate_names_are_rejected() {
    let mut fs = fresh_fs();
    fs.create_dir("/a").unwrap();
    assert_eq!(fs.create_dir("/a"), Err(Error::DuplicateName));
    // Files and directories share the namespace.
    assert_eq!(fs.create_file_by_path("/a"), Err(Error::DuplicateName));
    // The root always exists.
    assert_eq!(fs.create_dir("/"), Err(Error::DuplicateName));
}

#[test]
fn type_guards() {
    let mut fs = fresh_fs();
    fs.create_dir("/a").unwrap();
    fs.create_file_by_path("/f").unwrap();

    assert_eq!(fs.remove_file_by_path("/a"), Err(Error::IsADirectory));
    // A plain file does not resolve as a directory.
    assert_eq!(fs.resolve_path("/f"), Err(Error::NotFound));
    assert_eq!(fs.create_file_by_path("/f/child"), Err(Error::NotFound));
    assert_eq!(fs.list_dir("/f"), Err(Error::NotADirectory));
}

#[test]
fn removing_a_file_twice_fails() {
    let mut fs = fresh_fs();
    fs.create_file_by_path("/f").unwrap();
    fs.remove_file_by_path("/f").unwrap();
    assert_eq!(fs.remove_file_by_path("/f"), Err(Error::AlreadyDeleted));
    // The tombstone also blocks path-level I/O.
    let mut buf = [0u8; 4];
    assert_eq!(fs.read_file("/f", &mut buf, 0), Err(Error::NotFound));
    assert_eq!(fs.write_file("/f", b"data", 0), Err(Error::NotFound));
}

#[test]
fn missing_paths_fail() {
    let mut fs = fresh_fs();
    let mut buf = [0u8; 4];
    assert_eq!(fs.remove_file_by_path("/ghost"), Err(Error::NotFound));
    assert_eq!(fs.remove_dir("/ghost"), Err(Error::NotFound));
    assert_eq!(fs.read_file("/ghost", &mut buf, 0), Err(Error::NotFound));
    assert_eq!(fs.create_dir("/ghost/sub"), Err(Error::NotFound));
    assert_eq!(fs.list_dir("/ghost"), Err(Error::NotFound));
}

#[test]
fn root_cannot_be_removed() {
    let mut fs = fresh_fs();
    assert_eq!(fs.remove_dir("/"), Err(Error::NotFound));
}

#[test]
fn tombstoned_slots_are_reused() {
    let mut fs = fresh_fs();
    fs.create_dir("/d").unwrap();
    fs.create_file_by_path("/d/f1").unwrap();
    fs.create_file_by_path("/d/f2").unwrap();
    fs.create_file_by_path("/d/f3").unwrap();

    let dir_inumber = fs.resolve_path("/d").unwrap();
    let size_three = fs.get_filesize(dir_inumber).unwrap();
    let entry_size = size_three / 3;

    // Tombstoning does not shrink the directory's content.
    fs.remove_file_by_path("/d/f2").unwrap();
    assert_eq!(fs.get_filesize(dir_inumber).unwrap(), size_three);

    // A new name moves into the freed middle slot instead of appending.
    fs.create_file_by_path("/d/f4").unwrap();
    assert_eq!(fs.get_filesize(dir_inumber).unwrap(), size_three);

    // The very first slot is the exception: it is never reclaimed.
    fs.remove_file_by_path("/d/f1").unwrap();
    fs.create_file_by_path("/d/f5").unwrap();
    assert_eq!(fs.get_filesize(dir_inumber).unwrap(), size_three + entry_size);
}

#[test]
fn tombstoned_names_still_count_as_duplicates() {
    let mut fs = fresh_fs();
    fs.create_file_by_path("/f").unwrap();
    fs.remove_file_by_path("/f").unwrap();
    // The tombstone keeps its name, so the name stays taken.
    assert_eq!(fs.create_file_by_path("/f"), Err(Error::DuplicateName));
}

#[test]
fn name_length_limit() {
    let mut fs = fresh_fs();
    let too_long = format!("/{}", "x".repeat(256));
    assert_eq!(fs.create_dir(&too_long), Err(Error::NameTooLong));
    assert_eq!(fs.create_file_by_path(&too_long), Err(Error::NameTooLong));
    assert_eq!(fs.remove_file_by_path(&too_long), Err(Error::NameTooLong));

    let just_fits = format!("/{}", "y".repeat(255));
    fs.create_file_by_path(&just_fits).unwrap();
    assert!(fs.remove_file_by_path(&just_fits).is_ok());
}

#[test]
fn overly_deep_paths_are_rejected() {
    let mut fs = fresh_fs();
    let deep = "/a".repeat(65);
    assert_eq!(fs.resolve_path(&deep), Err(Error::PathTooDeep));
    assert_eq!(fs.create_dir(&deep), Err(Error::PathTooDeep));
}

#[test]
fn list_dir_shows_valid_entries() {
    let mut fs = fresh_fs();
    fs.create_dir("/d").unwrap();
    fs.create_file_by_path("/d/alpha").unwrap();
    fs.create_file_by_path("/d/beta").unwrap();
    fs.create_dir("/d/gamma").unwrap();

    let names: Vec<Vec<u8>> = fs
        .list_dir("/d")
        .unwrap()
        .iter()
        .map(|e| e.name().to_vec())
        .collect();
    assert_eq!(names, vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);

    fs.remove_file_by_path("/d/beta").unwrap();
    let names: Vec<Vec<u8>> = fs
        .list_dir("/d")
        .unwrap()
        .iter()
        .map(|e| e.name().to_vec())
        .collect();
    assert_eq!(names, vec![b"alpha".to_vec(), b"gamma".to_vec()]);

    assert!(fs.list_dir("/").unwrap().iter().any(|e| e.is_directory()));
}

#[test]
fn file_io_by_path_spans_blocks() {
    let mut fs = fresh_fs();
    fs.create_dir("/data").unwrap();
    fs.create_file_by_path("/data/blob").unwrap();

    let data: Vec<u8> = (0..3 * quark::BLOCK_SIZE + 17).map(|i| (i % 199) as u8).collect();
    assert_eq!(fs.write_file("/data/blob", &data, 0).unwrap(), data.len());

    let mut buf = vec![0u8; data.len()];
    assert_eq!(fs.read_file("/data/blob", &mut buf, 0).unwrap(), data.len());
    assert_eq!(buf, data);

    // Offsets and clamping behave exactly like the inode-level calls.
    let mut tail = vec![0u8; 64];
    let got = fs.read_file("/data/blob", &mut tail, data.len() - 10).unwrap();
    assert_eq!(got, 10);
    assert_eq!(&tail[..10], &data[data.len() - 10..]);
}

#[test]
fn full_device_keeps_directory_entries_aligned() {
    init_logger();
    // 11 blocks: 7 data blocks total.
    let disk = Arc::new(RamDisk::new(11));
    let mut fs = FileSystem::format(disk).unwrap();
    fs.init_dirsys().unwrap();

    fs.create_file_by_path("/big").unwrap();
    fs.create_file_by_path("/big2").unwrap();
    let entry_size = fs.get_filesize(ROOT_INODE_ID).unwrap() / 2;

    // Use up every data block: one holds the root's entries, the other six
    // go to the two files.
    let block = vec![7u8; BLOCK_SIZE];
    for i in 0..4 {
        assert_eq!(
            fs.write_file("/big", &block, i * BLOCK_SIZE).unwrap(),
            BLOCK_SIZE
        );
    }
    for i in 0..2 {
        assert_eq!(
            fs.write_file("/big2", &block, i * BLOCK_SIZE).unwrap(),
            BLOCK_SIZE
        );
    }

    // 15 records fill the root's first block.
    for i in 2..15 {
        fs.create_file_by_path(&format!("/f{:02}", i)).unwrap();
    }
    assert_eq!(fs.get_filesize(ROOT_INODE_ID).unwrap(), 15 * entry_size);

    // The 16th record would straddle into a block that cannot be
    // allocated. The partial append must be undone, or every record
    // written after it would sit off the scan grid.
    assert_eq!(fs.create_file_by_path("/f16"), Err(Error::OutOfSpace));
    assert_eq!(fs.get_filesize(ROOT_INODE_ID).unwrap(), 15 * entry_size);

    // Once space is back the same append succeeds and the entry is found.
    fs.remove_file_by_path("/big").unwrap();
    fs.create_file_by_path("/f16").unwrap();
    assert_eq!(fs.get_filesize(ROOT_INODE_ID).unwrap(), 16 * entry_size);
    assert!(fs.list_dir("/").unwrap().iter().any(|e| e.name() == b"f16"));
}

/// Refuses writes at or past a configured block ID; reads and writes below
/// it pass through.
struct WriteFaultDisk {
    inner: RamDisk,
    fail_from: usize,
}

impl BlockDevice for WriteFaultDisk {
    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), Error> {
        if block_id >= self.fail_from {
            return Err(Error::IoFailure);
        }
        self.inner.write_block(block_id, buf)
    }
}

#[test]
fn failed_entry_write_releases_the_inode() {
    init_logger();
    // The data region starts at block 9 on a 64-block device; metadata
    // writes below it keep working while every entry write fails.
    let disk = Arc::new(WriteFaultDisk {
        inner: RamDisk::new(DISK_BLOCKS),
        fail_from: 9,
    });
    let mut fs = FileSystem::format(disk).unwrap();
    fs.init_dirsys().unwrap();

    assert_eq!(fs.create_file_by_path("/f"), Err(Error::IoFailure));
    // The freshly allocated inode was given back: the next allocation
    // hands out the same number.
    assert_eq!(fs.create_file().unwrap(), 1);
    // And no trace of the entry remains.
    assert_eq!(fs.resolve_path("/f"), Err(Error::NotFound));
    assert!(fs.list_dir("/").unwrap().is_empty());
}

#[test]
fn independent_mounts_do_not_share_state() {
    init_logger();
    let mut fs1 = FileSystem::format(Arc::new(RamDisk::new(DISK_BLOCKS))).unwrap();
    let mut fs2 = FileSystem::format(Arc::new(RamDisk::new(DISK_BLOCKS))).unwrap();
    fs1.init_dirsys().unwrap();
    fs2.init_dirsys().unwrap();

    fs1.create_dir("/only-here").unwrap();
    assert!(fs1.resolve_path("/only-here").is_ok());
    assert_eq!(fs2.resolve_path("/only-here"), Err(Error::NotFound));
}
