#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::path::Path;

use common::{create, errno, mkdir, mount};
use slotfs::fs::{AccessMask, FsOps as _, OpenFlags};

#[test]
fn writes_land_at_their_offsets_and_grow_the_size() {
    let m = mount(2, None);
    let fs = &m.fs;
    let f = create(fs, "/f");

    assert_eq!(fs.write(f.fh, 0, b"hello").unwrap(), 5);
    assert_eq!(fs.write(f.fh, 5, b" world").unwrap(), 6);
    assert_eq!(fs.getattr(Path::new("/f")).unwrap().size, 11);
    assert_eq!(&fs.read(f.fh, 0, 64).unwrap()[..], b"hello world");
    assert_eq!(&fs.read(f.fh, 6, 3).unwrap()[..], b"wor");

    // Overwriting inside the file keeps its size.
    fs.write(f.fh, 0, b"J").unwrap();
    assert_eq!(fs.getattr(Path::new("/f")).unwrap().size, 11);
    assert_eq!(&fs.read(f.fh, 0, 5).unwrap()[..], b"Jello");
}

#[test]
fn sparse_write_and_read_past_end() {
    let m = mount(2, None);
    let fs = &m.fs;
    let f = create(fs, "/f");

    fs.write(f.fh, 10, b"x").unwrap();
    assert_eq!(fs.getattr(Path::new("/f")).unwrap().size, 11);
    let data = fs.read(f.fh, 0, 64).unwrap();
    assert_eq!(data.len(), 11);
    assert!(data[..10].iter().all(|b| *b == 0));
    assert!(fs.read(f.fh, 100, 8).unwrap().is_empty());
}

#[test]
fn open_with_trunc_drops_content() {
    let m = mount(2, None);
    let fs = &m.fs;
    let f = create(fs, "/f");
    fs.write(f.fh, 0, b"content").unwrap();

    // Read-only opens ignore O_TRUNC.
    fs.open(Path::new("/f"), OpenFlags::RDONLY | OpenFlags::TRUNC, 0)
        .unwrap();
    assert_eq!(fs.getattr(Path::new("/f")).unwrap().size, 7);

    let reopened = fs
        .open(Path::new("/f"), OpenFlags::WRONLY | OpenFlags::TRUNC, 0)
        .unwrap();
    assert_eq!(reopened.attr.size, 0);
    assert!(fs.read(reopened.fh, 0, 16).unwrap().is_empty());
}

#[test]
fn handles_die_with_their_name() {
    let m = mount(2, None);
    let fs = &m.fs;
    let f = create(fs, "/f");
    fs.unlink(Path::new("/f")).unwrap();

    assert_eq!(errno(fs.write(f.fh, 0, b"late")), libc::EBADF);
    assert_eq!(errno(fs.read(f.fh, 0, 4)), libc::EBADF);
    assert_eq!(errno(fs.write(u64::MAX, 0, b"x")), libc::EBADF);
    assert_eq!(errno(fs.release(u64::MAX)), libc::EBADF);
    assert!(fs.release(f.fh).is_ok(), "the slot itself stays open");
}

#[test]
fn directory_handles() {
    let m = mount(2, None);
    let fs = &m.fs;
    mkdir(fs, "/d");
    create(fs, "/f");

    let fh = fs.opendir(Path::new("/d")).unwrap();
    assert!(fs.releasedir(fh).is_ok());
    assert_eq!(errno(fs.opendir(Path::new("/f"))), libc::ENOTDIR);
    assert_eq!(
        errno(fs.readdir(Path::new("/f"), 0, |_, _| false)),
        libc::ENOTDIR
    );
}

#[test]
fn truncate_and_chown_are_not_implemented() {
    let m = mount(2, None);
    let fs = &m.fs;
    create(fs, "/f");

    assert_eq!(errno(fs.truncate(Path::new("/f"), 0)), libc::ENOSYS);
    assert_eq!(errno(fs.chown(Path::new("/f"), Some(0), None)), libc::ENOSYS);
    assert_eq!(errno(fs.truncate(Path::new("/missing"), 0)), libc::ENOENT);
}

#[test]
fn access_checks_owner_bits() {
    let m = mount(2, None);
    let fs = &m.fs;
    create(fs, "/f");
    fs.chmod(Path::new("/f"), 0o400).unwrap();

    assert!(fs.access(Path::new("/f"), AccessMask::empty()).is_ok());
    assert!(fs.access(Path::new("/f"), AccessMask::READ).is_ok());
    assert_eq!(
        errno(fs.access(Path::new("/f"), AccessMask::READ | AccessMask::WRITE)),
        libc::EACCES
    );
    assert_eq!(
        errno(fs.access(Path::new("/missing"), AccessMask::empty())),
        libc::ENOENT
    );
}

#[test]
fn statfs_tracks_pool_and_namespace() {
    let m = mount(3, None);
    let fs = &m.fs;
    let stats = fs.statfs().unwrap();
    assert_eq!(stats.total_slots, 3);
    assert_eq!(stats.free_slots, 3);
    assert_eq!(stats.active_entries, 1);
    assert_eq!(stats.max_filename_length, 255);

    mkdir(fs, "/d");
    create(fs, "/d/f");
    let stats = fs.statfs().unwrap();
    assert_eq!(stats.total_slots, 3);
    assert_eq!(stats.free_slots, 2);
    assert_eq!(stats.active_entries, 3);
}
