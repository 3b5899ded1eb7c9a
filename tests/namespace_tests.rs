#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::path::Path;

use common::{children, create, errno, free_slots, mkdir, mount};
use slotfs::fs::{DentryKind, FsOps as _, OpenFlags};

#[test]
fn mkdir_create_unlink_rmdir_returns_to_root_only() {
    let m = mount(8, None);
    let fs = &m.fs;
    assert_eq!(fs.statfs().unwrap().active_entries, 1);

    mkdir(fs, "/a");
    mkdir(fs, "/a/b");
    let before = free_slots(fs);
    create(fs, "/a/b/f");
    assert_eq!(free_slots(fs), before - 1, "create should pull a slot");
    assert_eq!(children(fs, "/a/b"), ["f"]);

    fs.unlink(Path::new("/a/b/f")).unwrap();
    assert_eq!(free_slots(fs), before, "unlink should return the slot");
    fs.rmdir(Path::new("/a/b")).unwrap();
    fs.rmdir(Path::new("/a")).unwrap();

    let stats = fs.statfs().unwrap();
    assert_eq!(stats.active_entries, 1, "only the root should remain");
    assert!(children(fs, "/").is_empty());
}

#[test]
fn created_file_resolves_with_zero_size() {
    let m = mount(4, None);
    let fs = &m.fs;
    let opened = create(fs, "/f");
    let attr = fs.getattr(Path::new("/f")).unwrap();
    assert_eq!(attr.kind, DentryKind::File);
    assert_eq!(attr.size, 0);
    assert_eq!(attr.nlink, 1);
    assert_eq!(attr.slot_id, opened.slot_id);
    assert_eq!(attr.perm, 0o644);
}

#[test]
fn children_are_listed_in_name_order_without_grandchildren() {
    let m = mount(8, None);
    let fs = &m.fs;
    mkdir(fs, "/d");
    create(fs, "/d/zeta");
    create(fs, "/d/alpha");
    mkdir(fs, "/d/mid");
    create(fs, "/d/mid/deep");

    assert_eq!(children(fs, "/d"), ["alpha", "mid", "zeta"]);
    assert_eq!(children(fs, "/d/mid"), ["deep"]);
    assert_eq!(children(fs, "/"), ["d"]);
}

#[test]
fn readdir_starts_with_dot_entries_and_resumes_from_offset() {
    let m = mount(8, None);
    let fs = &m.fs;
    mkdir(fs, "/d");
    create(fs, "/d/a");
    create(fs, "/d/b");

    let mut all = Vec::new();
    fs.readdir(Path::new("/d"), 0, |entry, next| {
        all.push((entry.name.to_string_lossy().into_owned(), next));
        false
    })
    .unwrap();
    let names: Vec<&str> = all.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, [".", "..", "a", "b"]);

    // Resume after the entry whose successor offset was handed out for ".".
    let (_, after_dot) = &all[0];
    let mut rest = Vec::new();
    fs.readdir(Path::new("/d"), *after_dot, |entry, _| {
        rest.push(entry.name.to_string_lossy().into_owned());
        false
    })
    .unwrap();
    assert_eq!(rest, ["..", "a", "b"]);

    // A filler reporting "full" stops the listing.
    let mut seen = 0;
    fs.readdir(Path::new("/d"), 0, |_, _| {
        seen += 1;
        true
    })
    .unwrap();
    assert_eq!(seen, 1);
}

#[test]
fn rmdir_on_non_empty_directory_leaves_it_in_place() {
    let m = mount(4, None);
    let fs = &m.fs;
    mkdir(fs, "/d");
    create(fs, "/d/f");

    assert_eq!(errno(fs.rmdir(Path::new("/d"))), libc::ENOTEMPTY);
    assert_eq!(children(fs, "/"), ["d"]);
    assert_eq!(children(fs, "/d"), ["f"]);
}

#[test]
fn rmdir_refuses_every_kind_of_child() {
    let m = mount(4, None);
    let fs = &m.fs;
    create(fs, "/target");
    mkdir(fs, "/with-dir");
    mkdir(fs, "/with-dir/sub");
    mkdir(fs, "/with-link");
    fs.symlink(Path::new("/target"), Path::new("/with-link/l"))
        .unwrap();

    assert_eq!(errno(fs.rmdir(Path::new("/with-dir"))), libc::ENOTEMPTY);
    assert_eq!(errno(fs.rmdir(Path::new("/with-link"))), libc::ENOTEMPTY);
    assert_eq!(children(fs, "/with-dir"), ["sub"]);
    assert_eq!(children(fs, "/with-link"), ["l"]);
    assert_eq!(fs.statfs().unwrap().active_entries, 6);

    fs.unlink(Path::new("/with-link/l")).unwrap();
    fs.rmdir(Path::new("/with-link")).unwrap();
    fs.rmdir(Path::new("/with-dir/sub")).unwrap();
    fs.rmdir(Path::new("/with-dir")).unwrap();
    assert_eq!(children(fs, "/"), ["target"]);
}

#[test]
fn rmdir_and_unlink_check_entry_types() {
    let m = mount(4, None);
    let fs = &m.fs;
    mkdir(fs, "/d");
    create(fs, "/f");

    assert_eq!(errno(fs.rmdir(Path::new("/f"))), libc::ENOTDIR);
    assert_eq!(errno(fs.unlink(Path::new("/d"))), libc::EISDIR);
    assert_eq!(errno(fs.rmdir(Path::new("/"))), libc::EBUSY);
    assert_eq!(errno(fs.rmdir(Path::new("/nope"))), libc::ENOENT);
}

#[test]
fn create_over_existing_path_does_not_consume_a_slot() {
    let m = mount(4, None);
    let fs = &m.fs;
    create(fs, "/f");
    mkdir(fs, "/d");
    let before = free_slots(fs);

    assert_eq!(errno(fs.create(Path::new("/f"), 0o644)), libc::EEXIST);
    assert_eq!(errno(fs.create(Path::new("/d"), 0o644)), libc::EEXIST);
    assert_eq!(errno(fs.mkdir(Path::new("/f"), 0o755)), libc::EEXIST);
    assert_eq!(free_slots(fs), before);
}

#[test]
fn missing_ancestors_and_file_ancestors_are_rejected() {
    let m = mount(4, None);
    let fs = &m.fs;
    create(fs, "/f");

    assert_eq!(errno(fs.create(Path::new("/no/such/f"), 0o644)), libc::ENOENT);
    assert_eq!(errno(fs.mkdir(Path::new("/f/sub"), 0o755)), libc::ENOTDIR);
    assert_eq!(errno(fs.getattr(Path::new("/f/sub"))), libc::ENOTDIR);
    assert_eq!(errno(fs.getattr(Path::new("/nope"))), libc::ENOENT);
}

#[test]
fn same_name_in_different_directories_is_distinct() {
    let m = mount(8, None);
    let fs = &m.fs;
    mkdir(fs, "/a");
    mkdir(fs, "/b");
    let in_a = create(fs, "/a/same");
    let in_b = create(fs, "/b/same");
    assert_ne!(in_a.slot_id, in_b.slot_id);

    fs.unlink(Path::new("/a/same")).unwrap();
    assert!(fs.getattr(Path::new("/b/same")).is_ok());
}

#[test]
fn open_with_create_flags() {
    let m = mount(4, None);
    let fs = &m.fs;
    let creat = OpenFlags::RDWR | OpenFlags::CREAT;

    let first = fs.open(Path::new("/f"), creat, 0o600).unwrap();
    let again = fs.open(Path::new("/f"), creat, 0o600).unwrap();
    assert_eq!(first.slot_id, again.slot_id);
    assert_eq!(first.attr.perm, 0o600);

    assert_eq!(
        errno(fs.open(Path::new("/f"), creat | OpenFlags::EXCL, 0o600)),
        libc::EEXIST
    );
    assert_eq!(
        errno(fs.open(Path::new("/missing"), OpenFlags::RDONLY, 0)),
        libc::ENOENT
    );
    mkdir(fs, "/d");
    assert_eq!(
        errno(fs.open(Path::new("/d"), OpenFlags::RDONLY, 0)),
        libc::EISDIR
    );
}

#[test]
fn metadata_updates_are_visible_through_getattr() {
    let m = mount(4, None);
    let fs = &m.fs;
    create(fs, "/f");

    let attr = fs.chmod(Path::new("/f"), 0o600).unwrap();
    assert_eq!(attr.perm, 0o600);
    assert_eq!(attr.kind, DentryKind::File);

    let when = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
    fs.utimens(Path::new("/f"), None, Some(when)).unwrap();
    assert_eq!(fs.getattr(Path::new("/f")).unwrap().mtime, when);
}

#[test]
fn overlong_names_are_rejected() {
    let m = mount(4, None);
    let fs = &m.fs;
    let long = format!("/{}", "n".repeat(256));
    assert_eq!(errno(fs.create(Path::new(&long), 0o644)), libc::EINVAL);
    assert_eq!(errno(fs.mkdir(Path::new(&long), 0o755)), libc::EINVAL);
}
