#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use common::{children, free_slots, mkdir, mount};
use slotfs::fs::{FsError, FsOps as _};

const THREADS: usize = 8;

#[test]
fn racing_creates_of_one_name_publish_exactly_once() {
    let m = mount(16, None);
    let fs = &m.fs;
    let wins = AtomicUsize::new(0);
    let exists = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| match fs.create(Path::new("/same"), 0o644) {
                Ok(_) => {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
                Err(FsError::AlreadyExists) => {
                    exists.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => panic!("unexpected error: {e}"),
            });
        }
    });

    assert_eq!(wins.load(Ordering::Relaxed), 1);
    assert_eq!(exists.load(Ordering::Relaxed), THREADS - 1);
    assert_eq!(free_slots(fs), 15, "losers must hand their slot back");
    assert_eq!(children(fs, "/"), ["same"]);
}

#[test]
fn racing_mkdirs_of_one_name_publish_exactly_once() {
    let m = mount(1, None);
    let fs = &m.fs;
    let wins = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                if fs.mkdir(Path::new("/d"), 0o755).is_ok() {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::Relaxed), 1);
    assert_eq!(fs.statfs().unwrap().active_entries, 2);
}

#[test]
fn disjoint_creates_drain_the_pool_exactly() {
    let m = mount(16, None);
    let fs = &m.fs;
    mkdir(fs, "/d");

    thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                for i in 0..2 {
                    let path = PathBuf::from(format!("/d/t{t}-{i}"));
                    fs.create(&path, 0o644)
                        .unwrap_or_else(|e| panic!("create {}: {e}", path.display()));
                }
            });
        }
    });

    assert_eq!(free_slots(fs), 0);
    assert_eq!(children(fs, "/d").len(), THREADS * 2);
    assert!(fs.create(Path::new("/d/extra"), 0o644).is_err());
}

#[test]
fn create_unlink_churn_conserves_slots() {
    let m = mount(16, None);
    let fs = &m.fs;

    thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                let path = PathBuf::from(format!("/churn-{t}"));
                for round in 0..50u64 {
                    let f = fs.create(&path, 0o644).unwrap();
                    fs.write(f.fh, 0, &round.to_le_bytes()).unwrap();
                    fs.unlink(&path).unwrap();
                }
            });
        }
    });

    let stats = fs.statfs().unwrap();
    assert_eq!(stats.free_slots, 16);
    assert_eq!(stats.total_slots, 16);
    assert_eq!(stats.active_entries, 1);
}

#[test]
fn readers_see_consistent_listings_during_writes() {
    let m = mount(16, None);
    let fs = &m.fs;
    mkdir(fs, "/d");

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..16 {
                fs.create(Path::new(&format!("/d/f{i:02}")), 0o644).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    let names = fs.list_children(Path::new("/d")).unwrap();
                    assert!(names.windows(2).all(|w| w[0] < w[1]), "listing out of order");
                }
            });
        }
    });

    assert_eq!(children(fs, "/d").len(), 16);
}

#[test]
fn growth_keeps_up_with_racing_creators() {
    for _ in 0..20 {
        let m = mount(1, Some(1));
        let fs = &m.fs;

        thread::scope(|s| {
            for t in 0..THREADS {
                s.spawn(move || {
                    for i in 0..10 {
                        let path = PathBuf::from(format!("/g{t}-{i}"));
                        if let Err(e) = fs.create(&path, 0o644) {
                            panic!("create {} with growth enabled: {e}", path.display());
                        }
                    }
                });
            }
        });

        assert_eq!(children(fs, "/").len(), THREADS * 10);
        assert_eq!(fs.statfs().unwrap().active_entries, 1 + THREADS as u64 * 10);
    }
}
