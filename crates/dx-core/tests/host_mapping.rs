//! Integration tests for the host mapping cache.

use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dx_core::fakes::StaticResource;
use dx_core::{CacheState, FileResource, HostMappingTable, DEFAULT_PIPELINE_SOURCE};

const TABLE: &str = "# hostname,source\nhost-a,\"source-a\"\nhost-b,source-b\n";

/// Test: quoted and bare values resolve, unknown hosts get the default
#[test]
fn test_lookup_mapped_and_unknown_hosts() {
    let table = HostMappingTable::new(StaticResource::new(TABLE));

    assert_eq!(table.resolve("host-a"), "source-a");
    assert_eq!(table.resolve("host-b"), "source-b");
    assert_eq!(table.resolve("host-c"), DEFAULT_PIPELINE_SOURCE);
    assert_eq!(table.resolve("HOST-A"), DEFAULT_PIPELINE_SOURCE);
}

/// Test: the table is read once and then served from memory
#[test]
fn test_resource_read_once() {
    let resource = Arc::new(StaticResource::new(TABLE));
    let table = HostMappingTable::new(resource.clone());

    assert_eq!(resource.reads(), 0, "construction must not read");
    for _ in 0..10 {
        table.resolve("host-a");
    }
    assert_eq!(resource.reads(), 1);
}

/// Test: reload picks up a changed in-memory resource
#[test]
fn test_reload_reflects_changed_resource() {
    let resource = Arc::new(StaticResource::new(TABLE));
    let table = HostMappingTable::new(resource.clone());
    assert_eq!(table.resolve("host-a"), "source-a");

    resource.set("host-a,source-a-v2\nhost-z,source-z\n");
    assert_eq!(table.resolve("host-a"), "source-a", "no reload, no change");

    table.reload();
    assert_eq!(table.state(), CacheState::Uninitialized);
    assert_eq!(table.resolve("host-a"), "source-a-v2");
    assert_eq!(table.resolve("host-z"), "source-z");
    assert_eq!(table.resolve("host-b"), DEFAULT_PIPELINE_SOURCE);
    assert_eq!(resource.reads(), 2);
}

/// Test: reload picks up an edited file on disk
#[test]
fn test_reload_reflects_edited_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("jenkins-server.csv");
    std::fs::write(&path, TABLE).expect("write table");

    let table = HostMappingTable::new(FileResource::new(&path));
    assert_eq!(table.resolve("host-b"), "source-b");

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .expect("open table");
    writeln!(file, "host-b,source-b-moved").expect("append");
    drop(file);

    table.reload();
    assert_eq!(table.resolve("host-b"), "source-b-moved");
}

/// Test: a missing file leaves the cache ready and empty
#[test]
fn test_missing_file_falls_back_to_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = HostMappingTable::new(FileResource::new(dir.path().join("absent.csv")));

    assert_eq!(table.resolve("host-a"), DEFAULT_PIPELINE_SOURCE);
    assert_eq!(table.state(), CacheState::Ready);
    assert_eq!(table.len(), 0);
}

/// Test: an unreadable resource is retried after reload
#[test]
fn test_unavailable_resource_recovers_after_reload() {
    let resource = Arc::new(StaticResource::unavailable());
    let table = HostMappingTable::new(resource.clone());
    assert_eq!(table.resolve("host-a"), DEFAULT_PIPELINE_SOURCE);

    resource.set(TABLE);
    table.reload();
    assert_eq!(table.resolve("host-a"), "source-a");
}

/// Test: N concurrent first lookups trigger exactly one load
#[test]
fn test_concurrent_first_lookups_load_once() {
    const THREADS: usize = 16;

    let resource = Arc::new(StaticResource::new(TABLE).with_read_delay(Duration::from_millis(50)));
    let table = Arc::new(HostMappingTable::new(resource.clone()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (table.resolve("host-a"), table.len())
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("lookup thread panicked"))
        .collect();

    assert_eq!(resource.reads(), 1, "exactly one build");
    for (source, len) in results {
        assert_eq!(source, "source-a");
        assert_eq!(len, 2, "readers must see the fully populated table");
    }
}

/// Test: lookups racing with reloads always see a complete table
#[test]
fn test_lookups_during_reload_see_complete_tables() {
    let resource = Arc::new(StaticResource::new(TABLE));
    let table = Arc::new(HostMappingTable::new(resource.clone()));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(table.resolve("host-a"), "source-a");
                    assert_eq!(table.resolve("host-b"), "source-b");
                }
            })
        })
        .collect();

    for _ in 0..50 {
        table.reload();
        thread::yield_now();
    }

    for reader in readers {
        reader.join().expect("reader panicked");
    }
    assert!(resource.reads() >= 1);
}
