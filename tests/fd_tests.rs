//! Descriptor counts are process-wide, so every case runs in one test.
#![cfg(target_os = "linux")]

use clam_prov::{LoggerConfig, OutputMode, ProvLogger, RecordReader};
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn test_lifecycle_releases_descriptors() {
    let home = tempdir().unwrap();
    let bogus_home = home.path().join("plain-file");
    fs::write(&bogus_home, b"").unwrap();
    let logger = ProvLogger::new();

    let baseline = open_fds();

    // File mode
    logger
        .init(&LoggerConfig::new(16, OutputMode::File).with_home_dir(home.path()))
        .unwrap();
    assert_eq!(open_fds(), baseline + 1);
    logger.shutdown().unwrap();
    assert_eq!(open_fds(), baseline, "file descriptor leaked");

    // Pipe mode; the reader's descriptor is gone once its thread is joined.
    let pipe = home.path().join(".clam-prov").join("audit.pipe");
    let reader = thread::spawn(move || {
        while !pipe.exists() {
            thread::sleep(Duration::from_millis(5));
        }
        RecordReader::open(&pipe).unwrap().count()
    });
    logger
        .init(&LoggerConfig::new(16, OutputMode::Pipe).with_home_dir(home.path()))
        .unwrap();
    logger.shutdown().unwrap();
    assert_eq!(reader.join().unwrap(), 0);
    assert_eq!(open_fds(), baseline, "pipe descriptor leaked");

    // Failed init
    assert!(logger
        .init(&LoggerConfig::new(16, OutputMode::File).with_home_dir(&bogus_home))
        .is_err());
    assert!(logger
        .init(&LoggerConfig::new(0, OutputMode::File).with_home_dir(home.path()))
        .is_err());
    assert_eq!(open_fds(), baseline, "failed init leaked a descriptor");
}
