use clam_prov::Record;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const READER_BIN: &str = env!("CARGO_BIN_EXE_clam-prov-reader");

fn records(ids: &[i64]) -> Vec<u8> {
    let mut data = Vec::new();
    for &id in ids {
        Record::new(1, 2, id, 0, b"read").unwrap().encode_into(&mut data);
    }
    data
}

#[test]
fn test_prints_every_record_of_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");
    fs::write(&path, records(&[7, 8, 9])).unwrap();

    let output = Command::new(READER_BIN).arg(&path).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.lines().next().unwrap().contains("call_site_tag=7"));
}

#[test]
fn test_count_zero_prints_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");
    fs::write(&path, records(&[1, 2])).unwrap();

    let output = Command::new(READER_BIN)
        .args(["--count", "0"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_truncated_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");
    let mut data = records(&[1]);
    data.extend_from_slice(&[0u8; 10]);
    fs::write(&path, data).unwrap();

    let output = Command::new(READER_BIN).arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Must be a multiple of 284"));
}

#[test]
fn test_count_stops_without_waiting_on_open_pipe() {
    let dir = tempdir().unwrap();
    let pipe = dir.path().join("audit.pipe");
    mkfifo(&pipe, Mode::from_bits_truncate(0o600)).unwrap();

    // The writer sends two records and keeps its end open until told to go.
    let (release, released) = mpsc::channel::<()>();
    let writer_pipe = pipe.clone();
    let writer = thread::spawn(move || {
        let mut fifo = OpenOptions::new().write(true).open(&writer_pipe).unwrap();
        fifo.write_all(&records(&[1, 2])).unwrap();
        let _ = released.recv();
    });

    let mut child = Command::new(READER_BIN)
        .args(["--count", "2"])
        .arg(&pipe)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break Some(status);
        }
        if Instant::now() > deadline {
            break None;
        }
        thread::sleep(Duration::from_millis(10));
    };

    if status.is_none() {
        let _ = child.kill();
    }
    release.send(()).unwrap();
    writer.join().unwrap();

    let status = status.expect("reader should exit after two records");
    assert!(status.success());
    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2);
}
