use clam_prov::{
    LoggerConfig, OutputMode, ProvLogger, ReadError, Record, RecordReader, RECORD_SIZE,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_empty_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");
    fs::write(&path, b"").unwrap();

    let mut reader = RecordReader::open(&path).unwrap();
    assert!(reader.read_record().unwrap().is_none());
}

#[test]
fn test_missing_file_fails_to_open() {
    let dir = tempdir().unwrap();
    assert!(RecordReader::open(dir.path().join("nope.log")).is_err());
}

#[test]
fn test_reads_logger_output() {
    let home = tempdir().unwrap();
    let logger = ProvLogger::new();
    logger
        .init(&LoggerConfig::new(3, OutputMode::File).with_home_dir(home.path()))
        .unwrap();
    for i in 0..7 {
        logger.buffer(i, i * i, format!("call_{}", i)).unwrap();
    }
    logger.shutdown().unwrap();

    let path = home.path().join(".clam-prov").join("audit.log");
    let records: Vec<Record> = RecordReader::open(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 7);
    for (i, record) in records.iter().enumerate() {
        let i = i as i64;
        assert_eq!(record.call_site_id, i);
        assert_eq!(record.exit_value, i * i);
        assert_eq!(record.function_name(), format!("call_{}", i));
    }
}

#[test]
fn test_truncated_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");

    let mut data = Vec::new();
    Record::new(1, 2, 3, 4, b"send").unwrap().encode_into(&mut data);
    data.extend_from_slice(&[0xAB; 17]);
    fs::write(&path, &data).unwrap();

    let mut reader = RecordReader::open(&path).unwrap();
    let first = reader.read_record().unwrap().unwrap();
    assert_eq!(first.call_site_id, 3);
    assert!(matches!(
        reader.read_record(),
        Err(ReadError::Truncated { residual: 17, record_size: RECORD_SIZE })
    ));
}

#[test]
fn test_appended_sessions_read_back_to_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");

    for session in 0..2i64 {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let bytes = Record::new(0, 1, session, 0, b"exec").unwrap().to_bytes();
        file.write_all(&bytes).unwrap();
    }

    let ids: Vec<i64> = RecordReader::open(&path)
        .unwrap()
        .map(|r| r.unwrap().call_site_id)
        .collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn test_reads_from_pipe_until_writer_closes() {
    let home = tempdir().unwrap();
    let pipe = home.path().join(".clam-prov").join("audit.pipe");

    let reader_pipe = pipe.clone();
    let consumer = thread::spawn(move || {
        while !reader_pipe.exists() {
            thread::sleep(Duration::from_millis(5));
        }
        RecordReader::open(&reader_pipe)
            .unwrap()
            .map(|r| r.unwrap().call_site_id)
            .collect::<Vec<i64>>()
    });

    let logger = ProvLogger::new();
    logger
        .init(&LoggerConfig::new(4, OutputMode::Pipe).with_home_dir(home.path()))
        .unwrap();
    for i in 0..10 {
        logger.buffer(i, 0, "recvfrom").unwrap();
    }
    let stats = logger.shutdown().unwrap();
    assert_eq!(stats.flushes, 3);

    assert_eq!(consumer.join().unwrap(), (0..10).collect::<Vec<i64>>());
}
