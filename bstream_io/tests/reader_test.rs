use bstream::{BufferSource, ByteOrder, FileSource, StreamError};
use bstream_io::SourceReader;
use bstream_mocked::{mocked_source, Fault, MockStore};

#[test]
fn read_to_end() {
    use std::io::Read;

    let mut reader = SourceReader::new(BufferSource::new(&b"Hello, world!"[..], ByteOrder::BigEndian));
    let mut text = String::new();
    reader.read_to_string(&mut text).unwrap();

    assert_eq!(text, "Hello, world!");
    assert_eq!(reader.get_ref().remaining(), 0);
}

#[test]
fn read_in_chunks() {
    use embedded_io::Read;

    let store = MockStore::with_contents(b"abcdefg".to_vec());
    let mut reader = SourceReader::new(mocked_source(&store, 3, ByteOrder::BigEndian));

    let mut buf = [0u8; 8];
    let n = reader.read(&mut buf).unwrap();
    assert!(n == 3, "Should read one window (a, b, c)");
    assert_eq!(&buf[..n], b"abc");

    let mut rest = Vec::new();
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        rest.extend_from_slice(&buf[..n]);
    }
    assert_eq!(rest, b"defg");
}

#[test]
fn seek_from_end() {
    use std::io::{Read, Seek, SeekFrom};

    let mut reader = SourceReader::new(BufferSource::new(&b"0123456789"[..], ByteOrder::BigEndian));
    assert_eq!(reader.seek(SeekFrom::End(-3)).unwrap(), 7);

    let mut tail = [0u8; 3];
    reader.read_exact(&mut tail).unwrap();
    assert_eq!(&tail, b"789");

    assert_eq!(reader.seek(SeekFrom::Current(-5)).unwrap(), 5);
    let err = reader
        .seek(SeekFrom::Start(11))
        .expect_err("Should refuse to seek past the end");
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn read_exact_past_end() {
    use std::io::Read;

    let mut reader = SourceReader::new(BufferSource::new(&b"abc"[..], ByteOrder::BigEndian));
    let mut buf = [0u8; 4];
    let err = reader.read_exact(&mut buf).expect_err("Should hit the end");
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[test]
fn read_file_through_small_buffer() {
    use std::io::Read;

    let dir = tempfile::tempdir().expect("Should create temp dir");
    let path = dir.path().join("input.bin");
    let payload: Vec<u8> = (0..100u8).collect();
    std::fs::write(&path, &payload).unwrap();

    let mut source = FileSource::with_buffer_size(7, ByteOrder::BigEndian);
    source.open(&path).expect("Should open file source");
    let mut reader = SourceReader::new(source);

    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();
    assert_eq!(data, payload);
}

#[test]
fn underflow_error() {
    use embedded_io::{Error, ErrorKind, Read};

    let store = MockStore::with_contents(b"hello".to_vec());
    let mut reader = SourceReader::new(mocked_source(&store, 2, ByteOrder::BigEndian));

    store.fail_next(Fault::Underflow);
    let mut buf = [0u8; 5];
    let err = reader.read(&mut buf).expect_err("Should fail to read");
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(matches!(err.0, StreamError::Io(_)));

    let n = reader.read(&mut buf).expect("Retry should succeed");
    assert_eq!(&buf[..n], b"he");
}
