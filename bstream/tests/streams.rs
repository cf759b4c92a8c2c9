#[macro_use]
extern crate hamcrest;

use bstream::endian::encode;
use bstream::{
    BufferSink, BufferSource, BufseqSink, BufseqSource, ByteOrder, ByteSink, ByteSource, Numeric,
    SeekAnchor, SliceSource, StreamError,
};
use hamcrest::prelude::*;

fn write_sample(sink: &mut dyn ByteSink) {
    sink.put(0x7f).unwrap();
    sink.put_u16(0x0102).unwrap();
    sink.put_u32(0x0304_0506).unwrap();
    sink.put_u64(0x0708_090a_0b0c_0d0e).unwrap();
    sink.putn(b"tail").unwrap();
    sink.filln(b'.', 3).unwrap();
}

fn read_sample(source: &mut dyn ByteSource) {
    assert_eq!(source.get().unwrap(), 0x7f);
    assert_eq!(source.get_u16().unwrap(), 0x0102);
    assert_eq!(source.get_u32().unwrap(), 0x0304_0506);
    assert_eq!(source.get_u64().unwrap(), 0x0708_090a_0b0c_0d0e);
    let mut tail = [0u8; 7];
    source.getn(&mut tail).unwrap();
    assert_eq!(&tail, b"tail...");
    assert_eq!(source.remaining(), 0);
}

#[test]
fn buffer_round_trip_in_both_orders() {
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        let mut sink = BufferSink::new(4, order);
        write_sample(&mut sink);
        assert_eq!(sink.size(), 22);
        let bytes = sink.release_bytes();
        let mut source = BufferSource::new(bytes, order);
        read_sample(&mut source);
    }
}

/// Write `values` through 3-byte segments so that wider numbers straddle
/// segment boundaries, then read them back.
fn numbers_round_trip<T: Numeric + PartialEq + std::fmt::Debug>(values: &[T]) {
    let width = std::mem::size_of::<T>();
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        let mut sink = BufseqSink::new(3, order);
        for value in values {
            sink.put_num(*value).unwrap();
        }
        assert_eq!(sink.size(), (values.len() * width) as u64);

        let segments: Vec<Vec<u8>> = sink.release_buffers().into_iter().collect();
        let flat = segments.concat();
        for (i, value) in values.iter().enumerate() {
            assert_eq!(
                &flat[i * width..(i + 1) * width],
                encode(*value, order).as_ref(),
                "layout of {value:?} in {order:?}"
            );
        }

        let mut source = BufseqSource::new(segments, order);
        for value in values {
            assert_eq!(source.get_num::<T>().unwrap(), *value, "{order:?}");
        }
        assert_eq!(source.remaining(), 0);
    }
}

#[test]
fn every_number_type_round_trips_in_both_orders() {
    numbers_round_trip(&[0u8, 1, 0x7f, u8::MAX]);
    numbers_round_trip(&[0i8, -1, i8::MIN, i8::MAX]);
    numbers_round_trip(&[0u16, 0x0102, u16::MAX]);
    numbers_round_trip(&[0i16, -2, i16::MIN, i16::MAX]);
    numbers_round_trip(&[0u32, 0x0102_0304, u32::MAX]);
    numbers_round_trip(&[0i32, -3, i32::MIN, i32::MAX]);
    numbers_round_trip(&[0u64, 0x0102_0304_0506_0708, u64::MAX]);
    numbers_round_trip(&[0i64, -4, i64::MIN, i64::MAX]);
    numbers_round_trip(&[0.0f32, -1.5, f32::MIN_POSITIVE, f32::MAX, f32::INFINITY]);
    numbers_round_trip(&[0.0f64, -2.25, f64::EPSILON, f64::MIN, f64::NEG_INFINITY]);
}

#[test]
fn byte_order_controls_layout() {
    let mut big = BufferSink::new(8, ByteOrder::BigEndian);
    big.put_num(0x0102_0304u32).unwrap();
    assert_eq!(big.get_buffer(), &[1, 2, 3, 4]);

    let mut little = BufferSink::new(8, ByteOrder::LittleEndian);
    little.put_num(0x0102_0304u32).unwrap();
    assert_eq!(little.get_buffer(), &[4, 3, 2, 1]);

    let mut source = SliceSource::new(&[4, 3, 2, 1], ByteOrder::LittleEndian);
    assert_eq!(source.get_num::<i32>().unwrap(), 0x0102_0304);
}

#[test]
fn bufseq_round_trip_through_small_segments() {
    for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
        let mut sink = BufseqSink::new(3, order);
        write_sample(&mut sink);
        assert_that!(sink.segment_count(), is(equal_to(8)));
        let segments: Vec<Vec<u8>> = sink.release_buffers().into_iter().collect();
        let mut source = BufseqSource::new(segments, order);
        read_sample(&mut source);
    }
}

#[test]
fn seeks_without_writes_are_free() {
    let mut sink = BufferSink::fixed(8, ByteOrder::BigEndian);
    sink.putn(b"abcd").unwrap();
    sink.seek(6, SeekAnchor::Begin).unwrap();
    sink.seek(1, SeekAnchor::Begin).unwrap();
    assert_eq!(sink.position(), 1);
    assert_eq!(sink.size(), 4);
    sink.put(b'B').unwrap();
    assert_eq!(sink.get_buffer(), b"aBcd");
}

#[test]
fn seek_back_over_written_bytes() {
    let mut sink = BufferSink::new(16, ByteOrder::BigEndian);
    sink.putn(b"0123456789").unwrap();
    sink.flush().unwrap();
    sink.seek(-4, SeekAnchor::End).unwrap();
    assert_eq!(sink.cursor().pending_seek(), None);
    sink.putn(b"xy").unwrap();
    assert_eq!(sink.size(), 10);
    sink.seek(0, SeekAnchor::End).unwrap();
    sink.put(b'!').unwrap();
    assert_eq!(sink.get_buffer(), b"012345xy89!");
}

#[test]
fn invalid_seeks_leave_sink_unchanged() {
    let mut sink = BufferSink::fixed(4, ByteOrder::BigEndian);
    sink.putn(b"ab").unwrap();
    assert!(matches!(
        sink.seek(-3, SeekAnchor::Current),
        Err(StreamError::InvalidSeek {
            offset: -3,
            anchor: SeekAnchor::Current
        })
    ));
    assert!(sink.seek(5, SeekAnchor::Begin).is_err());
    assert_eq!(sink.position(), 2);
    sink.put(b'c').unwrap();
    assert_eq!(sink.get_buffer(), b"abc");
}

#[test]
fn fixed_sink_keeps_partial_write() {
    let mut sink = BufferSink::fixed(3, ByteOrder::BigEndian);
    let err = sink.putn(b"abcde").unwrap_err();
    assert!(matches!(err, StreamError::CapacityExceeded { .. }));
    assert_eq!(sink.get_buffer(), b"abc");
}

#[test]
fn source_reads_to_end() {
    let mut source = BufferSource::new(&b"abc"[..], ByteOrder::BigEndian);
    assert_eq!(source.peek().unwrap(), b'a');
    assert_eq!(source.position(), 0);
    let mut buf = [0u8; 8];
    assert_eq!(source.read_some(&mut buf).unwrap(), 3);
    assert_eq!(source.read_some(&mut buf).unwrap(), 0);
    assert!(source.get().unwrap_err().is_end_of_stream());
    source.rewind().unwrap();
    let mut four = [0u8; 4];
    assert!(source.getn(&mut four).unwrap_err().is_end_of_stream());
}

#[test]
fn source_shared_slices_across_segments_are_copied() {
    let mut source = BufseqSource::new(vec![&b"ab"[..], b"cd"], ByteOrder::BigEndian);
    assert_eq!(&source.get_shared_slice(1).unwrap()[..], b"a");
    assert_eq!(&source.get_shared_slice(2).unwrap()[..], b"bc");
    assert_eq!(&source.get_slice(1).unwrap()[..], b"d");
}
