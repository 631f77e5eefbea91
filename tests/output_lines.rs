use std::io::Write;

use procflow::output::{handler, LineWriter, OutputBuffer, StreamSink, LATEST_OUTPUT_WINDOW};
use procflow::types::StreamKind;
use procflow_test_utils::recorder::LineRecorder;

fn writer(recorder: &LineRecorder) -> LineWriter {
    LineWriter::new("k", StreamKind::Stdout, vec![handler(recorder.handler())])
}

#[test]
fn lines_split_across_chunks() {
    let recorder = LineRecorder::new();
    let mut w = writer(&recorder);

    assert_eq!(w.write(b"hel").unwrap(), 3);
    assert_eq!(w.write(b"lo\nwor").unwrap(), 6);
    assert_eq!(w.pending(), b"wor");
    w.write_all(b"ld\n").unwrap();

    assert_eq!(recorder.text_for("k", StreamKind::Stdout), vec!["hello", "world"]);
    assert!(w.pending().is_empty());
}

#[test]
fn empty_lines_are_delivered() {
    let recorder = LineRecorder::new();
    let mut w = writer(&recorder);

    w.write_all(b"a\n\n\nb\n").unwrap();

    assert_eq!(
        recorder.text_for("k", StreamKind::Stdout),
        vec!["a", "", "", "b"]
    );
}

#[test]
fn trailing_partial_line_is_emitted_once_on_close() {
    let recorder = LineRecorder::new();
    let mut w = writer(&recorder);

    w.write_all(b"first\nlast").unwrap();
    assert_eq!(recorder.lines().len(), 1);

    w.close();
    w.close();
    w.write_all(b"ignored\n").unwrap();

    assert_eq!(recorder.text_for("k", StreamKind::Stdout), vec!["first", "last"]);
}

#[test]
fn every_handler_gets_its_own_copy() {
    let a = LineRecorder::new();
    let b = LineRecorder::new();
    let mut w = LineWriter::new(
        "k",
        StreamKind::Stderr,
        vec![handler(a.handler()), handler(b.handler())],
    );

    w.write_all(b"x\ny\n").unwrap();

    assert_eq!(a.text_for("k", StreamKind::Stderr), vec!["x", "y"]);
    assert_eq!(b.text_for("k", StreamKind::Stderr), vec!["x", "y"]);
}

#[test]
fn tail_window_is_bounded() {
    let buffer = OutputBuffer::new(true);
    let chunk = vec![b'a'; 3000];
    buffer.append(&chunk);
    buffer.append(b"\n");
    buffer.append(&vec![b'b'; 3000]);

    assert_eq!(buffer.len(), 6001);
    let latest = buffer.latest();
    assert_eq!(latest.len(), LATEST_OUTPUT_WINDOW);
    assert!(latest.ends_with('b'));
    assert!(latest.starts_with('a'));
}

#[test]
fn oversized_chunk_keeps_its_end() {
    let buffer = OutputBuffer::new(true);
    let mut chunk = vec![b'x'; LATEST_OUTPUT_WINDOW * 2];
    chunk.extend_from_slice(b"END");
    buffer.append(&chunk);

    let latest = buffer.latest();
    assert_eq!(latest.len(), LATEST_OUTPUT_WINDOW);
    assert!(latest.ends_with("END"));
}

#[test]
fn disabled_buffering_still_tracks_tail() {
    let buffer = OutputBuffer::new(false);
    buffer.append(b"hello\n");

    assert!(!buffer.is_buffering());
    assert!(buffer.is_empty());
    assert_eq!(buffer.contents(), "");
    assert_eq!(buffer.latest(), "hello\n");
}

#[test]
fn sink_fans_out_to_capture_and_lines() {
    let recorder = LineRecorder::new();
    let capture = OutputBuffer::new(true);
    let mut sink = StreamSink::new(
        "s",
        StreamKind::Stdout,
        capture.clone(),
        true,
        vec![handler(recorder.handler())],
    );

    sink.write_all(b"one\ntw").unwrap();
    sink.write_all(b"o").unwrap();
    sink.close();

    assert_eq!(capture.contents(), "one\ntwo");
    assert_eq!(sink.capture().contents(), "one\ntwo");
    assert_eq!(recorder.text_for("s", StreamKind::Stdout), vec!["one", "two"]);
}
