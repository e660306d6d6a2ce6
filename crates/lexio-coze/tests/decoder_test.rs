use lexio_coze::{Frame, FrameDecoder};

fn decode_all(lines: &[&str]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for line in lines {
        if let Some(frame) = decoder.feed_line(line) {
            frames.push(frame);
        }
    }
    if let Some(frame) = decoder.finish() {
        frames.push(frame);
    }
    frames
}

#[test]
fn test_single_frame_with_boundary() {
    let frames = decode_all(&[
        "event: conversation.message.delta",
        "data: {\"content\":\"hi\"}",
        "",
    ]);

    assert_eq!(
        frames,
        vec![Frame {
            event: "conversation.message.delta".to_string(),
            data: "{\"content\":\"hi\"}".to_string(),
        }]
    );
}

#[test]
fn test_flush_on_close_without_trailing_blank() {
    // Input ends mid-frame; the pending frame must still be emitted.
    let frames = decode_all(&["event: x", "data: {\"a\":1}"]);

    assert_eq!(
        frames,
        vec![Frame {
            event: "x".to_string(),
            data: "{\"a\":1}".to_string(),
        }]
    );
}

#[test]
fn test_multiple_data_lines_join_with_newline() {
    let frames = decode_all(&["event: x", "data: {\"a\":", "data: 1}", ""]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "{\"a\":\n1}");
}

#[test]
fn test_new_event_line_ends_prior_frame() {
    let frames = decode_all(&[
        "event: first",
        "data: one",
        "event: second",
        "data: two",
        "",
    ]);

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].event, "first");
    assert_eq!(frames[0].data, "one");
    assert_eq!(frames[1].event, "second");
    assert_eq!(frames[1].data, "two");
}

#[test]
fn test_event_line_without_pending_data_just_overwrites() {
    let frames = decode_all(&["event: stale", "event: fresh", "data: body", ""]);

    assert_eq!(
        frames,
        vec![Frame {
            event: "fresh".to_string(),
            data: "body".to_string(),
        }]
    );
}

#[test]
fn test_unknown_fields_ignored() {
    let frames = decode_all(&[
        "event: x",
        "id: 42",
        "retry: 3000",
        ": comment",
        "data: body",
        "",
    ]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "body");
}

#[test]
fn test_blank_line_without_pending_frame_is_noop() {
    assert!(decode_all(&["", "", ""]).is_empty());
}

#[test]
fn test_data_without_event_is_discarded_at_boundary() {
    let frames = decode_all(&["data: orphan", "", "event: x", "data: body", ""]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "x");
}

#[test]
fn test_event_without_data_emits_nothing() {
    assert!(decode_all(&["event: x", ""]).is_empty());
}

#[test]
fn test_done_sentinel_is_a_valid_frame() {
    let frames = decode_all(&["event: done", "data: [DONE]", ""]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "[DONE]");
}
