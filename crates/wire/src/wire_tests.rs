// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format tests: length-prefix framing and JSON encoding.

use super::*;
use serde_json::json;

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&Response::Ok).expect("encode failed");
    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert_eq!(json_str, r#"{"type":"Ok"}"#);
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original).await.expect("write failed");
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";
    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let mut frame = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(b"{}");
    let mut cursor = std::io::Cursor::new(frame);
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
}

#[tokio::test]
async fn execute_graph_request_roundtrip() {
    let raw = json!({
        "type": "ExecuteGraph",
        "project_id": "proj",
        "nodes": [{"id": "a", "type": "bash", "data": {"script": "echo a"}}],
        "edges": []
    });
    let mut buffer = Vec::new();
    write_message(&mut buffer, raw.to_string().as_bytes()).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let request = read_request(&mut cursor).await.unwrap();
    let Request::ExecuteGraph { project_id, nodes, start_node_id, .. } = request else {
        panic!("wrong request variant");
    };
    assert_eq!(project_id, "proj");
    assert_eq!(nodes[0].id, "a");
    assert_eq!(start_node_id, None);
}

#[tokio::test]
async fn write_response_is_framed() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::error("boom")).await.unwrap();
    let mut cursor = std::io::Cursor::new(buffer);
    let body = read_message(&mut cursor).await.unwrap();
    let response: Response = decode(&body).unwrap();
    assert_eq!(response, Response::Error { message: "boom".into() });
}

proptest::proptest! {
    #[test]
    fn framing_preserves_arbitrary_payloads(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let read_back = rt.block_on(async {
            let mut buffer = Vec::new();
            write_message(&mut buffer, &data).await.unwrap();
            read_message(&mut std::io::Cursor::new(buffer)).await.unwrap()
        });
        proptest::prop_assert_eq!(read_back, data);
    }
}
