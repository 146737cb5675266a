//! Receive-path behaviour of the opcode state machine.

use std::time::Duration;

use wsengine::extensions::{RsvBits, Transform, TransformFuture, ready};
use wsengine::{
    Config, Error, Event, EventLog, Frame, Message, OpCode, Receiver, Role, Sender,
    TransformPipeline,
};

fn frame(fin: bool, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    Frame::new(fin, opcode, payload.to_vec()).encode(None).unwrap()
}

fn client() -> Receiver {
    Receiver::new(Config::client())
}

async fn run(receiver: &mut Receiver, bytes: &[u8]) -> EventLog {
    let mut log = EventLog::new();
    receiver.feed(bytes).unwrap();
    let _ = receiver.drain(&mut log).await;
    log
}

fn protocol_error_code(log: &EventLog) -> Option<u16> {
    log.events().iter().find_map(|event| match event {
        Event::ProtocolError { code, .. } => Some(*code),
        _ => None,
    })
}

#[tokio::test]
async fn test_three_fragments_make_one_text_message() {
    let mut bytes = frame(false, OpCode::Text, b"a");
    bytes.extend(frame(false, OpCode::Continuation, b"b"));
    bytes.extend(frame(true, OpCode::Continuation, b"c"));

    let log = run(&mut client(), &bytes).await;
    assert_eq!(log.events(), &[Event::Text("abc".into())]);
    assert_eq!(log.meta(0).unwrap().fragments, 3);
}

#[tokio::test]
async fn test_fragmented_close_is_protocol_error() {
    let log = run(&mut client(), &[0x08, 0x00]).await;
    assert_eq!(protocol_error_code(&log), Some(1002));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_oversized_ping_is_protocol_error() {
    let mut bytes = vec![0x89, 0x7e, 0x00, 0xc8];
    bytes.extend(std::iter::repeat_n(0u8, 200));

    let log = run(&mut client(), &bytes).await;
    assert_eq!(protocol_error_code(&log), Some(1002));
}

#[tokio::test]
async fn test_oversized_ping_rejected_before_payload_arrives() {
    let mut receiver = client();
    let log = run(&mut receiver, &[0x89, 0x7e, 0x00, 0xc8]).await;
    assert_eq!(protocol_error_code(&log), Some(1002));
    assert_eq!(receiver.failure().map(|c| c.as_u16()), Some(1002));
}

#[tokio::test]
async fn test_close_payload_semantics() {
    let empty = run(&mut client(), &frame(true, OpCode::Close, &[])).await;
    assert_eq!(
        empty.events(),
        &[Event::Close {
            code: 1000,
            reason: String::new()
        }]
    );

    let code_only = run(&mut client(), &frame(true, OpCode::Close, &[0x03, 0xe8])).await;
    assert_eq!(
        code_only.events(),
        &[Event::Close {
            code: 1000,
            reason: String::new()
        }]
    );

    let one_byte = run(&mut client(), &frame(true, OpCode::Close, &[0x03])).await;
    assert_eq!(protocol_error_code(&one_byte), Some(1002));
    assert!(matches!(
        &one_byte.events()[0],
        Event::ProtocolError { message, .. } if message.contains("at least two bytes")
    ));
}

#[tokio::test]
async fn test_close_with_reason_and_application_code() {
    let mut payload = 4000u16.to_be_bytes().to_vec();
    payload.extend_from_slice("done ✓".as_bytes());

    let log = run(&mut client(), &frame(true, OpCode::Close, &payload)).await;
    assert_eq!(
        log.events(),
        &[Event::Close {
            code: 4000,
            reason: "done ✓".into()
        }]
    );
}

#[tokio::test]
async fn test_illegal_close_code_and_reason() {
    for code in [999u16, 1004, 1005, 1006, 1015, 2000, 5000] {
        let log = run(&mut client(), &frame(true, OpCode::Close, &code.to_be_bytes())).await;
        assert_eq!(protocol_error_code(&log), Some(1002), "code {code}");
    }

    let log = run(&mut client(), &frame(true, OpCode::Close, &[0x03, 0xe8, 0xff])).await;
    assert_eq!(protocol_error_code(&log), Some(1007));
}

#[tokio::test]
async fn test_text_utf8_validated_after_reassembly() {
    // "é" split between two fragments.
    let mut bytes = frame(false, OpCode::Text, &[b'c', b'a', b'f', 0xc3]);
    bytes.extend(frame(true, OpCode::Continuation, &[0xa9]));
    let log = run(&mut client(), &bytes).await;
    assert_eq!(log.events(), &[Event::Text("café".into())]);

    let log = run(&mut client(), &frame(true, OpCode::Text, &[0xed, 0xa0, 0x80])).await;
    assert_eq!(protocol_error_code(&log), Some(1007));

    // Binary skips validation.
    let log = run(&mut client(), &frame(true, OpCode::Binary, &[0xff, 0xfe])).await;
    assert_eq!(log.events(), &[Event::Binary(vec![0xff, 0xfe])]);
}

#[tokio::test]
async fn test_partial_message_discarded_on_error() {
    let mut bytes = frame(false, OpCode::Text, b"half");
    bytes.extend(frame(true, OpCode::Text, b"new message"));

    let mut receiver = client();
    let log = run(&mut receiver, &bytes).await;
    assert_eq!(log.len(), 1);
    assert_eq!(protocol_error_code(&log), Some(1002));

    assert_eq!(
        receiver.feed(&frame(true, OpCode::Continuation, b"rest")),
        Err(Error::ConnectionClosed(Some(1002)))
    );
    assert_eq!(receiver.pending(), 0);
}

#[tokio::test]
async fn test_unknown_opcodes_rejected() {
    for byte0 in [0x83u8, 0x87, 0x8b, 0x8f] {
        let log = run(&mut client(), &[byte0, 0x00]).await;
        assert_eq!(protocol_error_code(&log), Some(1002));
    }
}

#[tokio::test]
async fn test_length_above_four_gib_is_protocol_error() {
    let log = run(&mut client(), &[0x82, 0x7f, 0, 0, 0, 1, 0, 0, 0, 0]).await;
    assert_eq!(protocol_error_code(&log), Some(1002));
}

#[tokio::test]
async fn test_client_unmasks_masked_frames() {
    let bytes = Frame::new(true, OpCode::Text, b"hi".to_vec())
        .encode(Some([0x11, 0x22, 0x33, 0x44]))
        .unwrap();
    let log = run(&mut client(), &bytes).await;
    assert_eq!(log.events(), &[Event::Text("hi".into())]);
    assert!(log.meta(0).unwrap().masked);
}

#[tokio::test]
async fn test_server_accepts_unmasked_frames() {
    let log = run(&mut Receiver::new(Config::server()), &frame(true, OpCode::Text, b"hi")).await;
    assert_eq!(log.events(), &[Event::Text("hi".into())]);
    assert!(!log.meta(0).unwrap().masked);
}

#[tokio::test]
async fn test_strict_masking_by_role() {
    let server = Config::server().with_strict_masking(true);
    let log = run(&mut Receiver::new(server), &frame(true, OpCode::Text, b"hi")).await;
    assert_eq!(protocol_error_code(&log), Some(1002));

    let masked = Frame::new(true, OpCode::Text, b"hi".to_vec())
        .encode(Some([1, 2, 3, 4]))
        .unwrap();
    let strict_client = Config::client().with_strict_masking(true);
    let log = run(&mut Receiver::new(strict_client), &masked).await;
    assert_eq!(protocol_error_code(&log), Some(1002));
}

#[tokio::test]
async fn test_byte_at_a_time_delivery_matches_bulk() {
    let mut bytes = frame(false, OpCode::Binary, &[1, 2, 3]);
    bytes.extend(frame(true, OpCode::Ping, b"ping"));
    bytes.extend(frame(true, OpCode::Continuation, &[0; 300]));
    bytes.extend(frame(true, OpCode::Text, b"tail"));

    let bulk = run(&mut client(), &bytes).await;

    let mut receiver = client();
    let mut trickle = EventLog::new();
    for byte in &bytes {
        receiver.feed(std::slice::from_ref(byte)).unwrap();
        receiver.drain(&mut trickle).await.unwrap();
    }

    assert_eq!(bulk.events(), trickle.events());
    assert_eq!(trickle.len(), 3);
}

#[tokio::test]
async fn test_server_decodes_client_sender_output() {
    let mut sender = Sender::new(Role::Client);
    let mut bytes = sender.encode(Message::text("from client")).unwrap();
    bytes.extend(sender.ping(b"p".to_vec()).unwrap());
    bytes.extend(sender.encode(Message::binary(vec![7; 70_000])).unwrap());

    let log = run(&mut Receiver::new(Config::server()), &bytes).await;
    assert_eq!(log.len(), 3);
    assert_eq!(log.events()[0], Event::Text("from client".into()));
    assert_eq!(log.events()[1], Event::Ping(b"p".to_vec()));
    assert_eq!(log.events()[2], Event::Binary(vec![7; 70_000]));
    assert!(log.meta(0).unwrap().masked);
}

#[tokio::test]
async fn test_reserved_bits() {
    let compressed = Frame::new(true, OpCode::Text, b"x".to_vec())
        .with_rsv1(true)
        .encode(None)
        .unwrap();

    let log = run(&mut client(), &compressed).await;
    assert_eq!(protocol_error_code(&log), Some(1002));

    let pipeline = TransformPipeline::new().with(Box::new(Rsv1Passthrough)).unwrap();
    let mut receiver = client().with_transforms(pipeline);
    let log = run(&mut receiver, &compressed).await;
    assert_eq!(log.events(), &[Event::Text("x".into())]);
    assert!(log.meta(0).unwrap().compressed);
}

struct Rsv1Passthrough;

impl Transform for Rsv1Passthrough {
    fn name(&self) -> &str {
        "x-rsv1"
    }

    fn rsv_bits(&self) -> RsvBits {
        RsvBits::RSV1
    }

    fn apply(&mut self, payload: Vec<u8>, _: bool, _: bool) -> TransformFuture<'_> {
        ready(Ok(Some(payload)))
    }
}

/// Sleeps longer for payloads starting with "slow".
struct Delayed {
    completed: Vec<Vec<u8>>,
}

impl Transform for Delayed {
    fn name(&self) -> &str {
        "x-delayed"
    }

    fn apply(&mut self, payload: Vec<u8>, _: bool, _: bool) -> TransformFuture<'_> {
        let delay = if payload.starts_with(b"slow") {
            Duration::from_millis(500)
        } else {
            Duration::from_millis(1)
        };
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            self.completed.push(payload.clone());
            Ok::<_, Error>(Some(payload))
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_delivery_follows_queue_order_not_latency() {
    let pipeline = TransformPipeline::new()
        .with(Box::new(Delayed {
            completed: Vec::new(),
        }))
        .unwrap();
    let mut receiver = client().with_transforms(pipeline);

    let mut bytes = frame(false, OpCode::Text, b"slow-");
    bytes.extend(frame(true, OpCode::Continuation, b"a"));
    bytes.extend(frame(true, OpCode::Binary, b"fast"));
    bytes.extend(frame(true, OpCode::Text, b"slow-b"));
    bytes.extend(frame(true, OpCode::Text, b"c"));

    let log = run(&mut receiver, &bytes).await;
    assert_eq!(
        log.events(),
        &[
            Event::Text("slow-a".into()),
            Event::Binary(b"fast".to_vec()),
            Event::Text("slow-b".into()),
            Event::Text("c".into()),
        ]
    );
}

struct FailOnSecond {
    seen: usize,
}

impl Transform for FailOnSecond {
    fn name(&self) -> &str {
        "x-fail"
    }

    fn apply(&mut self, payload: Vec<u8>, _: bool, _: bool) -> TransformFuture<'_> {
        self.seen += 1;
        if self.seen == 2 {
            return ready(Err(Error::Transform("corrupt block".into())));
        }
        ready(Ok(Some(payload)))
    }
}

#[tokio::test]
async fn test_transform_error_fails_once_with_1007() {
    let pipeline = TransformPipeline::new()
        .with(Box::new(FailOnSecond { seen: 0 }))
        .unwrap();
    let mut receiver = client().with_transforms(pipeline);

    let mut bytes = frame(true, OpCode::Binary, b"one");
    bytes.extend(frame(true, OpCode::Binary, b"two"));
    bytes.extend(frame(true, OpCode::Binary, b"three"));
    receiver.feed(&bytes).unwrap();

    let mut log = EventLog::new();
    let err = receiver.drain(&mut log).await.unwrap_err();
    assert_eq!(err, Error::Transform("corrupt block".into()));
    assert_eq!(log.len(), 2);
    assert_eq!(log.events()[0], Event::Binary(b"one".to_vec()));
    assert_eq!(protocol_error_code(&log), Some(1007));

    assert_eq!(receiver.pending(), 0);
    assert_eq!(receiver.drain(&mut log).await, Ok(0));
    assert_eq!(log.len(), 2);
}
