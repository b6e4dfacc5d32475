use trust_dns_proto::op::{Message, ResponseCode};
use trust_dns_proto::rr::RecordType;

mod helpers;
use helpers::{query_bytes, test_config, test_server};

async fn reply_to(raw: &[u8]) -> Message {
    let server = test_server(test_config());
    Message::from_vec(&server.handler.handle_request(raw).await).unwrap()
}

#[tokio::test]
async fn short_packet_is_servfail_with_id() {
    let reply = reply_to(&[0xBE, 0xEF, 0x01, 0x00, 0x00, 0x01]).await;
    assert_eq!(reply.id(), 0xBEEF);
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
    assert!(reply.recursion_desired());
    assert!(!reply.authoritative());
    assert!(reply.queries().is_empty());
}

#[tokio::test]
async fn single_byte_is_servfail_with_zero_id() {
    let reply = reply_to(&[0x42]).await;
    assert_eq!(reply.id(), 0);
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn truncated_question_is_servfail() {
    let mut raw = query_bytes(0x1001, "my-app-e1.tunnel4.com", RecordType::A);
    raw.truncate(raw.len() - 3);
    let reply = reply_to(&raw).await;
    assert_eq!(reply.id(), 0x1001);
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn compression_loop_is_servfail() {
    // One question whose name is a pointer to itself.
    let raw = [
        0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x0C, 0x00,
        0x01, 0x00, 0x01,
    ];
    let reply = reply_to(&raw).await;
    assert_eq!(reply.id(), 0x1234);
    assert_eq!(reply.response_code(), ResponseCode::ServFail);
}

#[tokio::test]
async fn zero_questions_is_refused() {
    let raw = [0x00, 0x07, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
    let reply = reply_to(&raw).await;
    assert_eq!(reply.id(), 7);
    assert_eq!(reply.response_code(), ResponseCode::Refused);
    assert!(!reply.authoritative());
}

#[tokio::test]
async fn only_first_question_is_answered() {
    let mut message = Message::new();
    message
        .set_id(9)
        .add_query(trust_dns_proto::op::Query::query(
            trust_dns_proto::rr::Name::from_ascii("example.com").unwrap(),
            RecordType::A,
        ))
        .add_query(trust_dns_proto::op::Query::query(
            trust_dns_proto::rr::Name::from_ascii("my-app-e1.tunnel4.com").unwrap(),
            RecordType::A,
        ));
    let reply = reply_to(&message.to_vec().unwrap()).await;
    assert_eq!(reply.response_code(), ResponseCode::Refused);
}
