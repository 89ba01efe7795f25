//! Packet Tests
//!
//! Tests for the NSDP header and MAC address handling.

use prosafe::protocol::{
    parse_response, MacAddr, Operation, Packet, RequestKind, Tag, TlvRecord, HEADER_SIZE,
};
use prosafe::NsdpError;

const HOST: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
const SWITCH: MacAddr = MacAddr::new([0x08, 0xbd, 0x43, 0x01, 0x02, 0x03]);

fn query_request() -> Packet {
    Packet::request(
        RequestKind::Query,
        HOST,
        SWITCH,
        0x0456,
        vec![TlvRecord::empty(Tag(0x0003))],
    )
}

// =============================================================================
// Header Layout Tests
// =============================================================================

#[test]
fn test_query_request_header_layout() {
    let bytes = query_request().encode().unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + 4 + 4);
    assert_eq!(bytes[0], 0x01); // version
    assert_eq!(bytes[1], 0x01); // query request
    assert_eq!(bytes[2], 0x00); // result
    assert_eq!(&bytes[4..6], &[0x00, 0x00]); // failed tag
    assert_eq!(&bytes[8..14], &HOST.octets());
    assert_eq!(&bytes[14..20], &SWITCH.octets());
    assert_eq!(&bytes[22..24], &[0x04, 0x56]);
    assert_eq!(&bytes[24..28], b"NSDP");
    assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &[0x00, 0x03, 0x00, 0x00]);
    assert_eq!(&bytes[bytes.len() - 4..], &[0xff, 0xff, 0x00, 0x00]);
}

#[test]
fn test_request_kinds_map_to_operations() {
    let set = Packet::request(RequestKind::Set, HOST, SWITCH, 1, Vec::new());
    let discovery = Packet::request(RequestKind::Discovery, HOST, MacAddr::broadcast(), 1, Vec::new());

    assert_eq!(set.operation, Operation::SetRequest);
    assert_eq!(discovery.operation, Operation::QueryRequest);
    assert_eq!(set.encode().unwrap()[1], 0x03);
}

#[test]
fn test_response_operation_pairs() {
    assert_eq!(Operation::QueryRequest.response(), Operation::QueryResponse);
    assert_eq!(Operation::SetRequest.response(), Operation::SetResponse);
    assert!(Operation::SetResponse.is_response());
    assert!(!Operation::QueryRequest.is_response());
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_rejection_fields() {
    let mut reply = Packet::request(RequestKind::Set, HOST, SWITCH, 77, Vec::new());
    reply.operation = Operation::SetResponse;
    reply.result = 0x07;
    reply.failed_tag = Tag(0x000a);

    let decoded = parse_response(&reply.encode().unwrap()).unwrap();
    assert_eq!(decoded.result, 0x07);
    assert_eq!(decoded.failed_tag, Tag(0x000a));
    assert_eq!(decoded.sequence, 77);
    assert_eq!(decoded.switch_mac(), SWITCH);
    assert!(decoded.is_rejection());
}

#[test]
fn test_decode_records_for_repeated_tag() {
    let mut reply = query_request();
    reply.operation = Operation::QueryResponse;
    reply.records = vec![
        TlvRecord::new(Tag(0x3800), vec![1, 1]),
        TlvRecord::new(Tag(0x0003), b"sw".to_vec()),
        TlvRecord::new(Tag(0x3800), vec![2, 3]),
    ];

    let decoded = Packet::decode(&reply.encode().unwrap()).unwrap();
    assert_eq!(decoded.records_for(Tag(0x3800)).count(), 2);
    assert_eq!(decoded.record(Tag(0x0003)).unwrap().value, b"sw");
    assert!(decoded.record(Tag(0x0007)).is_none());
}

#[test]
fn test_decode_short_datagram() {
    let bytes = query_request().encode().unwrap();
    let err = Packet::decode(&bytes[..HEADER_SIZE - 1]).unwrap_err();
    assert!(matches!(err, NsdpError::MalformedPacket(_)));
    assert!(err.is_discardable());
}

#[test]
fn test_decode_bad_signature() {
    let mut bytes = query_request().encode().unwrap();
    bytes[24..28].copy_from_slice(b"XXXX");
    assert!(matches!(Packet::decode(&bytes), Err(NsdpError::MalformedPacket(_))));
}

#[test]
fn test_decode_unknown_operation() {
    let mut bytes = query_request().encode().unwrap();
    bytes[1] = 0x09;
    let err = Packet::decode(&bytes).unwrap_err();
    assert!(matches!(err, NsdpError::UnexpectedOperation(0x09)));
    assert!(err.is_discardable());
}

#[test]
fn test_parse_response_rejects_requests() {
    let bytes = query_request().encode().unwrap();
    assert!(matches!(
        parse_response(&bytes),
        Err(NsdpError::UnexpectedOperation(0x01))
    ));
}

// =============================================================================
// MAC Address Tests
// =============================================================================

#[test]
fn test_mac_parse_and_display() {
    let mac: MacAddr = "08:BD:43:01:02:03".parse().unwrap();
    assert_eq!(mac, SWITCH);
    assert_eq!(mac.to_string(), "08:bd:43:01:02:03");

    let dashed: MacAddr = "08-bd-43-01-02-03".parse().unwrap();
    assert_eq!(dashed, SWITCH);
}

#[test]
fn test_mac_parse_invalid() {
    for text in ["", "08:bd:43:01:02", "08:bd:43:01:02:zz", "08:bd:43:01:02:003"] {
        assert!(
            matches!(text.parse::<MacAddr>(), Err(NsdpError::InvalidValue { .. })),
            "accepted {:?}",
            text
        );
    }
}

#[test]
fn test_mac_broadcast() {
    assert!(MacAddr::broadcast().is_broadcast());
    assert!(!MacAddr::zero().is_broadcast());
    assert_eq!(MacAddr::broadcast().to_string(), "ff:ff:ff:ff:ff:ff");
}
