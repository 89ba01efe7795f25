//! Session Tests
//!
//! Tests for sending, collecting and retrying against a scripted switch.

#[path = "../support/stub_switch.rs"]
mod stub_switch;

use prosafe::network::{Destination, Expect, SessionState};
use prosafe::protocol::{MacAddr, Operation, RequestKind};
use prosafe::{Config, NsdpError};

use stub_switch::*;

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_new_session_is_idle() {
    let (transport, _) = StubTransport::silent();
    let session = stub_session(transport);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.local_mac(), HOST_MAC);
}

#[test]
fn test_sequence_increments_per_request() {
    let (transport, _) = StubTransport::silent();
    let mut session = stub_session(transport);

    let first = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    let second = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());

    assert_eq!(second.sequence, first.sequence.wrapping_add(1));
    assert!((100..2001).contains(&first.sequence));
    assert_eq!(first.source_mac, HOST_MAC);
}

#[test]
fn test_discovery_request_uses_discovery_mac() {
    let (transport, _) = StubTransport::silent();
    let config = Config::builder().discovery_mac(MacAddr::zero()).build();
    let mut session = stub_session_with(transport, config);

    let request = session.request(RequestKind::Discovery, SWITCH_MAC, Vec::new());
    assert_eq!(request.destination_mac, MacAddr::zero());
    assert_eq!(request.operation, Operation::QueryRequest);
}

// =============================================================================
// Exchange Tests
// =============================================================================

#[test]
fn test_exchange_returns_matching_reply() {
    let (transport, state) = StubTransport::new(|req| vec![reply(req, vec![record(3, b"sw")])]);
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, vec![record(3, b"")]);
    let answer = session.exchange(&request, 3).unwrap();

    assert_eq!(answer.sequence, request.sequence);
    assert_eq!(answer.record(prosafe::protocol::Tag(3)).unwrap().value, b"sw");
    assert_eq!(state.borrow().sent.len(), 1);
    assert_eq!(session.state(), SessionState::Completed);
}

#[test]
fn test_exchange_retries_until_attempts_exhausted() {
    let (transport, state) = StubTransport::silent();
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    let err = session.exchange(&request, 3).unwrap_err();

    match err {
        NsdpError::NoResponse { mac, attempts } => {
            assert_eq!(mac, SWITCH_MAC);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected NoResponse, got {:?}", other),
    }
    assert_eq!(state.borrow().sent.len(), 3);
    assert_eq!(session.state(), SessionState::TimedOut);
}

#[test]
fn test_exchange_answers_on_second_attempt() {
    let mut calls = 0;
    let (transport, state) = StubTransport::new(move |req| {
        calls += 1;
        if calls == 1 {
            Vec::new()
        } else {
            vec![reply(req, Vec::new())]
        }
    });
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    assert!(session.exchange(&request, 3).is_ok());
    assert_eq!(state.borrow().sent.len(), 2);
}

#[test]
fn test_exchange_ignores_other_sequences_and_switches() {
    let (transport, _) = StubTransport::new(|req| {
        let mut stale = req.clone();
        stale.sequence = req.sequence.wrapping_sub(1);
        vec![
            reply(&stale, vec![record(3, b"stale")]),
            reply_from(OTHER_MAC, req, vec![record(3, b"other")]),
            reply(req, vec![record(3, b"mine")]),
        ]
    });
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    let answer = session.exchange(&request, 1).unwrap();
    assert_eq!(answer.records[0].value, b"mine");
}

#[test]
fn test_malformed_datagram_is_discarded() {
    let (transport, _) = StubTransport::new(|req| {
        let mut truncated = reply(req, Vec::new());
        truncated.truncate(10);
        let mut request_echo = reply(req, Vec::new());
        request_echo[1] = 0x01;
        vec![truncated, request_echo, reply(req, vec![record(6, &[10, 0, 0, 2])])]
    });
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    let answer = session.exchange(&request, 1).unwrap();
    assert_eq!(answer.records.len(), 1);
}

#[test]
fn test_reply_larger_than_ethernet_mtu_is_received_whole() {
    // 24 ports of 49-byte statistics plus per-port speed records
    let records: Vec<_> = (1..=24u8)
        .flat_map(|port| {
            let mut stats = vec![0u8; 49];
            stats[0] = port;
            [record(0x1000, &stats), record(0x0c00, &[port, 0x05, 0x01])]
        })
        .collect();
    let (transport, _) = StubTransport::new(move |req| vec![reply(req, records.clone())]);
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, vec![record(0x1000, b"")]);
    let answer = session.exchange(&request, 1).unwrap();

    assert!(answer.encode().unwrap().len() > 1500);
    assert_eq!(answer.records.len(), 48);
    assert_eq!(answer.records[46].value[0], 24);
}

#[test]
fn test_undersized_buffer_truncates_reply_into_timeout() {
    let (transport, _) = StubTransport::new(|req| {
        vec![reply(req, vec![record(0x1000, &[0u8; 49]); 30])]
    });
    let config = Config::builder()
        .timeout(std::time::Duration::from_millis(10))
        .recv_buffer_size(1500)
        .build();
    let mut session = stub_session_with(transport, config);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    let err = session.exchange(&request, 1).unwrap_err();
    assert!(matches!(err, NsdpError::NoResponse { attempts: 1, .. }));
}

#[test]
fn test_default_receive_buffer_fits_any_udp_payload() {
    assert_eq!(Config::default().recv_buffer_size, prosafe::config::MAX_DATAGRAM_SIZE);
}

#[test]
fn test_unicast_after_reply_learned_address() {
    let (transport, state) = StubTransport::new(|req| vec![reply(req, Vec::new())]);
    let mut session = stub_session(transport);

    let first = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    session.exchange(&first, 1).unwrap();
    let second = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    session.exchange(&second, 1).unwrap();

    assert_eq!(session.known_ip(&SWITCH_MAC), Some(SWITCH_IP));
    assert_eq!(
        state.borrow().destinations(),
        vec![Destination::Broadcast, Destination::Unicast(SWITCH_IP)]
    );
}

// =============================================================================
// Collection Tests
// =============================================================================

#[test]
fn test_broadcast_dedupes_by_switch_mac() {
    let (transport, state) = StubTransport::new(|req| {
        vec![
            reply_from(SWITCH_MAC, req, Vec::new()),
            reply_from(SWITCH_MAC, req, Vec::new()),
            reply_from(OTHER_MAC, req, Vec::new()),
        ]
    });
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Discovery, MacAddr::broadcast(), Vec::new());
    let replies = session.broadcast(&request).unwrap();

    let macs: Vec<MacAddr> = replies.iter().map(|p| p.switch_mac()).collect();
    assert_eq!(macs, vec![SWITCH_MAC, OTHER_MAC]);
    assert_eq!(state.borrow().sent.len(), 1);
}

#[test]
fn test_collect_all_waits_for_every_reply() {
    let (transport, _) = StubTransport::new(|req| {
        vec![reply(req, Vec::new()), reply_from(OTHER_MAC, req, Vec::new())]
    });
    let mut session = stub_session(transport);

    let request = session.request(RequestKind::Query, SWITCH_MAC, Vec::new());
    session.send(&request).unwrap();
    assert_eq!(session.state(), SessionState::Sent);

    let all = session.collect(|_| true, Expect::All).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_close_releases_transport() {
    let (transport, state) = StubTransport::silent();
    let session = stub_session(transport);

    assert!(!state.borrow().closed);
    session.close();
    assert!(state.borrow().closed);
}
