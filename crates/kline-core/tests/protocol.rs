use kline_core::protocol::mock::MockEvent;
use kline_core::protocol::{
    build_frame, ConnectionConfig, Connection, ErrorKind, MockTransport, ProtocolError,
    SessionState, TimingConfig,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        timing: TimingConfig::immediate(),
        ..ConnectionConfig::default()
    }
}

fn connected() -> (MockTransport, Connection) {
    let mock = MockTransport::with_handshake();
    let mut conn = Connection::new(fast_config(), Box::new(mock.clone()));
    conn.connect("slow-init").unwrap();
    (mock, conn)
}

#[test]
fn full_diagnostic_session() {
    let (mock, mut conn) = connected();
    assert_eq!(conn.state(), SessionState::Connected { baud: 10400 });

    mock.push_reply(&build_frame(&[0x5A, 0x9B, b'0', b'2', b'6', b'1']).unwrap());
    mock.push_reply(&build_frame(&[0xC3]).unwrap());
    mock.push_reply(&build_frame(&[0xC6]).unwrap());
    mock.push_reply(&build_frame(&[0x63, 0x12, 0x34]).unwrap());
    mock.push_reply(&build_frame(&[0x7D]).unwrap());
    mock.push_reply(&build_frame(&[0x7E]).unwrap());
    mock.push_reply(&build_frame(&[0xC2]).unwrap());

    let id = conn.read_ecu_id(&[0x9B]).unwrap();
    assert_eq!(&id.payload()[2..], b"0261");

    conn.access_timing_parameter(&[0x00, 0x01, 0x00, 0x14, 0x01]).unwrap();
    conn.start_diag_session(38400).unwrap();
    assert_eq!(conn.state(), SessionState::Connected { baud: 38400 });

    let memory = conn.read_memory(0x380000, 2).unwrap();
    assert_eq!(memory.payload(), &[0x63, 0x12, 0x34]);

    conn.write_memory_by_address(0x380010, &[0xAB]).unwrap();
    conn.tester_present().unwrap();

    let stop = conn.close().unwrap();
    assert_eq!(stop.service_id(), Some(0xC2));
    assert_eq!(conn.state(), SessionState::Disconnected);

    let writes = mock.writes();
    assert_eq!(
        writes[1..],
        vec![
            build_frame(&[0x1A, 0x9B]).unwrap(),
            build_frame(&[0x83, 0x03, 0x00, 0x01, 0x00, 0x14, 0x01]).unwrap(),
            build_frame(&[0x10, 0x86, 0x50]).unwrap(),
            build_frame(&[0x23, 0x38, 0x00, 0x00, 0x02]).unwrap(),
            build_frame(&[0x3D, 0x38, 0x00, 0x10, 0x01, 0xAB]).unwrap(),
            build_frame(&[0x3E]).unwrap(),
            build_frame(&[0x82]).unwrap(),
        ][..]
    );

    let events = mock.events();
    assert!(events.contains(&MockEvent::Baud(38400)));
    assert_eq!(events.last(), Some(&MockEvent::Close));
}

#[test]
fn handshake_drives_wakeup_before_serial_traffic() {
    let (mock, _conn) = connected();

    assert_eq!(mock.pin_levels(), vec![1, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1]);
    assert_eq!(mock.writes()[0], vec![0x70]);

    let events = mock.events();
    let pin_closed = events.iter().position(|e| *e == MockEvent::PinClose).unwrap();
    let opened = events.iter().position(|e| *e == MockEvent::Open).unwrap();
    assert!(pin_closed < opened);
    assert!(events.contains(&MockEvent::Baud(10400)));
}

#[test]
fn handshake_tolerates_missing_sync() {
    let mock = MockTransport::new();
    mock.push_reply(&[0xEE]);
    let mut conn = Connection::new(fast_config(), Box::new(mock.clone()));

    conn.connect("slow-init").unwrap();
    assert!(conn.is_connected());
}

#[test]
fn silent_ecu_fails_handshake_and_closes() {
    let mock = MockTransport::new();
    let mut conn = Connection::new(fast_config(), Box::new(mock.clone()));

    let err = conn.connect("slow-init").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(conn.state(), SessionState::Disconnected);
    assert_eq!(mock.events().last(), Some(&MockEvent::Close));

    // A failed attempt leaves the connection reusable
    mock.push_rx(&[0x55, 0xEF, 0x8F]);
    mock.push_reply(&[0xEE]);
    conn.connect("SLOW-0x11").unwrap();
    assert!(conn.is_connected());
}

#[test]
fn services_before_connect_are_rejected() {
    let mut conn = Connection::new(fast_config(), Box::new(MockTransport::new()));

    assert!(matches!(conn.tester_present(), Err(ProtocolError::NotConnected)));
    assert!(matches!(conn.read_memory(0, 1), Err(ProtocolError::NotConnected)));
    assert!(matches!(conn.close(), Err(ProtocolError::NotConnected)));
    assert!(matches!(
        conn.connect("fast-init"),
        Err(ProtocolError::UnsupportedMethod(_))
    ));
}

#[test]
fn negative_response_is_returned_not_raised() {
    let (mock, mut conn) = connected();
    mock.push_reply(&build_frame(&[0x7F, 0x23, 0x31]).unwrap());

    let response = conn.read_memory(0xFFFFFF, 1).unwrap();
    assert!(response.is_negative());
    assert_eq!(response.negative_response_code(), Some(0x31));
}

#[test]
fn configuration_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "port_name": "/dev/ttyUSB1",
            "checksum_mode": "standard",
            "strict_echo": true,
            "timing": {{ "response_timeout_ms": 500 }}
        }}"#
    )
    .unwrap();

    let config = ConnectionConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.port_name, "/dev/ttyUSB1");
    assert!(config.strict_echo);
    assert_eq!(config.timing.response_timeout_ms, 500);
    assert_eq!(config.timing.wake_bit_ms, 200);
}
