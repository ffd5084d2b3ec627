use std::io::Read;
use std::net::TcpStream;

use scenewire_client::{ClientError, Connection};
use scenewire_core::config::LimitsConfig;
use scenewire_core::frame::{receive_message, send_message};
use scenewire_core::message::{ClientMessage, ImageSettings, ServerMessage};

use crate::*;

#[test]
fn matching_version_is_accepted() {
    let daemon = start_daemon();

    let conn = connect(daemon.addr);
    conn.bye().expect("bye failed");

    daemon.stop();
}

#[test]
fn mismatched_version_is_rejected_with_message() {
    let daemon = start_daemon();

    let mut stream = TcpStream::connect(daemon.addr).unwrap();
    send_message(
        &mut stream,
        &ClientMessage::Hello {
            protocol_version: 999,
        },
    )
    .unwrap();

    match receive_message::<_, ServerMessage>(&mut stream, usize::MAX).unwrap() {
        ServerMessage::HelloResult { success, message } => {
            assert!(!success);
            assert!(message.contains("999"), "message should name the client version: {message}");
            assert!(message.contains("mismatch"), "unexpected message: {message}");
        }
        other => panic!("expected HelloResult, got {other:?}"),
    }

    // The daemon closes a rejected connection.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).unwrap_or(0), 0);

    daemon.stop();
}

#[test]
fn first_message_must_be_hello() {
    let daemon = start_daemon();

    let mut stream = TcpStream::connect(daemon.addr).unwrap();
    send_message(
        &mut stream,
        &ClientMessage::UpdateImage(ImageSettings {
            width: 4,
            height: 4,
            border: None,
        }),
    )
    .unwrap();

    // No HelloResult, just a closed connection.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).unwrap_or(0), 0);

    daemon.stop();
}

#[test]
fn connect_to_dead_port_is_io_error() {
    let err = Connection::connect("127.0.0.1:1", LimitsConfig::default()).unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
}
