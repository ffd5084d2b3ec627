use std::io::Read;

use scenewire_client::MeshBuffers;
use scenewire_core::digest::ContentDigest;
use scenewire_core::frame::{send_frame, send_message};
use scenewire_core::message::{BlobRef, ClientMessage, MeshUpdate};

use crate::*;

/// The daemon must close the connection after a protocol error; reads on
/// our side then see EOF (or a reset, depending on timing).
fn assert_closed(stream: &mut std::net::TcpStream) {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(_) => continue, // drain whatever was already in flight
            Err(_) => return,  // reset also counts as closed
        }
    }
}

#[test]
fn oversize_message_frame_closes_connection() {
    let mut config = loopback_config();
    config.limits.max_message_bytes = 1024;
    let daemon = start_daemon_with(config);

    let mut stream = raw_connect(daemon.addr);
    // Declare a frame far above the limit; the daemon must reject it on
    // the prefix alone, before any payload arrives.
    std::io::Write::write_all(&mut stream, &10_000_000u32.to_le_bytes()).unwrap();
    assert_closed(&mut stream);

    daemon.stop();
}

#[test]
fn payload_beyond_a_kilobyte_round_trips() {
    // 1024 bytes was the reference implementation's hard receive cap;
    // multi-kilobyte buffers must flow without truncation.
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    let positions: Vec<f32> = (0..3000).map(|i| i as f32 * 0.5).collect();
    let triangles: Vec<u32> = (0..3000).map(|i| i % 1000).collect();
    let transfer = conn
        .update_mesh("large", &MeshBuffers::new(&positions, &triangles))
        .unwrap();
    assert_eq!(transfer.inline_blobs, 2);
    assert_eq!(transfer.blob_bytes_sent, 24_000);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn inline_blob_digest_mismatch_closes_connection() {
    let daemon = start_daemon();

    let mut stream = raw_connect(daemon.addr);
    let declared = b"the bytes the digest promises".as_slice();
    let sent = b"entirely different bytes".as_slice();

    send_message(
        &mut stream,
        &ClientMessage::UpdateMesh(MeshUpdate {
            name: "forged".to_string(),
            vertex_count: 1,
            triangle_count: 1,
            positions: BlobRef::Inline {
                digest: ContentDigest::of(declared),
                byte_len: sent.len() as u64,
            },
            normals: None,
            vertex_colors: None,
            triangles: BlobRef::Inline {
                digest: ContentDigest::of(b"unreached"),
                byte_len: 9,
            },
        }),
    )
    .unwrap();
    send_frame(&mut stream, sent).unwrap();
    assert_closed(&mut stream);

    // The forged blob never reached the shared store: a fresh connection
    // declaring the declared digest as Cached is a protocol error too.
    let mut probe = raw_connect(daemon.addr);
    send_message(
        &mut probe,
        &ClientMessage::UpdateMesh(MeshUpdate {
            name: "probe".to_string(),
            vertex_count: 1,
            triangle_count: 1,
            positions: BlobRef::Cached {
                digest: ContentDigest::of(declared),
                byte_len: declared.len() as u64,
            },
            normals: None,
            vertex_colors: None,
            triangles: BlobRef::Cached {
                digest: ContentDigest::of(declared),
                byte_len: declared.len() as u64,
            },
        }),
    )
    .unwrap();
    assert_closed(&mut probe);

    // And the daemon keeps serving well-behaved clients.
    let conn = connect(daemon.addr);
    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn cached_ref_to_unknown_digest_closes_connection() {
    let daemon = start_daemon();

    let mut stream = raw_connect(daemon.addr);
    let never_sent = ContentDigest::of(b"no connection ever uploaded this");
    send_message(
        &mut stream,
        &ClientMessage::UpdateMesh(MeshUpdate {
            name: "phantom".to_string(),
            vertex_count: 1,
            triangle_count: 1,
            positions: BlobRef::Cached {
                digest: never_sent,
                byte_len: 32,
            },
            normals: None,
            vertex_colors: None,
            triangles: BlobRef::Cached {
                digest: never_sent,
                byte_len: 32,
            },
        }),
    )
    .unwrap();
    assert_closed(&mut stream);

    daemon.stop();
}

#[test]
fn blob_length_disagreeing_with_declaration_closes_connection() {
    let daemon = start_daemon();

    let mut stream = raw_connect(daemon.addr);
    let content = b"twelve bytes".as_slice();
    send_message(
        &mut stream,
        &ClientMessage::UpdateMesh(MeshUpdate {
            name: "short".to_string(),
            vertex_count: 1,
            triangle_count: 1,
            positions: BlobRef::Inline {
                digest: ContentDigest::of(content),
                byte_len: content.len() as u64 + 5,
            },
            normals: None,
            vertex_colors: None,
            triangles: BlobRef::Inline {
                digest: ContentDigest::of(content),
                byte_len: content.len() as u64,
            },
        }),
    )
    .unwrap();
    send_frame(&mut stream, content).unwrap();
    assert_closed(&mut stream);

    daemon.stop();
}
