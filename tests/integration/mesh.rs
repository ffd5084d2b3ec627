use scenewire_client::MeshBuffers;
use scenewire_core::digest::ContentDigest;
use scenewire_core::frame::{receive_message, send_message};
use scenewire_core::message::{
    BlobRef, ClientMessage, MeshUpdate, PluginInstanceUpdate, PluginKind, ServerMessage,
};

use crate::*;

fn cube_buffers() -> MeshBuffers {
    let positions: Vec<f32> = (0..24).map(|i| i as f32).collect();
    let triangles: Vec<u32> = (0..36).map(|i| i % 8).collect();
    MeshBuffers::new(&positions, &triangles)
}

/// Round-trips a tiny message so the test can tell "daemon still serving
/// this connection" from "daemon tore it down".
fn assert_connection_alive(conn: &mut scenewire_client::Connection) {
    conn.update_plugin_instance(PluginInstanceUpdate {
        kind: PluginKind::Geometry,
        name: format!("probe-{}", std::process::id()),
        plugin_name: "probe".to_string(),
        parameters: serde_json::Value::Null,
        custom_properties: serde_json::Value::Null,
    })
    .expect("connection should still be serving");
}

#[test]
fn first_upload_is_inline() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    let buffers = cube_buffers();
    let transfer = conn.update_mesh("cube", &buffers).unwrap();
    assert_eq!(transfer.inline_blobs, 2);
    assert_eq!(transfer.cached_blobs, 0);
    assert_eq!(
        transfer.blob_bytes_sent,
        (buffers.positions.len() + buffers.triangles.len()) as u64
    );

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn repeat_upload_sends_only_cached_refs() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    let buffers = cube_buffers();
    conn.update_mesh("cube", &buffers).unwrap();

    // Same buffers under another name: nothing travels twice.
    let transfer = conn.update_mesh("cube-copy", &buffers).unwrap();
    assert_eq!(transfer.inline_blobs, 0);
    assert_eq!(transfer.cached_blobs, 2);
    assert_eq!(transfer.blob_bytes_sent, 0);

    assert_connection_alive(&mut conn);
    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn changed_buffers_go_inline_again() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    conn.update_mesh("cube", &cube_buffers()).unwrap();

    let moved: Vec<f32> = (0..24).map(|i| i as f32 + 10.0).collect();
    let triangles: Vec<u32> = (0..36).map(|i| i % 8).collect();
    let transfer = conn
        .update_mesh("cube", &MeshBuffers::new(&moved, &triangles))
        .unwrap();
    // Positions changed, triangles did not.
    assert_eq!(transfer.inline_blobs, 1);
    assert_eq!(transfer.cached_blobs, 1);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn optional_buffers_are_declared_and_deduplicated() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    let buffers = cube_buffers()
        .with_normals(&[0.0; 24])
        .with_vertex_colors(&[1.0; 32]);
    let transfer = conn.update_mesh("cube", &buffers).unwrap();
    assert_eq!(transfer.inline_blobs, 4);

    let transfer = conn.update_mesh("cube", &buffers).unwrap();
    assert_eq!(transfer.cached_blobs, 4);
    assert_eq!(transfer.inline_blobs, 0);

    assert_connection_alive(&mut conn);
    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn second_connection_resolves_blobs_from_shared_store() {
    let daemon = start_daemon();

    // Connection 1 uploads the buffers.
    let buffers = cube_buffers();
    let mut conn1 = connect(daemon.addr);
    conn1.update_mesh("cube", &buffers).unwrap();

    // Connection 2 never sent them but declares them Cached; the daemon
    // resolves against the shared content store.
    let mut stream = raw_connect(daemon.addr);
    let cached = |bytes: &bytes::Bytes| BlobRef::Cached {
        digest: ContentDigest::of(bytes),
        byte_len: bytes.len() as u64,
    };
    send_message(
        &mut stream,
        &ClientMessage::UpdateMesh(MeshUpdate {
            name: "cube".to_string(),
            vertex_count: buffers.vertex_count,
            triangle_count: buffers.triangle_count,
            positions: cached(&buffers.positions),
            normals: None,
            vertex_colors: None,
            triangles: cached(&buffers.triangles),
        }),
    )
    .unwrap();

    // A plugin round-trip proves the daemon accepted the mesh and is
    // still serving the connection.
    send_message(
        &mut stream,
        &ClientMessage::UpdatePluginInstance(PluginInstanceUpdate {
            kind: PluginKind::Geometry,
            name: "probe".to_string(),
            plugin_name: "probe".to_string(),
            parameters: serde_json::Value::Null,
            custom_properties: serde_json::Value::Null,
        }),
    )
    .unwrap();
    match receive_message::<_, ServerMessage>(&mut stream, usize::MAX).unwrap() {
        ServerMessage::GenerateResult { success, .. } => assert!(success),
        other => panic!("expected GenerateResult, got {other:?}"),
    }

    send_message(&mut stream, &ClientMessage::Bye).unwrap();
    conn1.bye().unwrap();
    daemon.stop();
}
