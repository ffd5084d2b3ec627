use glam::Mat4;

use scenewire_client::{MeshBuffers, RenderControl, RenderOutcome};
use scenewire_core::message::{ImageSettings, ObjectKind, RenderRequest, RenderSettings};

use crate::*;

fn small_image() -> ImageSettings {
    ImageSettings {
        width: 4,
        height: 4,
        border: None,
    }
}

#[test]
fn render_streams_one_framebuffer_per_sample() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    conn.update_image(small_image()).unwrap();
    conn.update_render_settings(RenderSettings {
        renderer: "scivis".to_string(),
        samples: 3,
        ao_samples: 0,
        background_color: [0.0, 0.0, 0.0, 1.0],
    })
    .unwrap();

    let mut frames = Vec::new();
    let outcome = conn
        .render(RenderRequest { samples: 3 }, |info, framebuffer| {
            frames.push((info.sample, framebuffer));
            RenderControl::Continue
        })
        .unwrap();

    assert_eq!(outcome, RenderOutcome::Done { samples: 3 });
    assert_eq!(
        frames.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    for (sample, framebuffer) in &frames {
        // 4×4 RGBA f32, every channel the sample number (null engine).
        assert_eq!(framebuffer.len(), 4 * 4 * 4 * 4);
        assert_eq!(&framebuffer[..4], &(*sample as f32).to_le_bytes());
    }

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn frames_report_daemon_memory() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    conn.update_image(small_image()).unwrap();
    let mut seen = 0u32;
    conn.render(RenderRequest { samples: 1 }, |info, _| {
        assert!(info.memory_mb > 0.0, "resident memory should be reported");
        assert!(info.peak_memory_mb > 0.0);
        seen += 1;
        RenderControl::Continue
    })
    .unwrap();
    assert_eq!(seen, 1);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn zero_samples_complete_immediately() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    conn.update_image(small_image()).unwrap();
    let outcome = conn
        .render(RenderRequest { samples: 0 }, |_, _| {
            panic!("no frame should arrive")
        })
        .unwrap();
    assert_eq!(outcome, RenderOutcome::Done { samples: 0 });

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn cancel_stops_a_long_render() {
    let daemon = start_daemon();
    let mut conn = connect(daemon.addr);

    // Large enough framebuffers and sample count that the cancel lands
    // many polls before the render could finish.
    conn.update_image(ImageSettings {
        width: 64,
        height: 64,
        border: None,
    })
    .unwrap();

    let mut frames = 0u32;
    let outcome = conn
        .render(RenderRequest { samples: 100_000 }, |_, _| {
            frames += 1;
            RenderControl::Cancel
        })
        .unwrap();

    assert_eq!(outcome, RenderOutcome::Canceled);
    assert!(frames >= 1);
    assert!(frames < 100_000, "cancel never took effect");

    // The session survives a canceled render.
    conn.update_mesh("after-cancel", &MeshBuffers::new(&[0.0; 9], &[0, 1, 2]))
        .unwrap();
    conn.update_object(
        "obj",
        ObjectKind::Mesh,
        &Mat4::IDENTITY,
        "after-cancel",
        None,
        serde_json::Value::Null,
    )
    .unwrap();
    let outcome = conn
        .render(RenderRequest { samples: 1 }, |_, _| RenderControl::Continue)
        .unwrap();
    assert_eq!(outcome, RenderOutcome::Done { samples: 1 });

    conn.bye().unwrap();
    daemon.stop();
}
