use std::sync::atomic::Ordering;

use scenewire_core::message::{PluginInstanceUpdate, PluginKind};
use serde_json::json;

use crate::*;

fn spheres(name: &str, radius: f64) -> PluginInstanceUpdate {
    PluginInstanceUpdate {
        kind: PluginKind::Geometry,
        name: name.to_string(),
        plugin_name: "spheres".to_string(),
        parameters: json!({ "radius": radius, "count": 100 }),
        custom_properties: serde_json::Value::Null,
    }
}

#[test]
fn unchanged_instance_skips_regeneration() {
    let (daemon, generations) = start_daemon_counting_generations();
    let mut conn = connect(daemon.addr);

    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 1);

    // Identical update: answered from the parameter-digest check, the
    // engine never runs.
    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 1);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn changed_parameters_regenerate() {
    let (daemon, generations) = start_daemon_counting_generations();
    let mut conn = connect(daemon.addr);

    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();
    conn.update_plugin_instance(spheres("field", 2.0)).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 2);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn changed_plugin_name_regenerates() {
    let (daemon, generations) = start_daemon_counting_generations();
    let mut conn = connect(daemon.addr);

    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();

    let mut renamed = spheres("field", 1.0);
    renamed.plugin_name = "discs".to_string();
    conn.update_plugin_instance(renamed).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 2);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn instances_are_cached_per_name() {
    let (daemon, generations) = start_daemon_counting_generations();
    let mut conn = connect(daemon.addr);

    conn.update_plugin_instance(spheres("left", 1.0)).unwrap();
    conn.update_plugin_instance(spheres("right", 1.0)).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 2);

    conn.bye().unwrap();
    daemon.stop();
}

#[test]
fn clear_scene_forgets_instances() {
    let (daemon, generations) = start_daemon_counting_generations();
    let mut conn = connect(daemon.addr);

    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();
    conn.clear_scene().unwrap();
    conn.update_plugin_instance(spheres("field", 1.0)).unwrap();
    assert_eq!(generations.load(Ordering::SeqCst), 2);

    conn.bye().unwrap();
    daemon.stop();
}
