//! Integration tests for holosync
//!
//! These tests drive whole sessions through the public participant API and
//! the `hs` binary.

use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use holosync::config::Config;
use holosync::domain::{Color3, MenuEntry, ParticipantId, Vec3};
use holosync::error::SyncError;
use holosync::events::LocalEvent;
use holosync::render::{RecordingRenderer, RenderAdapter};
use holosync::session::{Participant, ParticipantSettings};
use holosync::store::{ReplicatedStore, SessionCredentials, StoreConfig, StoreRequest};

async fn open_session() -> (mpsc::Sender<StoreRequest>, JoinHandle<()>) {
    let store = ReplicatedStore::open(&SessionCredentials::new("integration-key", "integration-app"), &StoreConfig::default())
        .expect("Failed to open store");
    let sender = store.sender();
    (sender, tokio::spawn(store.run()))
}

async fn join(sender: &mpsc::Sender<StoreRequest>, label: &str) -> Participant {
    Participant::join(sender.clone(), ParticipantId::generate(label), ParticipantSettings::default())
        .await
        .expect("Failed to join")
}

async fn sync_all(participants: &mut [&mut Participant]) {
    for p in participants.iter_mut() {
        p.sync().await.expect("Failed to sync");
    }
}

async fn shutdown(sender: mpsc::Sender<StoreRequest>, task: JoinHandle<()>) {
    sender.send(StoreRequest::Shutdown).await.expect("Store already gone");
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("Store should shut down")
        .expect("Store task panicked");
}

async fn build_scene(author: &mut Participant) {
    assert!(
        author
            .create_standard("cube1", "cube", json!({"size": 1.0}), Color3::white())
            .await
            .unwrap()
    );
    assert!(
        author
            .create_standard("sphere", "sphere", json!({"diameter": 0.5}), Color3::new(0.0, 0.5, 1.0))
            .await
            .unwrap()
    );
}

// =============================================================================
// Authority
// =============================================================================

#[tokio::test]
async fn test_authority_hands_over_and_frees_tokens() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    assert!(a.is_authority());
    assert!(!b.is_authority());

    build_scene(&mut a).await;
    a.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    assert!(b.is_frozen("sphere"));
    assert_eq!(b.controller_of("sphere"), Some(a.id()));

    // Non-authority setters are silent no-ops
    assert!(!b.set_position("cube1", Vec3::new(5.0, 5.0, 5.0)).await.unwrap());

    let a_id = a.id().clone();
    a.leave().await.unwrap();
    b.sync().await.unwrap();

    assert!(b.is_authority());
    assert!(!b.is_frozen("sphere"));
    assert_eq!(b.controller_of("sphere"), None);
    assert!(b.peers().all(|p| p != &a_id));

    // The new authority can publish
    assert!(b.set_position("cube1", Vec3::new(1.0, 2.0, 3.0)).await.unwrap());
    b.sync().await.unwrap();
    assert_eq!(b.hologram("cube1").unwrap().position, Vec3::new(1.0, 2.0, 3.0));

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_exactly_one_authority_across_joins_and_leaves() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "a").await;
    let mut b = join(&sender, "b").await;
    let mut c = join(&sender, "c").await;
    sync_all(&mut [&mut a, &mut b, &mut c]).await;

    let holders = [&a, &b, &c].iter().filter(|p| p.is_authority()).count();
    assert_eq!(holders, 1);
    assert!(a.is_authority());

    // A non-holder leaving changes nothing
    b.leave().await.unwrap();
    sync_all(&mut [&mut a, &mut c]).await;
    assert!(a.is_authority());
    assert!(!c.is_authority());

    a.leave().await.unwrap();
    c.sync().await.unwrap();
    assert!(c.is_authority());

    shutdown(sender, task).await;
}

// =============================================================================
// Control tokens
// =============================================================================

#[tokio::test]
async fn test_freeze_and_restore_reach_the_renderer_once() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    let mut a_view = RenderAdapter::new(RecordingRenderer::new(), a.subscribe());
    let mut b_view = RenderAdapter::new(RecordingRenderer::new(), b.subscribe());
    sync_all(&mut [&mut a, &mut b]).await;

    build_scene(&mut a).await;
    sync_all(&mut [&mut a, &mut b]).await;

    b.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    a_view.pump();
    b_view.pump();
    assert!(a.is_frozen("sphere"));
    assert!(!b.is_frozen("sphere"));
    assert_eq!(a_view.renderer().affordances_for("sphere"), vec![false]);

    // A second acquire is refused locally while the replica shows an owner
    let err = a.request_control("sphere").await.unwrap_err();
    assert!(matches!(err, SyncError::AlreadyControlled { .. }));

    b.release_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    a_view.pump();
    b_view.pump();

    assert!(!a.is_frozen("sphere"));
    assert_eq!(a_view.renderer().affordances_for("sphere"), vec![false, true]);
    assert!(b_view.renderer().affordances_for("sphere").is_empty());

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_late_joiner_sees_existing_freeze() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    build_scene(&mut a).await;
    sync_all(&mut [&mut a, &mut b]).await;
    b.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;

    let mut c = join(&sender, "carol").await;
    let mut c_view = RenderAdapter::new(RecordingRenderer::new(), c.subscribe());
    c.sync().await.unwrap();
    c_view.pump();

    assert!(!c.is_authority());
    assert!(c.is_frozen("sphere"));
    assert_eq!(c.controller_of("sphere"), Some(b.id()));
    assert_eq!(c_view.renderer().materialized(), 2);
    assert_eq!(c_view.renderer().affordances_for("sphere"), vec![false]);

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_concurrent_acquire_first_in_log_wins() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    let mut c = join(&sender, "carol").await;
    sync_all(&mut [&mut a, &mut b, &mut c]).await;
    build_scene(&mut a).await;
    sync_all(&mut [&mut a, &mut b, &mut c]).await;

    let mut c_events = c.subscribe();

    // Neither has seen the other's acquire yet
    b.request_control("cube1").await.unwrap();
    c.request_control("cube1").await.unwrap();
    sync_all(&mut [&mut a, &mut b, &mut c]).await;

    for p in [&a, &b, &c] {
        assert_eq!(p.controller_of("cube1"), Some(b.id()));
    }
    assert!(c.is_frozen("cube1"));

    let mut rejected = false;
    while let Ok(event) = c_events.try_recv() {
        if let LocalEvent::ControlRejected { requester, .. } = event {
            assert_eq!(&requester, c.id());
            rejected = true;
        }
    }
    assert!(rejected, "Losing requester should observe a rejection");

    shutdown(sender, task).await;
}

// =============================================================================
// Names
// =============================================================================

#[tokio::test]
async fn test_duplicate_name_is_rejected_without_side_effects() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    build_scene(&mut a).await;
    let err = a
        .create_standard("cube1", "cylinder", json!({}), Color3::white())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NameConflict { ref name } if name == "cube1"));

    // A menu whose button collides claims nothing
    let err = a
        .create_menu("main", vec![MenuEntry::new("go", "Go"), MenuEntry::new("sphere", "Sphere")])
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NameConflict { .. }));
    assert!(!a.knows_name("main"));
    assert!(!a.knows_name("go"));

    sync_all(&mut [&mut a, &mut b]).await;
    assert_eq!(b.holograms().count(), 2);
    assert!(b.knows_name("cube1"));
    assert!(b.menu("main").is_none());

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_unsupported_shape_publishes_nothing() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    a.sync().await.unwrap();

    let err = a
        .create_standard("blob", "dodecahedron", json!({}), Color3::white())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedShapeKind { .. }));
    assert!(!a.knows_name("blob"));

    let before = a.store_metrics().await.unwrap().log_len;
    a.sync().await.unwrap();
    assert_eq!(a.store_metrics().await.unwrap().log_len, before);

    shutdown(sender, task).await;
}

// =============================================================================
// Manipulation throttle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fifty_drag_samples_in_one_second() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    let mut a_view = RenderAdapter::new(RecordingRenderer::new(), a.subscribe());
    sync_all(&mut [&mut a, &mut b]).await;
    build_scene(&mut a).await;
    b.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    a_view.pump();
    let transforms_before = a_view.renderer().transforms();

    let mut broadcast = 0;
    for i in 0..50u32 {
        let x = i as f32;
        if b.drag("sphere", Vec3::new(x, 0.0, 0.0), Vec3::one()).await.unwrap() {
            broadcast += 1;
        }
        tokio::time::advance(Duration::from_millis(20)).await;
    }
    assert_eq!(broadcast, 20);

    b.release_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    a_view.pump();

    // 20 throttled samples plus the final one, each a position and a scaling
    assert_eq!(a_view.renderer().transforms() - transforms_before, 21 * 2);
    assert_eq!(a.hologram("sphere").unwrap().position, Vec3::new(49.0, 0.0, 0.0));
    assert_eq!(b.throttle_stats().broadcast, 20);
    assert_eq!(b.throttle_stats().dropped, 30);

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_drag_without_token_is_refused() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    a.sync().await.unwrap();
    build_scene(&mut a).await;
    a.sync().await.unwrap();

    let err = a.drag("sphere", Vec3::one(), Vec3::one()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotController { .. }));

    shutdown(sender, task).await;
}

// =============================================================================
// Departures
// =============================================================================

#[tokio::test]
async fn test_dropped_participant_departs_before_next_publish() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;
    build_scene(&mut a).await;
    a.create_menu("main", vec![MenuEntry::new("done", "Done")]).await.unwrap();
    a.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    assert!(b.is_frozen("sphere"));

    // Vanish without detaching
    drop(a);
    b.press("done").await.unwrap();
    b.sync().await.unwrap();

    assert!(b.is_authority());
    assert!(!b.is_frozen("sphere"));
    assert_eq!(b.peers().count(), 0);

    let metrics = b.store_metrics().await.unwrap();
    assert_eq!(metrics.attached, 1);
    assert_eq!(metrics.ungraceful_departures, 1);

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_dropped_controller_departs_without_further_traffic() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;
    build_scene(&mut a).await;
    a.request_control("sphere").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    assert!(b.is_frozen("sphere"));

    // Nobody publishes anything after the drop
    drop(a);
    b.sync().await.unwrap();

    assert!(b.is_authority());
    assert!(!b.is_frozen("sphere"));
    assert_eq!(b.controller_of("sphere"), None);
    assert_eq!(b.store_metrics().await.unwrap().controlled, 0);

    shutdown(sender, task).await;
}

// =============================================================================
// Variables and animations
// =============================================================================

#[tokio::test]
async fn test_variable_replicates_to_everyone() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    a.create_variable("score", json!(0)).await.unwrap();
    a.set_variable("score", json!(7)).await.unwrap();
    assert!(!b.set_variable("score", json!(99)).await.unwrap());
    sync_all(&mut [&mut a, &mut b]).await;

    assert_eq!(a.variable("score"), Some(&json!(7)));
    assert_eq!(b.variable("score"), Some(&json!(7)));

    shutdown(sender, task).await;
}

#[tokio::test]
async fn test_variables_have_no_control_token() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    a.create_variable("score", json!(0)).await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;

    let err = b.request_control("score").await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownName { ref name } if name == "score"));
    assert_eq!(a.controller_of("score"), None);

    shutdown(sender, task).await;
}

#[tokio::test(start_paused = true)]
async fn test_animation_stops_everywhere() {
    let (sender, task) = open_session().await;
    let mut a = join(&sender, "alice").await;
    let mut b = join(&sender, "bob").await;
    sync_all(&mut [&mut a, &mut b]).await;

    a.create_animation("spin", 16).await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    assert!(a.is_animating("spin"));
    assert!(b.is_animating("spin"));

    a.destroy_animation("spin").await.unwrap();
    sync_all(&mut [&mut a, &mut b]).await;
    assert!(!a.is_animating("spin"));
    assert!(!b.is_animating("spin"));

    shutdown(sender, task).await;
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_overrides_throttle() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("holosync.yml");
    std::fs::write(&path, "throttle:\n  max-per-window: 5\n  window-ms: 250\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.throttle.max_per_window, 5);
    assert_eq!(config.throttle.window_ms, 250);
    assert_eq!(config.store.channel_buffer, StoreConfig::default().channel_buffer);
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nope.yml");
    assert!(Config::load(Some(&path)).is_err());
}

// =============================================================================
// CLI
// =============================================================================

fn hs(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hs").expect("hs binary should build");
    cmd.env("XDG_DATA_HOME", data_dir.path()).env("HOME", data_dir.path());
    cmd
}

#[test]
fn test_cli_simulate_json() {
    let data_dir = TempDir::new().unwrap();
    hs(&data_dir)
        .args(["simulate", "--api-key", "k", "--app-id", "demo", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"app_id\": \"demo\""))
        .stdout(predicate::str::contains("\"restored_after_release\": true"));
}

#[test]
fn test_cli_simulate_rejects_blank_key() {
    let data_dir = TempDir::new().unwrap();
    hs(&data_dir)
        .args(["simulate", "--api-key", " ", "--app-id", "demo"])
        .assert()
        .failure();
}

#[test]
fn test_cli_config_prints_yaml() {
    let data_dir = TempDir::new().unwrap();
    let path = data_dir.path().join("custom.yml");
    std::fs::write(&path, "throttle:\n  max-per-window: 7\n").unwrap();

    hs(&data_dir)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-per-window: 7"));
}
