//! Scripted in-process session
//!
//! Drives a whole session through the public participant API: the authority
//! builds a scene, a second participant takes a hologram and drags it, then
//! the authority leaves and the next participant takes over.

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::domain::{Color3, MenuEntry, ParticipantId, Vec3};
use crate::render::{RecordingRenderer, RenderAdapter, TracingRenderer};
use crate::session::Participant;
use crate::store::{ReplicatedStore, SessionCredentials, StoreMetrics, StoreRequest};

/// Name of the hologram that gets dragged
pub const DRAGGED: &str = "sphere";

/// What to simulate
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Number of participants, at least two
    pub participants: usize,
    /// Drag samples offered by the controlling participant
    pub samples: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            participants: 2,
            samples: 50,
        }
    }
}

/// Renderer activity seen by one participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSummary {
    pub participant: ParticipantId,
    pub materialized: usize,
    pub transforms: usize,
    /// Freeze (false) and restore (true) calls for the dragged hologram
    pub affordances: Vec<bool>,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub app_id: String,
    pub participants: Vec<ParticipantId>,
    pub authority_before: ParticipantId,
    pub authority_after: Option<ParticipantId>,
    pub controller: ParticipantId,
    pub samples_offered: usize,
    pub samples_broadcast: u64,
    pub samples_dropped: u64,
    pub final_position: Vec3,
    pub frozen_during_drag: bool,
    pub restored_after_release: bool,
    pub render: Vec<RenderSummary>,
    pub store: StoreMetrics,
}

struct Viewer {
    participant: Participant,
    adapter: RenderAdapter<(RecordingRenderer, TracingRenderer)>,
}

impl Viewer {
    async fn sync(&mut self) -> Result<()> {
        self.participant.sync().await?;
        self.adapter.pump();
        Ok(())
    }
}

async fn sync_all(viewers: &mut [Viewer]) -> Result<()> {
    for v in viewers.iter_mut() {
        v.sync().await?;
    }
    Ok(())
}

/// Run the scripted session and report what happened
pub async fn run_simulation(
    credentials: &SessionCredentials,
    config: &Config,
    options: &SimulationOptions,
) -> Result<SimulationReport> {
    if options.participants < 2 {
        return Err(eyre!("A simulation needs at least 2 participants, got {}", options.participants));
    }

    let store = ReplicatedStore::open(credentials, &config.store).context("Failed to open session store")?;
    let app_id = store.app_id().to_string();
    let sender = store.sender();
    let store_task = tokio::spawn(store.run());

    let settings = config.participant_settings();
    let mut viewers = Vec::with_capacity(options.participants);
    for i in 0..options.participants {
        let id = ParticipantId::generate(&format!("viewer {}", i + 1));
        let participant = Participant::join(sender.clone(), id, settings.clone()).await?;
        let adapter = RenderAdapter::new((RecordingRenderer::new(), TracingRenderer), participant.subscribe());
        viewers.push(Viewer { participant, adapter });
        sync_all(&mut viewers).await?;
    }
    let participants: Vec<ParticipantId> = viewers.iter().map(|v| v.participant.id().clone()).collect();
    info!(count = participants.len(), "Simulation: participants joined");

    // The first joiner builds the scene
    let authority_before = viewers[0].participant.id().clone();
    {
        let author = &mut viewers[0].participant;
        author
            .create_standard("cube1", "cube", serde_json::json!({"size": 1.0}), Color3::white())
            .await?;
        author
            .create_standard(DRAGGED, "sphere", serde_json::json!({"diameter": 0.5}), Color3::new(0.2, 0.6, 1.0))
            .await?;
        author.create_variable("score", serde_json::json!(0)).await?;
        author
            .create_menu("main", vec![MenuEntry::new("reset", "Reset"), MenuEntry::new("done", "Done")])
            .await?;
        author.set_position("cube1", Vec3::new(0.0, 1.0, -2.0)).await?;
    }
    sync_all(&mut viewers).await?;

    // The second joiner drags the sphere
    let controller = viewers[1].participant.id().clone();
    viewers[1].participant.request_control(DRAGGED).await?;
    sync_all(&mut viewers).await?;
    let frozen_during_drag = viewers[0].participant.is_frozen(DRAGGED);

    for i in 0..options.samples {
        let t = i as f32 / options.samples.max(1) as f32;
        viewers[1]
            .participant
            .drag(DRAGGED, Vec3::new(t, 1.0, -1.0), Vec3::one())
            .await?;
    }
    viewers[1].participant.release_control(DRAGGED).await?;
    viewers[1].participant.press("done").await?;
    sync_all(&mut viewers).await?;
    let restored_after_release = !viewers[0].participant.is_frozen(DRAGGED);
    let stats = viewers[1].participant.throttle_stats();

    // The authority leaves; the next in join order takes over
    let leaving = viewers.remove(0);
    let mut render = vec![summary(&leaving)];
    leaving.participant.leave().await?;
    sync_all(&mut viewers).await?;

    let authority_after = viewers
        .iter()
        .find(|v| v.participant.is_authority())
        .map(|v| v.participant.id().clone());
    let final_position = viewers[0]
        .participant
        .hologram(DRAGGED)
        .map(|h| h.position)
        .unwrap_or_default();
    let store_metrics = viewers[0].participant.store_metrics().await?;
    render.extend(viewers.iter().map(summary));

    sender
        .send(StoreRequest::Shutdown)
        .await
        .map_err(|_| eyre!("Store stopped before shutdown"))?;
    store_task.await.context("Store task failed")?;

    Ok(SimulationReport {
        app_id,
        participants,
        authority_before,
        authority_after,
        controller,
        samples_offered: options.samples,
        samples_broadcast: stats.broadcast,
        samples_dropped: stats.dropped,
        final_position,
        frozen_during_drag,
        restored_after_release,
        render,
        store: store_metrics,
    })
}

fn summary(viewer: &Viewer) -> RenderSummary {
    let renderer = &viewer.adapter.renderer().0;
    RenderSummary {
        participant: viewer.participant.id().clone(),
        materialized: renderer.materialized(),
        transforms: renderer.transforms(),
        affordances: renderer.affordances_for(DRAGGED),
    }
}
