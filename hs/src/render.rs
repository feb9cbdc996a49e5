//! Rendering adapter
//!
//! The session core never draws anything. A [`Renderer`] is told what to
//! materialize and how to transform it; [`RenderAdapter`] feeds it from a
//! participant's event bus.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::domain::{Change, Color3, Entity};
use crate::events::LocalEvent;

/// Scene-side operations the session needs
pub trait Renderer: Send {
    /// Build the visual for a newly created entity
    fn materialize(&mut self, entity: &Entity);

    /// Apply a position, rotation, scaling or colour change
    fn apply_transform(&mut self, name: &str, change: &Change);

    /// Enable or disable local manipulation, with an optional bounding highlight
    fn set_manipulation_affordance(&mut self, name: &str, enabled: bool, highlight: Option<Color3>);
}

/// One call made on a [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "kebab-case")]
pub enum RenderCall {
    Materialize { name: String },
    Transform { name: String, field: String },
    Affordance {
        name: String,
        enabled: bool,
        highlight: Option<Color3>,
    },
}

/// Renderer that remembers every call
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn materialized(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RenderCall::Materialize { .. }))
            .count()
    }

    pub fn transforms(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, RenderCall::Transform { .. }))
            .count()
    }

    /// Affordance calls made for `name`, in order
    pub fn affordances_for(&self, name: &str) -> Vec<bool> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RenderCall::Affordance { name: n, enabled, .. } if n == name => Some(*enabled),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for RecordingRenderer {
    fn materialize(&mut self, entity: &Entity) {
        self.calls.push(RenderCall::Materialize {
            name: entity.name().to_string(),
        });
    }

    fn apply_transform(&mut self, name: &str, change: &Change) {
        self.calls.push(RenderCall::Transform {
            name: name.to_string(),
            field: change.field().to_string(),
        });
    }

    fn set_manipulation_affordance(&mut self, name: &str, enabled: bool, highlight: Option<Color3>) {
        self.calls.push(RenderCall::Affordance {
            name: name.to_string(),
            enabled,
            highlight,
        });
    }
}

/// Renderer that only logs
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn materialize(&mut self, entity: &Entity) {
        info!(name = entity.name(), kind = %entity.kind(), "render: materialize");
    }

    fn apply_transform(&mut self, name: &str, change: &Change) {
        debug!(%name, field = change.field(), "render: apply_transform");
    }

    fn set_manipulation_affordance(&mut self, name: &str, enabled: bool, highlight: Option<Color3>) {
        info!(%name, enabled, ?highlight, "render: set_manipulation_affordance");
    }
}

/// Both renderers receive every call, first then second
impl<A: Renderer, B: Renderer> Renderer for (A, B) {
    fn materialize(&mut self, entity: &Entity) {
        self.0.materialize(entity);
        self.1.materialize(entity);
    }

    fn apply_transform(&mut self, name: &str, change: &Change) {
        self.0.apply_transform(name, change);
        self.1.apply_transform(name, change);
    }

    fn set_manipulation_affordance(&mut self, name: &str, enabled: bool, highlight: Option<Color3>) {
        self.0.set_manipulation_affordance(name, enabled, highlight);
        self.1.set_manipulation_affordance(name, enabled, highlight);
    }
}

/// Forwards one participant's events to a renderer
pub struct RenderAdapter<R: Renderer> {
    renderer: R,
    rx: broadcast::Receiver<LocalEvent>,
    frozen: HashSet<String>,
}

impl<R: Renderer> RenderAdapter<R> {
    pub fn new(renderer: R, rx: broadcast::Receiver<LocalEvent>) -> Self {
        Self {
            renderer,
            rx,
            frozen: HashSet::new(),
        }
    }

    /// Translate one event into renderer calls
    pub fn handle(&mut self, event: &LocalEvent) {
        match event {
            LocalEvent::EntityMaterialized { entity, .. } => self.renderer.materialize(entity),
            LocalEvent::TransformApplied { target, change, .. } => {
                // shared variables have no visual
                if !matches!(change, Change::Value(_)) {
                    self.renderer.apply_transform(target, change);
                }
            }
            LocalEvent::AffordanceChanged {
                target,
                enabled,
                highlight,
                ..
            } => {
                let changed = if *enabled {
                    self.frozen.remove(target)
                } else {
                    self.frozen.insert(target.clone())
                };
                if changed {
                    self.renderer.set_manipulation_affordance(target, *enabled, *highlight);
                } else {
                    debug!(%target, enabled, "RenderAdapter: affordance already in this state");
                }
            }
            _ => {}
        }
    }

    /// Handle every event already on the bus; returns how many were handled
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.handle(&event);
                    count += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "RenderAdapter lagged behind the event bus");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        count
    }

    /// Handle events until the bus closes, then hand back the renderer
    pub async fn run(mut self) -> R {
        loop {
            match self.rx.recv().await {
                Ok(event) => self.handle(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "RenderAdapter lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.renderer
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}
