//! Named entities that live in the replicated store
//!
//! Every entity carries a session-unique name. Payloads decode into tagged
//! variants, so a payload naming an unknown shape or entity kind is rejected
//! at the decoding boundary instead of being patched into a local object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::geometry::{Color3, Quat, Vec3};
use crate::error::SyncError;

/// The closed set of primitive shapes a standard hologram can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Cube,
    Sphere,
    Cylinder,
    Plane,
    Disc,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Cube,
        ShapeKind::Sphere,
        ShapeKind::Cylinder,
        ShapeKind::Plane,
        ShapeKind::Disc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Cube => "cube",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Plane => "plane",
            ShapeKind::Disc => "disc",
        }
    }
}

impl FromStr for ShapeKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| SyncError::UnsupportedShapeKind { kind: s.to_string() })
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific hologram payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "kebab-case")]
pub enum HologramKind {
    /// Mesh loaded from a file by the renderer
    Imported {
        #[serde(rename = "mesh-file-path")]
        mesh_file_path: String,
    },
    /// Primitive shape built by the renderer
    Standard {
        shape: ShapeKind,
        #[serde(rename = "creation-options", default)]
        creation_options: serde_json::Value,
        #[serde(default)]
        color: Color3,
    },
}

/// A named 3-D object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hologram {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quat,
    #[serde(default = "Vec3::one")]
    pub scaling: Vec3,
    pub kind: HologramKind,
}

impl Hologram {
    /// A primitive hologram at the origin with unit scale
    pub fn standard(name: impl Into<String>, shape: ShapeKind, creation_options: serde_json::Value, color: Color3) -> Self {
        Self {
            name: name.into(),
            position: Vec3::zero(),
            rotation: Quat::identity(),
            scaling: Vec3::one(),
            kind: HologramKind::Standard {
                shape,
                creation_options,
                color,
            },
        }
    }

    /// A mesh hologram at the origin with unit scale
    pub fn imported(name: impl Into<String>, mesh_file_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::zero(),
            rotation: Quat::identity(),
            scaling: Vec3::one(),
            kind: HologramKind::Imported {
                mesh_file_path: mesh_file_path.into(),
            },
        }
    }

    /// Fold a delivered change into this projection
    ///
    /// Returns false when the change does not apply to holograms (a variable
    /// value, or a colour on an imported mesh).
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::Position(v) => self.position = *v,
            Change::Rotation(q) => self.rotation = *q,
            Change::Scaling(v) => self.scaling = *v,
            Change::Color(c) => match &mut self.kind {
                HologramKind::Standard { color, .. } => *color = *c,
                HologramKind::Imported { .. } => return false,
            },
            Change::Value(_) => return false,
        }
        true
    }
}

/// A named shared value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncVariable {
    pub name: String,
    pub value: serde_json::Value,
}

impl SyncVariable {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Fold a delivered change into this projection
    pub fn apply(&mut self, change: &Change) -> bool {
        match change {
            Change::Value(v) => {
                self.value = v.clone();
                true
            }
            _ => false,
        }
    }
}

/// A named repeating tick source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    /// Tick interval in milliseconds
    #[serde(rename = "time-ms")]
    pub time_ms: u64,
}

impl Animation {
    pub fn new(name: impl Into<String>, time_ms: u64) -> Self {
        Self {
            name: name.into(),
            time_ms,
        }
    }
}

/// One button of a menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Session-unique name of the button
    pub button: String,
    pub label: String,
}

impl MenuEntry {
    pub fn new(button: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            button: button.into(),
            label: label.into(),
        }
    }
}

/// A named panel of buttons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub name: String,
    pub entries: Vec<MenuEntry>,
}

/// Discriminant of [`Entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Hologram,
    Variable,
    Animation,
    Menu,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Hologram => "hologram",
            EntityKind::Variable => "variable",
            EntityKind::Animation => "animation",
            EntityKind::Menu => "menu",
        };
        f.write_str(s)
    }
}

/// Payload of a `create` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "kebab-case")]
pub enum Entity {
    Hologram(Hologram),
    Variable(SyncVariable),
    Animation(Animation),
    Menu(Menu),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Hologram(h) => &h.name,
            Entity::Variable(v) => &v.name,
            Entity::Animation(a) => &a.name,
            Entity::Menu(m) => &m.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Hologram(_) => EntityKind::Hologram,
            Entity::Variable(_) => EntityKind::Variable,
            Entity::Animation(_) => EntityKind::Animation,
            Entity::Menu(_) => EntityKind::Menu,
        }
    }

    /// Every name this entity occupies: its own, plus one per menu button
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name()];
        if let Entity::Menu(menu) = self {
            names.extend(menu.entries.iter().map(|e| e.button.as_str()));
        }
        names
    }

    /// Structural checks that do not depend on session state
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Entity::Animation(a) if a.time_ms == 0 => Err(SyncError::InvalidInterval { name: a.name.clone() }),
            Entity::Menu(m) if m.entries.is_empty() => Err(SyncError::EmptyMenu { name: m.name.clone() }),
            Entity::Menu(_) => {
                let names = self.names();
                for (i, name) in names.iter().enumerate() {
                    if names[..i].contains(name) {
                        return Err(SyncError::NameConflict {
                            name: name.to_string(),
                        });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// The `(field, value)` pair of an `update` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "kebab-case")]
pub enum Change {
    Position(Vec3),
    Rotation(Quat),
    Scaling(Vec3),
    Color(Color3),
    Value(serde_json::Value),
}

impl Change {
    pub fn field(&self) -> &'static str {
        match self {
            Change::Position(_) => "position",
            Change::Rotation(_) => "rotation",
            Change::Scaling(_) => "scaling",
            Change::Color(_) => "color",
            Change::Value(_) => "value",
        }
    }
}
