//! Transform value types shared by holograms and manipulation samples

use serde::{Deserialize, Serialize};

/// 3-component vector used for positions and scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::zero()
    }
}

/// Rotation quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

/// Linear RGB colour with components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Bounding highlight shown on objects another participant is manipulating
    pub const fn remote_control() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

impl Default for Color3 {
    fn default() -> Self {
        Self::white()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Vec3::default(), Vec3::zero());
        assert_eq!(Quat::default(), Quat::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(Color3::default(), Color3::white());
    }

    #[test]
    fn test_color_from_yaml() {
        let c: Color3 = serde_yaml::from_str("{r: 0.5, g: 0.25, b: 1.0}").unwrap();
        assert_eq!(c, Color3::new(0.5, 0.25, 1.0));
    }
}
