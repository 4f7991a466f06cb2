//! Light rig around the spinning model

use serde::{Deserialize, Serialize};

/// Uniform fill light
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientSettings {
    #[serde(default = "default_ambient_intensity")]
    pub intensity: f32,
}

impl Default for AmbientSettings {
    fn default() -> Self {
        Self {
            intensity: default_ambient_intensity(),
        }
    }
}

fn default_ambient_intensity() -> f32 {
    0.5
}

/// Cone light aimed at the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotSettings {
    #[serde(default = "default_spot_position")]
    pub position: [f32; 3],
    /// Half-angle of the cone in radians
    #[serde(default = "default_spot_angle")]
    pub angle: f32,
    /// Fraction of the cone that falls off toward the edge (0 = hard, 1 = fully soft)
    #[serde(default = "default_spot_penumbra")]
    pub penumbra: f32,
}

impl Default for SpotSettings {
    fn default() -> Self {
        Self {
            position: default_spot_position(),
            angle: default_spot_angle(),
            penumbra: default_spot_penumbra(),
        }
    }
}

impl SpotSettings {
    /// Angle where the falloff starts
    pub fn inner_angle(&self) -> f32 {
        self.angle * (1.0 - self.penumbra.clamp(0.0, 1.0))
    }
}

fn default_spot_position() -> [f32; 3] {
    [10.0, 10.0, 10.0]
}

fn default_spot_angle() -> f32 {
    0.15
}

fn default_spot_penumbra() -> f32 {
    1.0
}

/// Omnidirectional light
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSettings {
    #[serde(default = "default_point_position")]
    pub position: [f32; 3],
}

impl Default for PointSettings {
    fn default() -> Self {
        Self {
            position: default_point_position(),
        }
    }
}

fn default_point_position() -> [f32; 3] {
    [-10.0, -10.0, -10.0]
}

/// Ambient, spot, and point light around the viewer's model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    #[serde(default)]
    pub ambient: AmbientSettings,
    #[serde(default)]
    pub spot: SpotSettings,
    #[serde(default)]
    pub point: PointSettings,
}
