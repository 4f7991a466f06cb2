//! Model format tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// Declared format of a model resource. Selects the loader; nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Gltf,
    Obj,
    Fbx,
    Json,
}

impl ModelFormat {
    /// All formats, in declaration order
    pub const ALL: [ModelFormat; 4] = [
        ModelFormat::Gltf,
        ModelFormat::Obj,
        ModelFormat::Fbx,
        ModelFormat::Json,
    ];

    /// Canonical lower-case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::Gltf => "gltf",
            ModelFormat::Obj => "obj",
            ModelFormat::Fbx => "fbx",
            ModelFormat::Json => "json",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFormat {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gltf" | "glb" => Ok(ModelFormat::Gltf),
            "obj" => Ok(ModelFormat::Obj),
            "fbx" => Ok(ModelFormat::Fbx),
            "json" => Ok(ModelFormat::Json),
            _ => Err(LoadError::UnsupportedFormat(s.to_string())),
        }
    }
}
