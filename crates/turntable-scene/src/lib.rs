//! Turntable Scene - Bevy display for the rotating viewer
//!
//! This crate wires the renderer-agnostic [`turntable_core::RotatingViewer`]
//! into a Bevy app: a light rig and camera, a bridge that runs model loads
//! on a tokio runtime, and systems that keep exactly one spinning model
//! entity in sync with the viewer state.

pub mod models;
pub mod scene;

use bevy::prelude::*;
use turntable_core::{Config, ModelFormat, RotatingViewer};

pub use models::{LoadBridge, ModelRoot, Viewer, ViewerProps};

/// Plugin that sets up the lit scene and the spinning model slot
///
/// The app must also hold a [`LoadBridge`] resource; building one can fail,
/// so the binary creates it and inserts it before adding this plugin.
pub struct TurntablePlugin {
    pub config: Config,
    pub url: String,
    pub format: ModelFormat,
}

impl Plugin for TurntablePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(scene::Lighting(self.config.lighting))
            .insert_resource(Viewer(RotatingViewer::new(&self.config.viewer)))
            .insert_resource(ViewerProps {
                url: self.url.clone(),
                format: self.format,
                visible: self.config.viewer.visible,
            })
            .add_plugins(scene::SceneSetupPlugin)
            .add_plugins(models::ModelsPlugin);
    }
}
