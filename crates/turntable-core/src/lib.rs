//! Turntable Core - Model dispatch, viewer state, and module census
//!
//! This crate provides the renderer-agnostic pieces of Turntable:
//! - Model format tags and the dispatcher that picks a loader per format
//! - Normalized scene node trees produced by every loader
//! - Resource fetching for local paths and remote URLs
//! - The rotating viewer state machine (last-request-wins loading, spin)
//! - Module census over an injected module table
//! - Configuration loading

pub mod census;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod lighting;
pub mod loaders;
pub mod node;
pub mod source;
pub mod viewer;

pub use glam;

pub use census::{Census, ModuleEntry, ModuleTable};
pub use config::{Config, ConfigError};
pub use dispatch::{load_model, ModelLoader};
pub use error::LoadError;
pub use format::ModelFormat;
pub use lighting::LightRig;
pub use node::{MeshData, NodeKind, NodeTransform, SceneNode};
pub use source::{Fetcher, ResourceLocator};
pub use viewer::{Completion, LoadTicket, ModelTarget, RequestToken, RotatingViewer, ViewerState};
