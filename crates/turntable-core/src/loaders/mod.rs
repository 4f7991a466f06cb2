//! Per-format loaders
//!
//! Each loader fetches the resource through a [`crate::source::Fetcher`],
//! hands the bytes to the format's parser crate, and converts the parsed
//! result into a [`crate::node::SceneNode`] tree.

pub mod fbx_loader;
pub mod gltf_loader;
pub mod json_loader;
pub mod obj_loader;
