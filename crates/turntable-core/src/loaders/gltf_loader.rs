//! glTF / GLB loading
//!
//! The result is the document's default scene (or its first scene), not the
//! raw document. Buffers come from the GLB binary chunk, base64 `data:` URIs,
//! or sibling resources fetched relative to the model's locator.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use glam::{Quat, Vec3};
use gltf::buffer::Source;
use gltf::mesh::Mode;
use gltf::Semantic;
use tracing::debug;

use crate::error::LoadError;
use crate::node::{MeshData, NodeKind, NodeTransform, SceneNode};
use crate::source::{Fetcher, ResourceLocator};

/// Fetch and convert a glTF or GLB resource
pub async fn load(fetcher: &Fetcher, locator: &ResourceLocator) -> Result<SceneNode, LoadError> {
    let bytes = fetcher.fetch(locator).await?;
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(&bytes)?;
    let buffers = resolve_buffers(fetcher, locator, &document, blob).await?;
    build_scene(&document, &buffers, locator)
}

async fn resolve_buffers(
    fetcher: &Fetcher,
    locator: &ResourceLocator,
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();

    for buffer in document.buffers() {
        let mut data = match buffer.source() {
            Source::Bin => blob.take().ok_or_else(|| {
                LoadError::Unsupported("glTF buffer refers to a missing GLB binary chunk".to_string())
            })?,
            Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(uri)?,
            Source::Uri(uri) => {
                let target = locator.join(uri)?;
                debug!(buffer = buffer.index(), target = %target, "Fetching external glTF buffer");
                fetcher.fetch(&target).await?
            }
        };

        if data.len() < buffer.length() {
            return Err(LoadError::InvalidMesh(format!(
                "glTF buffer {} has {} bytes, declared {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }

        // Accessor reads assume 4-byte aligned buffer ends
        while data.len() % 4 != 0 {
            data.push(0);
        }
        buffers.push(data);
    }

    Ok(buffers)
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, LoadError> {
    let (_, payload) = uri
        .split_once(";base64,")
        .ok_or_else(|| LoadError::Unsupported("glTF data URI without base64 payload".to_string()))?;

    STANDARD
        .decode(payload)
        .map_err(|e| LoadError::Unsupported(format!("glTF data URI is not valid base64: {}", e)))
}

fn build_scene(
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    locator: &ResourceLocator,
) -> Result<SceneNode, LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::Empty(format!("{} declares no scenes", locator)))?;

    let name = scene
        .name()
        .map(str::to_string)
        .or_else(|| locator.file_stem())
        .unwrap_or_else(|| format!("scene_{}", scene.index()));

    let mut root = SceneNode::new(name, NodeKind::Scene);
    for node in scene.nodes() {
        root.children.push(convert_node(&node, buffers)?);
    }

    Ok(root)
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[Vec<u8>]) -> Result<SceneNode, LoadError> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let transform = NodeTransform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    };

    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));

    let mut converted = SceneNode::new(name, NodeKind::Group).with_transform(transform);

    if let Some(mesh) = node.mesh() {
        converted.kind = NodeKind::Mesh;
        for primitive in mesh.primitives() {
            converted.meshes.push(convert_primitive(&primitive, buffers)?);
        }
    }

    for child in node.children() {
        converted.children.push(convert_node(&child, buffers)?);
    }

    Ok(converted)
}

fn convert_primitive(primitive: &gltf::Primitive<'_>, buffers: &[Vec<u8>]) -> Result<MeshData, LoadError> {
    if primitive.mode() != Mode::Triangles {
        return Err(LoadError::Unsupported(format!(
            "glTF primitive mode {:?}",
            primitive.mode()
        )));
    }

    let position_accessor = primitive
        .get(&Semantic::Positions)
        .ok_or_else(|| LoadError::InvalidMesh("glTF primitive without POSITION".to_string()))?;
    check_accessor(&position_accessor, buffers)?;
    if let Some(accessor) = primitive.get(&Semantic::Normals) {
        check_accessor(&accessor, buffers)?;
    }
    if let Some(accessor) = primitive.indices() {
        check_accessor(&accessor, buffers)?;
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| {
            LoadError::InvalidMesh(format!(
                "glTF POSITION accessor {} could not be read",
                position_accessor.index()
            ))
        })?
        .collect();
    let normals = reader.read_normals().map(|normals| normals.collect());
    let indices = reader.read_indices().map(|indices| indices.into_u32().collect());

    MeshData::new(positions, normals, indices)
}

/// Reject accessors the reader cannot iterate safely
///
/// An empty accessor or one whose last element ends past its buffer view
/// (or buffer) is refused up front; `gltf`'s reader assumes both hold.
fn check_accessor(accessor: &gltf::Accessor<'_>, buffers: &[Vec<u8>]) -> Result<(), LoadError> {
    let count = accessor.count();
    if count == 0 {
        return Err(LoadError::InvalidMesh(format!(
            "glTF accessor {} has no elements",
            accessor.index()
        )));
    }

    let Some(view) = accessor.view() else {
        // Sparse-only accessors carry no view to overrun
        return Ok(());
    };

    let size = accessor.size();
    let stride = view.stride().unwrap_or(size);
    let end = stride
        .checked_mul(count - 1)
        .and_then(|span| span.checked_add(accessor.offset()))
        .and_then(|span| span.checked_add(size));
    let buffer_len = buffers.get(view.buffer().index()).map_or(0, Vec::len);
    let view_end = view.offset().checked_add(view.length());

    match (end, view_end) {
        (Some(end), Some(view_end)) if end <= view.length() && view_end <= buffer_len => Ok(()),
        _ => Err(LoadError::InvalidMesh(format!(
            "glTF accessor {} ({} elements of {} bytes) runs past buffer view {}",
            accessor.index(),
            count,
            size,
            view.index()
        ))),
    }
}
