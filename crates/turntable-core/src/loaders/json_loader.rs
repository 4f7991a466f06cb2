//! three.js JSON Object Format 4 loading
//!
//! [`ObjectLoader`] keeps the callback shape of the legacy three.js
//! `ObjectLoader.load(url, onLoad, onError)`; the dispatcher adapts it to an
//! awaitable result.

use glam::Mat4;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::LoadError;
use crate::node::{MeshData, NodeKind, NodeTransform, SceneNode};
use crate::source::{Fetcher, ResourceLocator};

#[derive(Debug, Deserialize)]
struct ObjectFile {
    metadata: Metadata,
    #[serde(default)]
    geometries: Vec<GeometryDef>,
    object: Option<ObjectDef>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    version: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeometryDef {
    uuid: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<BufferGeometryData>,
}

#[derive(Debug, Deserialize)]
struct BufferGeometryData {
    attributes: GeometryAttributes,
    #[serde(default)]
    index: Option<IndexDef>,
}

#[derive(Debug, Deserialize)]
struct GeometryAttributes {
    position: AttributeDef,
    #[serde(default)]
    normal: Option<AttributeDef>,
}

#[derive(Debug, Deserialize)]
struct AttributeDef {
    #[serde(rename = "itemSize")]
    item_size: usize,
    array: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct IndexDef {
    array: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ObjectDef {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    uuid: String,
    /// Column-major local matrix
    #[serde(default)]
    matrix: Option<[f32; 16]>,
    #[serde(default)]
    geometry: Option<String>,
    #[serde(default)]
    children: Vec<ObjectDef>,
}

/// Callback-style loader for three.js object JSON
#[derive(Debug, Clone)]
pub struct ObjectLoader {
    fetcher: Fetcher,
}

impl ObjectLoader {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Start loading in the background; exactly one of the callbacks runs
    ///
    /// Must be called from within a tokio runtime.
    pub fn load<L, E>(&self, locator: ResourceLocator, on_load: L, on_error: E)
    where
        L: FnOnce(SceneNode) + Send + 'static,
        E: FnOnce(LoadError) + Send + 'static,
    {
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            let result = match fetcher.fetch(&locator).await {
                Ok(bytes) => parse(&bytes),
                Err(e) => Err(e),
            };

            match result {
                Ok(node) => on_load(node),
                Err(e) => on_error(e),
            }
        });
    }
}

/// Parse a three.js object JSON document
pub fn parse(bytes: &[u8]) -> Result<SceneNode, LoadError> {
    let file: ObjectFile = serde_json::from_slice(bytes)?;

    if file.metadata.kind != "Object" {
        return Err(LoadError::Unsupported(format!(
            "three.js JSON of type {}",
            file.metadata.kind
        )));
    }
    debug!(version = ?file.metadata.version, geometries = file.geometries.len(), "Parsing three.js object JSON");

    let object = file
        .object
        .ok_or_else(|| LoadError::Empty("three.js JSON has no object".to_string()))?;

    let geometries: HashMap<&str, &GeometryDef> = file
        .geometries
        .iter()
        .map(|g| (g.uuid.as_str(), g))
        .collect();

    convert_object(&object, &geometries)
}

fn convert_object(object: &ObjectDef, geometries: &HashMap<&str, &GeometryDef>) -> Result<SceneNode, LoadError> {
    let kind = match object.kind.as_str() {
        "Scene" => NodeKind::Scene,
        "Mesh" | "SkinnedMesh" => NodeKind::Mesh,
        _ => NodeKind::Group,
    };

    let name = if object.name.is_empty() {
        object.uuid.clone()
    } else {
        object.name.clone()
    };

    let transform = object
        .matrix
        .map(|m| NodeTransform::from_matrix(Mat4::from_cols_array(&m)))
        .unwrap_or_default();

    let mut node = SceneNode::new(name, kind).with_transform(transform);

    if kind == NodeKind::Mesh {
        let uuid = object.geometry.as_deref().ok_or_else(|| {
            LoadError::InvalidMesh(format!("mesh {} references no geometry", node.name))
        })?;
        let geometry = geometries.get(uuid).ok_or_else(|| {
            LoadError::InvalidMesh(format!("mesh {} references unknown geometry {}", node.name, uuid))
        })?;
        node.meshes.push(convert_geometry(geometry)?);
    }

    for child in &object.children {
        node.children.push(convert_object(child, geometries)?);
    }

    Ok(node)
}

fn convert_geometry(geometry: &GeometryDef) -> Result<MeshData, LoadError> {
    if geometry.kind != "BufferGeometry" {
        return Err(LoadError::Unsupported(format!(
            "three.js geometry type {}",
            geometry.kind
        )));
    }

    let data = geometry.data.as_ref().ok_or_else(|| {
        LoadError::InvalidMesh(format!("geometry {} has no data", geometry.uuid))
    })?;

    let positions = vec3_attribute(&data.attributes.position, "position")?;
    let normals = data
        .attributes
        .normal
        .as_ref()
        .map(|normal| vec3_attribute(normal, "normal"))
        .transpose()?;
    let indices = data.index.as_ref().map(|index| index.array.clone());

    MeshData::new(positions, normals, indices)
}

fn vec3_attribute(attribute: &AttributeDef, name: &str) -> Result<Vec<[f32; 3]>, LoadError> {
    if attribute.item_size != 3 || attribute.array.len() % 3 != 0 {
        return Err(LoadError::InvalidMesh(format!(
            "{} attribute with itemSize {} and {} values",
            name,
            attribute.item_size,
            attribute.array.len()
        )));
    }

    Ok(attribute
        .array
        .chunks_exact(3)
        .map(|v| [v[0], v[1], v[2]])
        .collect())
}
