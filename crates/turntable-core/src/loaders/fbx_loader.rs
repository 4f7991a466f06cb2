//! Autodesk FBX (binary 7.x) loading
//!
//! The node tree is read with `fbxcel`, then reduced to the three object
//! kinds the viewer needs: `Model` nodes (the transform hierarchy),
//! `Geometry` nodes (vertices and polygon indices), and object-object
//! connections linking geometry to models and models to their parents.

use fbxcel::low::v7400::AttributeValue;
use fbxcel::tree::any::AnyTree;
use fbxcel::tree::v7400::NodeHandle;
use glam::{EulerRot, Quat, Vec3};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::node::{MeshData, NodeKind, NodeTransform, SceneNode};
use crate::source::{Fetcher, ResourceLocator};

/// Object id FBX uses for the implicit scene root
const ROOT_ID: i64 = 0;

/// `Model` object with its local transform properties
#[derive(Debug, Clone, PartialEq)]
pub struct FbxModel {
    pub id: i64,
    pub name: String,
    pub translation: [f64; 3],
    /// Euler angles in degrees, FBX default XYZ order
    pub rotation: [f64; 3],
    pub scaling: [f64; 3],
}

/// `Geometry` object of class `Mesh`
#[derive(Debug, Clone, PartialEq)]
pub struct FbxGeometry {
    pub id: i64,
    pub vertices: Vec<f64>,
    /// Polygon corner indices; a negative value `i` closes the polygon with index `!i`
    pub polygon_vertex_index: Vec<i32>,
}

/// Object-object connection (`C: "OO", child, parent`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbxConnection {
    pub child: i64,
    pub parent: i64,
}

/// The subset of an FBX document used to build a scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FbxDocument {
    pub models: Vec<FbxModel>,
    pub geometries: Vec<FbxGeometry>,
    pub connections: Vec<FbxConnection>,
}

/// Fetch and convert an FBX resource
pub async fn load(fetcher: &Fetcher, locator: &ResourceLocator) -> Result<SceneNode, LoadError> {
    let bytes = fetcher.fetch(locator).await?;
    let document = read_document(&bytes)?;
    let name = locator.file_stem().unwrap_or_else(|| "fbx".to_string());
    build_scene(&document, name)
}

/// Parse binary FBX bytes into an [`FbxDocument`]
pub fn read_document(bytes: &[u8]) -> Result<FbxDocument, LoadError> {
    let tree = match AnyTree::from_seekable_reader(Cursor::new(bytes))
        .map_err(|e| LoadError::Fbx(e.to_string()))?
    {
        AnyTree::V7400(version, tree, _footer) => {
            debug!(version = ?version, "Parsed FBX 7.4 tree");
            tree
        }
        _ => {
            return Err(LoadError::Unsupported(
                "FBX versions other than 7.x".to_string(),
            ))
        }
    };

    let root = tree.root();
    let objects = root
        .children_by_name("Objects")
        .next()
        .ok_or_else(|| LoadError::Fbx("missing Objects section".to_string()))?;

    let mut document = FbxDocument::default();

    for object in objects.children() {
        match object.name() {
            "Model" => document.models.push(read_model(&object)?),
            "Geometry" => {
                if let Some(geometry) = read_geometry(&object)? {
                    document.geometries.push(geometry);
                }
            }
            _ => {}
        }
    }

    if let Some(connections) = root.children_by_name("Connections").next() {
        for connection in connections.children_by_name("C") {
            if let [AttributeValue::String(kind), AttributeValue::I64(child), AttributeValue::I64(parent), ..] =
                connection.attributes()
            {
                if kind == "OO" {
                    document.connections.push(FbxConnection {
                        child: *child,
                        parent: *parent,
                    });
                }
            }
        }
    }

    debug!(
        models = document.models.len(),
        geometries = document.geometries.len(),
        connections = document.connections.len(),
        "Read FBX objects"
    );

    Ok(document)
}

fn object_header(node: &NodeHandle<'_>) -> Result<(i64, String, String), LoadError> {
    match node.attributes() {
        [AttributeValue::I64(id), AttributeValue::String(name), AttributeValue::String(class), ..] => {
            // Names are stored as "Name\x00\x01Class"
            let name = name.split("\u{0}\u{1}").next().unwrap_or_default().to_string();
            Ok((*id, name, class.clone()))
        }
        _ => Err(LoadError::Fbx(format!(
            "{} object without id/name/class attributes",
            node.name()
        ))),
    }
}

fn read_model(node: &NodeHandle<'_>) -> Result<FbxModel, LoadError> {
    let (id, name, _class) = object_header(node)?;
    Ok(FbxModel {
        id,
        name,
        translation: vec3_property(node, "Lcl Translation").unwrap_or([0.0; 3]),
        rotation: vec3_property(node, "Lcl Rotation").unwrap_or([0.0; 3]),
        scaling: vec3_property(node, "Lcl Scaling").unwrap_or([1.0; 3]),
    })
}

fn read_geometry(node: &NodeHandle<'_>) -> Result<Option<FbxGeometry>, LoadError> {
    let (id, name, class) = object_header(node)?;
    if class != "Mesh" {
        debug!(geometry = %name, class = %class, "Skipping non-mesh FBX geometry");
        return Ok(None);
    }

    let vertices = match first_attribute(node, "Vertices") {
        Some(AttributeValue::ArrF64(values)) => values.clone(),
        Some(AttributeValue::ArrF32(values)) => values.iter().map(|&v| f64::from(v)).collect(),
        _ => return Err(LoadError::Fbx(format!("geometry {} has no Vertices array", name))),
    };

    let polygon_vertex_index = match first_attribute(node, "PolygonVertexIndex") {
        Some(AttributeValue::ArrI32(values)) => values.clone(),
        _ => {
            return Err(LoadError::Fbx(format!(
                "geometry {} has no PolygonVertexIndex array",
                name
            )))
        }
    };

    Ok(Some(FbxGeometry {
        id,
        vertices,
        polygon_vertex_index,
    }))
}

fn first_attribute<'a>(node: &NodeHandle<'a>, child: &str) -> Option<&'a AttributeValue> {
    node.children_by_name(child)
        .next()
        .and_then(|child| child.attributes().first())
}

fn vec3_property(node: &NodeHandle<'_>, property: &str) -> Option<[f64; 3]> {
    let properties = node.children_by_name("Properties70").next()?;
    properties.children_by_name("P").find_map(|p| match p.attributes() {
        [AttributeValue::String(name), _, _, _, x, y, z, ..] if name == property => {
            Some([as_f64(x)?, as_f64(y)?, as_f64(z)?])
        }
        _ => None,
    })
}

fn as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::F64(v) => Some(*v),
        AttributeValue::F32(v) => Some(f64::from(*v)),
        AttributeValue::I32(v) => Some(f64::from(*v)),
        AttributeValue::I64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Build the model hierarchy under a group root
pub fn build_scene(document: &FbxDocument, name: String) -> Result<SceneNode, LoadError> {
    if document.models.is_empty() {
        return Err(LoadError::Empty(format!("FBX resource {} has no models", name)));
    }

    let models: HashMap<i64, &FbxModel> = document.models.iter().map(|m| (m.id, m)).collect();
    let geometries: HashMap<i64, &FbxGeometry> =
        document.geometries.iter().map(|g| (g.id, g)).collect();

    let mut parents: HashMap<i64, i64> = HashMap::new();
    let mut model_geometry: HashMap<i64, Vec<i64>> = HashMap::new();

    for connection in &document.connections {
        if models.contains_key(&connection.child) {
            parents.insert(connection.child, connection.parent);
        } else if geometries.contains_key(&connection.child) && models.contains_key(&connection.parent) {
            model_geometry
                .entry(connection.parent)
                .or_default()
                .push(connection.child);
        }
    }

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut top_level = Vec::new();
    for model in &document.models {
        match parents.get(&model.id) {
            Some(parent) if *parent != ROOT_ID && models.contains_key(parent) => {
                children.entry(*parent).or_default().push(model.id)
            }
            _ => top_level.push(model.id),
        }
    }

    let context = BuildContext {
        models: &models,
        geometries: &geometries,
        children: &children,
        model_geometry: &model_geometry,
    };

    let mut root = SceneNode::new(name, NodeKind::Group);
    let mut visited = HashSet::new();
    for id in top_level {
        root.children.push(context.build_model(id, &mut visited)?);
    }

    Ok(root)
}

struct BuildContext<'a> {
    models: &'a HashMap<i64, &'a FbxModel>,
    geometries: &'a HashMap<i64, &'a FbxGeometry>,
    children: &'a HashMap<i64, Vec<i64>>,
    model_geometry: &'a HashMap<i64, Vec<i64>>,
}

impl BuildContext<'_> {
    fn build_model(&self, id: i64, visited: &mut HashSet<i64>) -> Result<SceneNode, LoadError> {
        if !visited.insert(id) {
            return Err(LoadError::Fbx(format!("model {} is part of a parent cycle", id)));
        }

        let model = self
            .models
            .get(&id)
            .ok_or_else(|| LoadError::Fbx(format!("unknown model {}", id)))?;

        let mut node = SceneNode::new(model.name.clone(), NodeKind::Group)
            .with_transform(model_transform(model));

        for geometry_id in self.model_geometry.get(&id).into_iter().flatten() {
            if let Some(geometry) = self.geometries.get(geometry_id) {
                match triangulate(geometry)? {
                    Some(mesh) => {
                        node.kind = NodeKind::Mesh;
                        node.meshes.push(mesh);
                    }
                    None => warn!(model = %model.name, "FBX geometry has no polygons"),
                }
            }
        }

        for child in self.children.get(&id).into_iter().flatten() {
            node.children.push(self.build_model(*child, visited)?);
        }

        Ok(node)
    }
}

fn model_transform(model: &FbxModel) -> NodeTransform {
    let [t_x, t_y, t_z] = model.translation;
    let [r_x, r_y, r_z] = model.rotation;
    let [s_x, s_y, s_z] = model.scaling;

    // FBX eEulerXYZ applies X first, then Y, then Z
    let rotation = Quat::from_euler(
        EulerRot::ZYX,
        (r_z as f32).to_radians(),
        (r_y as f32).to_radians(),
        (r_x as f32).to_radians(),
    );

    NodeTransform {
        translation: Vec3::new(t_x as f32, t_y as f32, t_z as f32),
        rotation,
        scale: Vec3::new(s_x as f32, s_y as f32, s_z as f32),
    }
}

/// Fan-triangulate the polygons of a geometry
fn triangulate(geometry: &FbxGeometry) -> Result<Option<MeshData>, LoadError> {
    let positions: Vec<[f32; 3]> = geometry
        .vertices
        .chunks_exact(3)
        .map(|v| [v[0] as f32, v[1] as f32, v[2] as f32])
        .collect();

    let mut indices = Vec::new();
    let mut polygon: Vec<u32> = Vec::new();

    for &raw in &geometry.polygon_vertex_index {
        let (index, closes) = if raw < 0 { (!raw, true) } else { (raw, false) };
        polygon.push(index as u32);

        if closes {
            for i in 1..polygon.len().saturating_sub(1) {
                indices.extend_from_slice(&[polygon[0], polygon[i], polygon[i + 1]]);
            }
            polygon.clear();
        }
    }

    if indices.is_empty() {
        return Ok(None);
    }

    MeshData::new(positions, None, Some(indices)).map(Some)
}
