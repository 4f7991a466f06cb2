//! Wavefront OBJ loading

use std::path::Path;
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::node::{MeshData, NodeKind, SceneNode};
use crate::source::{Fetcher, ResourceLocator};

/// Fetch and convert an OBJ resource
pub async fn load(fetcher: &Fetcher, locator: &ResourceLocator) -> Result<SceneNode, LoadError> {
    let bytes = fetcher.fetch(locator).await?;
    let name = locator.file_stem().unwrap_or_else(|| "obj".to_string());
    parse(&bytes, name)
}

/// Parse OBJ text into a group with one mesh child per object
///
/// Material libraries are never fetched; geometry is all the viewer uses.
pub fn parse(bytes: &[u8], name: String) -> Result<SceneNode, LoadError> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };

    let mut reader = bytes;
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &options, |path: &Path| {
        debug!(mtllib = %path.display(), "Skipping OBJ material library");
        Err(tobj::LoadError::OpenFileFailed)
    })?;

    let mut root = SceneNode::new(name, NodeKind::Group);

    for model in models {
        let positions: Vec<[f32; 3]> = model
            .mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();

        if positions.is_empty() {
            warn!(object = %model.name, "OBJ object has no face geometry, skipping");
            continue;
        }

        let normals = if model.mesh.normals.len() == model.mesh.positions.len() {
            Some(
                model
                    .mesh
                    .normals
                    .chunks_exact(3)
                    .map(|n| [n[0], n[1], n[2]])
                    .collect(),
            )
        } else {
            None
        };

        let mesh = MeshData::new(positions, normals, Some(model.mesh.indices))?;
        root.children
            .push(SceneNode::new(model.name, NodeKind::Mesh).with_mesh(mesh));
    }

    if root.children.is_empty() {
        return Err(LoadError::Empty(format!("OBJ resource {} has no objects", root.name)));
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use tempfile::TempDir;

    const TWO_OBJECTS: &str = "\
mtllib shapes.mtl
o Quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
o Tri
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

    #[test]
    fn test_parse_objects() {
        let root = parse(TWO_OBJECTS.as_bytes(), "shapes".to_string()).unwrap();

        assert_eq!(root.kind, NodeKind::Group);
        assert_eq!(root.name, "shapes");
        assert_eq!(root.children.len(), 2);

        let quad = root.find("Quad").unwrap();
        assert_eq!(quad.kind, NodeKind::Mesh);
        assert_eq!(quad.meshes[0].vertex_count(), 4);
        assert_eq!(quad.meshes[0].triangle_count(), 2);

        let tri = root.find("Tri").unwrap();
        assert_eq!(tri.meshes[0].triangle_count(), 1);
        assert_eq!(root.triangle_count(), 3);
    }

    #[test]
    fn test_rejects_json_content() {
        let json = br#"{"metadata": {"type": "Object"}, "object": {"type": "Scene"}}"#;
        let err = parse(json, "scene".to_string()).unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("shapes.obj");
        std::fs::write(&path, TWO_OBJECTS).unwrap();

        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let root = load(&fetcher, &ResourceLocator::Local(path)).await.unwrap();
        assert_eq!(root.name, "shapes");
        assert_eq!(root.mesh_count(), 2);
    }
}
