//! Normalized scene node trees
//!
//! Every loader converts its parser's output into a [`SceneNode`] tree so
//! the viewer only ever deals with one displayable type.

use glam::{Mat4, Quat, Vec3};

use crate::error::LoadError;

/// Role of a node in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a glTF scene (or a three.js `Scene` object)
    Scene,
    /// Pure transform node, possibly with children
    Group,
    /// Node carrying one or more meshes
    Mesh,
}

/// Local transform relative to the parent node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl NodeTransform {
    pub const IDENTITY: NodeTransform = NodeTransform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Decompose an affine matrix
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Triangle-list geometry
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    /// Build a mesh, checking that indices and normals agree with the positions
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Option<Vec<[f32; 3]>>,
        indices: Option<Vec<u32>>,
    ) -> Result<Self, LoadError> {
        if positions.is_empty() {
            return Err(LoadError::InvalidMesh("mesh has no vertices".to_string()));
        }

        if let Some(ref normals) = normals {
            if normals.len() != positions.len() {
                return Err(LoadError::InvalidMesh(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    positions.len()
                )));
            }
        }

        if let Some(ref indices) = indices {
            if indices.len() % 3 != 0 {
                return Err(LoadError::InvalidMesh(format!(
                    "index count {} is not a multiple of 3",
                    indices.len()
                )));
            }
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
                return Err(LoadError::InvalidMesh(format!(
                    "index {} out of range for {} vertices",
                    bad,
                    positions.len()
                )));
            }
        } else if positions.len() % 3 != 0 {
            return Err(LoadError::InvalidMesh(format!(
                "non-indexed vertex count {} is not a multiple of 3",
                positions.len()
            )));
        }

        Ok(Self {
            positions,
            normals,
            indices,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }
}

/// A renderable node with a local transform, optional meshes, and children
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub transform: NodeTransform,
    pub meshes: Vec<MeshData>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Empty node of the given kind
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: NodeTransform::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first pre-order visit of this node and its descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a SceneNode, usize)) {
        visit(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, visit);
        }
    }

    /// First node (pre-order) with the given name
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, _| count += 1);
        count
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node, _| count += node.meshes.len());
        count
    }

    pub fn vertex_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node, _| {
            count += node.meshes.iter().map(MeshData::vertex_count).sum::<usize>()
        });
        count
    }

    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |node, _| {
            count += node.meshes.iter().map(MeshData::triangle_count).sum::<usize>()
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> MeshData {
        MeshData::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            Some(vec![0, 1, 2]),
        )
        .unwrap()
    }

    #[test]
    fn test_mesh_validation() {
        assert!(MeshData::new(Vec::new(), None, None).is_err());
        assert!(MeshData::new(vec![[0.0; 3]; 3], None, Some(vec![0, 1, 3])).is_err());
        assert!(MeshData::new(vec![[0.0; 3]; 3], Some(vec![[0.0; 3]; 2]), None).is_err());
        assert!(MeshData::new(vec![[0.0; 3]; 4], None, None).is_err());
        assert!(MeshData::new(vec![[0.0; 3]; 3], None, None).is_ok());
    }

    #[test]
    fn test_tree_counts() {
        let root = SceneNode::new("root", NodeKind::Group)
            .with_child(SceneNode::new("a", NodeKind::Mesh).with_mesh(triangle()))
            .with_child(
                SceneNode::new("b", NodeKind::Group)
                    .with_child(SceneNode::new("c", NodeKind::Mesh).with_mesh(triangle())),
            );

        assert_eq!(root.node_count(), 4);
        assert_eq!(root.mesh_count(), 2);
        assert_eq!(root.vertex_count(), 6);
        assert_eq!(root.triangle_count(), 2);
        assert_eq!(root.find("c").map(|n| n.kind), Some(NodeKind::Mesh));
        assert!(root.find("missing").is_none());
    }

    #[test]
    fn test_walk_depths() {
        let root = SceneNode::new("root", NodeKind::Scene)
            .with_child(SceneNode::new("child", NodeKind::Group).with_child(SceneNode::new("leaf", NodeKind::Group)));

        let mut seen = Vec::new();
        root.walk(&mut |node, depth| seen.push((node.name.clone(), depth)));
        assert_eq!(
            seen,
            vec![
                ("root".to_string(), 0),
                ("child".to_string(), 1),
                ("leaf".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_transform_matrix_decomposition() {
        let transform = NodeTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(2.0),
        };
        let back = NodeTransform::from_matrix(transform.to_matrix());
        assert!(back.translation.abs_diff_eq(transform.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(transform.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(transform.scale, 1e-5));
    }
}
