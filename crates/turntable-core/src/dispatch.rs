//! Model dispatcher
//!
//! Picks the loader for a declared [`ModelFormat`] and returns its result as
//! a [`SceneNode`]. There is no retry, no caching, and no format sniffing:
//! a tag that does not match the content surfaces as the parser's error.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::LoadError;
use crate::format::ModelFormat;
use crate::loaders::json_loader::ObjectLoader;
use crate::loaders::{fbx_loader, gltf_loader, obj_loader};
use crate::node::SceneNode;
use crate::source::{Fetcher, ResourceLocator};

/// Loads models of any supported format through one shared fetcher
#[derive(Debug, Clone)]
pub struct ModelLoader {
    fetcher: Fetcher,
}

impl ModelLoader {
    /// Create a loader with its own HTTP client
    pub fn new(config: &FetchConfig) -> Result<Self, LoadError> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
        })
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Load the model at `url`, parsing it as `format`
    pub async fn load(&self, url: &str, format: ModelFormat) -> Result<SceneNode, LoadError> {
        let locator = ResourceLocator::parse(url)?;
        info!(url = %locator, format = %format, "Loading model");

        let result = match format {
            ModelFormat::Gltf => gltf_loader::load(&self.fetcher, &locator).await,
            ModelFormat::Obj => obj_loader::load(&self.fetcher, &locator).await,
            ModelFormat::Fbx => fbx_loader::load(&self.fetcher, &locator).await,
            ModelFormat::Json => self.load_json(locator.clone()).await,
        };

        match &result {
            Ok(node) => info!(
                url = %locator,
                format = %format,
                nodes = node.node_count(),
                meshes = node.mesh_count(),
                "Model loaded"
            ),
            Err(e) => warn!(url = %locator, format = %format, error = %e, "Model load failed"),
        }

        result
    }

    /// Adapt the callback-style object loader to an awaitable result
    async fn load_json(&self, locator: ResourceLocator) -> Result<SceneNode, LoadError> {
        let (tx, rx) = oneshot::channel();
        // Exactly one callback runs; whichever does takes the sender
        let on_load = Arc::new(Mutex::new(Some(tx)));
        let on_error = on_load.clone();

        ObjectLoader::new(self.fetcher.clone()).load(
            locator,
            move |node| reply(&on_load, Ok(node)),
            move |e| reply(&on_error, Err(e)),
        );

        rx.await.unwrap_or(Err(LoadError::Cancelled))
    }
}

type Reply = oneshot::Sender<Result<SceneNode, LoadError>>;

fn reply(sender: &Mutex<Option<Reply>>, result: Result<SceneNode, LoadError>) {
    let sender = sender
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(sender) = sender {
        if sender.send(result).is_err() {
            debug!("Object loader result arrived after the caller went away");
        }
    }
}

/// Load a model with a default-configured loader
pub async fn load_model(url: &str, format: ModelFormat) -> Result<SceneNode, LoadError> {
    ModelLoader::new(&FetchConfig::default())?.load(url, format).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use tempfile::TempDir;

    const OBJ: &str = "o Tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    const JSON: &str = r#"{
        "metadata": { "version": 4.6, "type": "Object" },
        "geometries": [],
        "object": { "uuid": "g-1", "type": "Group", "name": "Empty" }
    }"#;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_dispatch_by_format() {
        let temp_dir = TempDir::new().unwrap();
        let obj = write(&temp_dir, "tri.obj", OBJ.as_bytes());
        let json = write(&temp_dir, "empty.json", JSON.as_bytes());

        let node = load_model(&obj, ModelFormat::Obj).await.unwrap();
        assert_eq!(node.kind, NodeKind::Group);
        assert_eq!(node.mesh_count(), 1);

        let node = load_model(&json, ModelFormat::Json).await.unwrap();
        assert_eq!(node.kind, NodeKind::Group);
        assert_eq!(node.name, "Empty");
    }

    #[tokio::test]
    async fn test_mismatched_tag_is_parser_error() {
        let temp_dir = TempDir::new().unwrap();
        let obj = write(&temp_dir, "tri.obj", OBJ.as_bytes());
        let json = write(&temp_dir, "empty.json", JSON.as_bytes());

        assert!(matches!(load_model(&obj, ModelFormat::Gltf).await, Err(LoadError::Gltf(_))));
        assert!(matches!(load_model(&obj, ModelFormat::Json).await, Err(LoadError::Json(_))));
        assert!(matches!(load_model(&obj, ModelFormat::Fbx).await, Err(LoadError::Fbx(_))));
        assert!(matches!(load_model(&json, ModelFormat::Obj).await, Err(LoadError::Empty(_))));
    }

    #[tokio::test]
    async fn test_json_error_propagates_from_callback() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        let err = load_model(&missing.to_string_lossy(), ModelFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_reply_delivers_first_result_only() {
        let (tx, rx) = oneshot::channel();
        let sender = Mutex::new(Some(tx));

        reply(&sender, Err(LoadError::Empty("first".to_string())));
        reply(&sender, Ok(SceneNode::new("late", NodeKind::Group)));

        assert!(matches!(rx.await.unwrap(), Err(LoadError::Empty(ref msg)) if msg == "first"));
        assert!(sender.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_locator() {
        let err = load_model("", ModelFormat::Obj).await.unwrap_err();
        assert!(matches!(err, LoadError::InvalidLocator(_)));
    }
}
