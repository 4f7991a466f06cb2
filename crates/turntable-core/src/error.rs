//! Model loading errors

use thiserror::Error;

/// Failure while fetching or parsing a model resource.
///
/// Every variant is a parser- or transport-level failure; the dispatcher
/// never produces a partially built node alongside an error.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
    #[error("Invalid resource locator: {0}")]
    InvalidLocator(String),
    #[error("Unsupported model format tag: {0}")]
    UnsupportedFormat(String),
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("OBJ parse error: {0}")]
    Obj(#[from] tobj::LoadError),
    #[error("FBX parse error: {0}")]
    Fbx(String),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported feature: {0}")]
    Unsupported(String),
    #[error("Invalid mesh data: {0}")]
    InvalidMesh(String),
    #[error("Resource contains no loadable objects: {0}")]
    Empty(String),
    #[error("Loader finished without reporting a result")]
    Cancelled,
    #[error("Load task aborted: {0}")]
    Aborted(String),
}
