use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or parse one of the startup assets.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unable to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse mesh {path}: {message}")]
    Mesh { path: PathBuf, message: String },
    #[error("unsupported mesh format for {0} (expected .xml or .obj)")]
    UnsupportedFormat(PathBuf),
}

/// Fatal initialization failures. Every variant terminates the demo.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("failed to compile shader program {program}: {message}")]
    ShaderCompile { program: String, message: String },
    #[error("shadow depth target is incomplete: {0}")]
    IncompleteDepthTarget(String),
    #[error("failed to acquire GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(String),
    #[error("failed to create window surface: {0}")]
    Surface(String),
}
