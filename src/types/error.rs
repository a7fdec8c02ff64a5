use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("invalid octree: {0}")]
    InvalidOctree(String),
    /// The cache header disagrees with the imported map. Recoverable: rebuild.
    #[error("cache mismatch: {0}")]
    CacheMismatch(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("likelihood grid is not ready (state: {0})")]
    NotReady(&'static str),
}
