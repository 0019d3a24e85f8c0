use thiserror::Error;

/// Errors surfaced by scene-tree operations.
///
/// Both kinds are recoverable: the tree is left untouched whenever an
/// operation fails, so the caller can report the message and carry on.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("scene is full: {0}")]
    FullScene(String),

    #[error("no such node: {0}")]
    NoSuchNode(String),
}

pub type SceneResult<T> = Result<T, SceneError>;
