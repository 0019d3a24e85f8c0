pub mod cli;
pub mod errors;
pub mod node;
pub mod tree;
pub mod util;

pub use errors::{SceneError, SceneResult};
pub use node::{SceneNode, Slot};
pub use tree::{SceneIter, SceneTree};
