pub mod backends;
pub mod template;

pub use template::{ObjectStore, StoredObject};
