//! Dataset sources.
//!
//! The engine never touches files or the network itself; it asks a
//! [`DatasetSource`] for datasets by name. Embedding applications implement
//! the trait over whatever storage they use.

pub mod memory;
pub mod traits;
