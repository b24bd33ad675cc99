//! Arena-based document tree
//!
//! The buffered half of the split design:
//! - Arena allocation for nodes, NodeId (u32) indices
//! - String interning for element and attribute names
//! - Per-node source spans for verbatim subtree serialization

pub mod document;
pub mod node;
pub mod strings;

pub use document::Document;
pub use node::{AttributeEntry, Node, NodeId, NodeKind};
pub use strings::StringPool;
