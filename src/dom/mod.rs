//! DOM Module - Arena-based mutable document trees
//!
//! - `engine`: the node arena, string handles and navigation
//! - `node`: node kinds and per-kind payloads
//! - `strings`: per-document dictionary for interned names
//! - `document`, `dtd`: documents, subsets, declaration tables, ID index
//! - `build`: node constructors
//! - `tree`: linking, coalescing, replacement, teardown
//! - `namespace`: prefix/href lookup and reconciliation
//! - `content`: text values and entity substitution
//! - `props`: attributes and the xml:* properties
//! - `path`: diagnostic node paths
//! - `copy`: node, list, DTD and document copies

pub mod build;
pub mod content;
pub mod copy;
pub mod document;
pub mod dtd;
pub mod engine;
pub mod namespace;
pub mod node;
pub mod path;
pub mod props;
pub mod strings;
pub mod tree;

pub use content::NodeList;
pub use copy::CopyDepth;
pub use dtd::EntityLookup;
pub use engine::Engine;
pub use namespace::{NsScope, XML_NAMESPACE};
pub use node::{EntityChildren, NodeData, NodeId, NodeKind, TextTag, XmlNode};
pub use strings::{NameRef, StringPool};
