//! Core primitives shared by the tree engine
//!
//! - Entities: predefined entities, character references, escaping
//! - DTD: declaration payloads and lookup tables
//! - QName: qualified-name building, splitting and validation

pub mod dtd;
pub mod entities;
pub mod qname;
