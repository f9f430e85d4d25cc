//! DTD Declaration Tables
//!
//! Typed declaration payloads plus the lookup tables a DTD node carries.
//! Tables map names to declaration nodes in the engine arena; the DTD
//! owns every node listed here.

use std::collections::HashMap;

use crate::dom::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSpec {
    Empty,
    Any,
    Mixed(Vec<String>),      // List of allowed element names
    Children(String),        // Raw content model
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
    Notation(Vec<String>),
    Enumeration(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

impl AttDefault {
    /// Value supplied when the attribute is absent
    #[inline]
    pub fn value(&self) -> Option<&str> {
        match self {
            AttDefault::Fixed(v) | AttDefault::Default(v) => Some(v),
            AttDefault::Required | AttDefault::Implied => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    InternalGeneral,
    ExternalGeneralParsed,
    ExternalGeneralUnparsed,
    InternalParameter,
    ExternalParameter,
    InternalPredefined,
}

impl EntityType {
    #[inline]
    pub fn is_parameter(self) -> bool {
        matches!(self, EntityType::InternalParameter | EntityType::ExternalParameter)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotationDecl {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

/// Name -> declaration node tables of one DTD
#[derive(Debug, Clone, Default)]
pub struct DtdTables {
    /// General entities
    pub entities: HashMap<String, NodeId>,
    /// Parameter entities
    pub pentities: HashMap<String, NodeId>,
    /// Element declarations keyed by (name, prefix)
    pub elements: HashMap<(String, Option<String>), NodeId>,
    /// Attribute declarations keyed by (element, name, prefix)
    pub attributes: HashMap<(String, String, Option<String>), NodeId>,
    pub notations: HashMap<String, NodeId>,
}

impl DtdTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, name: &str, parameter: bool) -> Option<NodeId> {
        let map = if parameter { &self.pentities } else { &self.entities };
        map.get(name).copied()
    }

    /// Register an entity; the first declaration wins.
    /// Returns the node already registered under that name, if any.
    pub fn insert_entity(&mut self, name: &str, parameter: bool, id: NodeId) -> Option<NodeId> {
        let map = if parameter { &mut self.pentities } else { &mut self.entities };
        if let Some(&existing) = map.get(name) {
            return Some(existing);
        }
        map.insert(name.to_string(), id);
        None
    }

    pub fn element(&self, name: &str, prefix: Option<&str>) -> Option<NodeId> {
        self.elements
            .get(&(name.to_string(), prefix.map(str::to_string)))
            .copied()
    }

    pub fn attribute(&self, elem: &str, name: &str, prefix: Option<&str>) -> Option<NodeId> {
        self.attributes
            .get(&(elem.to_string(), name.to_string(), prefix.map(str::to_string)))
            .copied()
    }

    pub fn notation(&self, name: &str) -> Option<NodeId> {
        self.notations.get(name).copied()
    }

    /// Every declaration node the tables own
    pub fn owned_nodes(&self) -> Vec<NodeId> {
        self.entities
            .values()
            .chain(self.pentities.values())
            .chain(self.elements.values())
            .chain(self.attributes.values())
            .chain(self.notations.values())
            .copied()
            .collect()
    }

    /// True when `id` is one of the table-owned declarations
    pub fn owns(&self, id: NodeId) -> bool {
        self.entities.values().any(|&n| n == id)
            || self.pentities.values().any(|&n| n == id)
            || self.elements.values().any(|&n| n == id)
            || self.attributes.values().any(|&n| n == id)
            || self.notations.values().any(|&n| n == id)
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pentities.clear();
        self.elements.clear();
        self.attributes.clear();
        self.notations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entity_wins() {
        let mut tables = DtdTables::new();
        assert_eq!(tables.insert_entity("e", false, 4), None);
        assert_eq!(tables.insert_entity("e", false, 9), Some(4));
        assert_eq!(tables.entity("e", false), Some(4));
        // Parameter entities live apart
        assert_eq!(tables.entity("e", true), None);
        assert_eq!(tables.insert_entity("e", true, 9), None);
    }

    #[test]
    fn test_keyed_lookups() {
        let mut tables = DtdTables::new();
        tables.elements.insert(("rect".into(), Some("svg".into())), 2);
        tables.attributes.insert(("rect".into(), "width".into(), None), 3);
        assert_eq!(tables.element("rect", Some("svg")), Some(2));
        assert_eq!(tables.element("rect", None), None);
        assert_eq!(tables.attribute("rect", "width", None), Some(3));
        assert!(tables.owns(3));
        assert_eq!(tables.owned_nodes().len(), 2);
        tables.clear();
        assert!(!tables.owns(3));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(AttDefault::Fixed("1".into()).value(), Some("1"));
        assert_eq!(AttDefault::Implied.value(), None);
        assert!(EntityType::ExternalParameter.is_parameter());
        assert!(!EntityType::InternalGeneral.is_parameter());
    }
}
