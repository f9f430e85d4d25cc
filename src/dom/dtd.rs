//! DTD declarations in the arena
//!
//! Declarations are nodes owned by their DTD's tables. Entity,
//! element, attribute and notation declarations are also linked into
//! the DTD's children chain in declaration order.

use crate::core::dtd::{AttDefault, AttType, ContentSpec, DtdTables, EntityType, NotationDecl};
use crate::core::entities::predefined_entity;
use crate::dom::engine::Engine;
use crate::dom::node::{
    AttributeDeclData, ElementDeclData, EntityChildren, EntityData, NodeData, NodeId, NodeKind,
    XmlNode,
};
use crate::dom::strings::NameRef;
use crate::error::{Result, TreeError};

/// Result of an entity lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLookup {
    /// One of lt, gt, amp, apos, quot
    Predefined(&'static str),
    Declared(NodeId),
}

impl Engine {
    pub(crate) fn dtd_tables(&self, dtd: NodeId) -> Result<&DtdTables> {
        let node = self.node(dtd)?;
        node.dtd().map(|d| &d.tables).ok_or(TreeError::WrongKind(node.kind()))
    }

    pub(crate) fn dtd_tables_mut(&mut self, dtd: NodeId) -> Result<&mut DtdTables> {
        let node = self.node_mut(dtd)?;
        let kind = node.kind();
        node.dtd_mut().map(|d| &mut d.tables).ok_or(TreeError::WrongKind(kind))
    }

    /// Allocate a declaration node belonging to `dtd` and append it to
    /// the DTD's children chain
    fn alloc_decl(&mut self, dtd: NodeId, data: NodeData, name: &str) -> Result<NodeId> {
        let doc = self.doc_of(dtd);
        let mut node = XmlNode::new(data, doc);
        node.name = Some(self.make_ref(doc, name));
        let id = self.alloc(node)?;
        self.link_child(dtd, id)?;
        Ok(id)
    }

    /// Declare an entity in `dtd`. The first declaration of a name wins
    /// and is returned for later ones.
    pub fn add_dtd_entity(
        &mut self,
        dtd: NodeId,
        name: &str,
        etype: EntityType,
        external_id: Option<&str>,
        system_id: Option<&str>,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let parameter = etype.is_parameter();
        if let Some(existing) = self.dtd_tables(dtd)?.entity(name, parameter) {
            log::debug!(target: "rustytree.tree", "entity {:?} already declared", name);
            return Ok(existing);
        }
        let data = EntityData {
            etype,
            external_id: external_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            children: EntityChildren::Unparsed,
        };
        let id = self.alloc_decl(dtd, NodeData::EntityDecl(Box::new(data)), name)?;
        if let Some(content) = content {
            self.node_mut(id)?.content = Some(NameRef::Owned(content.to_string()));
        }
        self.dtd_tables_mut(dtd)?.insert_entity(name, parameter, id);
        Ok(id)
    }

    /// Declare an entity in the document's internal subset
    pub fn add_doc_entity(
        &mut self,
        doc: NodeId,
        name: &str,
        etype: EntityType,
        external_id: Option<&str>,
        system_id: Option<&str>,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let dtd = self.get_int_subset(doc).ok_or(TreeError::NoInternalSubset)?;
        self.add_dtd_entity(dtd, name, etype, external_id, system_id, content)
    }

    /// General entity declared in one DTD
    pub fn get_dtd_entity(&self, dtd: NodeId, name: &str) -> Option<NodeId> {
        self.dtd_tables(dtd).ok()?.entity(name, false)
    }

    /// Look up a general entity: internal subset, external subset, then
    /// the predefined entities.
    pub fn get_doc_entity(&self, doc: Option<NodeId>, name: &str) -> Option<EntityLookup> {
        if let Some(doc) = doc.filter(|&d| self.is_document(d)) {
            let subsets = [self.get_int_subset(doc), self.get_ext_subset(doc)];
            for dtd in subsets.into_iter().flatten() {
                if let Some(ent) = self.get_dtd_entity(dtd, name) {
                    return Some(EntityLookup::Declared(ent));
                }
            }
        }
        predefined_entity(name).map(EntityLookup::Predefined)
    }

    /// Declared (non-predefined) entity, if any
    pub(crate) fn declared_entity(&self, doc: Option<NodeId>, name: &str) -> Option<NodeId> {
        match self.get_doc_entity(doc, name)? {
            EntityLookup::Declared(id) => Some(id),
            EntityLookup::Predefined(_) => None,
        }
    }

    /// Parameter entity from either subset
    pub fn get_parameter_entity(&self, doc: NodeId, name: &str) -> Option<NodeId> {
        let subsets = [self.get_int_subset(doc), self.get_ext_subset(doc)];
        subsets
            .into_iter()
            .flatten()
            .find_map(|dtd| self.dtd_tables(dtd).ok()?.entity(name, true))
    }

    pub fn entity_type(&self, ent: NodeId) -> Option<EntityType> {
        Some(self.get(ent)?.entity()?.etype)
    }

    pub fn entity_children_state(&self, ent: NodeId) -> Option<EntityChildren> {
        Some(self.get(ent)?.entity()?.children)
    }

    /// Declare an element type. A second declaration is refused.
    pub fn add_element_decl(
        &mut self,
        dtd: NodeId,
        name: &str,
        prefix: Option<&str>,
        content: ContentSpec,
    ) -> Result<NodeId> {
        if self.dtd_tables(dtd)?.element(name, prefix).is_some() {
            return Err(TreeError::DuplicateDeclaration(format!("element {name:?}")));
        }
        let data = ElementDeclData {
            prefix: prefix.map(str::to_string),
            content,
        };
        let id = self.alloc_decl(dtd, NodeData::ElementDecl(Box::new(data)), name)?;
        self.dtd_tables_mut(dtd)?
            .elements
            .insert((name.to_string(), prefix.map(str::to_string)), id);
        Ok(id)
    }

    pub fn get_dtd_qelement_desc(&self, dtd: NodeId, name: &str, prefix: Option<&str>) -> Option<NodeId> {
        self.dtd_tables(dtd).ok()?.element(name, prefix)
    }

    /// Declare an attribute of `elem`. The first declaration wins.
    pub fn add_attribute_decl(
        &mut self,
        dtd: NodeId,
        elem: &str,
        name: &str,
        prefix: Option<&str>,
        atype: AttType,
        default: AttDefault,
    ) -> Result<NodeId> {
        if let Some(existing) = self.dtd_tables(dtd)?.attribute(elem, name, prefix) {
            return Ok(existing);
        }
        let data = AttributeDeclData {
            elem: elem.to_string(),
            prefix: prefix.map(str::to_string),
            atype,
            default,
        };
        let id = self.alloc_decl(dtd, NodeData::AttributeDecl(Box::new(data)), name)?;
        self.dtd_tables_mut(dtd)?.attributes.insert(
            (elem.to_string(), name.to_string(), prefix.map(str::to_string)),
            id,
        );
        Ok(id)
    }

    /// Unprefixed attribute declaration
    pub fn get_dtd_attr_desc(&self, dtd: NodeId, elem: &str, name: &str) -> Option<NodeId> {
        self.dtd_tables(dtd).ok()?.attribute(elem, name, None)
    }

    pub fn get_dtd_qattr_desc(
        &self,
        dtd: NodeId,
        elem: &str,
        name: &str,
        prefix: Option<&str>,
    ) -> Option<NodeId> {
        self.dtd_tables(dtd).ok()?.attribute(elem, name, prefix)
    }

    pub fn attr_decl(&self, decl: NodeId) -> Option<&AttributeDeclData> {
        match &self.get(decl)?.data {
            NodeData::AttributeDecl(d) => Some(d),
            _ => None,
        }
    }

    /// Default or fixed value of an attribute declaration
    pub fn attr_decl_default(&self, decl: NodeId) -> Option<&str> {
        self.attr_decl(decl)?.default.value()
    }

    /// Declare a notation. A second declaration is refused.
    pub fn add_notation(&mut self, dtd: NodeId, name: &str, decl: NotationDecl) -> Result<NodeId> {
        if self.dtd_tables(dtd)?.notation(name).is_some() {
            return Err(TreeError::DuplicateDeclaration(format!("notation {name:?}")));
        }
        let id = self.alloc_decl(dtd, NodeData::Notation(decl), name)?;
        self.dtd_tables_mut(dtd)?.notations.insert(name.to_string(), id);
        Ok(id)
    }

    /// Find the equivalent of declaration `decl` in the tables of `dtd`
    pub(crate) fn lookup_same_decl(&self, dtd: NodeId, decl: NodeId) -> Option<NodeId> {
        let tables = self.dtd_tables(dtd).ok()?;
        let node = self.get(decl)?;
        let name = self.name(decl)?;
        match (&node.data, node.kind()) {
            (NodeData::EntityDecl(e), _) => tables.entity(name, e.etype.is_parameter()),
            (NodeData::ElementDecl(e), _) => tables.element(name, e.prefix.as_deref()),
            (NodeData::AttributeDecl(a), _) => {
                tables.attribute(&a.elem, name, a.prefix.as_deref())
            }
            (_, NodeKind::Notation) => tables.notation(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_subset(engine: &mut Engine) -> (NodeId, NodeId) {
        let doc = engine.new_doc(None).unwrap();
        let dtd = engine.create_int_subset(Some(doc), Some("root"), None, None).unwrap();
        (doc, dtd)
    }

    #[test]
    fn test_entity_lookup_order() {
        let mut engine = Engine::default();
        let (doc, _) = doc_with_subset(&mut engine);
        let ent = engine
            .add_doc_entity(doc, "corp", EntityType::InternalGeneral, None, None, Some("ACME"))
            .unwrap();
        assert_eq!(engine.get_doc_entity(Some(doc), "corp"), Some(EntityLookup::Declared(ent)));
        assert_eq!(engine.get_doc_entity(Some(doc), "lt"), Some(EntityLookup::Predefined("<")));
        assert_eq!(engine.get_doc_entity(None, "corp"), None);
        assert_eq!(engine.raw_content(ent), Some("ACME"));
        assert_eq!(engine.entity_children_state(ent), Some(EntityChildren::Unparsed));
    }

    #[test]
    fn test_first_entity_declaration_wins() {
        let mut engine = Engine::default();
        let (doc, dtd) = doc_with_subset(&mut engine);
        let first = engine
            .add_doc_entity(doc, "e", EntityType::InternalGeneral, None, None, Some("one"))
            .unwrap();
        let second = engine
            .add_doc_entity(doc, "e", EntityType::InternalGeneral, None, None, Some("two"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.children(dtd).count(), 1);
    }

    #[test]
    fn test_parameter_entities_separate() {
        let mut engine = Engine::default();
        let (doc, _) = doc_with_subset(&mut engine);
        let pe = engine
            .add_doc_entity(doc, "p", EntityType::InternalParameter, None, None, Some("x"))
            .unwrap();
        assert_eq!(engine.get_parameter_entity(doc, "p"), Some(pe));
        assert_eq!(engine.get_doc_entity(Some(doc), "p"), None);
    }

    #[test]
    fn test_no_int_subset() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        assert_eq!(
            engine.add_doc_entity(doc, "e", EntityType::InternalGeneral, None, None, None),
            Err(TreeError::NoInternalSubset)
        );
    }

    #[test]
    fn test_element_and_attribute_decls() {
        let mut engine = Engine::default();
        let (_, dtd) = doc_with_subset(&mut engine);
        let el = engine.add_element_decl(dtd, "item", None, ContentSpec::Empty).unwrap();
        assert!(engine.add_element_decl(dtd, "item", None, ContentSpec::Any).is_err());
        assert_eq!(engine.get_dtd_qelement_desc(dtd, "item", None), Some(el));

        let at = engine
            .add_attribute_decl(dtd, "item", "lang", None, AttType::CData, AttDefault::Default("en".into()))
            .unwrap();
        assert_eq!(engine.get_dtd_attr_desc(dtd, "item", "lang"), Some(at));
        assert_eq!(engine.attr_decl_default(at), Some("en"));
        assert_eq!(engine.lookup_same_decl(dtd, at), Some(at));

        let nt = engine.add_notation(dtd, "gif", NotationDecl::default()).unwrap();
        assert_eq!(engine.kind(nt), Some(NodeKind::Notation));
        assert!(engine.add_notation(dtd, "gif", NotationDecl::default()).is_err());
        assert_eq!(engine.children(dtd).count(), 3);
    }
}
