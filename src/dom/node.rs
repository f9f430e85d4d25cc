//! Tree node representation
//!
//! Uses NodeId (u32) for compact node references. Links common to every
//! chained node live on `XmlNode`; kind-specific fields live in the
//! `NodeData` payload so a text node carries no attribute chain and an
//! entity reference carries its target instead of a children pointer.

use std::collections::HashMap;

use crate::core::dtd::{AttDefault, AttType, ContentSpec, DtdTables, EntityType, NotationDecl};
use crate::dom::strings::{NameRef, StringPool};

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Type of tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Attribute,
    Text,
    CData,
    EntityRef,
    EntityDecl,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentFragment,
    Notation,
    Dtd,
    ElementDecl,
    AttributeDecl,
    Namespace,
}

impl NodeKind {
    /// Kinds that live in a DTD's tables rather than its sibling chain
    #[inline]
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::Notation | NodeKind::ElementDecl | NodeKind::AttributeDecl | NodeKind::EntityDecl
        )
    }

    /// Kinds that hold a content string instead of children
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Text
                | NodeKind::CData
                | NodeKind::EntityRef
                | NodeKind::ProcessingInstruction
                | NodeKind::Comment
                | NodeKind::Notation
        )
    }

    /// Kinds that may own a children chain
    #[inline]
    pub fn accepts_children(self) -> bool {
        matches!(
            self,
            NodeKind::Element
                | NodeKind::Attribute
                | NodeKind::Document
                | NodeKind::DocumentFragment
                | NodeKind::Dtd
                | NodeKind::EntityDecl
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::CData => "cdata",
            NodeKind::EntityRef => "entity_ref",
            NodeKind::EntityDecl => "entity_decl",
            NodeKind::ProcessingInstruction => "pi",
            NodeKind::Comment => "comment",
            NodeKind::Document => "document",
            NodeKind::DocumentFragment => "fragment",
            NodeKind::Notation => "notation",
            NodeKind::Dtd => "dtd",
            NodeKind::ElementDecl => "element_decl",
            NodeKind::AttributeDecl => "attribute_decl",
            NodeKind::Namespace => "namespace",
        }
    }
}

/// Name tag of a text node. Plain text and do-not-escape text never merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextTag {
    Text,
    NoEnc,
}

/// Who is responsible for an entity declaration's parsed children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityChildren {
    /// Replacement text not split into nodes yet
    #[default]
    Unparsed,
    /// Being split right now (recursion guard)
    Populating,
    /// Built lazily by the engine; freed with the declaration
    Owned,
    /// Supplied by a collaborator that frees them itself
    Borrowed,
}

#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Head of the attribute chain
    pub properties: Option<NodeId>,
    /// Head of the namespaces declared here
    pub ns_def: Option<NodeId>,
    /// Namespace of the element name (non-owning)
    pub ns: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct AttributeData {
    /// Namespace of the attribute name (non-owning)
    pub ns: Option<NodeId>,
    /// Registered in the document ID index
    pub is_id: bool,
}

#[derive(Debug, Clone)]
pub struct DocumentData {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub url: Option<String>,
    /// -1 when unspecified
    pub standalone: i8,
    /// 0..=9, -1 until set
    pub compression: i32,
    pub int_subset: Option<NodeId>,
    pub ext_subset: Option<NodeId>,
    /// Declarations detached from freed subtrees, plus the xml namespace
    pub old_ns: Option<NodeId>,
    pub dict: Option<StringPool>,
    /// ID value -> attribute node
    pub ids: HashMap<String, NodeId>,
    /// IDREF value -> attribute nodes
    pub refs: HashMap<String, Vec<NodeId>>,
}

impl DocumentData {
    pub fn new(version: Option<&str>, dict: Option<StringPool>) -> Self {
        DocumentData {
            version: Some(version.unwrap_or("1.0").to_string()),
            encoding: None,
            url: None,
            standalone: -1,
            compression: -1,
            int_subset: None,
            ext_subset: None,
            old_ns: None,
            dict,
            ids: HashMap::new(),
            refs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DtdData {
    pub external_id: Option<String>,
    pub system_id: Option<String>,
    pub tables: DtdTables,
}

#[derive(Debug, Clone)]
pub struct EntityData {
    pub etype: EntityType,
    pub external_id: Option<String>,
    pub system_id: Option<String>,
    pub children: EntityChildren,
}

#[derive(Debug, Clone)]
pub struct AttributeDeclData {
    /// Element the attribute is declared for
    pub elem: String,
    pub prefix: Option<String>,
    pub atype: AttType,
    pub default: AttDefault,
}

#[derive(Debug, Clone)]
pub struct ElementDeclData {
    pub prefix: Option<String>,
    pub content: ContentSpec,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceData {
    /// None for the default namespace
    pub prefix: Option<String>,
    pub href: Option<String>,
}

/// Kind-specific payload
#[derive(Debug, Clone)]
pub enum NodeData {
    Element(ElementData),
    Attribute(AttributeData),
    Text(TextTag),
    CData,
    /// Target is the declaration the reference expands to
    EntityRef { target: Option<NodeId> },
    EntityDecl(Box<EntityData>),
    ProcessingInstruction,
    Comment,
    Document(Box<DocumentData>),
    DocumentFragment,
    Notation(NotationDecl),
    Dtd(Box<DtdData>),
    ElementDecl(Box<ElementDeclData>),
    AttributeDecl(Box<AttributeDeclData>),
    Namespace(NamespaceData),
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub data: NodeData,
    pub name: Option<NameRef>,
    pub content: Option<NameRef>,
    /// Owning document (the node itself for documents)
    pub doc: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

impl XmlNode {
    /// Unlinked node with no strings
    pub fn new(data: NodeData, doc: Option<NodeId>) -> Self {
        XmlNode {
            data,
            name: None,
            content: None,
            doc,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Attribute(_) => NodeKind::Attribute,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::CData => NodeKind::CData,
            NodeData::EntityRef { .. } => NodeKind::EntityRef,
            NodeData::EntityDecl(_) => NodeKind::EntityDecl,
            NodeData::ProcessingInstruction => NodeKind::ProcessingInstruction,
            NodeData::Comment => NodeKind::Comment,
            NodeData::Document(_) => NodeKind::Document,
            NodeData::DocumentFragment => NodeKind::DocumentFragment,
            NodeData::Notation(_) => NodeKind::Notation,
            NodeData::Dtd(_) => NodeKind::Dtd,
            NodeData::ElementDecl(_) => NodeKind::ElementDecl,
            NodeData::AttributeDecl(_) => NodeKind::AttributeDecl,
            NodeData::Namespace(_) => NodeKind::Namespace,
        }
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn text_tag(&self) -> Option<TextTag> {
        match self.data {
            NodeData::Text(tag) => Some(tag),
            _ => None,
        }
    }

    /// Namespace reference of an element or attribute
    #[inline]
    pub fn ns(&self) -> Option<NodeId> {
        match &self.data {
            NodeData::Element(e) => e.ns,
            NodeData::Attribute(a) => a.ns,
            _ => None,
        }
    }

    /// Set the namespace reference. Returns false for other kinds.
    pub fn set_ns(&mut self, ns: Option<NodeId>) -> bool {
        match &mut self.data {
            NodeData::Element(e) => e.ns = ns,
            NodeData::Attribute(a) => a.ns = ns,
            _ => return false,
        }
        true
    }

    #[inline]
    pub fn properties(&self) -> Option<NodeId> {
        match &self.data {
            NodeData::Element(e) => e.properties,
            _ => None,
        }
    }

    #[inline]
    pub fn set_properties(&mut self, head: Option<NodeId>) {
        if let NodeData::Element(e) = &mut self.data {
            e.properties = head;
        }
    }

    #[inline]
    pub fn ns_def(&self) -> Option<NodeId> {
        match &self.data {
            NodeData::Element(e) => e.ns_def,
            _ => None,
        }
    }

    #[inline]
    pub fn set_ns_def(&mut self, head: Option<NodeId>) {
        if let NodeData::Element(e) = &mut self.data {
            e.ns_def = head;
        }
    }

    #[inline]
    pub fn entity_target(&self) -> Option<NodeId> {
        match self.data {
            NodeData::EntityRef { target } => target,
            _ => None,
        }
    }

    #[inline]
    pub fn namespace(&self) -> Option<&NamespaceData> {
        match &self.data {
            NodeData::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    #[inline]
    pub fn document(&self) -> Option<&DocumentData> {
        match &self.data {
            NodeData::Document(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn document_mut(&mut self) -> Option<&mut DocumentData> {
        match &mut self.data {
            NodeData::Document(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn dtd(&self) -> Option<&DtdData> {
        match &self.data {
            NodeData::Dtd(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn dtd_mut(&mut self) -> Option<&mut DtdData> {
        match &mut self.data {
            NodeData::Dtd(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn entity(&self) -> Option<&EntityData> {
        match &self.data {
            NodeData::EntityDecl(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn entity_mut(&mut self) -> Option<&mut EntityData> {
        match &mut self.data {
            NodeData::EntityDecl(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_payload() {
        let node = XmlNode::new(NodeData::Element(ElementData::default()), None);
        assert_eq!(node.kind(), NodeKind::Element);
        assert!(node.kind().accepts_children());

        let text = XmlNode::new(NodeData::Text(TextTag::NoEnc), Some(0));
        assert_eq!(text.kind(), NodeKind::Text);
        assert_eq!(text.text_tag(), Some(TextTag::NoEnc));
        assert!(text.kind().is_leaf());
        assert!(!text.kind().accepts_children());
    }

    #[test]
    fn test_ns_only_on_named_kinds() {
        let mut elem = XmlNode::new(NodeData::Element(ElementData::default()), None);
        assert!(elem.set_ns(Some(3)));
        assert_eq!(elem.ns(), Some(3));

        let mut comment = XmlNode::new(NodeData::Comment, None);
        assert!(!comment.set_ns(Some(3)));
        assert_eq!(comment.ns(), None);
    }

    #[test]
    fn test_declaration_kinds() {
        assert!(NodeKind::EntityDecl.is_declaration());
        assert!(NodeKind::AttributeDecl.is_declaration());
        assert!(!NodeKind::Comment.is_declaration());
        assert_eq!(NodeKind::ProcessingInstruction.as_str(), "pi");
    }

    #[test]
    fn test_document_defaults() {
        let data = DocumentData::new(None, None);
        assert_eq!(data.version.as_deref(), Some("1.0"));
        assert_eq!(data.standalone, -1);
        assert_eq!(data.compression, -1);
    }
}
