//! Node constructors
//!
//! Every constructor allocates a detached node. Only `new_child` and
//! `new_text_child` link what they build.

use crate::core::entities::predefined_entity;
use crate::dom::engine::Engine;
use crate::dom::node::{ElementData, NodeData, NodeId, NodeKind, TextTag, XmlNode};
use crate::error::{Result, TreeError};

/// First `len` bytes of `s`, refusing lengths past the end or inside a
/// character
pub(crate) fn prefix_of(s: &str, len: usize) -> Result<&str> {
    if len > s.len() || !s.is_char_boundary(len) {
        return Err(TreeError::InvalidLength {
            len,
            available: s.len(),
        });
    }
    Ok(&s[..len])
}

/// Entity name without the surrounding `&` and `;`
fn entity_name(name: &str) -> &str {
    let name = name.strip_prefix('&').unwrap_or(name);
    name.strip_suffix(';').unwrap_or(name)
}

impl Engine {
    fn alloc_with(
        &mut self,
        data: NodeData,
        doc: Option<NodeId>,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let mut node = XmlNode::new(data, doc);
        node.name = name.map(|n| self.make_ref(doc, n));
        node.content = content.map(|c| self.make_ref(doc, c));
        self.alloc(node)
    }

    fn check_ns(&self, ns: Option<NodeId>) -> Result<()> {
        match ns {
            Some(ns) => self.expect_kind(ns, NodeKind::Namespace),
            None => Ok(()),
        }
    }

    /// Element outside any document
    pub fn new_node(&mut self, ns: Option<NodeId>, name: &str) -> Result<NodeId> {
        self.new_doc_raw_node(None, ns, name, None)
    }

    /// Element whose content is split into text and entity references
    pub fn new_doc_node(
        &mut self,
        doc: Option<NodeId>,
        ns: Option<NodeId>,
        name: &str,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let elem = self.new_doc_raw_node(doc, ns, name, None)?;
        if let Some(content) = content {
            if let Err(err) = self.attach_parsed(elem, content) {
                self.free_subtree(elem);
                return Err(err);
            }
        }
        Ok(elem)
    }

    /// Element whose content is kept as one literal text child
    pub fn new_doc_raw_node(
        &mut self,
        doc: Option<NodeId>,
        ns: Option<NodeId>,
        name: &str,
        content: Option<&str>,
    ) -> Result<NodeId> {
        self.check_ns(ns)?;
        let data = NodeData::Element(ElementData {
            ns,
            ..ElementData::default()
        });
        let elem = self.alloc_with(data, doc, Some(name), None)?;
        if let Some(content) = content {
            match self.new_doc_text(doc, Some(content)) {
                Ok(text) => self.link_child(elem, text)?,
                Err(err) => {
                    self.free_subtree(elem);
                    return Err(err);
                }
            }
        }
        Ok(elem)
    }

    pub fn new_doc_fragment(&mut self, doc: Option<NodeId>) -> Result<NodeId> {
        self.alloc_with(NodeData::DocumentFragment, doc, None, None)
    }

    pub fn new_text(&mut self, content: Option<&str>) -> Result<NodeId> {
        self.new_doc_text(None, content)
    }

    pub fn new_doc_text(&mut self, doc: Option<NodeId>, content: Option<&str>) -> Result<NodeId> {
        self.alloc_with(NodeData::Text(TextTag::Text), doc, None, content)
    }

    pub fn new_text_len(&mut self, content: &str, len: usize) -> Result<NodeId> {
        self.new_doc_text_len(None, content, len)
    }

    pub fn new_doc_text_len(&mut self, doc: Option<NodeId>, content: &str, len: usize) -> Result<NodeId> {
        let content = prefix_of(content, len)?;
        self.new_doc_text(doc, Some(content))
    }

    /// Text written out without escaping. Never merges with plain text.
    pub fn new_doc_text_noenc(&mut self, doc: Option<NodeId>, content: Option<&str>) -> Result<NodeId> {
        self.alloc_with(NodeData::Text(TextTag::NoEnc), doc, None, content)
    }

    pub fn new_comment(&mut self, content: &str) -> Result<NodeId> {
        self.new_doc_comment(None, content)
    }

    pub fn new_doc_comment(&mut self, doc: Option<NodeId>, content: &str) -> Result<NodeId> {
        self.alloc_with(NodeData::Comment, doc, None, Some(content))
    }

    pub fn new_cdata_block(&mut self, doc: Option<NodeId>, content: &str) -> Result<NodeId> {
        self.alloc_with(NodeData::CData, doc, None, Some(content))
    }

    pub fn new_pi(&mut self, target: &str, content: Option<&str>) -> Result<NodeId> {
        self.new_doc_pi(None, target, content)
    }

    pub fn new_doc_pi(&mut self, doc: Option<NodeId>, target: &str, content: Option<&str>) -> Result<NodeId> {
        self.alloc_with(NodeData::ProcessingInstruction, doc, Some(target), content)
    }

    /// `&#...;` reference kept as a node
    pub fn new_char_ref(&mut self, doc: Option<NodeId>, name: &str) -> Result<NodeId> {
        let name = entity_name(name);
        self.alloc_with(NodeData::EntityRef { target: None }, doc, Some(name), None)
    }

    /// Reference to a named entity. The node points at the declaration
    /// when one exists and carries the replacement text.
    pub fn new_reference(&mut self, doc: Option<NodeId>, name: &str) -> Result<NodeId> {
        let name = entity_name(name);
        let target = self.declared_entity(doc, name);
        let content = match target {
            Some(ent) => self.raw_content(ent).map(str::to_string),
            None => predefined_entity(name).map(str::to_string),
        };
        self.alloc_with(NodeData::EntityRef { target }, doc, Some(name), content.as_deref())
    }

    /// Parent check shared by `new_child` and `new_text_child`: the
    /// namespace defaults to the parent's
    fn child_ns(&self, parent: NodeId, ns: Option<NodeId>) -> Result<Option<NodeId>> {
        match self.kind_of(parent)? {
            NodeKind::Element => Ok(ns.or_else(|| self.ns_of(parent))),
            NodeKind::Document | NodeKind::DocumentFragment => Ok(ns),
            other => Err(TreeError::WrongKind(other)),
        }
    }

    /// Create an element with parsed content and append it to `parent`
    pub fn new_child(
        &mut self,
        parent: NodeId,
        ns: Option<NodeId>,
        name: &str,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let ns = self.child_ns(parent, ns)?;
        let doc = self.doc_of(parent);
        let child = self.new_doc_node(doc, ns, name, content)?;
        self.link_child(parent, child)?;
        Ok(child)
    }

    /// Create an element with literal text content and append it to
    /// `parent`
    pub fn new_text_child(
        &mut self,
        parent: NodeId,
        ns: Option<NodeId>,
        name: &str,
        content: Option<&str>,
    ) -> Result<NodeId> {
        let ns = self.child_ns(parent, ns)?;
        let doc = self.doc_of(parent);
        let child = self.new_doc_raw_node(doc, ns, name, content)?;
        self.link_child(parent, child)?;
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dtd::EntityType;

    #[test]
    fn test_constructors_are_detached() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let ids = [
            engine.new_doc_node(Some(doc), None, "e", Some("x")).unwrap(),
            engine.new_doc_text(Some(doc), Some("t")).unwrap(),
            engine.new_doc_comment(Some(doc), "c").unwrap(),
            engine.new_cdata_block(Some(doc), "<raw>").unwrap(),
            engine.new_doc_pi(Some(doc), "php", Some("echo")).unwrap(),
            engine.new_doc_fragment(Some(doc)).unwrap(),
        ];
        for id in ids {
            assert_eq!(engine.parent(id), None);
            assert_eq!(engine.doc_of(id), Some(doc));
        }
        assert_eq!(engine.children(doc).count(), 0);
    }

    #[test]
    fn test_interned_names() {
        let mut engine = Engine::default();
        let doc = engine.new_doc_with_dict(None).unwrap();
        let a = engine.new_doc_node(Some(doc), None, "item", None).unwrap();
        let b = engine.new_doc_node(Some(doc), None, "item", None).unwrap();
        assert_eq!(engine.get(a).unwrap().name, engine.get(b).unwrap().name);
        assert!(engine.get(a).unwrap().name.as_ref().unwrap().is_interned());
        let plain = engine.new_node(None, "item").unwrap();
        assert!(!engine.get(plain).unwrap().name.as_ref().unwrap().is_interned());
    }

    #[test]
    fn test_doc_node_parses_content() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let parsed = engine.new_doc_node(Some(doc), None, "p", Some("a&amp;b")).unwrap();
        assert_eq!(engine.children(parsed).count(), 1);
        assert_eq!(engine.get_content(parsed).as_deref(), Some("a&b"));
        let raw = engine.new_doc_raw_node(Some(doc), None, "r", Some("a&amp;b")).unwrap();
        assert_eq!(engine.get_content(raw).as_deref(), Some("a&amp;b"));
    }

    #[test]
    fn test_text_len() {
        let mut engine = Engine::default();
        let t = engine.new_text_len("hello", 4).unwrap();
        assert_eq!(engine.raw_content(t), Some("hell"));
        assert_eq!(
            engine.new_text_len("hi", 3),
            Err(TreeError::InvalidLength { len: 3, available: 2 })
        );
        assert!(engine.new_text_len("é", 1).is_err());
    }

    #[test]
    fn test_references() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        engine.create_int_subset(Some(doc), Some("r"), None, None).unwrap();
        let ent = engine
            .add_doc_entity(doc, "corp", EntityType::InternalGeneral, None, None, Some("ACME"))
            .unwrap();
        let r = engine.new_reference(Some(doc), "&corp;").unwrap();
        assert_eq!(engine.name(r), Some("corp"));
        assert_eq!(engine.get(r).unwrap().entity_target(), Some(ent));
        assert_eq!(engine.raw_content(r), Some("ACME"));

        let lt = engine.new_reference(Some(doc), "lt").unwrap();
        assert_eq!(engine.get(lt).unwrap().entity_target(), None);
        assert_eq!(engine.raw_content(lt), Some("<"));

        let cr = engine.new_char_ref(Some(doc), "&#38;").unwrap();
        assert_eq!(engine.name(cr), Some("#38"));
    }

    #[test]
    fn test_new_child_inherits_namespace() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "root", None).unwrap();
        engine.set_root_element(doc, root).unwrap();
        let ns = engine.new_ns(Some(root), Some("urn:x"), Some("x")).unwrap();
        engine.set_ns(root, Some(ns)).unwrap();
        let child = engine.new_child(root, None, "c", None).unwrap();
        assert_eq!(engine.ns_of(child), Some(ns));
        let text_child = engine.new_text_child(root, None, "t", Some("1 < 2")).unwrap();
        assert_eq!(engine.get_content(text_child).as_deref(), Some("1 < 2"));
        assert_eq!(engine.children(root).collect::<Vec<_>>(), vec![child, text_child]);

        let comment = engine.new_doc_comment(Some(doc), "c").unwrap();
        assert_eq!(
            engine.new_child(comment, None, "x", None),
            Err(TreeError::WrongKind(NodeKind::Comment))
        );
    }
}
