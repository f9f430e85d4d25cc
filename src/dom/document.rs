//! Documents
//!
//! A document is a node whose payload carries the metadata, the
//! dictionary, both DTD subsets and the ID/IDREF indexes. Every node in
//! its content chain has `doc` pointing back at it.

use crate::config::clamp_compression;
use crate::core::dtd::AttType;
use crate::dom::engine::Engine;
use crate::dom::node::{
    AttributeData, DocumentData, DtdData, NodeData, NodeId, NodeKind, XmlNode,
};
use crate::dom::strings::StringPool;
use crate::error::{Result, TreeError};
use crate::dom::namespace::XML_NAMESPACE;

impl Engine {
    /// Create a document. The version defaults to "1.0".
    pub fn new_doc(&mut self, version: Option<&str>) -> Result<NodeId> {
        self.create_doc(version, None)
    }

    /// Create a document that interns names and content in a dictionary
    pub fn new_doc_with_dict(&mut self, version: Option<&str>) -> Result<NodeId> {
        self.create_doc(version, Some(StringPool::new()))
    }

    fn create_doc(&mut self, version: Option<&str>, dict: Option<StringPool>) -> Result<NodeId> {
        let data = DocumentData::new(version, dict);
        let id = self.alloc(XmlNode::new(NodeData::Document(Box::new(data)), None))?;
        self.node_mut(id)?.doc = Some(id);
        Ok(id)
    }

    pub(crate) fn doc_data(&self, doc: NodeId) -> Result<&DocumentData> {
        let node = self.node(doc)?;
        node.document().ok_or(TreeError::WrongKind(node.kind()))
    }

    pub(crate) fn doc_data_mut(&mut self, doc: NodeId) -> Result<&mut DocumentData> {
        let node = self.node_mut(doc)?;
        let kind = node.kind();
        node.document_mut().ok_or(TreeError::WrongKind(kind))
    }

    #[inline]
    pub fn is_document(&self, id: NodeId) -> bool {
        self.kind(id) == Some(NodeKind::Document)
    }

    pub fn has_dict(&self, doc: NodeId) -> bool {
        self.dict(Some(doc)).is_some()
    }

    pub fn doc_version(&self, doc: NodeId) -> Option<&str> {
        self.doc_data(doc).ok()?.version.as_deref()
    }

    pub fn doc_encoding(&self, doc: NodeId) -> Option<&str> {
        self.doc_data(doc).ok()?.encoding.as_deref()
    }

    pub fn set_doc_encoding(&mut self, doc: NodeId, encoding: Option<&str>) -> Result<()> {
        self.doc_data_mut(doc)?.encoding = encoding.map(str::to_string);
        Ok(())
    }

    pub fn doc_url(&self, doc: NodeId) -> Option<&str> {
        self.doc_data(doc).ok()?.url.as_deref()
    }

    pub fn set_doc_url(&mut self, doc: NodeId, url: Option<&str>) -> Result<()> {
        self.doc_data_mut(doc)?.url = url.map(str::to_string);
        Ok(())
    }

    /// Standalone flag: -1 unspecified, 0 no, 1 yes
    pub fn doc_standalone(&self, doc: NodeId) -> i8 {
        self.doc_data(doc).map(|d| d.standalone).unwrap_or(-1)
    }

    pub fn set_doc_standalone(&mut self, doc: NodeId, standalone: i8) -> Result<()> {
        self.doc_data_mut(doc)?.standalone = standalone.clamp(-1, 1);
        Ok(())
    }

    /// Compression level of a document, -1 for anything else
    pub fn doc_compress_mode(&self, doc: NodeId) -> i32 {
        self.doc_data(doc).map(|d| d.compression).unwrap_or(-1)
    }

    pub fn set_doc_compress_mode(&mut self, doc: NodeId, mode: i32) -> Result<()> {
        self.doc_data_mut(doc)?.compression = clamp_compression(mode);
        Ok(())
    }

    /// First element child of the document
    pub fn get_root_element(&self, doc: NodeId) -> Option<NodeId> {
        if !self.is_document(doc) {
            return None;
        }
        self.children(doc)
            .find(|&c| self.kind(c) == Some(NodeKind::Element))
    }

    /// The internal subset: a DTD child of the document, or the recorded one
    pub fn get_int_subset(&self, doc: NodeId) -> Option<NodeId> {
        let data = self.doc_data(doc).ok()?;
        self.children(doc)
            .find(|&c| self.kind(c) == Some(NodeKind::Dtd))
            .or(data.int_subset)
    }

    pub fn get_ext_subset(&self, doc: NodeId) -> Option<NodeId> {
        self.doc_data(doc).ok()?.ext_subset
    }

    pub(crate) fn alloc_dtd(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<NodeId> {
        let data = DtdData {
            external_id: external_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            ..DtdData::default()
        };
        let mut node = XmlNode::new(NodeData::Dtd(Box::new(data)), doc);
        node.name = name.map(|n| self.make_ref(doc, n));
        self.alloc(node)
    }

    /// Create a DTD and record it as the document's external subset
    pub fn new_dtd(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<NodeId> {
        if let Some(doc) = doc {
            if self.doc_data(doc)?.ext_subset.is_some() {
                return Err(TreeError::ExternalSubsetExists);
            }
        }
        let dtd = self.alloc_dtd(doc, name, external_id, system_id)?;
        if let Some(doc) = doc {
            self.doc_data_mut(doc)?.ext_subset = Some(dtd);
        }
        Ok(dtd)
    }

    /// Create the internal subset and link it before the first element
    pub fn create_int_subset(
        &mut self,
        doc: Option<NodeId>,
        name: Option<&str>,
        external_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<NodeId> {
        if let Some(doc) = doc {
            if self.get_int_subset(doc).is_some() {
                return Err(TreeError::InternalSubsetExists);
            }
        }
        let dtd = self.alloc_dtd(doc, name, external_id, system_id)?;
        let Some(doc) = doc else {
            return Ok(dtd);
        };
        self.doc_data_mut(doc)?.int_subset = Some(dtd);
        let first_element = self
            .children(doc)
            .find(|&c| self.kind(c) == Some(NodeKind::Element));
        match first_element {
            Some(elem) => self.link_before(elem, dtd)?,
            None => self.link_child(doc, dtd)?,
        }
        Ok(dtd)
    }

    // ------------------------------------------------------------------
    // ID and IDREF indexes
    // ------------------------------------------------------------------

    /// Register `attr` as the holder of ID `value`
    pub fn add_id(&mut self, doc: NodeId, value: &str, attr: NodeId) -> Result<()> {
        self.expect_kind(attr, NodeKind::Attribute)?;
        let data = self.doc_data_mut(doc)?;
        if let Some(&existing) = data.ids.get(value) {
            if existing != attr {
                return Err(TreeError::DuplicateDeclaration(format!("ID {value:?}")));
            }
        }
        data.ids.insert(value.to_string(), attr);
        if let NodeData::Attribute(a) = &mut self.node_mut(attr)?.data {
            a.is_id = true;
        }
        Ok(())
    }

    /// Drop every ID held by `attr`
    pub fn remove_id(&mut self, doc: NodeId, attr: NodeId) -> Result<()> {
        let data = self.doc_data_mut(doc)?;
        let before = data.ids.len();
        data.ids.retain(|_, holder| *holder != attr);
        let removed = data.ids.len() != before;
        if let Some(NodeData::Attribute(a)) = self.get_mut(attr).map(|n| &mut n.data) {
            a.is_id = false;
        }
        if removed {
            Ok(())
        } else {
            Err(TreeError::NotLinked(attr))
        }
    }

    /// Attribute registered for ID `value`
    pub fn get_id(&self, doc: NodeId, value: &str) -> Option<NodeId> {
        self.doc_data(doc).ok()?.ids.get(value).copied()
    }

    /// Whether `attr` on `elem` is ID-typed: `xml:id`, an already
    /// registered ID, or declared as ID in one of the document's subsets.
    pub fn is_id(&self, doc: Option<NodeId>, elem: Option<NodeId>, attr: NodeId) -> bool {
        let Some(node) = self.get(attr) else {
            return false;
        };
        let NodeData::Attribute(AttributeData { ns, is_id }) = &node.data else {
            return false;
        };
        if *is_id {
            return true;
        }
        let Some(name) = self.name(attr) else {
            return false;
        };
        if name == "id" && ns.and_then(|ns| self.ns_href(ns)) == Some(XML_NAMESPACE) {
            return true;
        }
        let (Some(doc), Some(elem)) = (doc, elem) else {
            return false;
        };
        let Some(elem_name) = self.name(elem) else {
            return false;
        };
        let subsets = [self.get_int_subset(doc), self.get_ext_subset(doc)];
        subsets.into_iter().flatten().any(|dtd| {
            self.get_dtd_attr_desc(dtd, elem_name, name)
                .and_then(|decl| self.attr_decl(decl))
                .is_some_and(|decl| decl.atype == AttType::Id)
        })
    }

    /// Record that `attr` references `value`
    pub fn add_ref(&mut self, doc: NodeId, value: &str, attr: NodeId) -> Result<()> {
        self.expect_kind(attr, NodeKind::Attribute)?;
        let holders = self.doc_data_mut(doc)?.refs.entry(value.to_string()).or_default();
        if !holders.contains(&attr) {
            holders.push(attr);
        }
        Ok(())
    }

    /// Forget every reference made by `attr`
    pub fn remove_ref(&mut self, doc: NodeId, attr: NodeId) -> Result<()> {
        let data = self.doc_data_mut(doc)?;
        for holders in data.refs.values_mut() {
            holders.retain(|&a| a != attr);
        }
        data.refs.retain(|_, holders| !holders.is_empty());
        Ok(())
    }

    /// Attributes referencing `value`
    pub fn get_refs(&self, doc: NodeId, value: &str) -> &[NodeId] {
        self.doc_data(doc)
            .ok()
            .and_then(|d| d.refs.get(value))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_doc_defaults() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        assert_eq!(engine.doc_of(doc), Some(doc));
        assert_eq!(engine.doc_version(doc), Some("1.0"));
        assert_eq!(engine.doc_standalone(doc), -1);
        assert_eq!(engine.doc_compress_mode(doc), -1);
        assert!(!engine.has_dict(doc));
        assert!(engine.get_root_element(doc).is_none());
    }

    #[test]
    fn test_metadata_setters() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(Some("1.1")).unwrap();
        engine.set_doc_encoding(doc, Some("UTF-8")).unwrap();
        engine.set_doc_url(doc, Some("http://example.com/doc.xml")).unwrap();
        engine.set_doc_compress_mode(doc, 12).unwrap();
        engine.set_doc_standalone(doc, 1).unwrap();
        assert_eq!(engine.doc_version(doc), Some("1.1"));
        assert_eq!(engine.doc_encoding(doc), Some("UTF-8"));
        assert_eq!(engine.doc_url(doc), Some("http://example.com/doc.xml"));
        assert_eq!(engine.doc_compress_mode(doc), 9);
        assert_eq!(engine.doc_standalone(doc), 1);
    }

    #[test]
    fn test_int_subset_placed_before_root() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let comment = engine.new_doc_comment(Some(doc), "lead").unwrap();
        engine.add_child(doc, comment).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "root", None).unwrap();
        engine.add_child(doc, root).unwrap();

        let dtd = engine.create_int_subset(Some(doc), Some("root"), None, None).unwrap();
        let order: Vec<_> = engine.children(doc).collect();
        assert_eq!(order, vec![comment, dtd, root]);
        assert_eq!(engine.get_int_subset(doc), Some(dtd));
        assert_eq!(
            engine.create_int_subset(Some(doc), Some("root"), None, None),
            Err(TreeError::InternalSubsetExists)
        );
    }

    #[test]
    fn test_ext_subset_once() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let dtd = engine.new_dtd(Some(doc), Some("html"), Some("-//W3C//DTD"), None).unwrap();
        assert_eq!(engine.get_ext_subset(doc), Some(dtd));
        assert!(engine.children(doc).next().is_none());
        assert_eq!(
            engine.new_dtd(Some(doc), Some("html"), None, None),
            Err(TreeError::ExternalSubsetExists)
        );
    }

    #[test]
    fn test_id_registry() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let elem = engine.new_doc_node(Some(doc), None, "item", None).unwrap();
        let attr = engine.new_prop(Some(elem), "key", Some("k1")).unwrap();
        let other = engine.new_prop(Some(elem), "alt", Some("k1")).unwrap();

        engine.add_id(doc, "k1", attr).unwrap();
        assert_eq!(engine.get_id(doc, "k1"), Some(attr));
        assert!(engine.is_id(Some(doc), Some(elem), attr));
        assert!(engine.add_id(doc, "k1", other).is_err());

        engine.remove_id(doc, attr).unwrap();
        assert_eq!(engine.get_id(doc, "k1"), None);
        assert!(!engine.is_id(Some(doc), Some(elem), attr));
    }

    #[test]
    fn test_refs_registry() {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let elem = engine.new_doc_node(Some(doc), None, "link", None).unwrap();
        let attr = engine.new_prop(Some(elem), "target", Some("k1")).unwrap();
        engine.add_ref(doc, "k1", attr).unwrap();
        engine.add_ref(doc, "k1", attr).unwrap();
        assert_eq!(engine.get_refs(doc, "k1"), &[attr]);
        engine.remove_ref(doc, attr).unwrap();
        assert!(engine.get_refs(doc, "k1").is_empty());
    }
}
