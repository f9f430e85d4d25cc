//! Namespace Resolution
//!
//! Declarations are `Namespace` nodes on their element's `ns_def` chain.
//! Elements and attributes refer to them by id without owning them.
//!
//! Lookups never cross an entity reference or declaration: a walk that
//! reaches one reports "not found".

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::dom::engine::Engine;
use crate::dom::node::{NamespaceData, NodeData, NodeId, NodeKind, XmlNode};
use crate::error::{Result, TreeError};

/// URI bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Longest prefix kept when deriving a reconciled prefix
const RECONCILE_PREFIX_MAX: usize = 20;

/// Whether a declaration held by an ancestor is visible from a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsScope {
    InScope,
    /// Redeclared by a node between the two
    Shadowed,
    /// The ancestor is not reachable, or an entity boundary is in the way
    Unreachable,
}

#[inline]
fn is_entity_boundary(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::EntityRef | NodeKind::EntityDecl)
}

impl Engine {
    pub(crate) fn alloc_ns(&mut self, doc: Option<NodeId>, href: Option<&str>, prefix: Option<&str>) -> Result<NodeId> {
        let data = NamespaceData {
            prefix: prefix.map(str::to_string),
            href: href.map(str::to_string),
        };
        self.alloc(XmlNode::new(NodeData::Namespace(data), doc))
    }

    /// Append a detached declaration to the `ns_def` chain of `elem`
    pub(crate) fn link_ns_def(&mut self, elem: NodeId, ns: NodeId) -> Result<()> {
        match self.ns_defs(elem).last() {
            Some(last) => self.link_after(last, ns),
            None => {
                self.node_mut(elem)?.set_ns_def(Some(ns));
                let n = self.node_mut(ns)?;
                n.parent = Some(elem);
                n.prev_sibling = None;
                n.next_sibling = None;
                Ok(())
            }
        }
    }

    /// Create a namespace declaration, attached to `node` when given.
    /// The `xml` prefix is predeclared and cannot be bound again.
    pub fn new_ns(&mut self, node: Option<NodeId>, href: Option<&str>, prefix: Option<&str>) -> Result<NodeId> {
        if prefix == Some("xml") {
            return Err(TreeError::ReservedPrefix);
        }
        let Some(elem) = node else {
            return self.alloc_ns(None, href, prefix);
        };
        self.expect_kind(elem, NodeKind::Element)?;
        if self.ns_defs(elem).any(|d| self.ns_prefix(d) == prefix) {
            return Err(TreeError::DuplicatePrefix(prefix.map(str::to_string)));
        }
        let doc = self.doc_of(elem);
        let ns = self.alloc_ns(doc, href, prefix)?;
        self.link_ns_def(elem, ns)?;
        Ok(ns)
    }

    /// Set the namespace of an element or attribute
    pub fn set_ns(&mut self, node: NodeId, ns: Option<NodeId>) -> Result<()> {
        if let Some(ns) = ns {
            self.expect_kind(ns, NodeKind::Namespace)?;
        }
        let n = self.node_mut(node)?;
        let kind = n.kind();
        if !n.set_ns(ns) {
            return Err(TreeError::WrongKind(kind));
        }
        Ok(())
    }

    /// Free a namespace declaration, unlinking it from its element
    pub fn free_ns(&mut self, ns: NodeId) -> Result<()> {
        self.expect_kind(ns, NodeKind::Namespace)?;
        self.unlink(ns)?;
        self.release(ns);
        Ok(())
    }

    /// Free a declaration and every declaration after it
    pub fn free_ns_list(&mut self, first: NodeId) -> Result<()> {
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        for ns in chain {
            self.free_ns(ns)?;
        }
        Ok(())
    }

    /// The document-wide declaration of the `xml` prefix, created on
    /// first use
    fn ensure_xml_decl(&mut self, doc: NodeId) -> Result<NodeId> {
        let head = self.doc_data(doc)?.old_ns;
        if let Some(existing) = self.siblings_from(head).find(|&ns| self.ns_prefix(ns) == Some("xml")) {
            return Ok(existing);
        }
        let ns = self.alloc_ns(Some(doc), Some(XML_NAMESPACE), Some("xml"))?;
        if let Some(head) = head {
            self.node_mut(ns)?.next_sibling = Some(head);
            self.node_mut(head)?.prev_sibling = Some(ns);
        }
        self.doc_data_mut(doc)?.old_ns = Some(ns);
        Ok(ns)
    }

    /// Declaration answering `xml` lookups from `node`. Without a
    /// document, one is put on the element itself.
    pub(crate) fn declare_xml(&mut self, doc: Option<NodeId>, node: NodeId) -> Result<NodeId> {
        if doc.is_none() && self.kind_of(node)? == NodeKind::Element {
            if let Some(existing) = self.ns_defs(node).find(|&d| self.ns_prefix(d) == Some("xml")) {
                return Ok(existing);
            }
            let ns = self.alloc_ns(self.doc_of(node), Some(XML_NAMESPACE), Some("xml"))?;
            let head = self.node(node)?.ns_def();
            {
                let n = self.node_mut(ns)?;
                n.parent = Some(node);
                n.next_sibling = head;
            }
            if let Some(head) = head {
                self.node_mut(head)?.prev_sibling = Some(ns);
            }
            self.node_mut(node)?.set_ns_def(Some(ns));
            return Ok(ns);
        }
        let doc = doc.or_else(|| self.doc_of(node)).ok_or(TreeError::NotLinked(node))?;
        self.ensure_xml_decl(doc)
    }

    fn xml_decl(&mut self, doc: Option<NodeId>, node: NodeId) -> Option<NodeId> {
        match self.declare_xml(doc, node) {
            Ok(ns) => Some(ns),
            Err(err) => {
                log::debug!(target: "rustytree.namespace", "no xml namespace for node {}: {}", node, err);
                None
            }
        }
    }

    fn ns_matches_prefix(&self, ns: NodeId, prefix: Option<&str>) -> bool {
        self.ns_href(ns).is_some() && self.ns_prefix(ns) == prefix
    }

    /// Walk from `node` outward looking for a declaration of `prefix`.
    /// `None` asks for the default namespace.
    pub fn find_ns(&self, node: NodeId, prefix: Option<&str>) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            let n = self.get(id)?;
            if is_entity_boundary(n.kind()) {
                return None;
            }
            if n.kind() == NodeKind::Element {
                if let Some(found) = self.ns_defs(id).find(|&d| self.ns_matches_prefix(d, prefix)) {
                    return Some(found);
                }
                if id != node {
                    if let Some(ns) = n.ns().filter(|&ns| self.ns_matches_prefix(ns, prefix)) {
                        return Some(ns);
                    }
                }
            }
            cur = n.parent;
        }
        None
    }

    /// Resolve `prefix` from `node`. The `xml` prefix always resolves,
    /// creating its declaration on demand.
    pub fn search_ns(&mut self, doc: Option<NodeId>, node: NodeId, prefix: Option<&str>) -> Option<NodeId> {
        if !self.contains(node) {
            return None;
        }
        if prefix == Some("xml") {
            return self.xml_decl(doc, node);
        }
        self.find_ns(node, prefix)
    }

    /// Whether the declaration of `prefix` held by `ancestor` is visible
    /// from `node`
    pub fn ns_in_scope(&self, node: NodeId, ancestor: NodeId, prefix: Option<&str>) -> NsScope {
        let mut cur = Some(node);
        while let Some(id) = cur.filter(|&id| id != ancestor) {
            let Some(n) = self.get(id) else {
                return NsScope::Unreachable;
            };
            if is_entity_boundary(n.kind()) {
                return NsScope::Unreachable;
            }
            if n.kind() == NodeKind::Element && self.ns_defs(id).any(|d| self.ns_prefix(d) == prefix) {
                return NsScope::Shadowed;
            }
            cur = n.parent;
        }
        if cur == Some(ancestor) {
            NsScope::InScope
        } else {
            NsScope::Unreachable
        }
    }

    fn visible_with_href(&self, orig: NodeId, holder: NodeId, ns: NodeId, href: &str, is_attr: bool) -> bool {
        if self.ns_href(ns) != Some(href) {
            return false;
        }
        let prefix = self.ns_prefix(ns);
        if is_attr && prefix.is_none() {
            return false;
        }
        self.ns_in_scope(orig, holder, prefix) == NsScope::InScope
    }

    /// In-scope declaration bound to `href`. Attributes only accept
    /// prefixed declarations since the default namespace never applies
    /// to them.
    pub fn search_ns_by_href(&mut self, doc: Option<NodeId>, node: NodeId, href: &str) -> Option<NodeId> {
        if !self.contains(node) {
            return None;
        }
        if href == XML_NAMESPACE {
            return self.xml_decl(doc, node);
        }
        self.find_ns_by_href(node, href)
    }

    /// Non-creating part of `search_ns_by_href`
    pub fn find_ns_by_href(&self, node: NodeId, href: &str) -> Option<NodeId> {
        let is_attr = self.kind(node) == Some(NodeKind::Attribute);
        let mut cur = Some(node);
        while let Some(id) = cur {
            let n = self.get(id)?;
            if is_entity_boundary(n.kind()) {
                return None;
            }
            if n.kind() == NodeKind::Element {
                let found = self
                    .ns_defs(id)
                    .find(|&d| self.visible_with_href(node, id, d, href, is_attr));
                if found.is_some() {
                    return found;
                }
                if id != node {
                    if let Some(ns) = n.ns().filter(|&ns| self.visible_with_href(node, id, ns, href, is_attr)) {
                        return Some(ns);
                    }
                }
            }
            cur = n.parent;
        }
        None
    }

    /// Every declaration in scope at `node`, nearest first, one per prefix
    pub fn get_ns_list(&self, node: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            let Some(n) = self.get(id) else { break };
            if n.kind() == NodeKind::Element {
                for decl in self.ns_defs(id) {
                    let prefix = self.ns_prefix(decl);
                    if !out.iter().any(|&o| self.ns_prefix(o) == prefix) {
                        out.push(decl);
                    }
                }
            }
            cur = n.parent;
        }
        out
    }

    /// Find or declare on `tree` a namespace equivalent to `ns`. A free
    /// prefix is derived from the original one when it is taken.
    pub fn new_reconciled_ns(&mut self, doc: Option<NodeId>, tree: NodeId, ns: NodeId) -> Result<NodeId> {
        self.expect_kind(tree, NodeKind::Element)?;
        self.expect_kind(ns, NodeKind::Namespace)?;
        let href = self.ns_href(ns).map(str::to_string);
        let original = self.ns_prefix(ns).map(str::to_string);

        if let Some(href) = href.as_deref() {
            if let Some(def) = self.search_ns_by_href(doc, tree, href) {
                return Ok(def);
            }
        }

        let base: String = match original.as_deref() {
            None => "default".to_string(),
            Some(p) => p.chars().take(RECONCILE_PREFIX_MAX).collect(),
        };
        let limit = self.config().reconcile_probe_limit;
        let mut candidate = base.clone();
        let mut counter: u32 = 2;
        while self.search_ns(doc, tree, Some(&candidate)).is_some() {
            if counter > limit {
                log::warn!(
                    target: "rustytree.namespace",
                    "giving up on a free prefix for {:?} after {} probes",
                    href, limit
                );
                return Err(TreeError::ReconcileOverflow(limit));
            }
            candidate = format!("{base}{counter}");
            counter += 1;
        }
        log::debug!(target: "rustytree.namespace", "declaring {:?} as {:?} on {}", href, candidate, tree);
        self.new_ns(Some(tree), href.as_deref(), Some(&candidate))
    }

    /// Make every namespace reference under `tree` point at a declaration
    /// in scope, declaring new ones on `tree` where needed.
    pub fn reconcile_ns(&mut self, doc: Option<NodeId>, tree: NodeId) -> Result<()> {
        self.expect_kind(tree, NodeKind::Element)?;
        if let Some(doc) = doc {
            if self.doc_of(tree) != Some(doc) {
                return Err(TreeError::DocumentMismatch(tree));
            }
        }
        let capacity = NonZeroUsize::new(self.config().reconcile_cache_size).unwrap_or(NonZeroUsize::MIN);
        let mut cache: LruCache<NodeId, NodeId> = LruCache::new(capacity);

        let elements: Vec<NodeId> = self
            .descendants(tree)
            .filter(|&id| self.kind(id) == Some(NodeKind::Element))
            .collect();
        for elem in elements {
            let attrs: Vec<NodeId> = self.attributes(elem).collect();
            for node in std::iter::once(elem).chain(attrs) {
                let Some(old) = self.ns_of(node) else { continue };
                let new = match cache.get(&old) {
                    Some(&mapped) => mapped,
                    None => {
                        if self.kind(old) != Some(NodeKind::Namespace) {
                            log::warn!(target: "rustytree.namespace", "node {} refers to a freed namespace", node);
                            self.set_ns(node, None)?;
                            continue;
                        }
                        let href = self.ns_href(old).map(str::to_string);
                        let found = href.and_then(|h| self.search_ns_by_href(doc, node, &h));
                        let mapped = match found {
                            Some(found) => found,
                            None => self.new_reconciled_ns(doc, tree, old)?,
                        };
                        cache.put(old, mapped);
                        mapped
                    }
                };
                if new != old {
                    self.set_ns(node, Some(new))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn doc_with_root(engine: &mut Engine) -> (NodeId, NodeId) {
        let doc = engine.new_doc(None).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "a", None).unwrap();
        engine.set_root_element(doc, root).unwrap();
        (doc, root)
    }

    #[test]
    fn test_nearest_declaration_wins() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        engine.new_ns(Some(a), Some("u1"), Some("x")).unwrap();
        let b = engine.new_child(a, None, "b", None).unwrap();
        let u2 = engine.new_ns(Some(b), Some("u2"), Some("x")).unwrap();
        let c = engine.new_child(b, None, "c", None).unwrap();
        let found = engine.search_ns(Some(doc), c, Some("x")).unwrap();
        assert_eq!(found, u2);
        assert_eq!(engine.ns_href(found), Some("u2"));
    }

    #[test]
    fn test_new_ns_rules() {
        let mut engine = Engine::default();
        let (_, a) = doc_with_root(&mut engine);
        assert_eq!(engine.new_ns(Some(a), Some(XML_NAMESPACE), Some("xml")), Err(TreeError::ReservedPrefix));
        engine.new_ns(Some(a), Some("urn:d"), None).unwrap();
        assert_eq!(
            engine.new_ns(Some(a), Some("urn:e"), None),
            Err(TreeError::DuplicatePrefix(None))
        );
        engine.new_ns(Some(a), Some("urn:p"), Some("p")).unwrap();
        assert_eq!(engine.ns_defs(a).count(), 2);
        let detached = engine.new_ns(None, Some("urn:q"), Some("q")).unwrap();
        assert_eq!(engine.parent(detached), None);
    }

    #[test]
    fn test_default_namespace_needs_href() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        engine.new_ns(Some(a), None, None).unwrap();
        assert_eq!(engine.search_ns(Some(doc), a, None), None);
        let b = engine.new_child(a, None, "b", None).unwrap();
        let d = engine.new_ns(Some(b), Some("urn:d"), None).unwrap();
        assert_eq!(engine.search_ns(Some(doc), b, None), Some(d));
    }

    #[test]
    fn test_xml_prefix_always_resolves() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        let first = engine.search_ns(Some(doc), a, Some("xml")).unwrap();
        let again = engine.search_ns_by_href(Some(doc), a, XML_NAMESPACE).unwrap();
        assert_eq!(first, again);
        assert_eq!(engine.ns_href(first), Some(XML_NAMESPACE));
        assert_eq!(engine.ns_defs(a).count(), 0);

        // Without a document the declaration lands on the element
        let local = engine.search_ns(None, a, Some("xml")).unwrap();
        assert_eq!(engine.ns_defs(a).collect::<Vec<_>>(), vec![local]);
        assert_eq!(engine.search_ns(None, a, Some("xml")), Some(local));
    }

    #[test]
    fn test_xml_decl_matched_by_prefix() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        let other = engine.alloc_ns(Some(doc), Some("urn:other"), Some("o")).unwrap();
        engine.doc_data_mut(doc).unwrap().old_ns = Some(other);

        let xml = engine.search_ns(Some(doc), a, Some("xml")).unwrap();
        assert_ne!(xml, other);
        assert_eq!(engine.ns_prefix(xml), Some("xml"));
        assert_eq!(engine.ns_href(xml), Some(XML_NAMESPACE));
        assert_eq!(engine.siblings_from(Some(xml)).collect::<Vec<_>>(), vec![xml, other]);
        assert_eq!(engine.search_ns(Some(doc), a, Some("xml")), Some(xml));

        engine.free_doc(doc).unwrap();
        assert_eq!(engine.live_nodes(), 0);
    }

    #[test]
    fn test_declare_xml_reports_failure() {
        let mut engine = Engine::default();
        let text = engine.new_text(Some("loose")).unwrap();
        assert_eq!(engine.declare_xml(None, text), Err(TreeError::NotLinked(text)));
        assert_eq!(engine.search_ns(None, text, Some("xml")), None);
        assert_eq!(engine.set_lang(text, "en"), Err(TreeError::WrongKind(NodeKind::Text)));
    }

    #[test]
    fn test_entity_boundary_stops_search() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        engine.new_ns(Some(a), Some("u1"), Some("x")).unwrap();
        let r = engine.new_reference(Some(doc), "ent").unwrap();
        engine.add_child(a, r).unwrap();
        assert_eq!(engine.search_ns(Some(doc), r, Some("x")), None);
        assert_eq!(engine.ns_in_scope(r, a, Some("x")), NsScope::Unreachable);
    }

    #[test]
    fn test_search_by_href_respects_shadowing() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        let outer = engine.new_ns(Some(a), Some("u1"), Some("x")).unwrap();
        let b = engine.new_child(a, None, "b", None).unwrap();
        engine.new_ns(Some(b), Some("u2"), Some("x")).unwrap();
        let c = engine.new_child(b, None, "c", None).unwrap();
        assert_eq!(engine.search_ns_by_href(Some(doc), c, "u1"), None);
        assert_eq!(engine.ns_in_scope(c, a, Some("x")), NsScope::Shadowed);
        assert_eq!(engine.search_ns_by_href(Some(doc), b, "u1"), None);
        let sibling = engine.new_child(a, None, "s", None).unwrap();
        assert_eq!(engine.search_ns_by_href(Some(doc), sibling, "u1"), Some(outer));
    }

    #[test]
    fn test_attribute_href_lookup_skips_default() {
        let mut engine = Engine::default();
        let (doc, a) = doc_with_root(&mut engine);
        engine.new_ns(Some(a), Some("urn:d"), None).unwrap();
        let attr = engine.new_prop(Some(a), "k", Some("v")).unwrap();
        assert_eq!(engine.search_ns_by_href(Some(doc), attr, "urn:d"), None);
        let p = engine.new_ns(Some(a), Some("urn:d"), Some("p")).unwrap();
        assert_eq!(engine.search_ns_by_href(Some(doc), attr, "urn:d"), Some(p));
    }

    #[test]
    fn test_ns_list_nearest_first() {
        let mut engine = Engine::default();
        let (_, a) = doc_with_root(&mut engine);
        let outer_y = engine.new_ns(Some(a), Some("u3"), Some("y")).unwrap();
        engine.new_ns(Some(a), Some("u1"), Some("x")).unwrap();
        let b = engine.new_child(a, None, "b", None).unwrap();
        let inner_x = engine.new_ns(Some(b), Some("u2"), Some("x")).unwrap();
        assert_eq!(engine.get_ns_list(b), vec![inner_x, outer_y]);
    }

    #[test]
    fn test_reconcile_moved_subtree() {
        let mut engine = Engine::default();
        let (src_doc, src_root) = doc_with_root(&mut engine);
        let src_ns = engine.new_ns(Some(src_root), Some("urn:a"), Some("x")).unwrap();
        let moved = engine.new_child(src_root, Some(src_ns), "c", None).unwrap();
        let inner = engine.new_child(moved, Some(src_ns), "d", None).unwrap();
        let attr = engine.new_ns_prop(Some(inner), Some(src_ns), "k", Some("v")).unwrap();

        let (dst_doc, dst_root) = doc_with_root(&mut engine);
        engine.new_ns(Some(dst_root), Some("urn:b"), Some("x")).unwrap();
        engine.add_child(dst_root, moved).unwrap();
        engine.reconcile_ns(Some(dst_doc), moved).unwrap();

        let decls: Vec<_> = engine.ns_defs(moved).collect();
        assert_eq!(decls.len(), 1);
        let fresh = decls[0];
        assert_eq!(engine.ns_prefix(fresh), Some("x2"));
        assert_eq!(engine.ns_href(fresh), Some("urn:a"));
        assert_eq!(engine.ns_of(moved), Some(fresh));
        assert_eq!(engine.ns_of(inner), Some(fresh));
        assert_eq!(engine.ns_of(attr), Some(fresh));
        // Source declaration untouched
        assert_eq!(engine.ns_defs(src_root).collect::<Vec<_>>(), vec![src_ns]);
        let _ = src_doc;
    }

    #[test]
    fn test_reconcile_reuses_equivalent_declaration() {
        let mut engine = Engine::default();
        let (_, src_root) = doc_with_root(&mut engine);
        let src_ns = engine.new_ns(Some(src_root), Some("urn:a"), Some("x")).unwrap();
        let moved = engine.new_child(src_root, Some(src_ns), "c", None).unwrap();

        let (dst_doc, dst_root) = doc_with_root(&mut engine);
        let same = engine.new_ns(Some(dst_root), Some("urn:a"), Some("y")).unwrap();
        engine.add_child(dst_root, moved).unwrap();
        engine.reconcile_ns(Some(dst_doc), moved).unwrap();
        assert_eq!(engine.ns_of(moved), Some(same));
        assert_eq!(engine.ns_defs(moved).count(), 0);
    }

    #[test]
    fn test_reconcile_probe_limit() {
        let mut engine = Engine::new(EngineConfig::new().with_reconcile_probe_limit(2));
        let (doc, root) = doc_with_root(&mut engine);
        engine.new_ns(Some(root), Some("u1"), Some("p")).unwrap();
        engine.new_ns(Some(root), Some("u2"), Some("p2")).unwrap();
        let foreign = engine.new_ns(None, Some("u3"), Some("p")).unwrap();
        assert_eq!(
            engine.new_reconciled_ns(Some(doc), root, foreign),
            Err(TreeError::ReconcileOverflow(2))
        );
        engine.new_ns(Some(root), Some("u4"), None).unwrap();
        let unprefixed = engine.new_ns(None, Some("u5"), None).unwrap();
        let made = engine.new_reconciled_ns(Some(doc), root, unprefixed).unwrap();
        assert_eq!(engine.ns_prefix(made), Some("default"));
    }

    #[test]
    fn test_reconcile_document_mismatch() {
        let mut engine = Engine::default();
        let (_, root) = doc_with_root(&mut engine);
        let other = engine.new_doc(None).unwrap();
        assert_eq!(engine.reconcile_ns(Some(other), root), Err(TreeError::DocumentMismatch(root)));
    }

    #[test]
    fn test_free_ns_repairs_chain() {
        let mut engine = Engine::default();
        let (_, a) = doc_with_root(&mut engine);
        let x = engine.new_ns(Some(a), Some("u1"), Some("x")).unwrap();
        let y = engine.new_ns(Some(a), Some("u2"), Some("y")).unwrap();
        engine.free_ns(x).unwrap();
        assert_eq!(engine.ns_defs(a).collect::<Vec<_>>(), vec![y]);
        engine.free_ns_list(y).unwrap();
        assert_eq!(engine.ns_defs(a).count(), 0);
    }
}
