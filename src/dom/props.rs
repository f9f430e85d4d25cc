//! Attributes
//!
//! An attribute's value is its children chain, normally a single text
//! node. Reads fall back to DTD default values when
//! `EngineConfig::check_dtd` is set and the element has no explicit
//! attribute.

use url::Url;

use crate::core::qname::split_qname2;
use crate::dom::engine::Engine;
use crate::dom::namespace::XML_NAMESPACE;
use crate::dom::node::{AttributeData, NodeData, NodeId, NodeKind, XmlNode};
use crate::error::{Result, TreeError};

/// Resolve `reference` against `base`. Bases that are not URLs are
/// joined as paths.
fn build_uri(reference: &str, base: &str) -> String {
    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    match Url::parse(base) {
        Ok(base) => match base.join(reference) {
            Ok(url) => url.into(),
            Err(_) => reference.to_string(),
        },
        Err(_) => match base.rfind('/') {
            Some(i) => format!("{}{}", &base[..=i], reference),
            None => reference.to_string(),
        },
    }
}

/// Bases with one of these schemes are not resolved any further
fn is_absolute_base(base: &str) -> bool {
    ["http://", "ftp://", "urn:"].iter().any(|p| base.starts_with(p))
}

impl Engine {
    fn alloc_prop(
        &mut self,
        doc: Option<NodeId>,
        ns: Option<NodeId>,
        name: &str,
    ) -> Result<NodeId> {
        if let Some(ns) = ns {
            self.expect_kind(ns, NodeKind::Namespace)?;
        }
        let mut node = XmlNode::new(NodeData::Attribute(AttributeData { ns, is_id: false }), doc);
        node.name = Some(self.make_ref(doc, name));
        self.alloc(node)
    }

    /// Store `value` as the single literal text child of `attr`
    fn set_prop_value(&mut self, attr: NodeId, value: Option<&str>) -> Result<()> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let doc = self.doc_of(attr);
        let text = self.new_doc_text(doc, Some(value))?;
        self.link_child(attr, text)
    }

    fn register_if_id(&mut self, elem: NodeId, attr: NodeId, value: Option<&str>) {
        let Some(doc) = self.doc_of(elem).filter(|&d| self.is_document(d)) else {
            return;
        };
        if !self.is_id(Some(doc), Some(elem), attr) {
            return;
        }
        if let Err(err) = self.add_id(doc, value.unwrap_or(""), attr) {
            log::debug!(target: "rustytree.tree", "ID not registered: {}", err);
        }
    }

    /// Create an attribute, appended to `node` when given
    pub fn new_prop(&mut self, node: Option<NodeId>, name: &str, value: Option<&str>) -> Result<NodeId> {
        self.new_ns_prop(node, None, name, value)
    }

    /// Create a namespaced attribute, appended to `node` when given
    pub fn new_ns_prop(
        &mut self,
        node: Option<NodeId>,
        ns: Option<NodeId>,
        name: &str,
        value: Option<&str>,
    ) -> Result<NodeId> {
        if let Some(elem) = node {
            self.expect_kind(elem, NodeKind::Element)?;
        }
        let doc = node.and_then(|n| self.doc_of(n));
        let attr = self.alloc_prop(doc, ns, name)?;
        if let Err(err) = self.set_prop_value(attr, value) {
            self.free_subtree(attr);
            return Err(err);
        }
        if let Some(elem) = node {
            self.link_property(elem, attr)?;
            self.register_if_id(elem, attr, value);
        }
        Ok(attr)
    }

    /// Detached attribute whose value may contain entity references
    pub fn new_doc_prop(&mut self, doc: Option<NodeId>, name: &str, value: Option<&str>) -> Result<NodeId> {
        let attr = self.alloc_prop(doc, None, name)?;
        if let Some(value) = value {
            match self.attach_parsed(attr, value) {
                Ok(Some(err)) => log::debug!(target: "rustytree.content", "attribute {:?}: {}", name, err),
                Ok(None) => {}
                Err(err) => {
                    self.free_subtree(attr);
                    return Err(err);
                }
            }
        }
        Ok(attr)
    }

    /// Attribute of `elem` called `name`. With `href` only attributes in
    /// that namespace match, without it only attributes in no namespace.
    pub(crate) fn find_attribute(&self, elem: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        self.attributes(elem).find(|&attr| {
            if self.name(attr) != Some(name) {
                return false;
            }
            let attr_href = self.ns_of(attr).map(|ns| self.ns_href(ns));
            match (href, attr_href) {
                (None, None) => true,
                (Some(h), Some(Some(found))) => h == found,
                _ => false,
            }
        })
    }

    /// DTD declaration supplying a default for `name` on `elem`
    fn dtd_attr_default(&self, elem: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        if !self.config().check_dtd {
            return None;
        }
        let doc = self.doc_of(elem).filter(|&d| self.is_document(d))?;
        let elem_name = self.qualified_name(elem)?.into_owned();
        let subsets = [self.get_int_subset(doc), self.get_ext_subset(doc)];
        let prefixes: Vec<Option<String>> = match href {
            None => vec![None],
            Some(href) => self
                .get_ns_list(elem)
                .into_iter()
                .filter(|&ns| self.ns_href(ns) == Some(href))
                .filter_map(|ns| self.ns_prefix(ns).map(|p| Some(p.to_string())))
                .collect(),
        };
        subsets.into_iter().flatten().find_map(|dtd| {
            prefixes.iter().find_map(|prefix| {
                self.get_dtd_qattr_desc(dtd, &elem_name, name, prefix.as_deref())
                    .filter(|&decl| self.attr_decl_default(decl).is_some())
            })
        })
    }

    /// Attribute called `name` in any namespace, or the DTD declaration
    /// providing its default
    pub fn has_prop(&self, node: NodeId, name: &str) -> Option<NodeId> {
        if self.kind(node) != Some(NodeKind::Element) {
            return None;
        }
        self.attributes(node)
            .find(|&attr| self.name(attr) == Some(name))
            .or_else(|| self.dtd_attr_default(node, name, None))
    }

    /// Attribute `name` in namespace `href`, or its DTD declaration
    pub fn has_ns_prop(&self, node: NodeId, name: &str, href: Option<&str>) -> Option<NodeId> {
        if self.kind(node) != Some(NodeKind::Element) {
            return None;
        }
        self.find_attribute(node, name, href)
            .or_else(|| self.dtd_attr_default(node, name, href))
    }

    /// Value of an attribute node or a declaration's default
    fn prop_value(&self, prop: NodeId) -> Option<String> {
        if self.kind(prop) == Some(NodeKind::AttributeDecl) {
            return self.attr_decl_default(prop).map(str::to_string);
        }
        let Some(first) = self.first_child(prop) else {
            return Some(String::new());
        };
        if self.next_sibling(first).is_none() && matches!(self.kind(first), Some(NodeKind::Text | NodeKind::CData)) {
            return Some(self.raw_content(first).unwrap_or("").to_string());
        }
        Some(self.node_list_get_string(first, true))
    }

    /// Value of attribute `name` regardless of namespace
    pub fn get_prop(&self, node: NodeId, name: &str) -> Option<String> {
        self.prop_value(self.has_prop(node, name)?)
    }

    /// Value of attribute `name` in no namespace
    pub fn get_no_ns_prop(&self, node: NodeId, name: &str) -> Option<String> {
        self.prop_value(self.has_ns_prop(node, name, None)?)
    }

    /// Value of attribute `name` in namespace `href`
    pub fn get_ns_prop(&self, node: NodeId, name: &str, href: Option<&str>) -> Option<String> {
        self.prop_value(self.has_ns_prop(node, name, href)?)
    }

    /// Set attribute `name`. A `prefix:local` name is bound through the
    /// prefix's in-scope declaration when there is one.
    pub fn set_prop(&mut self, node: NodeId, name: &str, value: Option<&str>) -> Result<NodeId> {
        if let Some((prefix, local)) = split_qname2(name) {
            let doc = self.doc_of(node);
            if let Some(ns) = self.search_ns(doc, node, Some(prefix)) {
                return self.set_ns_prop(node, Some(ns), local, value);
            }
        }
        self.set_ns_prop(node, None, name, value)
    }

    /// Set attribute `name` in namespace `ns`, replacing the value of an
    /// existing one
    pub fn set_ns_prop(
        &mut self,
        node: NodeId,
        ns: Option<NodeId>,
        name: &str,
        value: Option<&str>,
    ) -> Result<NodeId> {
        self.expect_kind(node, NodeKind::Element)?;
        let href = match ns {
            Some(ns) => {
                self.expect_kind(ns, NodeKind::Namespace)?;
                Some(self.ns_href(ns).ok_or(TreeError::WrongKind(NodeKind::Namespace))?.to_string())
            }
            None => None,
        };
        let Some(prop) = self.find_attribute(node, name, href.as_deref()) else {
            return self.new_ns_prop(Some(node), ns, name, value);
        };

        let doc = self.doc_of(node).filter(|&d| self.is_document(d));
        let was_id = matches!(&self.node(prop)?.data, NodeData::Attribute(a) if a.is_id);
        if let (true, Some(doc)) = (was_id, doc) {
            let _ = self.remove_id(doc, prop);
        }
        if let Some(first) = self.first_child(prop) {
            self.free_node_list(first)?;
        }
        self.set_ns(prop, ns)?;
        self.set_prop_value(prop, value)?;
        match (was_id, doc) {
            (true, Some(doc)) => {
                if let Err(err) = self.add_id(doc, value.unwrap_or(""), prop) {
                    log::debug!(target: "rustytree.tree", "ID not registered: {}", err);
                }
            }
            _ => self.register_if_id(node, prop, value),
        }
        Ok(prop)
    }

    /// Remove attribute `name` in no namespace
    pub fn unset_prop(&mut self, node: NodeId, name: &str) -> Result<()> {
        let prop = self
            .find_attribute(node, name, None)
            .ok_or_else(|| TreeError::NoSuchAttribute(name.to_string()))?;
        self.free_prop(prop)
    }

    /// Remove attribute `name` in namespace `ns`
    pub fn unset_ns_prop(&mut self, node: NodeId, ns: Option<NodeId>, name: &str) -> Result<()> {
        let href = ns.and_then(|ns| self.ns_href(ns)).map(str::to_string);
        let prop = self
            .find_attribute(node, name, href.as_deref())
            .ok_or_else(|| TreeError::NoSuchAttribute(name.to_string()))?;
        self.free_prop(prop)
    }

    /// Detach and free an attribute that belongs to an element
    pub fn remove_prop(&mut self, attr: NodeId) -> Result<()> {
        self.expect_kind(attr, NodeKind::Attribute)?;
        if self.parent(attr).is_none() {
            return Err(TreeError::NotLinked(attr));
        }
        self.free_prop(attr)
    }

    // ------------------------------------------------------------------
    // xml:lang, xml:space, xml:base
    // ------------------------------------------------------------------

    fn set_xml_prop(&mut self, node: NodeId, name: &str, value: Option<&str>) -> Result<NodeId> {
        self.expect_kind(node, NodeKind::Element)?;
        let doc = self.doc_of(node);
        let ns = self.declare_xml(doc, node)?;
        self.set_ns_prop(node, Some(ns), name, value)
    }

    /// `node` and its element ancestors, nearest first
    fn element_scope(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .filter(|&id| self.kind(id) == Some(NodeKind::Element))
    }

    pub fn set_lang(&mut self, node: NodeId, lang: &str) -> Result<()> {
        self.set_xml_prop(node, "lang", Some(lang)).map(|_| ())
    }

    /// Language in effect at `node`
    pub fn get_lang(&self, node: NodeId) -> Option<String> {
        self.element_scope(node)
            .find_map(|id| self.get_ns_prop(id, "lang", Some(XML_NAMESPACE)))
    }

    pub fn set_space_preserve(&mut self, node: NodeId, preserve: bool) -> Result<()> {
        let value = if preserve { "preserve" } else { "default" };
        self.set_xml_prop(node, "space", Some(value)).map(|_| ())
    }

    /// Whitespace handling in effect at `node`: `Some(true)` for
    /// preserve, `Some(false)` for default, `None` when unspecified
    pub fn get_space_preserve(&self, node: NodeId) -> Option<bool> {
        self.element_scope(node).find_map(|id| {
            match self.get_ns_prop(id, "space", Some(XML_NAMESPACE)).as_deref() {
                Some("preserve") => Some(true),
                Some("default") => Some(false),
                _ => None,
            }
        })
    }

    /// Set `xml:base` on an element, or the URL of a document
    pub fn set_base(&mut self, node: NodeId, uri: Option<&str>) -> Result<()> {
        match self.kind_of(node)? {
            NodeKind::Document => self.set_doc_url(node, uri),
            NodeKind::Element => self.set_xml_prop(node, "base", uri).map(|_| ()),
            other => Err(TreeError::WrongKind(other)),
        }
    }

    /// Base URI of `node`: the `xml:base` values from the node outward,
    /// each resolved against the next, and finally the document URL
    pub fn get_base(&self, doc: Option<NodeId>, node: NodeId) -> Option<String> {
        let doc = doc.or_else(|| self.doc_of(node)).filter(|&d| self.is_document(d));
        let mut base: Option<String> = None;
        for id in self.element_scope(node) {
            let Some(found) = self.get_ns_prop(id, "base", Some(XML_NAMESPACE)) else {
                continue;
            };
            let resolved = match base.take() {
                Some(inner) => build_uri(&inner, &found),
                None => found,
            };
            if is_absolute_base(&resolved) {
                return Some(resolved);
            }
            base = Some(resolved);
        }
        match (base, doc.and_then(|d| self.doc_url(d))) {
            (Some(inner), Some(url)) => Some(build_uri(&inner, url)),
            (None, Some(url)) => Some(url.to_string()),
            (base, None) => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::dtd::{AttDefault, AttType};

    fn setup_with(config: EngineConfig) -> (Engine, NodeId, NodeId) {
        let mut engine = Engine::new(config);
        let doc = engine.new_doc(None).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "root", None).unwrap();
        engine.set_root_element(doc, root).unwrap();
        (engine, doc, root)
    }

    fn setup() -> (Engine, NodeId, NodeId) {
        setup_with(EngineConfig::default())
    }

    #[test]
    fn test_set_and_get() {
        let (mut engine, _, root) = setup();
        let attr = engine.set_prop(root, "color", Some("red")).unwrap();
        assert_eq!(engine.get_prop(root, "color").as_deref(), Some("red"));
        let again = engine.set_prop(root, "color", Some("blue")).unwrap();
        assert_eq!(attr, again);
        assert_eq!(engine.attributes(root).count(), 1);
        assert_eq!(engine.get_no_ns_prop(root, "color").as_deref(), Some("blue"));
        // Literal, not parsed
        engine.set_prop(root, "expr", Some("a &amp; b")).unwrap();
        assert_eq!(engine.get_prop(root, "expr").as_deref(), Some("a &amp; b"));
        engine.set_prop(root, "empty", None).unwrap();
        assert_eq!(engine.get_prop(root, "empty").as_deref(), Some(""));
        assert_eq!(engine.get_prop(root, "missing"), None);
    }

    #[test]
    fn test_doc_prop_parses_value() {
        let (mut engine, doc, root) = setup();
        let attr = engine.new_doc_prop(Some(doc), "expr", Some("a &amp; b")).unwrap();
        engine.add_child(root, attr).unwrap();
        assert_eq!(engine.get_prop(root, "expr").as_deref(), Some("a & b"));
    }

    #[test]
    fn test_namespaced_props() {
        let (mut engine, _, root) = setup();
        let ns = engine.new_ns(Some(root), Some("urn:x"), Some("x")).unwrap();
        engine.set_ns_prop(root, Some(ns), "k", Some("ns")).unwrap();
        engine.set_prop(root, "k", Some("plain")).unwrap();
        assert_eq!(engine.attributes(root).count(), 2);
        assert_eq!(engine.get_ns_prop(root, "k", Some("urn:x")).as_deref(), Some("ns"));
        assert_eq!(engine.get_no_ns_prop(root, "k").as_deref(), Some("plain"));

        // Prefixed names bind through the declaration
        engine.set_prop(root, "x:k", Some("via prefix")).unwrap();
        assert_eq!(engine.get_ns_prop(root, "k", Some("urn:x")).as_deref(), Some("via prefix"));
        assert_eq!(engine.attributes(root).count(), 2);

        engine.unset_ns_prop(root, Some(ns), "k").unwrap();
        assert_eq!(engine.has_ns_prop(root, "k", Some("urn:x")), None);
        engine.unset_prop(root, "k").unwrap();
        assert_eq!(engine.unset_prop(root, "k"), Err(TreeError::NoSuchAttribute("k".into())));
    }

    #[test]
    fn test_dtd_default_values() {
        let (mut engine, doc, root) = setup();
        let dtd = engine.create_int_subset(Some(doc), Some("root"), None, None).unwrap();
        let decl = engine
            .add_attribute_decl(dtd, "root", "lang", None, AttType::CData, AttDefault::Default("en".into()))
            .unwrap();
        engine
            .add_attribute_decl(dtd, "root", "req", None, AttType::CData, AttDefault::Required)
            .unwrap();
        assert_eq!(engine.has_prop(root, "lang"), Some(decl));
        assert_eq!(engine.get_prop(root, "lang").as_deref(), Some("en"));
        assert_eq!(engine.has_prop(root, "req"), None);
        engine.set_prop(root, "lang", Some("fr")).unwrap();
        assert_eq!(engine.get_prop(root, "lang").as_deref(), Some("fr"));

        let (mut quiet, qdoc, qroot) = setup_with(EngineConfig::new().with_check_dtd(false));
        let qdtd = quiet.create_int_subset(Some(qdoc), Some("root"), None, None).unwrap();
        quiet
            .add_attribute_decl(qdtd, "root", "lang", None, AttType::CData, AttDefault::Fixed("en".into()))
            .unwrap();
        assert_eq!(quiet.get_prop(qroot, "lang"), None);
    }

    #[test]
    fn test_namespaced_dtd_default() {
        let (mut engine, doc, root) = setup();
        engine.new_ns(Some(root), Some("urn:x"), Some("x")).unwrap();
        let dtd = engine.create_int_subset(Some(doc), Some("root"), None, None).unwrap();
        engine
            .add_attribute_decl(dtd, "root", "mode", Some("x"), AttType::CData, AttDefault::Default("on".into()))
            .unwrap();
        assert_eq!(engine.get_ns_prop(root, "mode", Some("urn:x")).as_deref(), Some("on"));
        assert_eq!(engine.get_ns_prop(root, "mode", Some("urn:other")), None);
    }

    #[test]
    fn test_id_attributes_are_indexed() {
        let (mut engine, doc, root) = setup();
        let dtd = engine.create_int_subset(Some(doc), Some("root"), None, None).unwrap();
        engine
            .add_attribute_decl(dtd, "item", "key", None, AttType::Id, AttDefault::Implied)
            .unwrap();
        let item = engine.new_child(root, None, "item", None).unwrap();
        let attr = engine.set_prop(item, "key", Some("k1")).unwrap();
        assert_eq!(engine.get_id(doc, "k1"), Some(attr));
        engine.set_prop(item, "key", Some("k2")).unwrap();
        assert_eq!(engine.get_id(doc, "k1"), None);
        assert_eq!(engine.get_id(doc, "k2"), Some(attr));
        engine.remove_prop(attr).unwrap();
        assert_eq!(engine.get_id(doc, "k2"), None);
    }

    #[test]
    fn test_xml_id() {
        let (mut engine, doc, root) = setup();
        let xml = engine.search_ns_by_href(Some(doc), root, XML_NAMESPACE).unwrap();
        let attr = engine.new_ns_prop(Some(root), Some(xml), "id", Some("top")).unwrap();
        assert_eq!(engine.get_id(doc, "top"), Some(attr));
        assert!(engine.is_id(Some(doc), Some(root), attr));
    }

    #[test]
    fn test_remove_prop_needs_parent() {
        let (mut engine, doc, _) = setup();
        let loose = engine.new_doc_prop(Some(doc), "k", Some("v")).unwrap();
        assert_eq!(engine.remove_prop(loose), Err(TreeError::NotLinked(loose)));
    }

    #[test]
    fn test_lang_and_space_inherit() {
        let (mut engine, _, root) = setup();
        let child = engine.new_child(root, None, "c", None).unwrap();
        assert_eq!(engine.get_lang(child), None);
        assert_eq!(engine.get_space_preserve(child), None);
        engine.set_lang(root, "en-GB").unwrap();
        engine.set_space_preserve(root, true).unwrap();
        assert_eq!(engine.get_lang(child).as_deref(), Some("en-GB"));
        assert_eq!(engine.get_space_preserve(child), Some(true));
        engine.set_space_preserve(child, false).unwrap();
        assert_eq!(engine.get_space_preserve(child), Some(false));
        assert_eq!(engine.qualified_name(engine.has_prop(root, "lang").unwrap()).as_deref(), Some("xml:lang"));
    }

    #[test]
    fn test_base_resolution() {
        let (mut engine, doc, root) = setup();
        engine.set_base(doc, Some("http://example.com/docs/index.xml")).unwrap();
        let section = engine.new_child(root, None, "section", None).unwrap();
        let leaf = engine.new_child(section, None, "leaf", None).unwrap();
        assert_eq!(engine.get_base(None, leaf).as_deref(), Some("http://example.com/docs/index.xml"));

        engine.set_base(section, Some("guide/")).unwrap();
        engine.set_base(leaf, Some("intro.xml")).unwrap();
        assert_eq!(
            engine.get_base(None, leaf).as_deref(),
            Some("http://example.com/docs/guide/intro.xml")
        );

        engine.set_base(root, Some("http://other.org/")).unwrap();
        assert_eq!(engine.get_base(None, leaf).as_deref(), Some("http://other.org/guide/intro.xml"));
    }

    #[test]
    fn test_build_uri_fallback() {
        assert_eq!(build_uri("b.xml", "dir/a.xml"), "dir/b.xml");
        assert_eq!(build_uri("b.xml", "a.xml"), "b.xml");
        assert_eq!(build_uri("urn:isbn:1", "http://x/"), "urn:isbn:1");
    }
}
