//! Copying nodes, lists, DTDs and documents
//!
//! Copies are built detached and linked only once complete, except when
//! a parent is given: then the copy is attached first (so namespace
//! lookups see the destination scope) and removed again if a later
//! step fails. Attaching may coalesce text, so callers continue with the
//! returned id.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::core::entities::predefined_entity;
use crate::dom::engine::Engine;
use crate::dom::node::{ElementData, EntityChildren, NodeData, NodeId, NodeKind, XmlNode};
use crate::error::{Result, TreeError};

/// How much of a node to copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyDepth {
    /// The node alone
    Shallow,
    /// The node with its namespace declarations and attributes
    Properties,
    /// Everything, children included
    #[default]
    Deep,
}

impl CopyDepth {
    /// Map the host's numeric level: 0 shallow, 1 deep, 2 properties
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(CopyDepth::Shallow),
            1 => Some(CopyDepth::Deep),
            2 => Some(CopyDepth::Properties),
            _ => None,
        }
    }
}

impl Engine {
    /// Detached copy of a namespace declaration
    pub fn copy_namespace(&mut self, ns: NodeId) -> Result<NodeId> {
        self.expect_kind(ns, NodeKind::Namespace)?;
        let href = self.ns_href(ns).map(str::to_string);
        let prefix = self.ns_prefix(ns).map(str::to_string);
        self.alloc_ns(None, href.as_deref(), prefix.as_deref())
    }

    /// Copy a declaration chain; returns the head of the copy
    pub fn copy_namespace_list(&mut self, first: NodeId) -> Result<NodeId> {
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        let mut copies: Vec<NodeId> = Vec::with_capacity(chain.len());
        for ns in chain {
            let copy = match self.copy_namespace(ns) {
                Ok(copy) => copy,
                Err(err) => {
                    for made in copies {
                        self.release(made);
                    }
                    return Err(err);
                }
            };
            if let Some(&prev) = copies.last() {
                self.link_after(prev, copy)?;
            }
            copies.push(copy);
        }
        copies.first().copied().ok_or(TreeError::NoSuchNode(first))
    }

    /// Topmost element above `node`, where out-of-scope declarations go
    fn declaration_root(&self, node: NodeId) -> NodeId {
        let mut root = node;
        let mut below = None;
        while let Some(parent) = self.parent(root) {
            below = Some(root);
            root = parent;
        }
        if self.kind(root) == Some(NodeKind::Element) {
            return root;
        }
        below
            .filter(|&b| self.kind(b) == Some(NodeKind::Element))
            .unwrap_or(node)
    }

    /// Declaration in the destination scope of `target` standing in for
    /// the source declaration `src_ns`
    fn resolve_copied_ns(
        &mut self,
        target: NodeId,
        doc: Option<NodeId>,
        src_ns: NodeId,
    ) -> Result<Option<NodeId>> {
        if self.kind(src_ns) != Some(NodeKind::Namespace) {
            log::warn!(target: "rustytree.copy", "source refers to freed namespace {}", src_ns);
            return Ok(None);
        }
        let prefix = self.ns_prefix(src_ns).map(str::to_string);
        let href = self.ns_href(src_ns).map(str::to_string);
        match self.search_ns(doc, target, prefix.as_deref()) {
            Some(found) if self.ns_href(found) == href.as_deref() => Ok(Some(found)),
            Some(_) => self.new_reconciled_ns(doc, target, src_ns).map(Some),
            None => {
                let root = self.declaration_root(target);
                log::debug!(
                    target: "rustytree.copy",
                    "declaring {:?} on {} for a copied reference",
                    prefix, root
                );
                self.new_ns(Some(root), href.as_deref(), prefix.as_deref()).map(Some)
            }
        }
    }

    /// Copy an attribute for `target`. The copy is not linked; its
    /// namespace is resolved in the scope of `target` and ID values are
    /// registered in the target's document.
    pub fn copy_prop(&mut self, target: Option<NodeId>, attr: NodeId) -> Result<NodeId> {
        self.expect_kind(attr, NodeKind::Attribute)?;
        if let Some(target) = target {
            self.expect_kind(target, NodeKind::Element)?;
        }
        let doc = match target {
            Some(t) => self.doc_of(t),
            None => self
                .parent(attr)
                .and_then(|p| self.doc_of(p))
                .or_else(|| self.doc_of(attr)),
        };
        let name = self.name(attr).unwrap_or("").to_string();
        let copy = self.new_doc_prop(doc, &name, None)?;
        if let Err(err) = self.fill_prop(target, attr, copy, doc) {
            self.free_subtree(copy);
            return Err(err);
        }
        Ok(copy)
    }

    fn fill_prop(&mut self, target: Option<NodeId>, attr: NodeId, copy: NodeId, doc: Option<NodeId>) -> Result<()> {
        if let (Some(src_ns), Some(target)) = (self.ns_of(attr), target) {
            let ns = self.resolve_copied_ns(target, doc, src_ns)?;
            self.set_ns(copy, ns)?;
        }
        if let Some(first) = self.first_child(attr) {
            self.copy_list(first, doc, Some(copy))?;
        }

        let Some(target_doc) = doc.filter(|&d| self.is_document(d)) else {
            return Ok(());
        };
        if target.is_none() {
            return Ok(());
        }
        let src_doc = self.doc_of(attr).filter(|&d| self.is_document(d));
        let src_parent = self.parent(attr);
        if src_doc.is_some() && src_parent.is_some() && self.is_id(src_doc, src_parent, attr) {
            let value = self
                .first_child(attr)
                .map(|first| self.node_list_get_string(first, true))
                .unwrap_or_default();
            if let Err(err) = self.add_id(target_doc, &value, copy) {
                log::debug!(target: "rustytree.copy", "copied ID {:?} not registered: {}", value, err);
            }
        }
        Ok(())
    }

    /// Copy an attribute chain. With a target every copy is appended to
    /// its attributes; without one the copies form a detached chain.
    pub fn copy_prop_list(&mut self, target: Option<NodeId>, first: NodeId) -> Result<Option<NodeId>> {
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        let mut copies: Vec<NodeId> = Vec::with_capacity(chain.len());
        for attr in chain {
            let step = self.copy_prop(target, attr).and_then(|copy| {
                match (target, copies.last()) {
                    (Some(target), _) => self.link_property(target, copy)?,
                    (None, Some(&prev)) => self.link_after(prev, copy)?,
                    (None, None) => {}
                }
                Ok(copy)
            });
            match step {
                Ok(copy) => copies.push(copy),
                Err(err) => {
                    for made in copies {
                        let _ = self.free_prop(made);
                    }
                    return Err(err);
                }
            }
        }
        Ok(copies.first().copied())
    }

    /// Allocate the copy of a node that is not a document, DTD,
    /// declaration, attribute or namespace
    fn alloc_copy(&mut self, node: NodeId, doc: Option<NodeId>) -> Result<NodeId> {
        let src = self.node(node)?;
        let src_doc = src.doc;
        let name = self.name(node).map(str::to_string);
        let (data, content) = match &src.data {
            NodeData::Element(_) => (NodeData::Element(ElementData::default()), None),
            NodeData::EntityRef { target } => {
                let target = if doc.is_some() && src_doc == doc {
                    *target
                } else {
                    name.as_deref().and_then(|n| self.declared_entity(doc, n))
                };
                let content = match target {
                    Some(ent) => self.raw_content(ent).map(str::to_string),
                    None => name.as_deref().and_then(predefined_entity).map(str::to_string),
                };
                (NodeData::EntityRef { target }, content)
            }
            data @ (NodeData::Text(_)
            | NodeData::CData
            | NodeData::Comment
            | NodeData::ProcessingInstruction
            | NodeData::DocumentFragment) => (data.clone(), self.raw_content(node).map(str::to_string)),
            _ => return Err(TreeError::WrongKind(src.kind())),
        };
        let mut copy = XmlNode::new(data, doc);
        copy.name = name.map(|n| self.make_ref(doc, &n));
        copy.content = content.map(|c| self.make_ref(doc, &c));
        self.alloc(copy)
    }

    fn copy_into(
        &mut self,
        node: NodeId,
        doc: Option<NodeId>,
        parent: Option<NodeId>,
        depth: CopyDepth,
    ) -> Result<NodeId> {
        let kind = self.kind_of(node)?;
        match kind {
            NodeKind::Attribute => {
                let copy = self.copy_prop(parent, node)?;
                if self.doc_of(copy) != doc && parent.is_none() {
                    self.set_tree_doc(copy, doc)?;
                }
                return Ok(copy);
            }
            NodeKind::Namespace => return self.copy_namespace_list(node),
            NodeKind::Document => return self.copy_doc(node, depth != CopyDepth::Shallow),
            NodeKind::Dtd
            | NodeKind::Notation
            | NodeKind::ElementDecl
            | NodeKind::AttributeDecl
            | NodeKind::EntityDecl => return Err(TreeError::WrongKind(kind)),
            _ => {}
        }

        let copy = self.alloc_copy(node, doc)?;
        if let Some(parent) = parent {
            match self.add_child(parent, copy) {
                Ok(survivor) if survivor != copy => return Ok(survivor),
                Ok(_) => {}
                Err(err) => {
                    if self.contains(copy) {
                        let _ = self.free_node(copy);
                    }
                    return Err(err);
                }
            }
        }
        if depth == CopyDepth::Shallow {
            return Ok(copy);
        }
        if let Err(err) = self.copy_contents(node, copy, doc, depth) {
            let _ = self.free_node(copy);
            return Err(err);
        }
        Ok(copy)
    }

    /// Declarations, namespace, attributes and (when deep) children of
    /// `node` onto its fresh copy
    fn copy_contents(&mut self, node: NodeId, copy: NodeId, doc: Option<NodeId>, depth: CopyDepth) -> Result<()> {
        let kind = self.kind_of(node)?;
        if kind == NodeKind::Element {
            let decls: Vec<NodeId> = self.ns_defs(node).collect();
            for decl in decls {
                let href = self.ns_href(decl).map(str::to_string);
                let prefix = self.ns_prefix(decl).map(str::to_string);
                let ns = self.alloc_ns(doc, href.as_deref(), prefix.as_deref())?;
                self.link_ns_def(copy, ns)?;
            }
            if let Some(src_ns) = self.ns_of(node) {
                let ns = self.resolve_copied_ns(copy, doc, src_ns)?;
                self.set_ns(copy, ns)?;
            }
            if let Some(first) = self.attributes(node).next() {
                self.copy_prop_list(Some(copy), first)?;
            }
        }
        if depth == CopyDepth::Deep && kind != NodeKind::EntityRef {
            if let Some(first) = self.first_child(node) {
                self.copy_list(first, doc, Some(copy))?;
            }
        }
        Ok(())
    }

    /// A DTD met while copying a list into `doc`: copied when the
    /// document has no internal subset yet, otherwise the existing one is
    /// linked at this position if it is still detached
    fn copy_list_dtd(&mut self, dtd: NodeId, doc: Option<NodeId>, parent: Option<NodeId>) -> Result<Option<NodeId>> {
        let Some(doc) = doc.filter(|&d| self.is_document(d)) else {
            return Ok(None);
        };
        match self.get_int_subset(doc) {
            None => {
                let copy = self.copy_dtd(dtd)?;
                self.set_tree_doc(copy, Some(doc))?;
                self.doc_data_mut(doc)?.int_subset = Some(copy);
                if let Some(parent) = parent {
                    self.add_child(parent, copy)?;
                }
                Ok(Some(copy))
            }
            Some(existing) => match parent {
                Some(parent) if self.parent(existing).is_none() => self.add_child(parent, existing).map(Some),
                _ => {
                    log::debug!(target: "rustytree.copy", "document {} keeps its internal subset", doc);
                    Ok(None)
                }
            },
        }
    }

    /// Copy `first` and its following siblings, appended to `parent` or
    /// chained detached. On failure every copy made so far is freed and
    /// a reused internal subset is unlinked again. Text already merged
    /// into an existing child of `parent` stays merged.
    fn copy_list(&mut self, first: NodeId, doc: Option<NodeId>, parent: Option<NodeId>) -> Result<Option<NodeId>> {
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        let existing: HashSet<NodeId> = parent
            .map(|p| self.children(p).collect())
            .unwrap_or_default();
        let subset = doc.and_then(|d| self.get_int_subset(d));
        let mut head = None;
        let mut prev: Option<NodeId> = None;
        let mut made: Vec<NodeId> = Vec::new();
        for cur in chain {
            let step = if self.kind(cur) == Some(NodeKind::Dtd) {
                self.copy_list_dtd(cur, doc, parent)
            } else {
                self.copy_into(cur, doc, parent, CopyDepth::Deep).map(Some)
            };
            let copy = match step {
                Ok(Some(copy)) => copy,
                Ok(None) => continue,
                Err(err) => {
                    for id in made.into_iter().filter(|id| !existing.contains(id)) {
                        let undone = if Some(id) == subset { self.unlink(id) } else { self.free_node(id) };
                        if let Err(free_err) = undone {
                            log::warn!(target: "rustytree.copy", "dropping partial copy {}: {}", id, free_err);
                        }
                    }
                    return Err(err);
                }
            };
            // Coalesced into the previous copy
            if prev == Some(copy) {
                continue;
            }
            if parent.is_none() {
                if let Some(prev) = prev {
                    self.link_after(prev, copy)?;
                }
            }
            made.push(copy);
            head.get_or_insert(copy);
            prev = Some(copy);
        }
        Ok(head)
    }

    /// Copy a node outside any document
    pub fn copy_node(&mut self, node: NodeId, depth: CopyDepth) -> Result<NodeId> {
        self.copy_into(node, None, None, depth)
    }

    /// Copy a node for use in `doc`
    pub fn doc_copy_node(&mut self, node: NodeId, doc: Option<NodeId>, depth: CopyDepth) -> Result<NodeId> {
        self.copy_into(node, doc, None, depth)
    }

    /// Copy `node` and every sibling after it as a detached chain
    pub fn copy_node_list(&mut self, first: NodeId) -> Result<Option<NodeId>> {
        self.copy_list(first, None, None)
    }

    /// `copy_node_list` for use in `doc`. A DTD in the list becomes the
    /// document's internal subset unless it already has one.
    pub fn doc_copy_node_list(&mut self, doc: Option<NodeId>, first: NodeId) -> Result<Option<NodeId>> {
        self.copy_list(first, doc, None)
    }

    /// Copy one table of declarations. On failure the copies made so
    /// far are released.
    fn copy_decls<K: Clone + Eq + Hash>(&mut self, table: &HashMap<K, NodeId>) -> Result<HashMap<K, NodeId>> {
        let mut out = HashMap::with_capacity(table.len());
        for (key, &decl) in table {
            match self.copy_decl(decl) {
                Ok(copy) => {
                    out.insert(key.clone(), copy);
                }
                Err(err) => {
                    for copy in out.into_values() {
                        self.free_subtree(copy);
                    }
                    return Err(err);
                }
            }
        }
        Ok(out)
    }

    /// Detached copy of a declaration. Entity children are rebuilt on
    /// demand in the copy.
    fn copy_decl(&mut self, decl: NodeId) -> Result<NodeId> {
        let mut data = self.node(decl)?.data.clone();
        if let NodeData::EntityDecl(e) = &mut data {
            e.children = EntityChildren::Unparsed;
        }
        let name = self.name(decl).map(str::to_string);
        let content = self.raw_content(decl).map(str::to_string);
        let mut copy = XmlNode::new(data, None);
        copy.name = name.map(|n| self.make_ref(None, &n));
        copy.content = content.map(|c| self.make_ref(None, &c));
        self.alloc(copy)
    }

    /// Copy a DTD with all its tables, outside any document. Declaration
    /// children are relinked to the copied tables and comments copied.
    pub fn copy_dtd(&mut self, dtd: NodeId) -> Result<NodeId> {
        let (name, external_id, system_id) = {
            let node = self.node(dtd)?;
            let data = node.dtd().ok_or(TreeError::WrongKind(node.kind()))?;
            (self.name(dtd).map(str::to_string), data.external_id.clone(), data.system_id.clone())
        };
        let copy = self.alloc_dtd(None, name.as_deref(), external_id.as_deref(), system_id.as_deref())?;
        if let Err(err) = self.fill_dtd(dtd, copy) {
            self.free_subtree(copy);
            return Err(err);
        }
        Ok(copy)
    }

    fn fill_dtd(&mut self, src: NodeId, copy: NodeId) -> Result<()> {
        let tables = self.dtd_tables(src)?.clone();
        let entities = self.copy_decls(&tables.entities)?;
        self.dtd_tables_mut(copy)?.entities = entities;
        let pentities = self.copy_decls(&tables.pentities)?;
        self.dtd_tables_mut(copy)?.pentities = pentities;
        let elements = self.copy_decls(&tables.elements)?;
        self.dtd_tables_mut(copy)?.elements = elements;
        let attributes = self.copy_decls(&tables.attributes)?;
        self.dtd_tables_mut(copy)?.attributes = attributes;
        let notations = self.copy_decls(&tables.notations)?;
        self.dtd_tables_mut(copy)?.notations = notations;

        let children: Vec<NodeId> = self.children(src).collect();
        for child in children {
            let kind = self.kind_of(child)?;
            let linked = if kind.is_declaration() {
                self.lookup_same_decl(copy, child)
            } else if kind == NodeKind::Comment {
                Some(self.copy_into(child, None, None, CopyDepth::Shallow)?)
            } else {
                None
            };
            if let Some(linked) = linked {
                self.link_child(copy, linked)?;
            }
        }
        Ok(())
    }

    /// Copy a document. Metadata is always copied; with `recursive` the
    /// internal subset, orphaned declarations and content follow.
    pub fn copy_doc(&mut self, doc: NodeId, recursive: bool) -> Result<NodeId> {
        let src = self.doc_data(doc)?;
        let version = src.version.clone();
        let encoding = src.encoding.clone();
        let url = src.url.clone();
        let standalone = src.standalone;
        let compression = src.compression;
        let copy = if src.dict.is_some() {
            self.new_doc_with_dict(version.as_deref())?
        } else {
            self.new_doc(version.as_deref())?
        };
        {
            let data = self.doc_data_mut(copy)?;
            data.encoding = encoding;
            data.url = url;
            data.standalone = standalone;
            data.compression = compression;
        }
        if !recursive {
            return Ok(copy);
        }
        if let Err(err) = self.fill_doc(doc, copy) {
            let _ = self.free_doc(copy);
            return Err(err);
        }
        log::debug!(target: "rustytree.copy", "copied document {} as {}", doc, copy);
        Ok(copy)
    }

    fn fill_doc(&mut self, src: NodeId, copy: NodeId) -> Result<()> {
        if let Some(int) = self.doc_data(src)?.int_subset {
            let dtd = self.copy_dtd(int)?;
            self.doc_data_mut(copy)?.int_subset = Some(dtd);
            self.set_tree_doc(dtd, Some(copy))?;
        }
        if let Some(old_ns) = self.doc_data(src)?.old_ns {
            let list = self.copy_namespace_list(old_ns)?;
            let chain: Vec<NodeId> = self.siblings_from(Some(list)).collect();
            for ns in chain {
                self.node_mut(ns)?.doc = Some(copy);
            }
            self.doc_data_mut(copy)?.old_ns = Some(list);
        }
        if let Some(first) = self.first_child(src) {
            self.copy_list(first, Some(copy), Some(copy))?;
        }
        Ok(())
    }
}
