//! Tree mutation
//!
//! Linking, unlinking, text coalescing, replacement and teardown.
//!
//! Every insertion unlinks the incoming node first and retargets it to
//! the destination document before it becomes reachable. Coalescing
//! merges text into the surviving node before the incoming one is freed,
//! so callers must continue with the returned id.

use crate::dom::engine::Engine;
use crate::dom::node::{EntityChildren, NodeData, NodeId, NodeKind, TextTag};
use crate::error::{Result, TreeError};

impl Engine {
    #[inline]
    pub(crate) fn text_tag(&self, id: NodeId) -> Option<TextTag> {
        self.get(id)?.text_tag()
    }

    #[inline]
    pub(crate) fn content_string(&self, id: NodeId) -> String {
        self.raw_content(id).unwrap_or("").to_string()
    }

    // ------------------------------------------------------------------
    // Raw linking (no checks, no coalescing)
    // ------------------------------------------------------------------

    /// Append `child` to the children chain of `parent`
    pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let last = self.node(parent)?.last_child;
        {
            let node = self.node_mut(child)?;
            node.parent = Some(parent);
            node.prev_sibling = last;
            node.next_sibling = None;
        }
        match last {
            Some(last) => self.node_mut(last)?.next_sibling = Some(child),
            None => self.node_mut(parent)?.first_child = Some(child),
        }
        self.node_mut(parent)?.last_child = Some(child);
        Ok(())
    }

    /// Append `attr` to the attribute chain of `elem`
    pub(crate) fn link_property(&mut self, elem: NodeId, attr: NodeId) -> Result<()> {
        let last = self.attributes(elem).last();
        {
            let node = self.node_mut(attr)?;
            node.parent = Some(elem);
            node.prev_sibling = last;
            node.next_sibling = None;
        }
        match last {
            Some(last) => self.node_mut(last)?.next_sibling = Some(attr),
            None => self.node_mut(elem)?.set_properties(Some(attr)),
        }
        Ok(())
    }

    /// Splice unlinked `node` in front of `anchor`
    pub(crate) fn link_before(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let (parent, prev, anchor_kind) = {
            let a = self.node(anchor)?;
            (a.parent, a.prev_sibling, a.kind())
        };
        {
            let n = self.node_mut(node)?;
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = Some(anchor);
        }
        self.node_mut(anchor)?.prev_sibling = Some(node);
        match (prev, parent) {
            (Some(prev), _) => self.node_mut(prev)?.next_sibling = Some(node),
            (None, Some(parent)) => {
                let p = self.node_mut(parent)?;
                match anchor_kind {
                    NodeKind::Attribute => p.set_properties(Some(node)),
                    NodeKind::Namespace => p.set_ns_def(Some(node)),
                    _ => p.first_child = Some(node),
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Splice unlinked `node` after `anchor`
    pub(crate) fn link_after(&mut self, anchor: NodeId, node: NodeId) -> Result<()> {
        let (parent, next, anchor_kind) = {
            let a = self.node(anchor)?;
            (a.parent, a.next_sibling, a.kind())
        };
        {
            let n = self.node_mut(node)?;
            n.parent = parent;
            n.prev_sibling = Some(anchor);
            n.next_sibling = next;
        }
        self.node_mut(anchor)?.next_sibling = Some(node);
        match (next, parent) {
            (Some(next), _) => self.node_mut(next)?.prev_sibling = Some(node),
            (None, Some(parent)) if !matches!(anchor_kind, NodeKind::Attribute | NodeKind::Namespace) => {
                self.node_mut(parent)?.last_child = Some(node);
            }
            _ => {}
        }
        Ok(())
    }

    /// Refuse nodes that can never be inserted and insertions that would
    /// create a cycle
    fn check_insert(&self, anchor: NodeId, node: NodeId) -> Result<()> {
        if anchor == node {
            return Err(TreeError::SameNode(node));
        }
        let kind = self.kind_of(node)?;
        if matches!(kind, NodeKind::Document | NodeKind::Namespace) {
            return Err(TreeError::WrongKind(kind));
        }
        if self.is_ancestor_or_self(node, anchor) {
            return Err(TreeError::HierarchyCycle(node));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Public mutation
    // ------------------------------------------------------------------

    /// Detach a node from its parent and siblings. No-op when unlinked.
    pub fn unlink(&mut self, id: NodeId) -> Result<()> {
        let (kind, doc, parent, prev, next) = {
            let n = self.node(id)?;
            (n.kind(), n.doc, n.parent, n.prev_sibling, n.next_sibling)
        };
        if kind == NodeKind::Dtd {
            if let Some(data) = doc.and_then(|d| self.get_mut(d)).and_then(|n| n.document_mut()) {
                if data.int_subset == Some(id) {
                    data.int_subset = None;
                }
                if data.ext_subset == Some(id) {
                    data.ext_subset = None;
                }
            }
        }
        if let Some(parent) = parent {
            let p = self.node_mut(parent)?;
            match kind {
                NodeKind::Attribute => {
                    if p.properties() == Some(id) {
                        p.set_properties(next);
                    }
                }
                NodeKind::Namespace => {
                    if p.ns_def() == Some(id) {
                        p.set_ns_def(next);
                    }
                }
                _ => {
                    if p.first_child == Some(id) {
                        p.first_child = next;
                    }
                    if p.last_child == Some(id) {
                        p.last_child = prev;
                    }
                }
            }
        }
        if let Some(next) = next {
            self.node_mut(next)?.prev_sibling = prev;
        }
        if let Some(prev) = prev {
            self.node_mut(prev)?.next_sibling = next;
        }
        let n = self.node_mut(id)?;
        n.parent = None;
        n.prev_sibling = None;
        n.next_sibling = None;
        Ok(())
    }

    /// Append `cur` to `parent`. Text is coalesced into a text parent or
    /// a trailing text child with the same tag; the surviving node is
    /// returned. An attribute replaces any attribute of the same name and
    /// namespace.
    pub fn add_child(&mut self, parent: NodeId, cur: NodeId) -> Result<NodeId> {
        self.check_insert(parent, cur)?;
        let parent_kind = self.kind_of(parent)?;
        let cur_kind = self.kind_of(cur)?;

        if let Some(tag) = self.text_tag(cur) {
            if self.text_tag(parent) == Some(tag) && self.node(parent)?.content.is_some() {
                let text = self.content_string(cur);
                self.add_content(parent, &text)?;
                self.free_node(cur)?;
                return Ok(parent);
            }
            if let Some(last) = self.last_child(parent) {
                if last != cur && self.text_tag(last) == Some(tag) {
                    let text = self.content_string(cur);
                    self.add_content(last, &text)?;
                    self.free_node(cur)?;
                    return Ok(last);
                }
            }
        }

        // Adding a node to its own parent twice is a no-op
        if self.parent(cur) == Some(parent) {
            return Ok(cur);
        }

        if parent_kind == NodeKind::Text && self.node(parent)?.content.is_some() {
            let text = self.content_string(cur);
            self.add_content(parent, &text)?;
            self.free_node(cur)?;
            return Ok(parent);
        }
        if !parent_kind.accepts_children() {
            return Err(TreeError::WrongKind(parent_kind));
        }
        if cur_kind == NodeKind::Attribute && parent_kind != NodeKind::Element {
            return Err(TreeError::WrongKind(parent_kind));
        }

        self.unlink(cur)?;
        let doc = self.doc_of(parent);
        if self.doc_of(cur) != doc {
            self.set_tree_doc(cur, doc)?;
        }

        if cur_kind == NodeKind::Attribute {
            let existing = self.same_attribute(parent, cur);
            self.link_property(parent, cur)?;
            if let Some(existing) = existing {
                self.free_prop(existing)?;
            }
        } else {
            self.link_child(parent, cur)?;
        }
        Ok(cur)
    }

    /// Attribute on `elem` with the same name and namespace as `attr`
    fn same_attribute(&self, elem: NodeId, attr: NodeId) -> Option<NodeId> {
        let name = self.name(attr)?;
        let href = self.ns_of(attr).and_then(|ns| self.ns_href(ns));
        self.find_attribute(elem, name, href).filter(|&a| a != attr)
    }

    /// Append a detached sibling chain to `parent`. Only the join point is
    /// checked for coalescing. Returns the last node of the chain.
    pub fn add_child_list(&mut self, parent: NodeId, first: NodeId) -> Result<NodeId> {
        let parent_kind = self.kind_of(parent)?;
        if !parent_kind.accepts_children() {
            return Err(TreeError::WrongKind(parent_kind));
        }
        if self.parent(first).is_some() || self.prev_sibling(first).is_some() {
            return Err(TreeError::AlreadyLinked(first));
        }
        let mut chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        for &id in &chain {
            let kind = self.kind_of(id)?;
            if matches!(kind, NodeKind::Document | NodeKind::Namespace | NodeKind::Attribute) {
                return Err(TreeError::WrongKind(kind));
            }
            if self.is_ancestor_or_self(id, parent) {
                return Err(TreeError::HierarchyCycle(id));
            }
        }

        if let (Some(tag), Some(last)) = (self.text_tag(first), self.last_child(parent)) {
            if self.text_tag(last) == Some(tag) {
                let text = self.content_string(first);
                self.add_content(last, &text)?;
                self.free_node(first)?;
                chain.remove(0);
                if chain.is_empty() {
                    return Ok(last);
                }
            }
        }

        let doc = self.doc_of(parent);
        for &id in &chain {
            if self.doc_of(id) != doc {
                self.set_tree_doc(id, doc)?;
            }
            self.node_mut(id)?.parent = Some(parent);
        }
        let head = chain[0];
        let tail = chain[chain.len() - 1];
        let prev = self.last_child(parent);
        self.node_mut(head)?.prev_sibling = prev;
        match prev {
            Some(prev) => self.node_mut(prev)?.next_sibling = Some(head),
            None => self.node_mut(parent)?.first_child = Some(head),
        }
        self.node_mut(parent)?.last_child = Some(tail);
        Ok(tail)
    }

    fn check_sibling_kinds(&self, cur: NodeId, elem: NodeId) -> Result<()> {
        let cur_kind = self.kind_of(cur)?;
        let elem_kind = self.kind_of(elem)?;
        if (cur_kind == NodeKind::Attribute) != (elem_kind == NodeKind::Attribute) {
            return Err(TreeError::KindMismatch(cur_kind, elem_kind));
        }
        Ok(())
    }

    /// Insert `elem` right after `cur`. Returns the surviving node.
    pub fn add_next_sibling(&mut self, cur: NodeId, elem: NodeId) -> Result<NodeId> {
        self.check_insert(cur, elem)?;
        self.check_sibling_kinds(cur, elem)?;
        self.unlink(elem)?;

        let mut replaced = None;
        if let Some(tag) = self.text_tag(elem) {
            if self.text_tag(cur) == Some(tag) {
                let text = self.content_string(elem);
                self.add_content(cur, &text)?;
                self.free_node(elem)?;
                return Ok(cur);
            }
            if let Some(next) = self.next_sibling(cur) {
                if self.text_tag(next) == Some(tag) {
                    let mut text = self.content_string(elem);
                    text.push_str(self.raw_content(next).unwrap_or(""));
                    self.set_leaf_content(next, Some(&text))?;
                    self.free_node(elem)?;
                    return Ok(next);
                }
            }
        } else if self.kind(elem) == Some(NodeKind::Attribute) {
            if let Some(parent) = self.parent(cur) {
                replaced = self.same_attribute(parent, elem);
            }
        }

        let doc = self.doc_of(cur);
        if self.doc_of(elem) != doc {
            self.set_tree_doc(elem, doc)?;
        }
        self.link_after(cur, elem)?;
        if let Some(old) = replaced {
            self.free_prop(old)?;
        }
        Ok(elem)
    }

    /// Insert `elem` right before `cur`. Returns the surviving node.
    pub fn add_prev_sibling(&mut self, cur: NodeId, elem: NodeId) -> Result<NodeId> {
        self.check_insert(cur, elem)?;
        self.check_sibling_kinds(cur, elem)?;
        self.unlink(elem)?;

        let mut replaced = None;
        if let Some(tag) = self.text_tag(elem) {
            if self.text_tag(cur) == Some(tag) {
                let mut text = self.content_string(elem);
                text.push_str(self.raw_content(cur).unwrap_or(""));
                self.set_leaf_content(cur, Some(&text))?;
                self.free_node(elem)?;
                return Ok(cur);
            }
            if let Some(prev) = self.prev_sibling(cur) {
                if self.text_tag(prev) == Some(tag) {
                    let text = self.content_string(elem);
                    self.add_content(prev, &text)?;
                    self.free_node(elem)?;
                    return Ok(prev);
                }
            }
        } else if self.kind(elem) == Some(NodeKind::Attribute) {
            if let Some(parent) = self.parent(cur) {
                replaced = self.same_attribute(parent, elem);
            }
        }

        let doc = self.doc_of(cur);
        if self.doc_of(elem) != doc {
            self.set_tree_doc(elem, doc)?;
        }
        self.link_before(cur, elem)?;
        if let Some(old) = replaced {
            self.free_prop(old)?;
        }
        Ok(elem)
    }

    /// Append `elem` after the last sibling of `cur`
    pub fn add_sibling(&mut self, cur: NodeId, elem: NodeId) -> Result<NodeId> {
        if cur == elem {
            return Err(TreeError::SameNode(cur));
        }
        let is_attr = self.kind_of(cur)? == NodeKind::Attribute;
        let cached = self
            .parent(cur)
            .filter(|_| !is_attr)
            .and_then(|p| self.last_child(p))
            .filter(|&last| self.next_sibling(last).is_none());
        let last = match cached {
            Some(last) => last,
            None => self.siblings_from(Some(cur)).last().unwrap_or(cur),
        };
        if last == elem {
            return Ok(elem);
        }
        self.add_next_sibling(last, elem)
    }

    /// Put `cur` in the exact position of `old`, which is returned
    /// unlinked but not freed. `None` just unlinks `old`.
    pub fn replace_node(&mut self, old: NodeId, cur: Option<NodeId>) -> Result<NodeId> {
        let Some(cur) = cur else {
            self.unlink(old)?;
            return Ok(old);
        };
        if old == cur {
            return Err(TreeError::SameNode(old));
        }
        if self.parent(old).is_none() {
            return Err(TreeError::NotLinked(old));
        }
        self.check_sibling_kinds(old, cur)?;
        self.check_insert(old, cur)?;

        self.unlink(cur)?;
        let doc = self.doc_of(old);
        if self.doc_of(cur) != doc {
            self.set_tree_doc(cur, doc)?;
        }
        let (kind, parent, prev, next) = {
            let o = self.node(old)?;
            (o.kind(), o.parent, o.prev_sibling, o.next_sibling)
        };
        {
            let c = self.node_mut(cur)?;
            c.parent = parent;
            c.prev_sibling = prev;
            c.next_sibling = next;
        }
        if let Some(prev) = prev {
            self.node_mut(prev)?.next_sibling = Some(cur);
        }
        if let Some(next) = next {
            self.node_mut(next)?.prev_sibling = Some(cur);
        }
        if let Some(parent) = parent {
            let p = self.node_mut(parent)?;
            if kind == NodeKind::Attribute {
                if p.properties() == Some(old) {
                    p.set_properties(Some(cur));
                }
            } else {
                if p.first_child == Some(old) {
                    p.first_child = Some(cur);
                }
                if p.last_child == Some(old) {
                    p.last_child = Some(cur);
                }
            }
        }
        let o = self.node_mut(old)?;
        o.parent = None;
        o.prev_sibling = None;
        o.next_sibling = None;
        Ok(old)
    }

    /// Make `root` the document element, returning the previous one
    pub fn set_root_element(&mut self, doc: NodeId, root: NodeId) -> Result<Option<NodeId>> {
        self.expect_kind(doc, NodeKind::Document)?;
        self.expect_kind(root, NodeKind::Element)?;
        self.unlink(root)?;
        self.set_tree_doc(root, Some(doc))?;
        match self.get_root_element(doc) {
            Some(old) => {
                self.replace_node(old, Some(root))?;
                Ok(Some(old))
            }
            None => {
                match self.first_child(doc) {
                    Some(first) => {
                        self.add_sibling(first, root)?;
                    }
                    None => self.link_child(doc, root)?,
                }
                Ok(None)
            }
        }
    }

    /// Last child of a node
    pub fn get_last_child(&self, parent: NodeId) -> Option<NodeId> {
        self.last_child(parent)
    }

    // ------------------------------------------------------------------
    // Document retargeting
    // ------------------------------------------------------------------

    /// Every node of a subtree plus its declarations, attributes and
    /// attribute values
    pub(crate) fn subtree_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.ns_defs(id));
            stack.extend(self.attributes(id));
            stack.extend(self.children(id));
        }
        out
    }

    /// Point every node of a subtree at `doc`
    pub fn set_tree_doc(&mut self, tree: NodeId, doc: Option<NodeId>) -> Result<()> {
        for id in self.subtree_nodes(tree) {
            self.retarget_node(id, doc)?;
        }
        Ok(())
    }

    /// Point every subtree of a sibling chain at `doc`
    pub fn set_list_doc(&mut self, first: NodeId, doc: Option<NodeId>) -> Result<()> {
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        for id in chain {
            self.set_tree_doc(id, doc)?;
        }
        Ok(())
    }

    fn retarget_node(&mut self, id: NodeId, doc: Option<NodeId>) -> Result<()> {
        let old_doc = self.node(id)?.doc;
        if old_doc == doc {
            return Ok(());
        }
        let target_has_dict = self.dict(doc).is_some();

        // Re-home strings: interned ones must leave the old dictionary
        let name = self.node(id)?.name.clone();
        let content = self.node(id)?.content.clone();
        let rehome = |engine: &mut Engine, r: Option<crate::dom::strings::NameRef>| {
            let r = r?;
            if !r.is_interned() && !target_has_dict {
                return Some(r);
            }
            let text = engine.resolve(old_doc, &r)?.to_string();
            Some(engine.make_ref(doc, &text))
        };
        let name = rehome(self, name);
        let content = rehome(self, content);

        // Registered IDs follow the attribute
        let mut moved_ids = Vec::new();
        if let NodeData::Attribute(a) = &self.node(id)?.data {
            if a.is_id {
                if let Some(old) = old_doc.and_then(|d| self.get_mut(d)).and_then(|n| n.document_mut()) {
                    old.ids.retain(|value, holder| {
                        if *holder == id {
                            moved_ids.push(value.clone());
                            false
                        } else {
                            true
                        }
                    });
                }
            }
        }

        // Entity references resolve against the new document
        let target = match self.node(id)?.data {
            NodeData::EntityRef { .. } => {
                let ref_name = name.as_ref().and_then(|r| r.resolve(self.dict(doc))).map(str::to_string);
                Some(ref_name.and_then(|n| self.declared_entity(doc, &n)))
            }
            _ => None,
        };

        let node = self.node_mut(id)?;
        node.name = name;
        node.content = content;
        node.doc = doc;
        if let (Some(target), NodeData::EntityRef { target: slot }) = (target, &mut node.data) {
            *slot = target;
        }
        if let Some(new_doc) = doc.filter(|_| !moved_ids.is_empty()) {
            for value in moved_ids {
                if self.add_id(new_doc, &value, id).is_err() {
                    log::debug!(target: "rustytree.tree", "ID {:?} already taken in document {}", value, new_doc);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Unlink and free a node with its subtree
    pub fn free_node(&mut self, id: NodeId) -> Result<()> {
        if self.kind_of(id)? == NodeKind::Document {
            return self.free_doc(id);
        }
        self.unlink(id)?;
        self.free_subtree(id);
        Ok(())
    }

    /// Free every node of a sibling chain. DTD nodes are left in place
    /// for the document teardown.
    pub fn free_node_list(&mut self, first: NodeId) -> Result<()> {
        match self.kind_of(first)? {
            NodeKind::Namespace => return self.free_ns_list(first),
            NodeKind::Document => return self.free_doc(first),
            _ => {}
        }
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        for id in chain {
            if self.kind(id) == Some(NodeKind::Dtd) {
                continue;
            }
            self.unlink(id)?;
            self.free_subtree(id);
        }
        Ok(())
    }

    /// Free an attribute and its value
    pub fn free_prop(&mut self, attr: NodeId) -> Result<()> {
        self.expect_kind(attr, NodeKind::Attribute)?;
        self.unlink(attr)?;
        self.free_subtree(attr);
        Ok(())
    }

    /// Free a detached subtree. Entity references never free the
    /// declaration they alias; entity declarations only free children
    /// they own.
    pub(crate) fn free_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            match &node.data {
                NodeData::Document(_) => {
                    if let Err(err) = self.free_doc(id) {
                        log::warn!(target: "rustytree.tree", "freeing nested document {}: {}", id, err);
                    }
                    continue;
                }
                NodeData::Dtd(_) => {
                    self.free_dtd_contents(id);
                    self.release(id);
                    continue;
                }
                NodeData::EntityRef { .. } => {}
                NodeData::EntityDecl(e) => {
                    if e.children == EntityChildren::Owned {
                        stack.extend(self.children(id));
                    }
                }
                NodeData::Attribute(_) => {
                    self.drop_attr_indexes(id);
                    stack.extend(self.children(id));
                }
                _ => {
                    stack.extend(self.attributes(id));
                    stack.extend(self.ns_defs(id));
                    stack.extend(self.children(id));
                }
            }
            self.release(id);
        }
    }

    fn drop_attr_indexes(&mut self, attr: NodeId) {
        let Some(doc) = self.doc_of(attr).filter(|&d| self.is_document(d)) else {
            return;
        };
        let is_id = matches!(self.get(attr).map(|n| &n.data), Some(NodeData::Attribute(a)) if a.is_id);
        if is_id {
            let _ = self.remove_id(doc, attr);
        }
        let _ = self.remove_ref(doc, attr);
    }

    /// Free what a DTD owns: its non-declaration children and every
    /// declaration in its tables
    fn free_dtd_contents(&mut self, dtd: NodeId) {
        let children: Vec<NodeId> = self.children(dtd).collect();
        let owned = self
            .dtd_tables(dtd)
            .map(|t| t.owned_nodes())
            .unwrap_or_default();
        for id in children.into_iter().chain(owned) {
            self.free_subtree(id);
        }
        if let Some(data) = self.get_mut(dtd).and_then(|n| n.dtd_mut()) {
            data.tables.clear();
        }
    }

    /// Free a DTD with its declarations
    pub fn free_dtd(&mut self, dtd: NodeId) -> Result<()> {
        self.expect_kind(dtd, NodeKind::Dtd)?;
        self.unlink(dtd)?;
        self.free_subtree(dtd);
        Ok(())
    }

    /// Free a document: indexes, subsets, content, orphaned namespaces
    /// and finally the dictionary
    pub fn free_doc(&mut self, doc: NodeId) -> Result<()> {
        let (int_subset, ext_subset, old_ns) = {
            let data = self.doc_data_mut(doc)?;
            data.ids.clear();
            data.refs.clear();
            (data.int_subset, data.ext_subset, data.old_ns.take())
        };
        if let Some(ext) = ext_subset.filter(|&e| Some(e) != int_subset) {
            self.free_dtd(ext)?;
        }
        if let Some(int) = int_subset {
            self.free_dtd(int)?;
        }
        let children: Vec<NodeId> = self.children(doc).collect();
        for id in children {
            self.unlink(id)?;
            self.free_subtree(id);
        }
        if let Some(old_ns) = old_ns {
            self.free_ns_list(old_ns)?;
        }
        self.orphan_detached(doc)?;
        self.release(doc);
        Ok(())
    }

    /// Nodes that left `doc` without being adopted elsewhere outlive it.
    /// Their strings become owned while the dictionary still resolves them
    /// and namespace references into the freed tree are cleared.
    fn orphan_detached(&mut self, doc: NodeId) -> Result<()> {
        let strays = self.nodes_of_doc(doc);
        if !strays.is_empty() {
            log::debug!(target: "rustytree.tree", "document {} leaves {} detached nodes", doc, strays.len());
        }
        for &id in &strays {
            self.retarget_node(id, None)?;
        }
        for id in strays {
            let ns = self.ns_of(id);
            if ns.is_some_and(|ns| !self.contains(ns)) {
                if let Some(node) = self.get_mut(id) {
                    node.set_ns(None);
                }
            }
        }
        Ok(())
    }
}
