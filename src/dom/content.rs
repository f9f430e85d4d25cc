//! Content and entity substitution
//!
//! Two directions:
//! - `string_get_node_list` splits a string with `&...;` markers into
//!   text and entity reference nodes
//! - `buf_get_content` and friends flatten a node back into text,
//!   optionally expanding entity references
//!
//! Entity declarations are split into children lazily, the first time a
//! reference to them is parsed. Children built that way are owned by the
//! declaration.

use memchr::memchr;

use crate::buffer::Buffer;
use crate::core::entities::{decode_char_ref, encode_entities, encode_special_chars, is_blank_char};
use crate::dom::build::prefix_of;
use crate::dom::dtd::EntityLookup;
use crate::dom::engine::Engine;
use crate::dom::node::{EntityChildren, NodeId, NodeKind};
use crate::dom::strings::NameRef;
use crate::error::{Result, TreeError};

/// A detached sibling chain produced by parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeList {
    pub first: Option<NodeId>,
    pub last: Option<NodeId>,
    /// Decode error that stopped parsing early. Nodes before it are kept.
    pub error: Option<TreeError>,
}

impl NodeList {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

impl Engine {
    // ------------------------------------------------------------------
    // String -> nodes
    // ------------------------------------------------------------------

    /// Split `value` into text and entity reference nodes
    pub fn string_get_node_list(&mut self, doc: Option<NodeId>, value: &str) -> Result<NodeList> {
        let mut nodes = Vec::new();
        match self.split_references(doc, value, &mut nodes) {
            Ok(error) => {
                let mut list = self.chain_nodes(&nodes)?;
                if let Some(err) = &error {
                    log::debug!(target: "rustytree.content", "stopped splitting {:?}: {}", value, err);
                }
                list.error = error;
                Ok(list)
            }
            Err(err) => {
                for id in nodes {
                    self.free_subtree(id);
                }
                Err(err)
            }
        }
    }

    /// `string_get_node_list` over the first `len` bytes of `value`
    pub fn string_len_get_node_list(&mut self, doc: Option<NodeId>, value: &str, len: usize) -> Result<NodeList> {
        let value = prefix_of(value, len)?;
        self.string_get_node_list(doc, value)
    }

    /// Push the nodes for `value` onto `nodes`. Returns the decode error
    /// that stopped the scan, if any.
    fn split_references(
        &mut self,
        doc: Option<NodeId>,
        value: &str,
        nodes: &mut Vec<NodeId>,
    ) -> Result<Option<TreeError>> {
        let mut pending = String::new();
        let mut pos = 0;
        let mut error = None;

        while let Some(offset) = memchr(b'&', &value.as_bytes()[pos..]) {
            let amp = pos + offset;
            pending.push_str(&value[pos..amp]);
            let rest = &value[amp + 1..];
            let Some(semi) = memchr(b';', rest.as_bytes()) else {
                error = Some(TreeError::UnterminatedEntity(rest.to_string()));
                pos = value.len();
                break;
            };
            let body = &rest[..semi];
            pos = amp + semi + 2;

            if let Some(digits) = body.strip_prefix("#x") {
                match decode_char_ref(digits, true) {
                    Ok(c) => pending.push(c),
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                }
            } else if let Some(digits) = body.strip_prefix('#') {
                match decode_char_ref(digits, false) {
                    Ok(c) => pending.push(c),
                    Err(err) => {
                        error = Some(err);
                        break;
                    }
                }
            } else if body.is_empty() {
                continue;
            } else if let Some(EntityLookup::Predefined(text)) = self.get_doc_entity(doc, body) {
                pending.push_str(text);
            } else {
                self.flush_text(doc, &mut pending, nodes)?;
                let reference = self.new_reference(doc, body)?;
                nodes.push(reference);
                if let Some(ent) = self.get(reference).and_then(|n| n.entity_target()) {
                    self.populate_entity(doc, ent)?;
                }
            }
        }
        if error.is_none() {
            pending.push_str(&value[pos..]);
        }
        self.flush_text(doc, &mut pending, nodes)?;
        Ok(error)
    }

    fn flush_text(&mut self, doc: Option<NodeId>, pending: &mut String, nodes: &mut Vec<NodeId>) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let text = self.new_doc_text(doc, Some(pending.as_str()))?;
        pending.clear();
        nodes.push(text);
        Ok(())
    }

    /// Split an entity's replacement text into its children, once
    fn populate_entity(&mut self, doc: Option<NodeId>, ent: NodeId) -> Result<()> {
        if self.entity_children_state(ent) != Some(EntityChildren::Unparsed) {
            return Ok(());
        }
        let content = self.raw_content(ent).unwrap_or("").to_string();
        self.set_entity_children(ent, EntityChildren::Populating)?;
        let list = match self.string_get_node_list(doc, &content) {
            Ok(list) => list,
            Err(err) => {
                self.set_entity_children(ent, EntityChildren::Unparsed)?;
                return Err(err);
            }
        };
        self.adopt_list(ent, &list)?;
        self.set_entity_children(ent, EntityChildren::Owned)
    }

    fn set_entity_children(&mut self, ent: NodeId, state: EntityChildren) -> Result<()> {
        let node = self.node_mut(ent)?;
        let kind = node.kind();
        let data = node.entity_mut().ok_or(TreeError::WrongKind(kind))?;
        data.children = state;
        Ok(())
    }

    /// Link loose nodes into a sibling chain
    fn chain_nodes(&mut self, nodes: &[NodeId]) -> Result<NodeList> {
        for pair in nodes.windows(2) {
            self.node_mut(pair[0])?.next_sibling = Some(pair[1]);
            self.node_mut(pair[1])?.prev_sibling = Some(pair[0]);
        }
        Ok(NodeList {
            first: nodes.first().copied(),
            last: nodes.last().copied(),
            error: None,
        })
    }

    /// Append a detached chain to the children of `parent`
    pub(crate) fn adopt_list(&mut self, parent: NodeId, list: &NodeList) -> Result<()> {
        let (Some(first), Some(last)) = (list.first, list.last) else {
            return Ok(());
        };
        let chain: Vec<NodeId> = self.siblings_from(Some(first)).collect();
        for id in chain {
            self.node_mut(id)?.parent = Some(parent);
        }
        let prev = self.last_child(parent);
        self.node_mut(first)?.prev_sibling = prev;
        match prev {
            Some(prev) => self.node_mut(prev)?.next_sibling = Some(first),
            None => self.node_mut(parent)?.first_child = Some(first),
        }
        self.node_mut(parent)?.last_child = Some(last);
        Ok(())
    }

    /// Parse `value` and append the nodes to `parent`. Returns the decode
    /// error that cut parsing short, if any.
    pub(crate) fn attach_parsed(&mut self, parent: NodeId, value: &str) -> Result<Option<TreeError>> {
        let doc = self.doc_of(parent);
        let list = self.string_get_node_list(doc, value)?;
        self.adopt_list(parent, &list)?;
        Ok(list.error)
    }

    // ------------------------------------------------------------------
    // Nodes -> string
    // ------------------------------------------------------------------

    /// Serialize a sibling chain of text and references. With `in_line`
    /// references are expanded and text kept verbatim; otherwise text is
    /// escaped and references written as `&name;`.
    pub fn node_list_get_string(&self, first: NodeId, in_line: bool) -> String {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.list_string(&mut out, Some(first), in_line, false, &mut stack);
        out
    }

    /// Like `node_list_get_string` but escaping quotes too
    pub fn node_list_get_raw_string(&self, first: NodeId, in_line: bool) -> String {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.list_string(&mut out, Some(first), in_line, true, &mut stack);
        out
    }

    fn list_string(&self, out: &mut String, first: Option<NodeId>, in_line: bool, raw: bool, stack: &mut Vec<NodeId>) {
        for id in self.siblings_from(first) {
            match self.kind(id) {
                Some(NodeKind::Text | NodeKind::CData) => {
                    let text = self.raw_content(id).unwrap_or("");
                    if in_line {
                        out.push_str(text);
                    } else if raw {
                        out.push_str(&encode_special_chars(text));
                    } else {
                        out.push_str(&encode_entities(text));
                    }
                }
                Some(NodeKind::EntityRef) => {
                    let name = self.name(id).unwrap_or("");
                    if !in_line {
                        out.push('&');
                        out.push_str(name);
                        out.push(';');
                        continue;
                    }
                    let declared = match self.get_doc_entity(self.doc_of(id), name) {
                        Some(EntityLookup::Declared(ent)) => Some(ent),
                        _ => None,
                    };
                    match declared {
                        Some(ent) if stack.contains(&ent) => {
                            log::debug!(target: "rustytree.content", "skipping recursive entity {:?}", name);
                        }
                        Some(ent) if self.first_child(ent).is_some() => {
                            stack.push(ent);
                            self.list_string(out, self.first_child(ent), true, raw, stack);
                            stack.pop();
                        }
                        _ => out.push_str(self.raw_content(id).unwrap_or("")),
                    }
                }
                _ => {}
            }
        }
    }

    /// Append the text content of `node` to `buf`
    pub fn buf_get_content(&self, buf: &mut Buffer<'_>, node: NodeId) -> Result<()> {
        let mut stack = Vec::new();
        self.emit_node(buf, node, true, true, &mut stack)
    }

    /// Text content of `node` as a fresh buffer. With `substitute` entity
    /// references are expanded, otherwise they stay as `&name;`.
    pub fn materialize_content(&self, node: NodeId, substitute: bool) -> Result<Buffer<'static>> {
        let config = self.config();
        let mut buf = Buffer::with_scheme(config.default_buffer_size, config.buffer_scheme)?;
        let mut stack = Vec::new();
        self.emit_node(&mut buf, node, substitute, true, &mut stack)?;
        Ok(buf)
    }

    /// Text content of `node` with entities expanded. `None` for kinds
    /// without content and for unresolvable references.
    pub fn get_content(&self, node: NodeId) -> Option<String> {
        match self.materialize_content(node, true) {
            Ok(buf) => Some(buf.into_string()),
            Err(err) => {
                log::debug!(target: "rustytree.content", "no content for {}: {}", node, err);
                None
            }
        }
    }

    fn emit_node(
        &self,
        buf: &mut Buffer<'_>,
        node: NodeId,
        substitute: bool,
        top: bool,
        stack: &mut Vec<NodeId>,
    ) -> Result<()> {
        let kind = self.kind_of(node)?;
        match kind {
            NodeKind::Text | NodeKind::CData | NodeKind::Comment | NodeKind::ProcessingInstruction => {
                buf.cat(self.raw_content(node).unwrap_or(""))
            }
            NodeKind::Element | NodeKind::DocumentFragment => {
                for id in self.descendants(node) {
                    match self.kind(id) {
                        Some(NodeKind::Text | NodeKind::CData) => buf.cat(self.raw_content(id).unwrap_or(""))?,
                        Some(NodeKind::EntityRef) => self.emit_reference(buf, id, substitute, false, stack)?,
                        _ => {}
                    }
                }
                Ok(())
            }
            NodeKind::Attribute => {
                for child in self.children(node) {
                    self.emit_node(buf, child, substitute, false, stack)?;
                }
                Ok(())
            }
            NodeKind::EntityRef => self.emit_reference(buf, node, substitute, top, stack),
            NodeKind::Document => {
                for child in self.children(node) {
                    if matches!(
                        self.kind(child),
                        Some(NodeKind::Element | NodeKind::Text | NodeKind::CData)
                    ) {
                        self.emit_node(buf, child, substitute, false, stack)?;
                    }
                }
                Ok(())
            }
            NodeKind::Namespace => buf.cat(self.ns_href(node).unwrap_or("")),
            _ if top => Err(TreeError::WrongKind(kind)),
            _ => Ok(()),
        }
    }

    fn emit_reference(
        &self,
        buf: &mut Buffer<'_>,
        reference: NodeId,
        substitute: bool,
        top: bool,
        stack: &mut Vec<NodeId>,
    ) -> Result<()> {
        let name = self.name(reference).unwrap_or("");
        if !substitute {
            buf.cat("&")?;
            buf.cat(name)?;
            return buf.cat(";");
        }
        if let Some(digits) = name.strip_prefix('#') {
            let decoded = match digits.strip_prefix('x') {
                Some(hex) => decode_char_ref(hex, true),
                None => decode_char_ref(digits, false),
            };
            return match decoded {
                Ok(c) => buf.cat(c.encode_utf8(&mut [0u8; 4])),
                Err(err) if top => Err(err),
                Err(_) => Ok(()),
            };
        }
        match self.get_doc_entity(self.doc_of(reference), name) {
            Some(EntityLookup::Predefined(text)) => buf.cat(text),
            Some(EntityLookup::Declared(ent)) => {
                if stack.contains(&ent) {
                    log::debug!(target: "rustytree.content", "skipping recursive entity {:?}", name);
                    return Ok(());
                }
                stack.push(ent);
                let result = self.emit_entity(buf, ent, stack);
                stack.pop();
                result
            }
            None if top => Err(TreeError::UnresolvedEntity(name.to_string())),
            None => {
                log::debug!(target: "rustytree.content", "unresolved entity {:?} expands to nothing", name);
                Ok(())
            }
        }
    }

    /// Children of a declaration, or its replacement text when it was
    /// never split
    fn emit_entity(&self, buf: &mut Buffer<'_>, ent: NodeId, stack: &mut Vec<NodeId>) -> Result<()> {
        if self.first_child(ent).is_none() {
            return buf.cat(self.raw_content(ent).unwrap_or(""));
        }
        let children: Vec<NodeId> = self.children(ent).collect();
        for child in children {
            self.emit_node(buf, child, true, false, stack)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Setting and extending content
    // ------------------------------------------------------------------

    /// Replace the stored string of a leaf node
    pub(crate) fn set_leaf_content(&mut self, node: NodeId, content: Option<&str>) -> Result<()> {
        self.node_mut(node)?.content = content.map(|c| NameRef::Owned(c.to_string()));
        Ok(())
    }

    fn free_children(&mut self, node: NodeId) -> Result<()> {
        if let Some(first) = self.first_child(node) {
            self.free_node_list(first)?;
        }
        Ok(())
    }

    /// Replace the content of `node`. Elements, attributes and fragments
    /// get their children rebuilt from `content`; leaves get the string.
    /// On a decode error the nodes built before it are kept and the error
    /// is returned.
    pub fn set_content(&mut self, node: NodeId, content: Option<&str>) -> Result<()> {
        let kind = self.kind_of(node)?;
        match kind {
            NodeKind::Element | NodeKind::Attribute | NodeKind::DocumentFragment => {
                self.free_children(node)?;
                let Some(content) = content else {
                    return Ok(());
                };
                match self.attach_parsed(node, content)? {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }
            NodeKind::Text
            | NodeKind::CData
            | NodeKind::EntityRef
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction => {
                self.free_children(node)?;
                self.set_leaf_content(node, content)
            }
            other => Err(TreeError::WrongKind(other)),
        }
    }

    /// `set_content` with the first `len` bytes of `content`
    pub fn set_content_len(&mut self, node: NodeId, content: &str, len: usize) -> Result<()> {
        let content = prefix_of(content, len)?;
        self.set_content(node, Some(content))
    }

    /// Append text to the content of `node`. Documents, DTDs, namespace
    /// declarations and the element, attribute and entity declarations
    /// have no appendable content and are left untouched.
    pub fn add_content(&mut self, node: NodeId, content: &str) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        let kind = self.kind_of(node)?;
        match kind {
            NodeKind::Element | NodeKind::DocumentFragment => {
                let doc = self.doc_of(node);
                let text = self.new_doc_text(doc, Some(content))?;
                self.add_child(node, text)?;
                Ok(())
            }
            // Attribute values are only replaced, never extended
            NodeKind::Attribute => Ok(()),
            NodeKind::Text
            | NodeKind::CData
            | NodeKind::EntityRef
            | NodeKind::Comment
            | NodeKind::ProcessingInstruction
            | NodeKind::Notation => {
                let mut merged = self.raw_content(node).unwrap_or("").to_string();
                merged.push_str(content);
                self.set_leaf_content(node, Some(&merged))
            }
            NodeKind::Document
            | NodeKind::Dtd
            | NodeKind::Namespace
            | NodeKind::ElementDecl
            | NodeKind::AttributeDecl
            | NodeKind::EntityDecl => Ok(()),
        }
    }

    /// `add_content` with the first `len` bytes of `content`
    pub fn add_content_len(&mut self, node: NodeId, content: &str, len: usize) -> Result<()> {
        let content = prefix_of(content, len)?;
        self.add_content(node, content)
    }

    /// Merge text node `second` into `first` and free it. Text nodes with
    /// different tags are left alone.
    pub fn text_merge(&mut self, first: NodeId, second: NodeId) -> Result<NodeId> {
        if first == second {
            return Err(TreeError::SameNode(first));
        }
        let (Some(a), Some(b)) = (self.text_tag(first), self.text_tag(second)) else {
            let kind = if self.text_tag(first).is_none() {
                self.kind_of(first)?
            } else {
                self.kind_of(second)?
            };
            return Err(TreeError::WrongKind(kind));
        };
        if a != b {
            return Ok(first);
        }
        let text = self.content_string(second);
        self.add_content(first, &text)?;
        self.free_node(second)?;
        Ok(first)
    }

    /// Append the first `len` bytes of `content` to a text or CDATA node
    pub fn text_concat(&mut self, node: NodeId, content: &str, len: usize) -> Result<()> {
        match self.kind_of(node)? {
            NodeKind::Text | NodeKind::CData => self.add_content_len(node, content, len),
            other => Err(TreeError::WrongKind(other)),
        }
    }

    /// Text or CDATA holding nothing but whitespace
    pub fn is_blank_node(&self, node: NodeId) -> bool {
        match self.kind(node) {
            Some(NodeKind::Text | NodeKind::CData) => self
                .raw_content(node)
                .map_or(true, |s| s.bytes().all(is_blank_char)),
            _ => false,
        }
    }

    /// Rename a node
    pub fn set_name(&mut self, node: NodeId, name: &str) -> Result<()> {
        let kind = self.kind_of(node)?;
        if matches!(
            kind,
            NodeKind::Text
                | NodeKind::CData
                | NodeKind::Comment
                | NodeKind::DocumentFragment
                | NodeKind::Notation
                | NodeKind::Namespace
        ) {
            return Err(TreeError::WrongKind(kind));
        }
        let doc = self.doc_of(node);
        let name = self.make_ref(doc, name);
        self.node_mut(node)?.name = Some(name);
        Ok(())
    }
}
