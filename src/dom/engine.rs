//! Node arena
//!
//! Every document, node, attribute and namespace declaration of one
//! engine lives in a single arena indexed by `NodeId`. Moving a subtree
//! between documents is a relink plus a retarget, never a reallocation.
//!
//! Released slots are reused. An id carries the slot index in its low 24
//! bits and the slot generation in the high 8, so a stale id resolves to
//! `None` instead of aliasing the slot's next occupant. A slot whose
//! generation is exhausted is retired rather than recycled.

use std::borrow::Cow;

use crate::config::EngineConfig;
use crate::core::qname::build_qname;
use crate::dom::node::{NodeId, NodeKind, XmlNode};
use crate::dom::strings::{NameRef, StringPool};
use crate::error::{Result, TreeError};

const INDEX_BITS: u32 = 24;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const MAX_GENERATION: u32 = u32::MAX >> INDEX_BITS;

#[inline]
fn slot_index(id: NodeId) -> usize {
    (id & INDEX_MASK) as usize
}

#[inline]
fn slot_generation(id: NodeId) -> u32 {
    id >> INDEX_BITS
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<XmlNode>,
}

/// Tree engine context
pub struct Engine {
    config: EngineConfig,
    nodes: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("slots", &self.nodes.len())
            .field("free", &self.free.len())
            .field("live", &self.live)
            .finish()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            nodes: Vec::with_capacity(256),
            free: Vec::new(),
            live: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Number of nodes currently allocated
    #[inline]
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Arena slots in use or waiting for reuse
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Get a node by ID
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&XmlNode> {
        let slot = self.nodes.get(slot_index(id))?;
        if slot.generation != slot_generation(id) {
            return None;
        }
        slot.node.as_ref()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        let slot = self.nodes.get_mut(slot_index(id))?;
        if slot.generation != slot_generation(id) {
            return None;
        }
        slot.node.as_mut()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> Result<&XmlNode> {
        self.get(id).ok_or(TreeError::NoSuchNode(id))
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut XmlNode> {
        self.get_mut(id).ok_or(TreeError::NoSuchNode(id))
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(XmlNode::kind)
    }

    /// Kind of `id`, failing when it does not exist
    #[inline]
    pub(crate) fn kind_of(&self, id: NodeId) -> Result<NodeKind> {
        self.node(id).map(XmlNode::kind)
    }

    pub(crate) fn expect_kind(&self, id: NodeId, kind: NodeKind) -> Result<()> {
        let found = self.kind_of(id)?;
        if found != kind {
            return Err(TreeError::WrongKind(found));
        }
        Ok(())
    }

    /// Place a node in the arena, preferring a released slot, and fire
    /// the register hook
    pub(crate) fn alloc(&mut self, node: XmlNode) -> Result<NodeId> {
        let kind = node.kind();
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                slot.node = Some(node);
                (slot.generation << INDEX_BITS) | index
            }
            None => {
                if self.nodes.len() > INDEX_MASK as usize {
                    return Err(TreeError::OutOfMemory("allocating node"));
                }
                self.nodes
                    .try_reserve(1)
                    .map_err(|_| TreeError::OutOfMemory("allocating node"))?;
                let index = self.nodes.len() as u32;
                self.nodes.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                index
            }
        };
        self.live += 1;
        log::trace!(target: "rustytree.tree", "alloc {} {:?}", id, kind);
        self.config.notify_register(id, kind);
        Ok(id)
    }

    /// Ids of live nodes still pointing at `doc`, other than `doc` itself
    pub(crate) fn nodes_of_doc(&self, doc: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let node = slot.node.as_ref()?;
                let id = (slot.generation << INDEX_BITS) | index as u32;
                (node.doc == Some(doc) && id != doc).then_some(id)
            })
            .collect()
    }

    /// Take a node out of the arena and fire the deregister hook.
    /// Links and payload are the caller's to dispose of.
    pub(crate) fn release(&mut self, id: NodeId) -> Option<XmlNode> {
        let slot = self.nodes.get_mut(slot_index(id))?;
        if slot.generation != slot_generation(id) {
            return None;
        }
        let node = slot.node.take()?;
        if slot.generation < MAX_GENERATION {
            slot.generation += 1;
            self.free.push(slot_index(id) as u32);
        }
        self.live -= 1;
        log::trace!(target: "rustytree.tree", "release {} {:?}", id, node.kind());
        self.config.notify_deregister(id, node.kind());
        Some(node)
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Dictionary of a document
    #[inline]
    pub(crate) fn dict(&self, doc: Option<NodeId>) -> Option<&StringPool> {
        self.get(doc?)?.document()?.dict.as_ref()
    }

    /// Handle for `s` under `doc`: interned when the document has a
    /// dictionary, owned otherwise.
    pub(crate) fn make_ref(&mut self, doc: Option<NodeId>, s: &str) -> NameRef {
        let dict = doc
            .and_then(|d| self.get_mut(d))
            .and_then(|n| n.document_mut())
            .and_then(|d| d.dict.as_mut());
        match dict {
            Some(dict) => NameRef::Interned(dict.intern(s)),
            None => NameRef::Owned(s.to_string()),
        }
    }

    #[inline]
    pub(crate) fn resolve<'a>(&'a self, doc: Option<NodeId>, r: &'a NameRef) -> Option<&'a str> {
        r.resolve(self.dict(doc))
    }

    /// Name of a node
    pub fn name(&self, id: NodeId) -> Option<&str> {
        let node = self.get(id)?;
        self.resolve(node.doc, node.name.as_ref()?)
    }

    /// Stored content string of a node, without entity expansion
    pub fn raw_content(&self, id: NodeId) -> Option<&str> {
        let node = self.get(id)?;
        self.resolve(node.doc, node.content.as_ref()?)
    }

    /// Name qualified with the node's namespace prefix
    pub fn qualified_name(&self, id: NodeId) -> Option<Cow<'_, str>> {
        let name = self.name(id)?;
        let prefix = self.get(id)?.ns().and_then(|ns| self.ns_prefix(ns));
        Some(build_qname(name, prefix))
    }

    /// Prefix of a namespace declaration
    #[inline]
    pub fn ns_prefix(&self, ns: NodeId) -> Option<&str> {
        self.get(ns)?.namespace()?.prefix.as_deref()
    }

    /// Href of a namespace declaration
    #[inline]
    pub fn ns_href(&self, ns: NodeId) -> Option<&str> {
        self.get(ns)?.namespace()?.href.as_deref()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    #[inline]
    pub fn doc_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.doc
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    #[inline]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    #[inline]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child
    }

    #[inline]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    #[inline]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling
    }

    /// Namespace reference of an element or attribute
    #[inline]
    pub fn ns_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.ns()
    }

    /// Iterate over children
    pub fn children(&self, id: NodeId) -> SiblingIter<'_> {
        SiblingIter {
            engine: self,
            next: self.first_child(id),
        }
    }

    /// Iterate over an element's attributes
    pub fn attributes(&self, id: NodeId) -> SiblingIter<'_> {
        SiblingIter {
            engine: self,
            next: self.get(id).and_then(XmlNode::properties),
        }
    }

    /// Iterate over the namespaces an element declares
    pub fn ns_defs(&self, id: NodeId) -> SiblingIter<'_> {
        SiblingIter {
            engine: self,
            next: self.get(id).and_then(XmlNode::ns_def),
        }
    }

    /// Iterate over `id` and the siblings after it
    pub fn siblings_from(&self, id: Option<NodeId>) -> SiblingIter<'_> {
        SiblingIter { engine: self, next: id }
    }

    /// Iterate over ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> AncestorIter<'_> {
        AncestorIter {
            engine: self,
            next: self.parent(id),
        }
    }

    /// Iterate over `id` and its descendants in document order.
    /// Attributes are not visited.
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        DescendantIter {
            engine: self,
            stack: if self.contains(id) { vec![id] } else { Vec::new() },
        }
    }

    /// True when `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }
}

/// Iterator along a next-sibling chain
pub struct SiblingIter<'a> {
    engine: &'a Engine,
    next: Option<NodeId>,
}

impl<'a> Iterator for SiblingIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.engine.next_sibling(current);
        Some(current)
    }
}

/// Iterator along the parent chain
pub struct AncestorIter<'a> {
    engine: &'a Engine,
    next: Option<NodeId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.engine.parent(current);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first)
pub struct DescendantIter<'a> {
    engine: &'a Engine,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let mut child_id = self.engine.last_child(current);
        while let Some(id) = child_id {
            self.stack.push(id);
            child_id = self.engine.prev_sibling(id);
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::{ElementData, NodeData};

    fn element(engine: &mut Engine, name: &str) -> NodeId {
        let mut node = XmlNode::new(NodeData::Element(ElementData::default()), None);
        node.name = Some(NameRef::Owned(name.to_string()));
        engine.alloc(node).unwrap()
    }

    #[test]
    fn test_alloc_release() {
        let mut engine = Engine::default();
        let a = element(&mut engine, "a");
        assert_eq!(engine.live_nodes(), 1);
        assert_eq!(engine.name(a), Some("a"));
        assert!(engine.release(a).is_some());
        assert_eq!(engine.live_nodes(), 0);
        // The slot is reused under a new id; the old one stays dead
        let b = element(&mut engine, "b");
        assert_ne!(a, b);
        assert_eq!(engine.slot_count(), 1);
        assert!(engine.get(a).is_none());
        assert_eq!(engine.node(a).err(), Some(TreeError::NoSuchNode(a)));
        assert!(engine.release(a).is_none());
        assert_eq!(engine.name(b), Some("b"));
    }

    #[test]
    fn test_document_churn_keeps_arena_bounded() {
        let mut engine = Engine::default();
        for i in 0..200 {
            let doc = engine.new_doc_with_dict(None).unwrap();
            let root = engine.new_doc_node(Some(doc), None, "root", Some("text")).unwrap();
            engine.set_root_element(doc, root).unwrap();
            engine.set_prop(root, "n", Some(&i.to_string())).unwrap();
            engine.free_doc(doc).unwrap();
        }
        assert_eq!(engine.live_nodes(), 0);
        assert!(engine.slot_count() <= 16, "arena grew to {}", engine.slot_count());
    }

    #[test]
    fn test_exhausted_slot_is_retired() {
        let mut engine = Engine::default();
        let mut id = element(&mut engine, "a");
        for _ in 0..MAX_GENERATION {
            engine.release(id).unwrap();
            id = element(&mut engine, "a");
        }
        assert_eq!(slot_generation(id), MAX_GENERATION);
        engine.release(id).unwrap();
        let fresh = element(&mut engine, "b");
        assert_eq!(engine.slot_count(), 2);
        assert_eq!(slot_index(fresh), 1);
        assert!(engine.get(id).is_none());
    }

    #[test]
    fn test_make_ref_without_dict() {
        let mut engine = Engine::default();
        assert_eq!(engine.make_ref(None, "x"), NameRef::Owned("x".into()));
    }

    #[test]
    fn test_expect_kind() {
        let mut engine = Engine::default();
        let a = element(&mut engine, "a");
        assert!(engine.expect_kind(a, NodeKind::Element).is_ok());
        assert_eq!(
            engine.expect_kind(a, NodeKind::Text),
            Err(TreeError::WrongKind(NodeKind::Element))
        );
    }
}
