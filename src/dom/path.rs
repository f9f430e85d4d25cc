//! Node paths for diagnostics
//!
//! `/root/item[2]/text()` style locations. A step gets an `[n]` index
//! only when a sibling would produce the same step.

use crate::buffer::Buffer;
use crate::dom::engine::Engine;
use crate::dom::node::{NodeId, NodeKind};
use crate::error::Result;

impl Engine {
    /// Whether `a` and `b` produce the same path step
    fn same_step(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(ka), Some(kb)) = (self.kind(a), self.kind(b)) else {
            return false;
        };
        match ka {
            NodeKind::Element => {
                if kb != NodeKind::Element || self.name(a) != self.name(b) {
                    return false;
                }
                match (self.ns_of(a), self.ns_of(b)) {
                    (None, None) => true,
                    (Some(x), Some(y)) => x == y || self.ns_prefix(x) == self.ns_prefix(y),
                    _ => false,
                }
            }
            NodeKind::Text | NodeKind::CData => matches!(kb, NodeKind::Text | NodeKind::CData),
            NodeKind::Comment => kb == NodeKind::Comment,
            NodeKind::ProcessingInstruction => {
                kb == NodeKind::ProcessingInstruction && self.name(a) == self.name(b)
            }
            _ => false,
        }
    }

    /// 1-based position among same-step siblings, 0 when it is the
    /// only one
    fn step_index(&self, node: NodeId) -> usize {
        let mut prev = self.prev_sibling(node);
        let mut before = 0;
        while let Some(id) = prev {
            if self.same_step(node, id) {
                before += 1;
            }
            prev = self.prev_sibling(id);
        }
        if before > 0 {
            return before + 1;
        }
        let later = self
            .siblings_from(self.next_sibling(node))
            .any(|id| self.same_step(node, id));
        usize::from(later)
    }

    fn path_step(&self, node: NodeId) -> (String, Option<NodeId>) {
        let parent = self.parent(node);
        let kind = self.kind(node);
        let (sep, name) = match kind {
            Some(NodeKind::Element) => ("/", self.qualified_name(node).map(|n| n.into_owned()).unwrap_or_default()),
            Some(NodeKind::Text | NodeKind::CData) => ("/", "text()".to_string()),
            Some(NodeKind::Comment) => ("/", "comment()".to_string()),
            Some(NodeKind::ProcessingInstruction) => (
                "/",
                format!("processing-instruction('{}')", self.name(node).unwrap_or("")),
            ),
            Some(NodeKind::Attribute) => {
                let name = self.qualified_name(node).map(|n| n.into_owned()).unwrap_or_default();
                return (format!("/@{}", name), parent);
            }
            Some(NodeKind::Document) => return ("/".to_string(), None),
            _ => ("?", String::new()),
        };
        let step = match (kind, self.step_index(node)) {
            (Some(NodeKind::Element | NodeKind::Text | NodeKind::CData | NodeKind::Comment | NodeKind::ProcessingInstruction), n)
                if n > 0 =>
            {
                format!("{}{}[{}]", sep, name, n)
            }
            _ => format!("{}{}", sep, name),
        };
        (step, parent)
    }

    /// Path from the document down to `node`
    pub fn get_node_path(&self, node: NodeId) -> Result<String> {
        self.kind_of(node)?;
        let config = self.config();
        let mut buf = Buffer::with_scheme(config.default_buffer_size, config.buffer_scheme)?;
        let mut cur = Some(node);
        while let Some(id) = cur {
            let (step, next) = self.path_step(id);
            // A document contributes the leading slash only for itself
            if self.kind(id) == Some(NodeKind::Document) && buf.content().first() == Some(&b'/') {
                break;
            }
            buf.add_head(step.as_bytes(), None)?;
            cur = next;
        }
        log::trace!(target: "rustytree.tree", "path of node {}: {} bytes", node, buf.len());
        Ok(buf.into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Engine, NodeId, NodeId) {
        let mut engine = Engine::default();
        let doc = engine.new_doc(None).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "root", None).unwrap();
        engine.set_root_element(doc, root).unwrap();
        (engine, doc, root)
    }

    #[test]
    fn test_document_and_root() {
        let (engine, doc, root) = setup();
        assert_eq!(engine.get_node_path(doc).unwrap(), "/");
        assert_eq!(engine.get_node_path(root).unwrap(), "/root");
    }

    #[test]
    fn test_indexes_only_for_repeats() {
        let (mut engine, _, root) = setup();
        let a1 = engine.new_child(root, None, "a", None).unwrap();
        let b = engine.new_child(root, None, "b", None).unwrap();
        let a2 = engine.new_child(root, None, "a", None).unwrap();
        assert_eq!(engine.get_node_path(a1).unwrap(), "/root/a[1]");
        assert_eq!(engine.get_node_path(b).unwrap(), "/root/b");
        assert_eq!(engine.get_node_path(a2).unwrap(), "/root/a[2]");
    }

    #[test]
    fn test_leaf_steps() {
        let (mut engine, doc, root) = setup();
        let text = engine.new_doc_text(Some(doc), Some("t")).unwrap();
        engine.add_child(root, text).unwrap();
        let comment = engine.new_doc_comment(Some(doc), "c").unwrap();
        engine.add_child(root, comment).unwrap();
        let pi = engine.new_doc_pi(Some(doc), "style", None).unwrap();
        engine.add_child(root, pi).unwrap();
        let cdata = engine.new_cdata_block(Some(doc), "x").unwrap();
        engine.add_child(root, cdata).unwrap();
        assert_eq!(engine.get_node_path(text).unwrap(), "/root/text()[1]");
        assert_eq!(engine.get_node_path(cdata).unwrap(), "/root/text()[2]");
        assert_eq!(engine.get_node_path(comment).unwrap(), "/root/comment()");
        assert_eq!(
            engine.get_node_path(pi).unwrap(),
            "/root/processing-instruction('style')"
        );
    }

    #[test]
    fn test_attribute_and_prefix() {
        let (mut engine, _, root) = setup();
        let ns = engine.new_ns(Some(root), Some("urn:x"), Some("x")).unwrap();
        let item = engine.new_child(root, Some(ns), "item", None).unwrap();
        let attr = engine.new_prop(Some(item), "id", Some("1")).unwrap();
        assert_eq!(engine.get_node_path(item).unwrap(), "/root/x:item");
        assert_eq!(engine.get_node_path(attr).unwrap(), "/root/x:item/@id");
    }

    #[test]
    fn test_detached_subtree() {
        let mut engine = Engine::default();
        let top = engine.new_node(None, "top").unwrap();
        let leaf = engine.new_child(top, None, "leaf", None).unwrap();
        assert_eq!(engine.get_node_path(leaf).unwrap(), "/top/leaf");
    }
}
