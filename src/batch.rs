//! Parallel read-only queries
//!
//! Uses Rayon to answer the same question for many nodes at once. The
//! engine is only borrowed, so these never mutate the tree.

use rayon::prelude::*;

use crate::dom::{Engine, NodeId};
use crate::error::Result;

/// Text value of every node, `None` for stale ids and kinds without one
pub fn content_parallel(engine: &Engine, nodes: &[NodeId]) -> Vec<Option<String>> {
    nodes.par_iter().map(|&id| engine.get_content(id)).collect()
}

/// Diagnostic path of every node
pub fn paths_parallel(engine: &Engine, nodes: &[NodeId]) -> Vec<Result<String>> {
    nodes.par_iter().map(|&id| engine.get_node_path(id)).collect()
}

/// Value of attribute `name` on every node
pub fn props_parallel(engine: &Engine, nodes: &[NodeId], name: &str) -> Vec<Option<String>> {
    nodes.par_iter().map(|&id| engine.get_prop(id, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;

    fn build(engine: &mut Engine) -> Vec<NodeId> {
        let doc = engine.new_doc(None).unwrap();
        let root = engine.new_doc_node(Some(doc), None, "root", None).unwrap();
        engine.set_root_element(doc, root).unwrap();
        (0..8)
            .map(|i| {
                let item = engine.new_child(root, None, "item", Some(&format!("v{i}"))).unwrap();
                engine.set_prop(item, "n", Some(&i.to_string())).unwrap();
                item
            })
            .collect()
    }

    #[test]
    fn test_content_parallel_keeps_order() {
        let mut engine = Engine::default();
        let items = build(&mut engine);
        let contents = content_parallel(&engine, &items);
        assert_eq!(contents.len(), 8);
        assert_eq!(contents[0].as_deref(), Some("v0"));
        assert_eq!(contents[7].as_deref(), Some("v7"));
    }

    #[test]
    fn test_paths_parallel() {
        let mut engine = Engine::default();
        let items = build(&mut engine);
        let paths = paths_parallel(&engine, &items[..2]);
        assert_eq!(paths[0].as_deref(), Ok("/root/item[1]"));
        assert_eq!(paths[1].as_deref(), Ok("/root/item[2]"));
        let stale = paths_parallel(&engine, &[9999]);
        assert_eq!(stale[0], Err(TreeError::NoSuchNode(9999)));
    }

    #[test]
    fn test_props_parallel() {
        let mut engine = Engine::default();
        let items = build(&mut engine);
        let values = props_parallel(&engine, &items, "n");
        assert_eq!(values[3].as_deref(), Some("3"));
        assert!(props_parallel(&engine, &items, "missing").iter().all(Option::is_none));
    }
}
