//! RustyTree - Mutable XML document trees for the BEAM
//!
//! Surfaces:
//! A: Engine lifecycle and node construction (engine_new, new_*)
//! B: Tree mutation (add_*, replace_node, unlink, free_node)
//! C: Content, attributes and namespaces (get_/set_content, *_prop, reconcile_ns)
//! D: Copies (copy_node, copy_doc)
//! E: Parallel read-only queries (content_parallel, paths_parallel)

// The engine API is wider than the NIF surface
#![allow(dead_code)]

use rustler::{Encoder, Env, NifResult, Term};

mod alloc;
mod batch;
mod buffer;
mod config;
mod core;
mod dom;
mod error;
mod resource;
mod term;

use buffer::AllocScheme;
use config::EngineConfig;
use dom::{CopyDepth, Engine, NodeId};
use error::Result;
use resource::{EngineRef, EngineResource};
use term::{node_to_term, opt_str_to_term, result_to_term, unit_result_to_term};

// ============================================================================
// Memory Tracking NIFs
// ============================================================================

#[rustler::nif]
fn get_rust_memory() -> usize {
    alloc::current()
}

#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    alloc::peak()
}

#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    alloc::reset_stats()
}

// ============================================================================
// Helpers
// ============================================================================

/// Lock the engine, run `f` and encode its result as `{:ok, v}` / `{:error, r}`
fn run<'a, T, F>(env: Env<'a>, engine: &EngineRef, f: F) -> NifResult<Term<'a>>
where
    T: Encoder,
    F: FnOnce(&mut Engine) -> Result<T>,
{
    engine
        .with_engine(|e| result_to_term(env, f(e)))
        .map_err(rustler::Error::RaiseAtom)
}

/// Same as `run` for operations without a value
fn run_unit<'a, F>(env: Env<'a>, engine: &EngineRef, f: F) -> NifResult<Term<'a>>
where
    F: FnOnce(&mut Engine) -> Result<()>,
{
    engine
        .with_engine(|e| unit_result_to_term(env, f(e)))
        .map_err(rustler::Error::RaiseAtom)
}

// ============================================================================
// Surface A: Engine and Construction
// ============================================================================

/// Create an engine. `scheme` is "exact", "double" or "immutable".
#[rustler::nif]
fn engine_new<'a>(env: Env<'a>, scheme: Option<&str>, check_dtd: bool) -> NifResult<Term<'a>> {
    let mut config = EngineConfig::new().with_check_dtd(check_dtd);
    if let Some(name) = scheme {
        match AllocScheme::from_name(name) {
            Some(scheme) => config = config.with_buffer_scheme(scheme),
            None => return Ok((term::error(), term::invalid_scheme()).encode(env)),
        }
    }
    let engine = EngineRef::new(EngineResource::with_config(config));
    Ok((term::ok(), engine).encode(env))
}

#[rustler::nif]
fn live_nodes(engine: EngineRef) -> NifResult<usize> {
    engine.with_engine(|e| e.live_nodes()).map_err(rustler::Error::RaiseAtom)
}

#[rustler::nif]
fn new_doc<'a>(env: Env<'a>, engine: EngineRef, version: Option<&str>, dict: bool) -> NifResult<Term<'a>> {
    run(env, &engine, |e| {
        if dict {
            e.new_doc_with_dict(version)
        } else {
            e.new_doc(version)
        }
    })
}

#[rustler::nif]
fn new_node<'a>(env: Env<'a>, engine: EngineRef, doc: Option<NodeId>, name: &str) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_doc_node(doc, None, name, None))
}

#[rustler::nif]
fn new_child<'a>(
    env: Env<'a>,
    engine: EngineRef,
    parent: NodeId,
    ns: Option<NodeId>,
    name: &str,
    content: Option<&str>,
) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_child(parent, ns, name, content))
}

#[rustler::nif]
fn new_text<'a>(env: Env<'a>, engine: EngineRef, doc: Option<NodeId>, content: &str) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_doc_text(doc, Some(content)))
}

#[rustler::nif]
fn new_comment<'a>(env: Env<'a>, engine: EngineRef, doc: Option<NodeId>, content: &str) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_doc_comment(doc, content))
}

#[rustler::nif]
fn new_cdata<'a>(env: Env<'a>, engine: EngineRef, doc: Option<NodeId>, content: &str) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_cdata_block(doc, content))
}

#[rustler::nif]
fn new_pi<'a>(
    env: Env<'a>,
    engine: EngineRef,
    doc: Option<NodeId>,
    target: &str,
    content: Option<&str>,
) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_doc_pi(doc, target, content))
}

#[rustler::nif]
fn new_reference<'a>(env: Env<'a>, engine: EngineRef, doc: Option<NodeId>, name: &str) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_reference(doc, name))
}

#[rustler::nif]
fn new_ns<'a>(
    env: Env<'a>,
    engine: EngineRef,
    node: Option<NodeId>,
    href: Option<&str>,
    prefix: Option<&str>,
) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.new_ns(node, href, prefix))
}

#[rustler::nif]
fn set_root_element<'a>(env: Env<'a>, engine: EngineRef, doc: NodeId, root: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.set_root_element(doc, root))
}

#[rustler::nif]
fn get_root_element<'a>(env: Env<'a>, engine: EngineRef, doc: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| {
        e.kind_of(doc)?;
        Ok(e.get_root_element(doc))
    })
}

// ============================================================================
// Surface B: Tree Mutation
// ============================================================================

#[rustler::nif]
fn add_child<'a>(env: Env<'a>, engine: EngineRef, parent: NodeId, child: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.add_child(parent, child))
}

#[rustler::nif]
fn add_next_sibling<'a>(env: Env<'a>, engine: EngineRef, cur: NodeId, elem: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.add_next_sibling(cur, elem))
}

#[rustler::nif]
fn add_prev_sibling<'a>(env: Env<'a>, engine: EngineRef, cur: NodeId, elem: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.add_prev_sibling(cur, elem))
}

#[rustler::nif]
fn replace_node<'a>(env: Env<'a>, engine: EngineRef, old: NodeId, cur: Option<NodeId>) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.replace_node(old, cur))
}

#[rustler::nif]
fn unlink<'a>(env: Env<'a>, engine: EngineRef, node: NodeId) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| e.unlink(node))
}

/// Free a node, or a whole document when given one
#[rustler::nif]
fn free_node<'a>(env: Env<'a>, engine: EngineRef, node: NodeId) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| {
        if e.is_document(node) {
            e.free_doc(node)
        } else {
            e.free_node(node)
        }
    })
}

// ============================================================================
// Surface C: Content, Attributes, Namespaces
// ============================================================================

#[rustler::nif]
fn get_content<'a>(env: Env<'a>, engine: EngineRef, node: NodeId) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| opt_str_to_term(env, e.get_content(node).as_deref()))
        .map_err(rustler::Error::RaiseAtom)
}

#[rustler::nif]
fn set_content<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, content: Option<&str>) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| e.set_content(node, content))
}

#[rustler::nif]
fn add_content<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, content: &str) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| e.add_content(node, content))
}

#[rustler::nif]
fn get_prop<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, name: &str) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| opt_str_to_term(env, e.get_prop(node, name).as_deref()))
        .map_err(rustler::Error::RaiseAtom)
}

#[rustler::nif]
fn set_prop<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, name: &str, value: Option<&str>) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.set_prop(node, name, value))
}

#[rustler::nif]
fn unset_prop<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, name: &str) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| e.unset_prop(node, name))
}

#[rustler::nif]
fn get_node_path<'a>(env: Env<'a>, engine: EngineRef, node: NodeId) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.get_node_path(node))
}

#[rustler::nif]
fn reconcile_ns<'a>(env: Env<'a>, engine: EngineRef, tree: NodeId) -> NifResult<Term<'a>> {
    run_unit(env, &engine, |e| {
        let doc = e.doc_of(tree);
        e.reconcile_ns(doc, tree)
    })
}

/// Render a node and its subtree as nested terms
#[rustler::nif]
fn to_term<'a>(env: Env<'a>, engine: EngineRef, node: NodeId) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| node_to_term(env, e, node))
        .map_err(rustler::Error::RaiseAtom)
}

// ============================================================================
// Surface D: Copies
// ============================================================================

/// Copy `node` into `doc` (or its own document). `level` is 0 shallow,
/// 1 deep, 2 properties only.
#[rustler::nif]
fn copy_node<'a>(env: Env<'a>, engine: EngineRef, node: NodeId, doc: Option<NodeId>, level: u8) -> NifResult<Term<'a>> {
    let Some(depth) = CopyDepth::from_level(level) else {
        return Ok((term::error(), term::invalid_depth()).encode(env));
    };
    run(env, &engine, |e| match doc {
        Some(doc) => e.doc_copy_node(node, Some(doc), depth),
        None => e.copy_node(node, depth),
    })
}

#[rustler::nif]
fn copy_doc<'a>(env: Env<'a>, engine: EngineRef, doc: NodeId, recursive: bool) -> NifResult<Term<'a>> {
    run(env, &engine, |e| e.copy_doc(doc, recursive))
}

// ============================================================================
// Surface E: Parallel Queries
// ============================================================================

#[rustler::nif(schedule = "DirtyCpu")]
fn content_parallel<'a>(env: Env<'a>, engine: EngineRef, nodes: Vec<NodeId>) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| {
            let results = batch::content_parallel(e, &nodes);
            let mut list = Term::list_new_empty(env);
            for content in results.into_iter().rev() {
                list = list.list_prepend(opt_str_to_term(env, content.as_deref()));
            }
            list
        })
        .map_err(rustler::Error::RaiseAtom)
}

#[rustler::nif(schedule = "DirtyCpu")]
fn paths_parallel<'a>(env: Env<'a>, engine: EngineRef, nodes: Vec<NodeId>) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| {
            let results = batch::paths_parallel(e, &nodes);
            let mut list = Term::list_new_empty(env);
            for path in results.into_iter().rev() {
                list = list.list_prepend(result_to_term(env, path));
            }
            list
        })
        .map_err(rustler::Error::RaiseAtom)
}

#[rustler::nif(schedule = "DirtyCpu")]
fn props_parallel<'a>(env: Env<'a>, engine: EngineRef, nodes: Vec<NodeId>, name: &str) -> NifResult<Term<'a>> {
    engine
        .with_engine(|e| {
            let results = batch::props_parallel(e, &nodes, name);
            let mut list = Term::list_new_empty(env);
            for value in results.into_iter().rev() {
                list = list.list_prepend(opt_str_to_term(env, value.as_deref()));
            }
            list
        })
        .map_err(rustler::Error::RaiseAtom)
}

// ============================================================================
// NIF Initialization
// ============================================================================

fn load(_env: Env, _info: Term) -> bool {
    log::debug!(target: "rustytree.tree", "native library loaded");
    true
}

rustler::init!("Elixir.RustyTree.Native", load = load);
