//! Elixir Term Conversion Utilities
//!
//! Converts engine nodes and errors to Elixir terms.

use rustler::{Encoder, Env, NewBinary, Term};

use crate::dom::{Engine, NodeId, NodeKind};
use crate::error::TreeError;

rustler::atoms! {
    ok,
    error,
    element,
    comment,
    pi,
    cdata,
    entity_ref,
    fragment,
    document,
    invalid_scheme,
    invalid_depth,
}

/// Convert a node to an Elixir term
///
/// Elements become `{:element, name, attrs, children}`, text becomes a
/// bare binary, everything else a tagged tuple or `nil`.
pub fn node_to_term<'a>(env: Env<'a>, engine: &Engine, node_id: NodeId) -> Term<'a> {
    let Some(kind) = engine.kind(node_id) else {
        return rustler::types::atom::nil().encode(env);
    };

    match kind {
        NodeKind::Element => {
            let name = engine.qualified_name(node_id).unwrap_or_default();
            let name_term = str_to_binary(env, &name);

            let attr_ids: Vec<NodeId> = engine.attributes(node_id).collect();
            let mut attrs = Term::list_new_empty(env);
            for &attr in attr_ids.iter().rev() {
                let attr_name = engine.qualified_name(attr).unwrap_or_default();
                let value = engine.get_content(attr).unwrap_or_default();
                let tuple = (str_to_binary(env, &attr_name), str_to_binary(env, &value));
                attrs = attrs.list_prepend(tuple.encode(env));
            }

            (element(), name_term, attrs, children_to_term(env, engine, node_id)).encode(env)
        }
        NodeKind::Text => str_to_binary(env, engine.raw_content(node_id).unwrap_or("")),
        NodeKind::CData => {
            (cdata(), str_to_binary(env, engine.raw_content(node_id).unwrap_or(""))).encode(env)
        }
        NodeKind::Comment => {
            (comment(), str_to_binary(env, engine.raw_content(node_id).unwrap_or(""))).encode(env)
        }
        NodeKind::ProcessingInstruction => {
            let target = engine.name(node_id).unwrap_or("");
            let data = engine.raw_content(node_id).unwrap_or("");
            (pi(), str_to_binary(env, target), str_to_binary(env, data)).encode(env)
        }
        NodeKind::EntityRef => {
            (entity_ref(), str_to_binary(env, engine.name(node_id).unwrap_or(""))).encode(env)
        }
        NodeKind::DocumentFragment => {
            (fragment(), children_to_term(env, engine, node_id)).encode(env)
        }
        NodeKind::Document => match engine.get_root_element(node_id) {
            Some(root) => (document(), node_to_term(env, engine, root)).encode(env),
            None => (document(), rustler::types::atom::nil()).encode(env),
        },
        _ => rustler::types::atom::nil().encode(env),
    }
}

/// Children of `parent`, built from the last child backwards
fn children_to_term<'a>(env: Env<'a>, engine: &Engine, parent: NodeId) -> Term<'a> {
    let mut children = Term::list_new_empty(env);
    let mut child = engine.last_child(parent);
    while let Some(cid) = child {
        children = children.list_prepend(node_to_term(env, engine, cid));
        child = engine.prev_sibling(cid);
    }
    children
}

/// `{:ok, value}` or `{:error, reason}`
pub fn result_to_term<'a, T: Encoder>(env: Env<'a>, result: Result<T, TreeError>) -> Term<'a> {
    match result {
        Ok(value) => (ok(), value).encode(env),
        Err(err) => error_to_term(env, &err),
    }
}

/// `:ok` or `{:error, reason}`
pub fn unit_result_to_term<'a>(env: Env<'a>, result: Result<(), TreeError>) -> Term<'a> {
    match result {
        Ok(()) => ok().encode(env),
        Err(err) => error_to_term(env, &err),
    }
}

/// `{:error, reason}` with the error's reason atom
pub fn error_to_term<'a>(env: Env<'a>, err: &TreeError) -> Term<'a> {
    match rustler::types::atom::Atom::from_str(env, err.reason()) {
        Ok(reason) => (error(), reason).encode(env),
        Err(_) => (error(), err.to_string()).encode(env),
    }
}

/// Optional string as a binary or `nil`
pub fn opt_str_to_term<'a>(env: Env<'a>, s: Option<&str>) -> Term<'a> {
    match s {
        Some(s) => str_to_binary(env, s),
        None => rustler::types::atom::nil().encode(env),
    }
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
