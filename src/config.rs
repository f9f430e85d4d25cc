//! Engine configuration
//!
//! Holds the defaults that would otherwise be process globals:
//! - buffer allocation scheme and size
//! - DTD default-attribute checking
//! - default compression mode
//! - node register/deregister hooks

use std::fmt;

use crate::buffer::AllocScheme;
use crate::dom::node::{NodeId, NodeKind};

/// Callback fired when a node is allocated or released
pub type NodeHook = Box<dyn Fn(NodeId, NodeKind) + Send + Sync>;

/// Default initial size for engine-created buffers
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Prefix probes before reconciliation gives up
pub const DEFAULT_RECONCILE_PROBES: u32 = 1000;

pub struct EngineConfig {
    /// Growth policy for buffers the engine creates
    pub buffer_scheme: AllocScheme,
    pub default_buffer_size: usize,
    /// Fall back to DTD attribute defaults in HasProp/GetProp
    pub check_dtd: bool,
    /// Prefix probes allowed in NewReconciledNs
    pub reconcile_probe_limit: u32,
    /// Entries kept in the old->new namespace cache during ReconcileNs
    pub reconcile_cache_size: usize,
    compress_mode: i32,
    register_hook: Option<NodeHook>,
    deregister_hook: Option<NodeHook>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            buffer_scheme: AllocScheme::Exact,
            default_buffer_size: DEFAULT_BUFFER_SIZE,
            check_dtd: true,
            reconcile_probe_limit: DEFAULT_RECONCILE_PROBES,
            reconcile_cache_size: 16,
            compress_mode: 0,
            register_hook: None,
            deregister_hook: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("buffer_scheme", &self.buffer_scheme)
            .field("default_buffer_size", &self.default_buffer_size)
            .field("check_dtd", &self.check_dtd)
            .field("reconcile_probe_limit", &self.reconcile_probe_limit)
            .field("reconcile_cache_size", &self.reconcile_cache_size)
            .field("compress_mode", &self.compress_mode)
            .field("register_hook", &self.register_hook.is_some())
            .field("deregister_hook", &self.deregister_hook.is_some())
            .finish()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer_scheme(mut self, scheme: AllocScheme) -> Self {
        // Immutable is a property of a view, never a default policy
        if scheme != AllocScheme::Immutable {
            self.buffer_scheme = scheme;
        }
        self
    }

    pub fn with_check_dtd(mut self, check: bool) -> Self {
        self.check_dtd = check;
        self
    }

    pub fn with_reconcile_probe_limit(mut self, limit: u32) -> Self {
        self.reconcile_probe_limit = limit;
        self
    }

    pub fn with_compress_mode(mut self, mode: i32) -> Self {
        self.set_compress_mode(mode);
        self
    }

    pub fn with_register_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(NodeId, NodeKind) + Send + Sync + 'static,
    {
        self.register_hook = Some(Box::new(hook));
        self
    }

    pub fn with_deregister_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(NodeId, NodeKind) + Send + Sync + 'static,
    {
        self.deregister_hook = Some(Box::new(hook));
        self
    }

    /// Default compression level for new documents (0..=9)
    #[inline]
    pub fn compress_mode(&self) -> i32 {
        self.compress_mode
    }

    pub fn set_compress_mode(&mut self, mode: i32) {
        self.compress_mode = clamp_compression(mode);
    }

    #[inline]
    pub(crate) fn notify_register(&self, id: NodeId, kind: NodeKind) {
        if let Some(hook) = &self.register_hook {
            hook(id, kind);
        }
    }

    #[inline]
    pub(crate) fn notify_deregister(&self, id: NodeId, kind: NodeKind) {
        if let Some(hook) = &self.deregister_hook {
            hook(id, kind);
        }
    }
}

/// Clamp a compression level to 0..=9
#[inline]
pub fn clamp_compression(mode: i32) -> i32 {
    mode.clamp(0, 9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_scheme, AllocScheme::Exact);
        assert_eq!(config.default_buffer_size, 4096);
        assert!(config.check_dtd);
        assert_eq!(config.reconcile_probe_limit, 1000);
        assert_eq!(config.compress_mode(), 0);
    }

    #[test]
    fn test_compress_mode_clamped() {
        let mut config = EngineConfig::new().with_compress_mode(42);
        assert_eq!(config.compress_mode(), 9);
        config.set_compress_mode(-3);
        assert_eq!(config.compress_mode(), 0);
    }

    #[test]
    fn test_immutable_not_a_default_scheme() {
        let config = EngineConfig::new()
            .with_buffer_scheme(AllocScheme::DoubleIt)
            .with_buffer_scheme(AllocScheme::Immutable);
        assert_eq!(config.buffer_scheme, AllocScheme::DoubleIt);
    }

    #[test]
    fn test_hooks_fire() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let config = EngineConfig::new().with_register_hook(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        config.notify_register(1, NodeKind::Element);
        config.notify_deregister(1, NodeKind::Element);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(format!("{:?}", config).contains("register_hook: true"));
    }
}
