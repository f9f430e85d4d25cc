//! ResourceArc Wrappers
//!
//! Persistent engine state handed to the BEAM.

use rustler::ResourceArc;
use std::sync::Mutex;

use crate::config::EngineConfig;
use crate::dom::Engine;

/// A tree engine that can be stored in a ResourceArc
pub struct EngineResource {
    pub inner: Mutex<Engine>,
}

impl EngineResource {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        EngineResource {
            inner: Mutex::new(Engine::new(config)),
        }
    }

    /// Run `f` against the locked engine.
    ///
    /// # Errors
    ///
    /// Returns `"mutex_poisoned"` if a previous holder panicked.
    pub fn with_engine<F, R>(&self, f: F) -> Result<R, &'static str>
    where
        F: FnOnce(&mut Engine) -> R,
    {
        let mut guard = self.inner.lock().map_err(|_| "mutex_poisoned")?;
        Ok(f(&mut guard))
    }
}

#[rustler::resource_impl]
impl rustler::Resource for EngineResource {}

impl Default for EngineResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for the ResourceArc
pub type EngineRef = ResourceArc<EngineResource>;
