//! Static phase registry.
//!
//! Maps a phase name to its handler. The registry is filled once at process
//! start with the built-in phases plus every phase other crates submitted
//! through `inventory::submit!`; callers may add their own handlers before
//! starting pipelines. Lookup is by lower-cased name and a miss is a
//! configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use phasework_shared::{PhaseworkError, PhaseworkResult};

use super::PhaseHandler;
use crate::config::PhaseworkOptions;
use crate::phases::BUILTIN;

/// A phase known at compile time.
///
/// Crates adding phases submit one with
/// `inventory::submit! { PhaseRegistration::new("name", build) }`.
pub struct PhaseRegistration {
    pub name: &'static str,
    pub build: fn(&PhaseworkOptions) -> Arc<dyn PhaseHandler>,
}

impl PhaseRegistration {
    pub const fn new(
        name: &'static str,
        build: fn(&PhaseworkOptions) -> Arc<dyn PhaseHandler>,
    ) -> Self {
        Self { name, build }
    }
}

inventory::collect!(PhaseRegistration);

/// Thread-safe name → handler map.
#[derive(Default)]
pub struct PhaseRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn PhaseHandler>>>,
}

impl std::fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRegistry")
            .field("phases", &self.names())
            .finish()
    }
}

impl PhaseRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in and submitted phases.
    pub fn builtin(options: &PhaseworkOptions) -> PhaseworkResult<Self> {
        let registry = Self::new();
        for registration in BUILTIN
            .iter()
            .chain(inventory::iter::<PhaseRegistration>)
        {
            registry.register((registration.build)(options))?;
        }
        tracing::debug!(phases = ?registry.names(), "Registered built-in phases");
        Ok(registry)
    }

    /// Add a handler under its own name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or already taken.
    pub fn register(&self, handler: Arc<dyn PhaseHandler>) -> PhaseworkResult<()> {
        let key = normalize(handler.name());
        if key.is_empty() {
            return Err(PhaseworkError::Config("phase name cannot be empty".into()));
        }

        let mut handlers = self.handlers.write();
        if handlers.contains_key(&key) {
            return Err(PhaseworkError::Config(format!(
                "phase '{}' already registered",
                key
            )));
        }
        handlers.insert(key, handler);
        Ok(())
    }

    /// Resolve a phase by name (case-insensitive).
    pub fn get(&self, name: &str) -> PhaseworkResult<Arc<dyn PhaseHandler>> {
        self.handlers
            .read()
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| PhaseworkError::UnknownPhase(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(&normalize(name))
    }

    /// Registered phase names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
