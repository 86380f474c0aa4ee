use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Backend handle shared between the registry and the detection loop.
pub type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Named detector backends, one of which is preferred when no name is requested.
pub struct BackendRegistry {
    backends: BTreeMap<&'static str, SharedBackend>,
    preferred: Option<&'static str>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            preferred: None,
        }
    }

    /// Add a backend under its own name, replacing any backend with that name.
    /// The first backend added becomes the preferred one.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name();
        self.preferred.get_or_insert(name);
        if self
            .backends
            .insert(name, Arc::new(Mutex::new(backend)))
            .is_some()
        {
            log::warn!("detector backend '{}' registered twice; keeping the last", name);
        }
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let key = self
            .backends
            .get_key_value(name)
            .map(|(key, _)| *key)
            .ok_or_else(|| self.unknown(name))?;
        self.preferred = Some(key);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.preferred.and_then(|name| self.get(name))
    }

    /// Registered names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().map(|name| name.to_string()).collect()
    }

    /// Resolve `name` (or the preferred backend) and run its warm-up hook.
    pub fn select(&self, name: Option<&str>) -> Result<SharedBackend> {
        let backend = match name {
            Some(name) => self.get(name).ok_or_else(|| self.unknown(name))?,
            None => self
                .default_backend()
                .ok_or_else(|| anyhow!("no detector backends registered"))?,
        };
        {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            guard.warm_up()?;
            log::info!("detector backend '{}' ready", guard.name());
        }
        Ok(backend)
    }

    fn unknown(&self, name: &str) -> anyhow::Error {
        anyhow!(
            "detector backend '{}' not registered (available: {})",
            name,
            self.list().join(", ")
        )
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
