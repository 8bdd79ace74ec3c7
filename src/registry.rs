//! Driver registry
//!
//! Maps a driver type name (as written in the configuration) to the factory
//! that builds it. Registration happens during startup; the first
//! [`DriverRegistry::create`] seals the registry against further additions.

use crate::api::Charger;
use crate::capability::CapabilitySet;
use crate::config::Other;
use crate::error::{ChargerError, Result};
use crate::logging::get_logger;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Future returned by a driver factory
pub type FactoryFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Charger>>> + Send>>;

/// Builds a charger from its opaque configuration
pub type Factory = Arc<dyn Fn(Other) -> FactoryFuture + Send + Sync>;

/// Name → factory table
pub struct DriverRegistry {
    factories: RwLock<BTreeMap<String, Factory>>,
    sealed: AtomicBool,
    logger: crate::logging::StructuredLogger,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
            sealed: AtomicBool::new(false),
            logger: get_logger("registry"),
        }
    }

    /// Register `factory` under `name`.
    ///
    /// Fails if the name is taken or if chargers have already been created.
    pub fn add<F, Fut>(&self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(Other) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Charger>>> + Send + 'static,
    {
        let mut factories = self
            .factories
            .write()
            .map_err(|_| ChargerError::generic("Driver registry lock poisoned"))?;
        if self.sealed.load(Ordering::Acquire) {
            return Err(ChargerError::RegistrySealed {
                name: name.to_string(),
            });
        }
        if factories.contains_key(name) {
            return Err(ChargerError::DuplicateDriver {
                name: name.to_string(),
            });
        }

        let factory: Factory = Arc::new(move |other: Other| -> FactoryFuture {
            Box::pin(factory(other))
        });
        factories.insert(name.to_string(), factory);
        self.logger
            .debug(&format!("Registered charger driver '{}'", name));
        Ok(())
    }

    /// Whether a driver type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .map(|f| f.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered driver types, sorted
    pub fn types(&self) -> Vec<String> {
        self.factories
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Build a charger of driver type `name` from its configuration.
    ///
    /// Construction talks to the device; the returned future completes only
    /// after the driver connected and identified the device.
    pub async fn create(&self, name: &str, other: Other) -> Result<Arc<dyn Charger>> {
        let factory = {
            let factories = self
                .factories
                .read()
                .map_err(|_| ChargerError::generic("Driver registry lock poisoned"))?;
            // Sealed under the lock so a concurrent add either lands first or fails
            self.sealed.store(true, Ordering::Release);
            factories
                .get(name)
                .cloned()
                .ok_or_else(|| ChargerError::DriverNotFound {
                    name: name.to_string(),
                })?
        };

        self.logger.info(&format!("Creating '{}' charger", name));
        match factory(other).await {
            Ok(charger) => {
                let caps = charger
                    .capabilities()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                self.logger.info(&format!(
                    "Created '{}' charger with capabilities [{}]",
                    name,
                    caps.join(", ")
                ));
                Ok(charger)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Cannot create '{}' charger: {}", name, e));
                Err(e)
            }
        }
    }
}

static REGISTRY: Lazy<DriverRegistry> = Lazy::new(|| {
    let registry = DriverRegistry::new();
    if let Err(e) = crate::charger::register_builtin(&registry) {
        registry
            .logger
            .error(&format!("Failed to register built-in drivers: {}", e));
    }
    registry
});

/// Process-wide registry with all built-in drivers registered
pub fn registry() -> &'static DriverRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChargeStatus;
    use crate::capability::CapabilitySet;

    struct Dummy;

    impl CapabilitySet for Dummy {}

    #[async_trait::async_trait]
    impl Charger for Dummy {
        async fn status(&self) -> Result<ChargeStatus> {
            Ok(ChargeStatus::A)
        }
        async fn enabled(&self) -> Result<bool> {
            Ok(false)
        }
        async fn enable(&self, _enable: bool) -> Result<()> {
            Ok(())
        }
        async fn max_current(&self, _current: i64) -> Result<()> {
            Ok(())
        }
    }

    async fn dummy(_other: Other) -> Result<Arc<dyn Charger>> {
        Ok(Arc::new(Dummy))
    }

    #[tokio::test]
    async fn create_seals_registry() {
        let registry = DriverRegistry::new();
        registry.add("dummy", dummy).unwrap();
        registry.create("dummy", Other::new()).await.unwrap();

        let err = registry.add("late", dummy).unwrap_err();
        assert!(matches!(err, ChargerError::RegistrySealed { .. }));
        assert!(!registry.contains("late"));
    }

    #[tokio::test]
    async fn no_add_lands_after_create() {
        let registry = Arc::new(DriverRegistry::new());
        registry.add("dummy", dummy).unwrap();

        let adder = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                (0..500)
                    .filter(|i| registry.add(&format!("late{}", i), dummy).is_ok())
                    .map(|i| format!("late{}", i))
                    .collect::<Vec<_>>()
            })
        };

        registry.create("dummy", Other::new()).await.unwrap();
        let after_create = registry.types();
        let added = adder.join().unwrap();

        assert_eq!(registry.types(), after_create);
        for name in added {
            assert!(after_create.contains(&name));
        }
    }

    #[test]
    fn global_registry_has_builtin_drivers() {
        let types = registry().types();
        for name in ["etrel", "go-e", "pulsar", "wallbox"] {
            assert!(types.contains(&name.to_string()), "missing {}", name);
        }
    }
}
