use crate::{SignStrategy, SignatureVersion, StrategyFactory, StrategyParams};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Registry mapping signature version identifiers to strategy factories.
///
/// Each entry also records whether the strategy needs a region: the signer
/// checks that requirement before invoking the factory (and before touching
/// the credential provider), so factories can rely on `region` and
/// `signing_name` being populated when the flag is set.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    entries: HashMap<String, StrategyEntry>,
}

#[derive(Clone)]
pub(crate) struct StrategyEntry {
    pub(crate) requires_region: bool,
    pub(crate) factory: StrategyFactory,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy factory for a version identifier.
    ///
    /// Registering the same identifier twice replaces the earlier factory.
    /// The region requirement is declared here, as registry metadata, rather
    /// than queried from constructed strategies.
    pub fn register<F>(mut self, version: impl Into<String>, requires_region: bool, factory: F) -> Self
    where
        F: Fn(StrategyParams) -> crate::Result<Arc<dyn SignStrategy>> + Send + Sync + 'static,
    {
        self.entries.insert(
            version.into(),
            StrategyEntry {
                requires_region,
                factory: Arc::new(factory),
            },
        );
        self
    }

    /// Whether a factory is registered for the given version.
    pub fn contains(&self, version: &SignatureVersion) -> bool {
        self.entries.contains_key(version.as_str())
    }

    pub(crate) fn get(&self, version: &SignatureVersion) -> Option<&StrategyEntry> {
        self.entries.get(version.as_str())
    }
}

// Factories are not Debug; show the registered identifiers instead.
impl Debug for StrategyRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut versions: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        versions.sort_unstable();
        f.debug_struct("StrategyRegistry")
            .field("versions", &versions)
            .finish()
    }
}
