//! Lookup of zone rules by identifier.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::rules::ZoneRules;
use crate::ZoneRulesError;

/// A source of [`ZoneRules`] keyed by zone identifier.
pub trait ZoneRulesProvider {
    /// A version string identifying the data this provider serves.
    fn version(&self) -> &str;

    /// The identifiers this provider can resolve, in registration
    /// order.
    fn zone_ids(&self) -> Vec<String>;

    /// The rules for `zone_id`.
    fn rules_for(&self, zone_id: &str) -> Result<Arc<ZoneRules>, ZoneRulesError>;
}

/// A provider holding a fixed set of pre-built rules.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    version: String,
    zones: IndexMap<String, Arc<ZoneRules>>,
}

impl InMemoryProvider {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            zones: IndexMap::new(),
        }
    }

    /// Registers rules under `zone_id`. Re-registering an identifier is
    /// only allowed when the rules are unchanged.
    pub fn register(
        &mut self,
        zone_id: impl Into<String>,
        rules: ZoneRules,
    ) -> Result<(), ZoneRulesError> {
        let zone_id = zone_id.into();
        if let Some(existing) = self.zones.get(&zone_id) {
            if **existing != rules {
                return Err(ZoneRulesError::DuplicateZoneId(zone_id));
            }
            return Ok(());
        }
        self.zones.insert(zone_id, Arc::new(rules));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl ZoneRulesProvider for InMemoryProvider {
    fn version(&self) -> &str {
        &self.version
    }

    fn zone_ids(&self) -> Vec<String> {
        self.zones.keys().cloned().collect()
    }

    fn rules_for(&self, zone_id: &str) -> Result<Arc<ZoneRules>, ZoneRulesError> {
        self.zones
            .get(zone_id)
            .map(Arc::clone)
            .ok_or_else(|| ZoneRulesError::UnknownZoneId(zone_id.to_owned()))
    }
}
