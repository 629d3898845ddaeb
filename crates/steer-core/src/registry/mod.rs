//! Plugin-based provider registry
//!
//! The registry allows record stores and optimal-IP feeds to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use steer_core::registry::ProviderRegistry;
//! use steer_core::config::ProviderConfig;
//!
//! let registry = ProviderRegistry::new();
//!
//! // Implementation crates register themselves
//! steer_provider_dnspod::register(&registry);
//! steer_feed_http::register(&registry);
//!
//! // Create components from config
//! let store = registry.create_record_store(&provider_config)?;
//! let feed = registry.create_feed(&feed_config)?;
//! ```

use crate::config::{FeedConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{IpFeed, IpFeedFactory, RecordStore, RecordStoreFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry mapping type names to component factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered record store factories
    stores: RwLock<HashMap<String, Box<dyn RecordStoreFactory>>>,

    /// Registered feed factories
    feeds: RwLock<HashMap<String, Box<dyn IpFeedFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record store factory
    ///
    /// # Parameters
    ///
    /// - `name`: store type name (e.g., "dnspod")
    /// - `factory`: factory object for creating store instances
    pub fn register_record_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordStoreFactory>,
    ) {
        let name = name.into();
        let mut stores = self.stores.write().unwrap();
        stores.insert(name, factory);
    }

    /// Register a feed factory
    ///
    /// # Parameters
    ///
    /// - `name`: feed type name (e.g., "http")
    /// - `factory`: factory object for creating feed instances
    pub fn register_feed(&self, name: impl Into<String>, factory: Box<dyn IpFeedFactory>) {
        let name = name.into();
        let mut feeds = self.feeds.write().unwrap();
        feeds.insert(name, factory);
    }

    /// Create a record store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordStore>)`: created store instance
    /// - `Err(Error)`: if the store type is not registered or creation fails
    pub fn create_record_store(&self, config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
        let store_type = config.type_name();
        let stores = self.stores.read().unwrap();

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("unknown provider type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a feed from configuration
    pub fn create_feed(&self, config: &FeedConfig) -> Result<Box<dyn IpFeed>> {
        let feed_type = config.type_name();
        let feeds = self.feeds.read().unwrap();

        let factory = feeds
            .get(feed_type)
            .ok_or_else(|| Error::config(format!("unknown feed type: {}", feed_type)))?;

        factory.create(config)
    }

    /// List all registered record store types
    pub fn list_record_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap();
        stores.keys().cloned().collect()
    }

    /// List all registered feed types
    pub fn list_feeds(&self) -> Vec<String> {
        let feeds = self.feeds.read().unwrap();
        feeds.keys().cloned().collect()
    }

    /// Check if a record store type is registered
    pub fn has_record_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap();
        stores.contains_key(name)
    }

    /// Check if a feed type is registered
    pub fn has_feed(&self, name: &str) -> bool {
        let feeds = self.feeds.read().unwrap();
        feeds.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockStoreFactory;

    impl RecordStoreFactory for MockStoreFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn RecordStore>> {
            Err(Error::not_found("mock store not implemented"))
        }
    }

    #[test]
    fn registration_makes_a_type_visible() {
        let registry = ProviderRegistry::new();

        assert!(!registry.has_record_store("mock"));

        registry.register_record_store("mock", Box::new(MockStoreFactory));

        assert!(registry.has_record_store("mock"));
        assert!(registry.list_record_stores().contains(&"mock".to_string()));
    }

    #[test]
    fn unknown_type_is_a_config_error() {
        let registry = ProviderRegistry::new();

        let config = ProviderConfig::Dnspod {
            token_id: "1234".to_string(),
            token: "secret".to_string(),
        };

        assert!(registry.create_record_store(&config).is_err());
    }
}
