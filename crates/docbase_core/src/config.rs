//! Engine configuration.

/// Configuration for the document engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Namespace prefix for change-event channel names.
    pub namespace: String,

    /// Default page size for find when the caller gives no limit.
    pub default_limit: usize,

    /// Maximum number of advisor-materialized indexes per collection.
    pub max_indexed_fields: usize,

    /// Whether `select` projections always include the system fields.
    pub select_includes_system_fields: bool,

    /// Capacity of the change-event dispatch queue.
    pub event_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: "docbase".to_string(),
            default_limit: 50,
            max_indexed_fields: 20,
            select_includes_system_fields: false,
            event_queue_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the change-event channel namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the default find page size.
    #[must_use]
    pub const fn default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Sets the per-collection advisor index cap.
    #[must_use]
    pub const fn max_indexed_fields(mut self, max: usize) -> Self {
        self.max_indexed_fields = max;
        self
    }

    /// Sets whether projections force-include system fields.
    #[must_use]
    pub const fn select_includes_system_fields(mut self, value: bool) -> Self {
        self.select_includes_system_fields = value;
        self
    }

    /// Sets the event dispatch queue capacity.
    #[must_use]
    pub const fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.namespace, "docbase");
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.max_indexed_fields, 20);
        assert!(!config.select_includes_system_fields);
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .namespace("acme")
            .default_limit(10)
            .max_indexed_fields(3)
            .select_includes_system_fields(true);

        assert_eq!(config.namespace, "acme");
        assert_eq!(config.default_limit, 10);
        assert_eq!(config.max_indexed_fields, 3);
        assert!(config.select_includes_system_fields);
    }
}
