// ============================================================================
// File: packages/porter/src/config.rs
// ----------------------------------------------------------------------------
// Configuration types for handlers, instance pools and the drain protocol
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PorterError, PorterResult};

/// Handler configuration
///
/// All durations are whole seconds on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Handler name, unique within its registry
    pub name: String,

    /// Initialize the target when the handler is registered
    pub load_on_startup: bool,

    /// Instance pool settings for single-request targets
    pub pool: PoolConfig,

    /// Teardown drain settings
    pub drain: DrainConfig,

    /// Maximum number of chained re-dispatch hops per request
    pub max_chain_depth: usize,

    /// Parameters handed to the target factory
    pub init_params: HashMap<String, String>,
}

impl HandlerConfig {
    /// Create a new handler configuration
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            load_on_startup: false,
            pool: PoolConfig::default(),
            drain: DrainConfig::default(),
            max_chain_depth: 4,
            init_params: HashMap::new(),
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> PorterResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PorterError::invalid_config(format!("Malformed handler config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set eager initialization
    pub fn with_load_on_startup(mut self, load_on_startup: bool) -> Self {
        self.load_on_startup = load_on_startup;
        self
    }

    /// Set pool settings
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set drain settings
    pub fn with_drain(mut self, drain: DrainConfig) -> Self {
        self.drain = drain;
        self
    }

    /// Set the chained re-dispatch limit
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Add an initialization parameter
    pub fn with_init_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.init_params.insert(key.into(), value.into());
        self
    }

    /// Check invariants the handler relies on
    pub fn validate(&self) -> PorterResult<()> {
        if self.name.trim().is_empty() {
            return Err(PorterError::invalid_config("Handler name cannot be empty"));
        }
        self.pool.validate()?;
        self.drain.validate()
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Instance pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances constructed when the handler initializes
    pub initial_size: usize,

    /// Idle time after which an instance is evicted
    #[serde(with = "duration_secs")]
    pub max_idle_time: Duration,
}

impl PoolConfig {
    /// Set the number of prewarmed instances
    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Set the idle eviction threshold
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    fn validate(&self) -> PorterResult<()> {
        if self.initial_size == 0 {
            return Err(PorterError::invalid_config(
                "Pool initial size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 1,
            max_idle_time: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Drain settings used by destroy and unload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Longest time teardown waits for in-flight requests
    #[serde(with = "duration_secs")]
    pub wait_bound: Duration,

    /// Interval between in-flight samples
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
}

impl DrainConfig {
    /// Set the maximum drain wait
    pub fn with_wait_bound(mut self, wait_bound: Duration) -> Self {
        self.wait_bound = wait_bound;
        self
    }

    /// Set the drain poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn validate(&self) -> PorterResult<()> {
        if self.poll_interval.is_zero() {
            return Err(PorterError::invalid_config(
                "Drain poll interval must be greater than zero",
            ));
        }
        if self.poll_interval > self.wait_bound {
            return Err(PorterError::invalid_config(format!(
                "Drain poll interval ({}s) exceeds the wait bound ({}s)",
                self.poll_interval.as_secs(),
                self.wait_bound.as_secs()
            )));
        }
        Ok(())
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            wait_bound: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
