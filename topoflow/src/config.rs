//! Compiler configuration.
//!
//! Defaults mirror the storage and compute settings the reference data
//! pipelines are deployed with: versioned buckets that are emptied and
//! destroyed on teardown, Python functions with a `main.handler` entrypoint,
//! and half-vCPU container tasks.

use crate::errors::TopologyError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Retention and teardown policy of a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPolicy {
    /// Keep every object version.
    #[serde(default = "default_true")]
    pub versioned: bool,
    /// Delete the location when the stack is torn down (otherwise retain it).
    #[serde(default = "default_true")]
    pub destroy_on_teardown: bool,
    /// Empty the location before deleting it.
    #[serde(default = "default_true")]
    pub auto_delete_objects: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self {
            versioned: true,
            destroy_on_teardown: true,
            auto_delete_objects: true,
        }
    }
}

/// Defaults for function work units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefaults {
    /// Function runtime identifier.
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Entrypoint within the work unit's code.
    #[serde(default = "default_handler")]
    pub handler: String,
}

fn default_runtime() -> String {
    "python3.9".to_string()
}

fn default_handler() -> String {
    "main.handler".to_string()
}

impl Default for FunctionDefaults {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            handler: default_handler(),
        }
    }
}

/// Defaults for container work units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefaults {
    /// CPU units (1024 = one vCPU).
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    /// Memory limit in MiB.
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    /// Number of tasks kept running.
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
}

fn default_cpu() -> u32 {
    512
}

fn default_memory_mib() -> u32 {
    2048
}

fn default_desired_count() -> u32 {
    1
}

impl Default for ContainerDefaults {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory_mib: default_memory_mib(),
            desired_count: default_desired_count(),
        }
    }
}

/// Configuration for the topology compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Policy applied to every location without an override.
    #[serde(default)]
    pub locations: LocationPolicy,
    /// Defaults for function work units.
    #[serde(default)]
    pub function: FunctionDefaults,
    /// Defaults for container work units.
    #[serde(default)]
    pub container: ContainerDefaults,
}

impl CompilerConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default location policy.
    #[must_use]
    pub fn with_location_policy(mut self, policy: LocationPolicy) -> Self {
        self.locations = policy;
        self
    }

    /// Sets the function defaults.
    #[must_use]
    pub fn with_function_defaults(
        mut self,
        runtime: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        self.function = FunctionDefaults {
            runtime: runtime.into(),
            handler: handler.into(),
        };
        self
    }

    /// Sets the container defaults.
    #[must_use]
    pub fn with_container_defaults(mut self, defaults: ContainerDefaults) -> Self {
        self.container = defaults;
        self
    }

    /// Parses and validates a configuration from JSON.
    ///
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, TopologyError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::Config`] for blank function defaults or zero
    /// container sizing.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.function.runtime.trim().is_empty() {
            return Err(TopologyError::Config("function runtime cannot be blank".into()));
        }
        if self.function.handler.trim().is_empty() {
            return Err(TopologyError::Config("function handler cannot be blank".into()));
        }
        if self.container.cpu == 0 {
            return Err(TopologyError::Config("container cpu must be positive".into()));
        }
        if self.container.memory_mib == 0 {
            return Err(TopologyError::Config("container memory must be positive".into()));
        }
        if self.container.desired_count == 0 {
            return Err(TopologyError::Config(
                "container desired count must be positive".into(),
            ));
        }
        Ok(())
    }
}
