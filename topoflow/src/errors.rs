//! Error types for the topoflow compiler.
//!
//! Every error is detected at build time and is fatal to the build. Each one
//! carries the offending stage and location identifiers plus a
//! [`ContractErrorInfo`] so callers can point the author at the exact place
//! in the pipeline description that needs fixing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Contract code: pipeline name is empty.
pub const CODE_EMPTY_NAME: &str = "TOPO-001-NAME";
/// Contract code: pipeline has no stages.
pub const CODE_NO_STAGES: &str = "TOPO-001-EMPTY";
/// Contract code: malformed stage or location identifier.
pub const CODE_BAD_IDENTIFIER: &str = "TOPO-001-IDENT";
/// Contract code: duplicate stage identifier.
pub const CODE_DUPLICATE_STAGE: &str = "TOPO-001-DUPLICATE";
/// Contract code: predecessor or successor names an undeclared stage.
pub const CODE_DANGLING_LINK: &str = "TOPO-001-DANGLING";
/// Contract code: too many sources or sinks without branching.
pub const CODE_ENDPOINTS: &str = "TOPO-001-ENDPOINTS";
/// Contract code: policy override for a location no stage references.
pub const CODE_DEAD_LOCATION: &str = "TOPO-001-DEAD_LOCATION";
/// Contract code: unparseable schedule expression.
pub const CODE_SCHEDULE: &str = "TOPO-001-SCHEDULE";
/// Contract code: two stages write the same location.
pub const CODE_WRITE_CONFLICT: &str = "TOPO-002-WRITE_CONFLICT";
/// Contract code: stage links form a cycle.
pub const CODE_CYCLE: &str = "TOPO-003-CYCLE";
/// Contract code: invalid compiler configuration.
pub const CODE_CONFIG: &str = "TOPO-004-CONFIG";

/// The main error type for topology builds.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The pipeline description failed graph validation.
    #[error("{0}")]
    GraphValidation(#[from] GraphValidationError),

    /// Two stages declared write access to the same location.
    #[error("{0}")]
    WriteConflict(#[from] WriteConflictError),

    /// The stage links do not form a DAG.
    #[error("{0}")]
    CyclicGraph(#[from] CyclicGraphError),

    /// The compiler configuration is invalid.
    #[error("Invalid compiler configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TopologyError {
    /// Returns the contract error code, when the error has one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Config(_) => Some(CODE_CONFIG),
            _ => self.error_info().map(|info| info.code.as_str()),
        }
    }

    /// Returns the contract details of a build-phase error.
    #[must_use]
    pub fn error_info(&self) -> Option<&ContractErrorInfo> {
        match self {
            Self::GraphValidation(err) => Some(&err.error_info),
            Self::WriteConflict(err) => Some(&err.error_info),
            Self::CyclicGraph(err) => Some(&err.error_info),
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) => None,
        }
    }

    /// Converts to a JSON representation suitable for event payloads.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "message": self.to_string(),
        });
        if let Some(code) = self.code() {
            value["code"] = serde_json::json!(code);
        }
        if let Some(hint) = self.error_info().and_then(|info| info.fix_hint.as_deref()) {
            value["fixHint"] = serde_json::json!(hint);
        }
        match self {
            Self::GraphValidation(err) => {
                value["stages"] = serde_json::json!(err.stages);
                value["locations"] = serde_json::json!(err.locations);
            }
            Self::WriteConflict(err) => {
                value["locations"] = serde_json::json!([err.location]);
                value["stages"] = serde_json::json!(err.writers);
            }
            Self::CyclicGraph(err) => {
                value["stages"] = serde_json::json!(err.cycle_path);
            }
            _ => {}
        }
        value
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "TOPO-003-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the pipeline description fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GraphValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// The locations involved in the error.
    pub locations: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl GraphValidationError {
    /// Creates a new validation error under the given contract code.
    #[must_use]
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut info = ContractErrorInfo::new(code, message.clone());
        if let Some(hint) = ContractSuggestions::get(code) {
            info = info.with_fix_hint(hint);
        }
        Self {
            message,
            stages: Vec::new(),
            locations: Vec::new(),
            error_info: info,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the locations involved.
    #[must_use]
    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations;
        self
    }

    /// Returns the contract code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.error_info.code
    }
}

/// Error raised when more than one stage writes the same location.
#[derive(Debug, Clone, Error)]
#[error("Write conflict on location '{location}': written by {}", writers.join(", "))]
pub struct WriteConflictError {
    /// The contested location.
    pub location: String,
    /// Every stage that declared the location as its output, in declaration order.
    pub writers: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl WriteConflictError {
    /// Creates a new write conflict error.
    #[must_use]
    pub fn new(location: impl Into<String>, writers: Vec<String>) -> Self {
        let location = location.into();
        let info = ContractErrorInfo::new(
            CODE_WRITE_CONFLICT,
            format!("Location '{location}' has more than one producer"),
        )
        .with_fix_hint(ContractSuggestions::get(CODE_WRITE_CONFLICT).unwrap_or_default())
        .with_context_entry("location", location.clone());

        Self {
            location,
            writers,
            error_info: info,
        }
    }
}

/// Error raised when a cycle is detected among stage links.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CyclicGraphError {
    /// The path of stages forming the cycle, first stage repeated at the end.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CyclicGraphError {
    /// Creates a new cycle error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            CODE_CYCLE,
            format!("Pipeline contains a link cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint(ContractSuggestions::get(CODE_CYCLE).unwrap_or_default());

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// Provides default suggestions for contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            CODE_EMPTY_NAME => Some("Give the pipeline a non-blank name."),
            CODE_NO_STAGES => Some("Add at least one stage to the pipeline before building."),
            CODE_BAD_IDENTIFIER => Some(
                "Identifiers must start with a letter or digit and contain only \
                 letters, digits, '_', '-' or '.'.",
            ),
            CODE_DUPLICATE_STAGE => Some("Rename one of the stages so every stage id is unique."),
            CODE_DANGLING_LINK => Some(
                "Ensure every predecessor and successor names a stage declared in the \
                 pipeline. Check for typos in stage ids.",
            ),
            CODE_ENDPOINTS => Some(
                "A linear pipeline has one stage without input and one without output. \
                 Set `branching: true` if the extra endpoints are intentional.",
            ),
            CODE_DEAD_LOCATION => Some(
                "Remove the policy override or reference the location from a stage.",
            ),
            CODE_SCHEDULE => Some(
                "Use `cron(min hour day-of-month month day-of-week year)` or \
                 `rate(<n> <minute|minutes|hour|hours|day|days>)`.",
            ),
            CODE_WRITE_CONFLICT => Some(
                "Each storage tier has exactly one producer. Give one of the writers \
                 its own output location.",
            ),
            CODE_CYCLE => Some(
                "Pipelines do not loop back. Remove one of the links in the cycle.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_validation_error_picks_up_suggestion() {
        let err = GraphValidationError::new(CODE_DUPLICATE_STAGE, "Duplicate stage 'fetch'")
            .with_stages(vec!["fetch".to_string()]);

        assert_eq!(err.code(), CODE_DUPLICATE_STAGE);
        assert!(err.error_info.fix_hint.is_some());
        assert_eq!(err.to_string(), "Duplicate stage 'fetch'");
    }

    #[test]
    fn test_write_conflict_names_location() {
        let err = WriteConflictError::new(
            "staging",
            vec!["transform".to_string(), "enrich".to_string()],
        );

        let message = err.to_string();
        assert!(message.contains("'staging'"));
        assert!(message.contains("transform, enrich"));
        assert_eq!(err.error_info.context.get("location"), Some(&"staging".to_string()));
    }

    #[test]
    fn test_cycle_error_path() {
        let err = CyclicGraphError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, CODE_CYCLE);
    }

    #[test]
    fn test_topology_error_json() {
        let err: TopologyError =
            WriteConflictError::new("staging", vec!["a".to_string(), "b".to_string()]).into();

        let json = err.to_json();
        assert_eq!(json["code"], CODE_WRITE_CONFLICT);
        assert_eq!(json["locations"][0], "staging");
        assert_eq!(json["stages"][1], "b");
        assert!(json["fixHint"].is_string());

        let config = TopologyError::Config("cpu".into());
        assert_eq!(config.code(), Some(CODE_CONFIG));
        assert!(config.error_info().is_none());
    }

    #[test]
    fn test_contract_suggestions() {
        assert!(ContractSuggestions::get(CODE_CYCLE).is_some());
        assert!(ContractSuggestions::get("UNKNOWN").is_none());
    }
}
