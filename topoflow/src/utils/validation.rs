//! Validation utilities for pipeline descriptions.
//!
//! Identifier checks for stage and location names, and schedule expression
//! checks for the recurring trigger.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[allow(clippy::expect_used)]
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid regex"));

#[allow(clippy::expect_used)]
static CRON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cron\(([^()]*)\)$").expect("valid regex"));

#[allow(clippy::expect_used)]
static CRON_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z*?/,\-#]+$").expect("valid regex"));

#[allow(clippy::expect_used)]
static RATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^rate\((\d+) (minute|minutes|hour|hours|day|days)\)$").expect("valid regex")
});

const CRON_FIELD_COUNT: usize = 6;

/// Error indicating an invalid stage or location identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} identifier '{value}'")]
pub struct InvalidNameError {
    /// What was being named ("stage", "location").
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Error indicating an unparseable schedule expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid schedule expression '{expression}': {reason}")]
pub struct InvalidScheduleError {
    /// The rejected expression.
    pub expression: String,
    /// Why it was rejected.
    pub reason: String,
}

impl InvalidScheduleError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validates a stage or location identifier.
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), InvalidNameError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(InvalidNameError {
            kind,
            value: value.to_string(),
        })
    }
}

/// Validates a schedule expression.
///
/// Accepts `cron(min hour day-of-month month day-of-week year)` and
/// `rate(<n> <unit>)`, where the unit is singular exactly when `n` is 1.
pub fn validate_schedule(expression: &str) -> Result<(), InvalidScheduleError> {
    let expression = expression.trim();

    if let Some(caps) = CRON.captures(expression) {
        let fields: Vec<&str> = caps[1].split_whitespace().collect();
        if fields.len() != CRON_FIELD_COUNT {
            return Err(InvalidScheduleError::new(
                expression,
                format!("expected {CRON_FIELD_COUNT} cron fields, found {}", fields.len()),
            ));
        }
        if let Some(bad) = fields.iter().find(|f| !CRON_FIELD.is_match(f)) {
            return Err(InvalidScheduleError::new(
                expression,
                format!("malformed cron field '{bad}'"),
            ));
        }
        // Day-of-month and day-of-week cannot both be specified.
        if fields[2] != "?" && fields[4] != "?" {
            return Err(InvalidScheduleError::new(
                expression,
                "one of day-of-month or day-of-week must be '?'",
            ));
        }
        return Ok(());
    }

    if let Some(caps) = RATE.captures(expression) {
        let value: u64 = caps[1]
            .parse()
            .map_err(|_| InvalidScheduleError::new(expression, "rate value out of range"))?;
        let unit = &caps[2];
        if value == 0 {
            return Err(InvalidScheduleError::new(expression, "rate value must be positive"));
        }
        let singular = !unit.ends_with('s');
        if singular != (value == 1) {
            return Err(InvalidScheduleError::new(
                expression,
                "use a singular unit for 1 and a plural unit otherwise",
            ));
        }
        return Ok(());
    }

    Err(InvalidScheduleError::new(
        expression,
        "expected cron(...) or rate(...)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier("stage", "fetch_data").is_ok());
        assert!(validate_identifier("location", "raw-bucket.v2").is_ok());
        assert!(validate_identifier("stage", "0_fetch").is_ok());

        assert!(validate_identifier("stage", "").is_err());
        assert!(validate_identifier("stage", "-leading").is_err());
        assert!(validate_identifier("location", "has space").is_err());

        let err = validate_identifier("location", "a/b").unwrap_err();
        assert_eq!(err.to_string(), "Invalid location identifier 'a/b'");
    }

    #[test]
    fn test_cron_expressions() {
        assert!(validate_schedule("cron(0/15 * * * ? *)").is_ok());
        assert!(validate_schedule("cron(* * * * ? *)").is_ok());
        assert!(validate_schedule("cron(0 12 ? * MON-FRI *)").is_ok());

        assert!(validate_schedule("cron(* * * *)").is_err());
        assert!(validate_schedule("cron(0 12 * * * *)").is_err());
        assert!(validate_schedule("cron(0 12 $ * ? *)").is_err());
    }

    #[test]
    fn test_rate_expressions() {
        assert!(validate_schedule("rate(1 minute)").is_ok());
        assert!(validate_schedule("rate(15 minutes)").is_ok());
        assert!(validate_schedule("rate(2 days)").is_ok());

        assert!(validate_schedule("rate(0 minutes)").is_err());
        assert!(validate_schedule("rate(1 minutes)").is_err());
        assert!(validate_schedule("rate(5 hour)").is_err());
        assert!(validate_schedule("rate(5 weeks)").is_err());
    }

    #[test]
    fn test_unknown_schedule_format() {
        let err = validate_schedule("every 5 minutes").unwrap_err();
        assert!(err.reason.contains("cron"));
    }
}
