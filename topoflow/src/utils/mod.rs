//! Utility functions shared by the compiler phases.

pub mod validation;

pub use validation::{
    validate_identifier, validate_schedule, InvalidNameError, InvalidScheduleError,
};
