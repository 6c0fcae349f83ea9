//! Hair Loss Bayes Core Library
//!
//! This library provides the survey analysis:
//! - Exit codes for CLI operations
//! - Configuration loading and validation
//! - CSV loading and cleaning
//! - Prior specification and Bayesian logistic regression by MCMC
//! - Diagnostics, posterior predictive checks, accuracy and model comparison
//! - Report rendering
//!
//! The binary entry point is in `main.rs`.

pub mod config;
pub mod data;
pub mod evaluate;
pub mod exit_codes;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
