//! Core math modules.

pub mod stable;
pub mod normal;
pub mod quantile;
pub mod mcmc;
pub mod kde;
