//! Hair loss Bayes math utilities.

pub mod math;

pub use math::stable::*;
pub use math::normal;
pub use math::quantile::*;
pub use math::mcmc;
pub use math::kde;
