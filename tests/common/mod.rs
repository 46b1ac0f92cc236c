//! Shared test harness for the integration suites.
//!
//! - [`simulated_cluster`] - in-memory pool implementing every management plane trait

pub mod simulated_cluster;

#[allow(unused_imports)]
pub use simulated_cluster::*;
