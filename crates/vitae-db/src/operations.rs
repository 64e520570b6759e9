//! Document store operations.

pub mod documents;
pub mod eligibility;
pub mod failures;
pub mod results;
pub mod stats;
