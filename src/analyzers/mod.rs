//! Aggregation and comparison over cycle records.
//!
//! Every function here is pure: records in, chart-ready data out. Empty input
//! produces an empty or zero-filled result and a zero baseline produces 0%,
//! so nothing in this module fails.

pub mod breakdown;
pub mod compare;
pub mod filter;
pub mod kpi;
pub mod objectives;
pub mod series;
pub mod utility;
