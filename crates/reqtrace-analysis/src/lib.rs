//! Offline analysis over captured traces: the request lifecycle breakdown
//! and the transfer share of the transaction workload that produced it.

pub mod breakdown;
pub mod workload;
