//! Workload characterization for Etherscan transaction exports.

use std::collections::HashMap;

use reqtrace_data::TxRecord;

/// Method label Etherscan assigns to plain value transfers.
pub const TRANSFER_METHOD: &str = "Transfer";

/// Transfer share of one exported workload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkloadStats {
    /// Rows in the export.
    pub total_rows: usize,
    /// Rows whose method is exactly [`TRANSFER_METHOD`].
    pub transfer_rows: usize,
    /// `transfer_rows / total_rows`, zero for an empty export.
    pub transfer_share: f64,
}

/// Counts plain transfers in an export.
///
/// Only rows whose method is exactly `Transfer` count; no case folding.
pub fn count_transfers(records: &[TxRecord]) -> WorkloadStats {
    let transfer_rows = records
        .iter()
        .filter(|tx| tx.method == TRANSFER_METHOD)
        .count();
    let transfer_share = if records.is_empty() {
        0.0
    } else {
        transfer_rows as f64 / records.len() as f64
    };
    WorkloadStats {
        total_rows: records.len(),
        transfer_rows,
        transfer_share,
    }
}

/// Row counts per decoded method, most frequent first, ties by name.
pub fn method_histogram(records: &[TxRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tx in records {
        *counts.entry(tx.method.as_str()).or_insert(0) += 1;
    }
    let mut histogram: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(method, count)| (method.to_string(), count))
        .collect();
    histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    histogram
}
