//! Etherscan transaction export parsing.
//!
//! Exports are fully quoted CSV and their header names drift between
//! downloads (the value columns embed the ETH price at export time, e.g.
//! `CurrentValue @ $2489.59/Eth`). Only the `Method` column is stable and
//! only it feeds the workload analysis, so nothing else is modeled.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use eyre::{bail, Result, WrapErr};
use serde::Deserialize;
use tracing::{debug, warn};

/// One exported transaction row.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TxRecord {
    /// The decoded method label Etherscan assigned to the transaction.
    #[serde(rename = "Method")]
    pub method: String,
}

/// Parses an Etherscan export from any reader.
///
/// Rows that fail to parse are skipped, not rejected; exports sometimes end
/// with a truncated final line.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<TxRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    {
        let headers = reader
            .headers()
            .wrap_err("failed to read the CSV header row")?;
        if !headers.iter().any(|name| name == "Method") {
            bail!("transaction export has no Method column");
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, row) in reader.deserialize::<TxRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(err) => {
                debug!(line = line + 2, %err, "skipping malformed transaction row");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "ignored malformed rows in transaction export");
    }
    Ok(records)
}

/// Loads an Etherscan export from disk.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<TxRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .wrap_err_with(|| format!("failed to open transaction export {}", path.display()))?;
    read_transactions(file)
        .wrap_err_with(|| format!("failed to parse transaction export {}", path.display()))
}
