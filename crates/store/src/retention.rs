use costkube_core::error::{CostError, Result};
use costkube_core::query::PruneSummary;
use costkube_core::time::days_before;
use duckdb::params;
use tracing::info;

use crate::Store;

impl Store {
    /// Delete rows of both families older than `now - days` in one
    /// transaction. `days == 0` clears everything stamped up to now.
    pub fn prune_older_than(&self, days: u32) -> Result<PruneSummary> {
        let _gate = self.write_gate()?;
        let cutoff = days_before(self.now()?, days).naive_utc();
        let (namespace_sql, pod_sql) = if days == 0 {
            (
                "DELETE FROM namespace_metrics WHERE ts <= ?",
                "DELETE FROM pod_metrics WHERE ts <= ?",
            )
        } else {
            (
                "DELETE FROM namespace_metrics WHERE ts < ?",
                "DELETE FROM pod_metrics WHERE ts < ?",
            )
        };
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| CostError::StorageFailure(format!("begin tx failed: {e}")))?;

        let namespace_rows = tx
            .execute(namespace_sql, params![cutoff])
            .map_err(|e| CostError::StorageFailure(format!("prune namespace rows failed: {e}")))?;
        let pod_rows = tx
            .execute(pod_sql, params![cutoff])
            .map_err(|e| CostError::StorageFailure(format!("prune pod rows failed: {e}")))?;

        tx.commit()
            .map_err(|e| CostError::StorageFailure(format!("commit prune failed: {e}")))?;

        let summary = PruneSummary {
            namespace_rows,
            pod_rows,
        };
        if summary.total() > 0 {
            info!(days, namespace_rows, pod_rows, "pruned old cost records");
        }
        Ok(summary)
    }
}
