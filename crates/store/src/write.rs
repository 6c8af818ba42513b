use chrono::{DateTime, Utc};
use costkube_core::error::{CostError, Result};
use costkube_core::model::cost::CostedSample;
use costkube_core::model::record::RecordFamily;
use duckdb::{Connection, params};
use tracing::debug;

use crate::Store;

impl Store {
    /// Append one snapshot of namespace costs. Every row in the batch shares
    /// one timestamp, assigned here.
    pub fn append_namespace_records(&self, costs: &[CostedSample]) -> Result<usize> {
        self.append(RecordFamily::Namespace, costs)
    }

    /// Append one snapshot of pod costs. Every sample must name its pod.
    pub fn append_pod_records(&self, costs: &[CostedSample]) -> Result<usize> {
        if let Some(bad) = costs.iter().find(|c| c.pod().is_none()) {
            return Err(CostError::InvalidArgument(format!(
                "pod record for namespace {} has no pod name",
                bad.namespace()
            )));
        }
        self.append(RecordFamily::Pod, costs)
    }

    fn append(&self, family: RecordFamily, costs: &[CostedSample]) -> Result<usize> {
        let _gate = self.write_gate()?;
        let (mut conn, ts) = self.checkout_for_write()?;
        if costs.is_empty() {
            return Ok(0);
        }

        insert_batch(&mut conn, family, ts, costs)?;
        debug!(table = family.table(), rows = costs.len(), %ts, "appended cost records");
        Ok(costs.len())
    }
}

fn insert_batch(
    conn: &mut Connection,
    family: RecordFamily,
    ts: DateTime<Utc>,
    costs: &[CostedSample],
) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| CostError::StorageFailure(format!("begin tx failed: {e}")))?;

    {
        let sql = match family {
            RecordFamily::Namespace => {
                "INSERT INTO namespace_metrics
                 (id, ts, namespace, cpu_mcores, memory_bytes, hourly_cost, monthly_cost)
                 VALUES (nextval('namespace_metrics_id_seq'), ?, ?, ?, ?, ?, ?)"
            }
            RecordFamily::Pod => {
                "INSERT INTO pod_metrics
                 (id, ts, namespace, pod, cpu_mcores, memory_bytes, hourly_cost, monthly_cost)
                 VALUES (nextval('pod_metrics_id_seq'), ?, ?, ?, ?, ?, ?, ?)"
            }
        };
        let mut stmt = tx.prepare(sql).map_err(|e| {
            CostError::StorageFailure(format!("prepare insert {} failed: {e}", family.table()))
        })?;

        let naive = ts.naive_utc();
        for cost in costs {
            let res = match family {
                RecordFamily::Namespace => stmt.execute(params![
                    naive,
                    cost.namespace(),
                    cost.usage.cpu_mcores,
                    cost.usage.memory_bytes,
                    cost.hourly_cost,
                    cost.monthly_cost,
                ]),
                RecordFamily::Pod => stmt.execute(params![
                    naive,
                    cost.namespace(),
                    cost.pod(),
                    cost.usage.cpu_mcores,
                    cost.usage.memory_bytes,
                    cost.hourly_cost,
                    cost.monthly_cost,
                ]),
            };
            res.map_err(|e| {
                CostError::StorageFailure(format!("insert into {} failed: {e}", family.table()))
            })?;
        }
    }

    tx.commit().map_err(|e| {
        CostError::StorageFailure(format!("commit {} failed: {e}", family.table()))
    })
}
