use chrono::NaiveDateTime;
use costkube_core::error::{CostError, Result};
use costkube_core::model::record::{MetricRecord, RecordFamily};
use costkube_core::query::{CostTrends, NamespaceRanking};
use costkube_core::time::hours_before;
use duckdb::params;

use crate::Store;
use crate::db::naive_to_utc;

impl Store {
    /// Namespace rows at or after `now - since_hours`, oldest first.
    pub fn query_namespace_history(
        &self,
        namespace: Option<&str>,
        since_hours: u32,
    ) -> Result<Vec<MetricRecord>> {
        self.fetch_history(RecordFamily::Namespace, namespace, since_hours)
    }

    pub fn query_pod_history(
        &self,
        namespace: Option<&str>,
        since_hours: u32,
    ) -> Result<Vec<MetricRecord>> {
        self.fetch_history(RecordFamily::Pod, namespace, since_hours)
    }

    /// Hour buckets over namespace rows. Hours with no rows are absent.
    pub fn query_cost_trends(&self, since_hours: u32) -> Result<CostTrends> {
        let cutoff = hours_before(self.now()?, since_hours).naive_utc();
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date_trunc('hour', ts) AS bucket,
                        SUM(hourly_cost), SUM(cpu_mcores), SUM(memory_bytes)
                 FROM namespace_metrics
                 WHERE ts >= ?
                 GROUP BY bucket
                 ORDER BY bucket ASC",
            )
            .map_err(|e| CostError::StorageFailure(format!("prepare trends failed: {e}")))?;

        let rows = stmt
            .query_map(params![cutoff], |row| {
                Ok((
                    row.get::<_, NaiveDateTime>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .map_err(|e| CostError::StorageFailure(format!("trends query failed: {e}")))?;

        let mut trends = CostTrends::default();
        for row in rows {
            let (bucket, cost, cpu, memory) =
                row.map_err(|e| CostError::StorageFailure(format!("trends row failed: {e}")))?;
            trends.timestamps.push(naive_to_utc(bucket));
            trends.costs.push(cost);
            trends.cpu.push(cpu);
            trends.memory.push(memory);
        }
        Ok(trends)
    }

    /// Per-namespace means over the window, most expensive first. Equal
    /// averages keep the namespace that was recorded first ahead.
    pub fn query_top_namespaces(
        &self,
        limit: usize,
        since_hours: u32,
    ) -> Result<Vec<NamespaceRanking>> {
        let cutoff = hours_before(self.now()?, since_hours).naive_utc();
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT namespace,
                        AVG(hourly_cost), AVG(monthly_cost),
                        AVG(cpu_mcores), AVG(memory_bytes),
                        MIN(id) AS first_id
                 FROM namespace_metrics
                 WHERE ts >= ?
                 GROUP BY namespace
                 ORDER BY AVG(monthly_cost) DESC, first_id ASC",
            )
            .map_err(|e| CostError::StorageFailure(format!("prepare top namespaces failed: {e}")))?;

        let rows = stmt
            .query_map(params![cutoff], |row| {
                Ok(NamespaceRanking {
                    namespace: row.get(0)?,
                    avg_hourly_cost: row.get(1)?,
                    avg_monthly_cost: row.get(2)?,
                    avg_cpu: row.get(3)?,
                    avg_memory: row.get(4)?,
                })
            })
            .map_err(|e| CostError::StorageFailure(format!("top namespaces query failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| {
                CostError::StorageFailure(format!("top namespaces row failed: {e}"))
            })?);
        }
        out.truncate(limit);
        Ok(out)
    }

    fn fetch_history(
        &self,
        family: RecordFamily,
        namespace: Option<&str>,
        since_hours: u32,
    ) -> Result<Vec<MetricRecord>> {
        let cutoff = hours_before(self.now()?, since_hours).naive_utc();
        let conn = self.conn()?;

        let pod_column = match family {
            RecordFamily::Namespace => "NULL::VARCHAR AS pod",
            RecordFamily::Pod => "pod",
        };
        let filter = if namespace.is_some() {
            "AND namespace = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, ts, namespace, {pod_column}, cpu_mcores, memory_bytes, hourly_cost, monthly_cost
             FROM {}
             WHERE ts >= ? {filter}
             ORDER BY ts ASC, id ASC",
            family.table()
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| CostError::StorageFailure(format!("prepare history failed: {e}")))?;
        let rows = match namespace {
            Some(ns) => stmt.query_map(params![cutoff, ns], read_record),
            None => stmt.query_map(params![cutoff], read_record),
        }
        .map_err(|e| CostError::StorageFailure(format!("history query failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| CostError::StorageFailure(format!("history row failed: {e}")))?);
        }
        Ok(out)
    }
}

fn read_record(row: &duckdb::Row<'_>) -> duckdb::Result<MetricRecord> {
    Ok(MetricRecord {
        id: row.get(0)?,
        timestamp: naive_to_utc(row.get::<_, NaiveDateTime>(1)?),
        namespace: row.get(2)?,
        pod: row.get(3)?,
        cpu_mcores: row.get(4)?,
        memory_bytes: row.get(5)?,
        hourly_cost: row.get(6)?,
        monthly_cost: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use testkit::{ManualClock, costed_namespace, costed_pod};

    use super::*;

    fn ready_store(clock: Arc<ManualClock>) -> Store {
        let store = Store::open_in_memory().unwrap().with_clock(clock);
        store.initialize().unwrap();
        store
    }

    #[test]
    fn history_filters_by_namespace_and_window() {
        let clock = Arc::new(ManualClock::default());
        let store = ready_store(clock.clone());

        store
            .append_namespace_records(&[
                costed_namespace("web", 100.0, 0.0),
                costed_namespace("db", 200.0, 0.0),
            ])
            .unwrap();
        clock.advance(Duration::hours(3));
        store
            .append_namespace_records(&[costed_namespace("web", 150.0, 0.0)])
            .unwrap();

        let web = store.query_namespace_history(Some("web"), 24).unwrap();
        assert_eq!(web.iter().map(|r| r.cpu_mcores).collect::<Vec<_>>(), vec![100.0, 150.0]);

        let recent = store.query_namespace_history(None, 2).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].namespace, "web");

        assert!(store.query_namespace_history(Some("missing"), 24).unwrap().is_empty());
    }

    #[test]
    fn trends_bucket_by_hour() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 1, 10, 15, 0).unwrap()));
        let store = ready_store(clock.clone());

        store
            .append_namespace_records(&[
                costed_namespace("web", 500.0, 536870912.0),
                costed_namespace("db", 2000.0, 2147483648.0),
            ])
            .unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 2, 1, 10, 45, 0).unwrap());
        store
            .append_namespace_records(&[costed_namespace("web", 500.0, 536870912.0)])
            .unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 2, 1, 11, 5, 0).unwrap());
        store
            .append_namespace_records(&[costed_namespace("web", 1000.0, 0.0)])
            .unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 2, 1, 11, 30, 0).unwrap());

        let trends = store.query_cost_trends(24).unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(
            trends.timestamps,
            vec![
                Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 2, 1, 11, 0, 0).unwrap(),
            ]
        );
        assert!((trends.costs[0] - (0.0175 + 0.07 + 0.0175)).abs() < 1e-9);
        assert_eq!(trends.cpu[0], 3000.0);
        assert_eq!(trends.cpu[1], 1000.0);
        assert_eq!(trends.memory[1], 0.0);
    }

    #[test]
    fn trends_are_empty_without_rows() {
        let store = ready_store(Arc::new(ManualClock::default()));
        assert!(store.query_cost_trends(168).unwrap().is_empty());
    }

    #[test]
    fn top_namespaces_rank_by_average_monthly_cost() {
        let store = ready_store(Arc::new(ManualClock::default()));
        store
            .append_namespace_records(&[
                costed_namespace("namespace-1", 500.0, 536870912.0),
                costed_namespace("namespace-2", 2000.0, 2147483648.0),
            ])
            .unwrap();

        let top = store.query_top_namespaces(10, 24).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].namespace, "namespace-2");
        assert_eq!(top[0].avg_monthly_cost, 51.1);
        assert_eq!(top[1].avg_monthly_cost, 12.78);

        let top = store.query_top_namespaces(1, 24).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].namespace, "namespace-2");
    }

    #[test]
    fn top_namespace_ties_keep_first_seen_order() {
        let store = ready_store(Arc::new(ManualClock::default()));
        store
            .append_namespace_records(&[
                costed_namespace("zeta", 100.0, 0.0),
                costed_namespace("alpha", 100.0, 0.0),
            ])
            .unwrap();

        let names = store
            .query_top_namespaces(10, 24)
            .unwrap()
            .into_iter()
            .map(|r| r.namespace)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn oversized_windows_cover_all_rows() {
        let store = ready_store(Arc::new(ManualClock::default()));
        store
            .append_namespace_records(&[costed_namespace("web", 100.0, 0.0)])
            .unwrap();
        store
            .append_pod_records(&[costed_pod("web", "web-1", 100.0, 0.0)])
            .unwrap();

        assert_eq!(store.query_namespace_history(None, u32::MAX).unwrap().len(), 1);
        assert_eq!(store.query_pod_history(Some("web"), u32::MAX).unwrap().len(), 1);
        assert_eq!(store.query_cost_trends(u32::MAX).unwrap().len(), 1);
        assert_eq!(store.query_top_namespaces(10, u32::MAX).unwrap().len(), 1);
    }
}
