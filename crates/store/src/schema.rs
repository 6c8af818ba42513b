pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS namespace_metrics (
  id BIGINT PRIMARY KEY,
  ts TIMESTAMP NOT NULL,
  namespace TEXT NOT NULL,
  cpu_mcores DOUBLE NOT NULL,
  memory_bytes DOUBLE NOT NULL,
  hourly_cost DOUBLE NOT NULL,
  monthly_cost DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS pod_metrics (
  id BIGINT PRIMARY KEY,
  ts TIMESTAMP NOT NULL,
  namespace TEXT NOT NULL,
  pod TEXT NOT NULL,
  cpu_mcores DOUBLE NOT NULL,
  memory_bytes DOUBLE NOT NULL,
  hourly_cost DOUBLE NOT NULL,
  monthly_cost DOUBLE NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS namespace_metrics_id_seq;
CREATE SEQUENCE IF NOT EXISTS pod_metrics_id_seq;

-- ART indexes serve newest-first and oldest-first range scans alike.
CREATE INDEX IF NOT EXISTS idx_namespace_metrics_ts ON namespace_metrics(ts);
CREATE INDEX IF NOT EXISTS idx_namespace_metrics_namespace ON namespace_metrics(namespace);
CREATE INDEX IF NOT EXISTS idx_pod_metrics_ts ON pod_metrics(ts);
CREATE INDEX IF NOT EXISTS idx_pod_metrics_namespace ON pod_metrics(namespace);
"#;
