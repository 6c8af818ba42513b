use chrono::{DateTime, Utc};
use costkube_core::model::cost::CostedSample;

use crate::protocol::ExportEnvelope;

const CSV_HEADER: &str = "namespace,cpu_mcores,memory_bytes,hourly_cost,monthly_cost";

pub fn namespaces_csv(costs: &[CostedSample]) -> String {
    let mut out = String::with_capacity(64 * (costs.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for c in costs {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(c.namespace()),
            c.usage.cpu_mcores,
            c.usage.memory_bytes,
            c.hourly_cost,
            c.monthly_cost
        ));
    }
    out
}

pub fn namespaces_json(costs: Vec<CostedSample>, now: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportEnvelope {
        timestamp: now,
        export_type: "namespaces".to_string(),
        data: costs,
    })
}

pub fn export_filename(now: DateTime<Utc>, ext: &str) -> String {
    format!("costkube_namespaces_{}.{ext}", now.format("%Y%m%d_%H%M%S"))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use testkit::costed_namespace;

    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_namespace() {
        let csv = namespaces_csv(&[
            costed_namespace("namespace-1", 500.0, 536870912.0),
            costed_namespace("namespace-2", 2000.0, 2147483648.0),
        ]);
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "namespace-1,500,536870912,0.0175,12.78");
        assert_eq!(lines[2], "namespace-2,2000,2147483648,0.07,51.1");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_quotes_awkward_names() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn json_export_wraps_costs() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 10, 15, 0).unwrap();
        let raw = namespaces_json(vec![costed_namespace("web", 100.0, 0.0)], now).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["export_type"], "namespaces");
        assert_eq!(value["data"][0]["namespace"], "web");
        assert_eq!(value["data"][0]["cpu_mcores"], 100.0);
    }

    #[test]
    fn filename_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 10, 15, 7).unwrap();
        assert_eq!(export_filename(now, "csv"), "costkube_namespaces_20260201_101507.csv");
    }
}
