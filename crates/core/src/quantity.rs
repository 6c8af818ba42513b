//! Parsing of Kubernetes resource quantity strings into canonical units.
//!
//! CPU is normalized to millicores and memory to bytes. Only the suffixes
//! metrics-server actually emits are accepted: `n`, `u`, `m` for CPU and the
//! binary `Ki`..`Pi` family for memory. Anything else is a
//! [`CostError::MalformedQuantity`].

use crate::error::{CostError, Result};

const MEMORY_SUFFIXES: [(&str, i32); 5] = [("Ki", 10), ("Mi", 20), ("Gi", 30), ("Ti", 40), ("Pi", 50)];

/// Parse a CPU quantity ("250m", "1200000n", "0.5") into millicores.
pub fn normalize_cpu(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix('n') {
        return Ok(parse_prefix(value, raw)? / 1_000_000.0);
    }
    if let Some(value) = raw.strip_suffix('u') {
        return Ok(parse_prefix(value, raw)? / 1_000.0);
    }
    if let Some(value) = raw.strip_suffix('m') {
        return parse_prefix(value, raw);
    }
    Ok(parse_prefix(raw, raw)? * 1_000.0)
}

/// Parse a memory quantity ("512Mi", "1048576") into bytes.
pub fn normalize_memory(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    for (suffix, exp) in MEMORY_SUFFIXES {
        if let Some(value) = raw.strip_suffix(suffix) {
            return Ok(parse_prefix(value, raw)? * 2f64.powi(exp));
        }
    }
    parse_prefix(raw, raw)
}

fn parse_prefix(value: &str, raw: &str) -> Result<f64> {
    // f64::from_str also takes "inf" and "NaN", which no quantity may carry.
    if value.is_empty() || !value.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(CostError::MalformedQuantity(format!("{raw:?}")));
    }
    let parsed = value
        .parse::<f64>()
        .map_err(|e| CostError::MalformedQuantity(format!("{raw:?}: {e}")))?;
    if !parsed.is_finite() {
        return Err(CostError::MalformedQuantity(format!("{raw:?}: not finite")));
    }
    Ok(parsed)
}

/// Render millicores the way kubectl does: whole cores without a suffix.
pub fn format_cpu(mcores: f64) -> String {
    if mcores >= 1000.0 && (mcores % 1000.0) == 0.0 {
        format!("{}", mcores / 1000.0)
    } else {
        format!("{mcores:.0}m")
    }
}

/// Render bytes in the largest binary unit that keeps two decimals readable.
pub fn format_memory(bytes: f64) -> String {
    for (suffix, exp) in MEMORY_SUFFIXES.iter().rev() {
        let unit = 2f64.powi(*exp);
        if bytes >= unit {
            return format!("{:.2}{suffix}", bytes / unit);
        }
    }
    format!("{bytes:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_suffixes_scale_to_millicores() {
        for v in [0.0, 1.0, 7.0, 250.0, 123456789.0] {
            assert_eq!(normalize_cpu(&format!("{v}n")).unwrap(), v / 1e6);
            assert_eq!(normalize_cpu(&format!("{v}u")).unwrap(), v / 1e3);
            assert_eq!(normalize_cpu(&format!("{v}m")).unwrap(), v);
            assert_eq!(normalize_cpu(&format!("{v}")).unwrap(), v * 1000.0);
        }
    }

    #[test]
    fn cpu_accepts_decimal_cores() {
        assert_eq!(normalize_cpu("0.5").unwrap(), 500.0);
        assert_eq!(normalize_cpu("2").unwrap(), 2000.0);
        assert_eq!(normalize_cpu("1.5m").unwrap(), 1.5);
        assert_eq!(normalize_cpu(" 100m ").unwrap(), 100.0);
    }

    #[test]
    fn memory_suffixes_are_binary() {
        for v in [0.0, 1.0, 3.0, 512.0, 1.5] {
            assert_eq!(normalize_memory(&format!("{v}Ki")).unwrap(), v * 1024.0);
            assert_eq!(normalize_memory(&format!("{v}Mi")).unwrap(), v * 1048576.0);
            assert_eq!(normalize_memory(&format!("{v}Gi")).unwrap(), v * 1073741824.0);
            assert_eq!(normalize_memory(&format!("{v}Ti")).unwrap(), v * 2f64.powi(40));
            assert_eq!(normalize_memory(&format!("{v}Pi")).unwrap(), v * 2f64.powi(50));
            assert_eq!(normalize_memory(&format!("{v}")).unwrap(), v);
        }
    }

    #[test]
    fn rejects_malformed_quantities() {
        for raw in ["", "m", "abc", "12x", "--5m", "-5m", "NaN", "inf", "1.2.3Mi", "Mi", "128M"] {
            for err in [normalize_cpu(raw).unwrap_err(), normalize_memory(raw).unwrap_err()] {
                assert!(
                    matches!(err, CostError::MalformedQuantity(_)),
                    "expected malformed for {raw:?}, got {err:?}"
                );
            }
        }
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert!(normalize_cpu("100M").is_err());
        assert!(normalize_memory("1gi").is_err());
    }

    #[test]
    fn formats_for_display() {
        assert_eq!(format_cpu(2000.0), "2");
        assert_eq!(format_cpu(250.4), "250m");
        assert_eq!(format_memory(536870912.0), "512.00Mi");
        assert_eq!(format_memory(512.0), "512");
    }
}
