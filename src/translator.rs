//! Converts parsed performance records into time-series line-protocol lines.

use crate::record::{PerformanceDatum, PerformanceRecord};
use spool_source::is_number;
use std::collections::BTreeMap;

/// Source-unit to target-unit string remap, consulted when tagging a
/// translated line. Missing keys map a unit to itself.
#[derive(Debug, Clone)]
pub struct UnitMap {
    table: BTreeMap<String, String>,
}

impl UnitMap {
    pub fn with_defaults() -> Self {
        let mut table = BTreeMap::new();
        for (source, target) in DEFAULT_UNIT_MAP {
            table.insert((*source).to_string(), (*target).to_string());
        }
        UnitMap { table }
    }

    /// Overlays `overrides` on top of the built-in defaults; entries in
    /// `overrides` win on key collision.
    pub fn merge(&mut self, overrides: &BTreeMap<String, String>) {
        for (key, value) in overrides {
            self.table.insert(key.clone(), value.clone());
        }
    }

    pub fn remap(&self, unit: &str) -> String {
        self.table.get(unit).cloned().unwrap_or_else(|| unit.to_string())
    }
}

const DEFAULT_UNIT_MAP: &[(&str, &str)] = &[
    ("%", "percent"),
    ("s", "seconds"),
    ("b", "bits"),
    ("B", "bytes"),
    ("kB", "deckbytes"),
    ("KB", "deckbytes"),
    ("KiB", "kbytes"),
    ("MB", "decmbytes"),
    ("MiB", "mbytes"),
    ("GB", "decgbytes"),
    ("GiB", "gbytes"),
    ("TB", "dectbytes"),
    ("TiB", "tbytes"),
    ("PB", "decpbytes"),
    ("PiB", "pbytes"),
];

pub struct Translator<'a> {
    measurement: String,
    unit_map: &'a UnitMap,
}

impl<'a> Translator<'a> {
    pub fn new(measurement: impl Into<String>, unit_map: &'a UnitMap) -> Self {
        Translator {
            measurement: measurement.into(),
            unit_map,
        }
    }

    /// Emits one line per performance datum in `record`, in the order the
    /// data appeared on the source line.
    pub fn translate(&self, record: &PerformanceRecord) -> Vec<String> {
        record.data.iter().map(|datum| self.translate_one(record, datum)).collect()
    }

    fn translate_one(&self, record: &PerformanceRecord, datum: &PerformanceDatum) -> String {
        let mut tags = BTreeMap::new();
        set_item(&mut tags, "host", &record.host);
        set_item(&mut tags, "service", &record.service);
        set_item(&mut tags, "label", &datum.label);
        set_item(&mut tags, "unit", &self.unit_map.remap(&datum.unit));

        let mut fields = BTreeMap::new();
        set_item(&mut fields, "value", &datum.value);
        set_item(&mut fields, "warn", &datum.warn);
        set_item(&mut fields, "crit", &datum.crit);
        set_item(&mut fields, "min", &datum.min);
        set_item(&mut fields, "max", &datum.max);

        format_line(&self.measurement, &tags, &fields, &record.timestamp)
    }
}

/// Replaces or erases `key` in `map`: an empty `value` always erases, never
/// inherits whatever the key held from a previous call.
fn set_item(map: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if value.is_empty() {
        map.remove(key);
    } else {
        map.insert(key.to_string(), value.to_string());
    }
}

fn escape_value(value: &str, quote_if_non_numeric: bool) -> String {
    if is_number(value) {
        return value.to_string();
    }
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ' ' | ',' | '=') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    if quote_if_non_numeric {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

fn format_line(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    fields: &BTreeMap<String, String>,
    timestamp: &str,
) -> String {
    let tag_str = tags
        .iter()
        .map(|(k, v)| format!("{k}={}", escape_value(v, false)))
        .collect::<Vec<_>>()
        .join(",");
    let field_str = fields
        .iter()
        .map(|(k, v)| format!("{k}={}", escape_value(v, true)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{measurement},{tag_str} {field_str} {timestamp}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: Vec<PerformanceDatum>) -> PerformanceRecord {
        PerformanceRecord {
            timestamp: "1700000000".to_string(),
            host: "hostA".to_string(),
            service: "svc1".to_string(),
            data,
        }
    }

    #[test]
    fn happy_path_line() {
        let map = UnitMap::with_defaults();
        let translator = Translator::new("perfdata", &map);
        let rec = record(vec![PerformanceDatum {
            label: "cpu".to_string(),
            value: "0.50".to_string(),
            warn: "0.8".to_string(),
            crit: "0.9".to_string(),
            min: "0".to_string(),
            max: "1".to_string(),
            unit: String::new(),
        }]);
        let lines = translator.translate(&rec);
        assert_eq!(
            lines,
            vec!["perfdata,host=hostA,label=cpu,service=svc1 crit=0.9,max=1,min=0,value=0.50,warn=0.8 1700000000"]
        );
    }

    #[test]
    fn non_numeric_value_is_quoted_and_escaped() {
        let map = UnitMap::with_defaults();
        let translator = Translator::new("perfdata", &map);
        let rec = record(vec![PerformanceDatum {
            label: "state".to_string(),
            value: "ok".to_string(),
            ..Default::default()
        }]);
        let lines = translator.translate(&rec);
        assert_eq!(lines, vec!["perfdata,host=hostA,label=state,service=svc1 value=\"ok\" 1700000000"]);
    }

    #[test]
    fn unit_remap_applied_as_tag() {
        let map = UnitMap::with_defaults();
        let translator = Translator::new("perfdata", &map);
        let rec = record(vec![PerformanceDatum {
            label: "mem".to_string(),
            value: "512".to_string(),
            unit: "MB".to_string(),
            ..Default::default()
        }]);
        let lines = translator.translate(&rec);
        assert_eq!(
            lines,
            vec!["perfdata,host=hostA,label=mem,service=svc1,unit=decmbytes value=512 1700000000"]
        );
    }

    #[test]
    fn unmapped_unit_is_emitted_unchanged() {
        let map = UnitMap::with_defaults();
        let translator = Translator::new("perfdata", &map);
        let rec = record(vec![PerformanceDatum {
            label: "custom".to_string(),
            value: "1".to_string(),
            unit: "widgets".to_string(),
            ..Default::default()
        }]);
        let lines = translator.translate(&rec);
        assert!(lines[0].contains("unit=widgets"));
    }

    quickcheck::quickcheck! {
        fn numeric_values_round_trip_unescaped(value: String) -> quickcheck::TestResult {
            if !is_number(&value) {
                return quickcheck::TestResult::discard();
            }
            let map = UnitMap::with_defaults();
            let translator = Translator::new("perfdata", &map);
            let rec = record(vec![PerformanceDatum {
                label: "x".to_string(),
                value: value.clone(),
                ..Default::default()
            }]);
            let line = &translator.translate(&rec)[0];
            quickcheck::TestResult::from_bool(line.contains(&format!("value={value} ")))
        }

        fn unmapped_unit_is_identity(unit: String) -> quickcheck::TestResult {
            let defaults = UnitMap::with_defaults();
            if unit.is_empty() || DEFAULT_UNIT_MAP.iter().any(|(k, _)| *k == unit) {
                return quickcheck::TestResult::discard();
            }
            quickcheck::TestResult::from_bool(defaults.remap(&unit) == unit)
        }
    }

    #[test]
    fn empty_threshold_fields_are_omitted_not_inherited() {
        let map = UnitMap::with_defaults();
        let translator = Translator::new("perfdata", &map);
        let rec = record(vec![
            PerformanceDatum {
                label: "a".to_string(),
                value: "1".to_string(),
                warn: "5".to_string(),
                ..Default::default()
            },
            PerformanceDatum {
                label: "b".to_string(),
                value: "2".to_string(),
                ..Default::default()
            },
        ]);
        let lines = translator.translate(&rec);
        assert!(lines[0].contains("warn=5"));
        assert!(!lines[1].contains("warn="));
    }
}
