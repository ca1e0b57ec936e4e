//! The data model shared by the parser, translator and time-series client.

/// One measurement within a performance record. Any field but `label`/`value`
/// may be empty, which the translator treats as "omit this key".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceDatum {
    pub label: String,
    pub value: String,
    pub unit: String,
    pub warn: String,
    pub crit: String,
    pub min: String,
    pub max: String,
}

/// A single parsed line from the spool: a host/service pair, a timestamp, and
/// the performance data items that followed it on the same line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceRecord {
    pub timestamp: String,
    pub host: String,
    pub service: String,
    pub data: Vec<PerformanceDatum>,
}
