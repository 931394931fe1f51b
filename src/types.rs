use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Which sheet of the tracking workbook a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    RedTag,
    Air,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::RedTag => "red-tag",
            Category::Air => "air",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red-tag" | "redtag" | "red" | "红单" => Ok(Category::RedTag),
            "air" | "空运" => Ok(Category::Air),
            other => Err(ReportError::invalid_argument(
                "category",
                other,
                "one of: red-tag, air",
            )),
        }
    }
}

/// Canonical on-time status.
///
/// Source sheets use either a two-valued label (`提前/准时` vs `延期`) or a
/// three-valued one (`提前`, `准时`, `延期`). Both fold into this model; the
/// combined label becomes `OnTime`. Ordering is the display order used when a
/// report breaks groups down by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Status {
    Early,
    OnTime,
    Delayed,
    Unknown,
}

impl Status {
    /// Map a raw sheet label to a status. `None` means the cell was empty,
    /// which is different from a label we do not recognise (`Unknown`).
    pub fn from_label(raw: Option<&str>) -> Option<Status> {
        let s = raw?.trim();
        if s.is_empty() {
            return None;
        }
        let status = match s {
            "提前" => Status::Early,
            "准时" | "提前/准时" => Status::OnTime,
            "延期" | "延迟" => Status::Delayed,
            _ => match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
                "early" => Status::Early,
                "ontime" => Status::OnTime,
                "delayed" | "late" => Status::Delayed,
                _ => Status::Unknown,
            },
        };
        Some(status)
    }

    /// Early and OnTime both count towards the on-time rate.
    pub fn is_on_time(self) -> bool {
        matches!(self, Status::Early | Status::OnTime)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Early => "Early",
            Status::OnTime => "OnTime",
            Status::Delayed => "Delayed",
            Status::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses a single status for exact-match filtering. Unlike `from_label`,
/// an unrecognised word is rejected rather than read as `Unknown`.
impl FromStr for Status {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ReportError::invalid_argument("status", s, "one of: early, on-time, delayed, unknown")
        };
        match Status::from_label(Some(s)) {
            Some(Status::Unknown) if !s.trim().eq_ignore_ascii_case("unknown") => Err(invalid()),
            Some(status) => Ok(status),
            None => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StatusFilter {
    #[default]
    All,
    EarlyOrOnTime,
    Delayed,
}

impl StatusFilter {
    pub fn accepts(self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::EarlyOrOnTime => status.is_on_time(),
            StatusFilter::Delayed => status == Status::Delayed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "on-time" | "ontime" | "early-or-on-time" => Ok(StatusFilter::EarlyOrOnTime),
            "delayed" | "late" => Ok(StatusFilter::Delayed),
            other => Err(ReportError::invalid_argument(
                "status filter",
                other,
                "one of: all, on-time, delayed",
            )),
        }
    }
}

/// Secondary grouping axis next to the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    Forwarder,
    Warehouse,
}

impl Dimension {
    pub fn value_of(self, record: &ShipmentRecord) -> &str {
        match self {
            Dimension::Forwarder => &record.forwarder,
            Dimension::Warehouse => &record.warehouse,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Forwarder => "Forwarder",
            Dimension::Warehouse => "Warehouse",
        }
    }
}

impl FromStr for Dimension {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forwarder" | "货代" => Ok(Dimension::Forwarder),
            "warehouse" | "仓库" => Ok(Dimension::Warehouse),
            other => Err(ReportError::invalid_argument(
                "dimension",
                other,
                "one of: forwarder, warehouse",
            )),
        }
    }
}

/// Named numeric fields of a record, in sheet column order. A `None` value
/// is a cell that was empty or not a number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet(Vec<(String, Option<f64>)>);

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.0.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<f64>)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (S, Option<f64>)>>(iter: I) -> Self {
        MetricSet(iter.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}

pub const ABS_DEVIATION: &str = "abs_deviation";
pub const DEVIATION: &str = "deviation";

/// Fixed columns of the tracking sheet as read from the CSV. Stage duration
/// columns vary per category and are picked up by the loader separately.
#[derive(Debug, Default, Deserialize)]
pub struct RawRow {
    #[serde(rename = "FBA号", alias = "order_id", alias = "OrderId", alias = "fba")]
    pub order_id: Option<String>,
    #[serde(rename = "店铺", alias = "shop", alias = "Shop")]
    pub shop: Option<String>,
    #[serde(rename = "仓库", alias = "warehouse", alias = "Warehouse")]
    pub warehouse: Option<String>,
    #[serde(rename = "货代", alias = "forwarder", alias = "Forwarder")]
    pub forwarder: Option<String>,
    #[serde(rename = "异常备注", alias = "note", alias = "Note")]
    pub note: Option<String>,
    #[serde(
        rename = "到货年月",
        alias = "period",
        alias = "Period",
        alias = "arrival_month"
    )]
    pub period: Option<String>,
    #[serde(rename = "提前/延期", alias = "status", alias = "Status")]
    pub status: Option<String>,
    #[serde(
        rename = "预计物流时效-实际物流时效差值",
        alias = "deviation",
        alias = "Deviation"
    )]
    pub deviation: Option<String>,
    #[serde(
        rename = "预计物流时效-实际物流时效差值(绝对值)",
        alias = "预计物流时效-实际物流时效差值（绝对值）",
        alias = "abs_deviation",
        alias = "AbsDeviation"
    )]
    pub abs_deviation: Option<String>,
}

/// Header spellings accepted for the columns the loader cannot do without.
/// Kept in step with the `RawRow` renames above.
pub const PERIOD_HEADERS: &[&str] = &["到货年月", "period", "Period", "arrival_month"];
pub const STATUS_HEADERS: &[&str] = &["提前/延期", "status", "Status"];
pub const ABS_DEVIATION_HEADERS: &[&str] = &[
    "预计物流时效-实际物流时效差值(绝对值)",
    "预计物流时效-实际物流时效差值（绝对值）",
    "abs_deviation",
    "AbsDeviation",
];

/// One cleaned row of the tracking sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRecord {
    pub order_id: String,
    pub category: Category,
    pub shop: String,
    pub warehouse: String,
    pub forwarder: String,
    pub note: Option<String>,
    /// Arrival year-month, normally `YYYY-MM`.
    pub period: Option<String>,
    pub stages: MetricSet,
    /// Expected minus actual transit days; positive means early.
    pub deviation: Option<f64>,
    pub abs_deviation: Option<f64>,
    pub status: Option<Status>,
}

impl ShipmentRecord {
    /// Every numeric field of the record: the two deviation columns first,
    /// then the stage durations the sheet provided.
    pub fn metric_values(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        [
            (ABS_DEVIATION, self.abs_deviation),
            (DEVIATION, self.deviation),
        ]
        .into_iter()
        .chain(self.stages.iter())
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            ABS_DEVIATION => self.abs_deviation,
            DEVIATION => self.deviation,
            other => self.stages.get(other),
        }
    }

    pub fn period_str(&self) -> Option<&str> {
        self.period.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Dynamic-column table handed to the console preview and CSV export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SnapshotCard {
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Current")]
    #[tabled(rename = "Current")]
    pub current: String,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change")]
    pub change: String,
    #[serde(rename = "PreviousMonth")]
    #[tabled(rename = "PreviousMonth")]
    pub previous: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HistogramRow {
    #[serde(rename = "Days")]
    #[tabled(rename = "Days")]
    pub days: String,
    #[serde(rename = "Bar")]
    #[tabled(rename = "Bar")]
    pub bar: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_fold_into_canonical_model() {
        assert_eq!(Status::from_label(Some("提前/准时")), Some(Status::OnTime));
        assert_eq!(Status::from_label(Some("提前")), Some(Status::Early));
        assert_eq!(Status::from_label(Some(" 延期 ")), Some(Status::Delayed));
        assert_eq!(Status::from_label(Some("On Time")), Some(Status::OnTime));
        assert_eq!(Status::from_label(Some("late")), Some(Status::Delayed));
        assert_eq!(Status::from_label(Some("lost")), Some(Status::Unknown));
        assert_eq!(Status::from_label(Some("  ")), None);
        assert_eq!(Status::from_label(None), None);
    }

    #[test]
    fn status_filter_never_passes_unknown_except_all() {
        assert!(StatusFilter::All.accepts(Status::Unknown));
        assert!(!StatusFilter::EarlyOrOnTime.accepts(Status::Unknown));
        assert!(!StatusFilter::Delayed.accepts(Status::Unknown));
        assert!(StatusFilter::EarlyOrOnTime.accepts(Status::Early));
        assert!(!StatusFilter::EarlyOrOnTime.accepts(Status::Delayed));
    }

    #[test]
    fn unknown_enum_names_are_invalid_arguments() {
        assert!(matches!(
            "carrier".parse::<Dimension>(),
            Err(ReportError::InvalidArgument { name: "dimension", .. })
        ));
        assert!(matches!(
            "sometimes".parse::<StatusFilter>(),
            Err(ReportError::InvalidArgument { .. })
        ));
        assert_eq!("Warehouse".parse::<Dimension>().ok(), Some(Dimension::Warehouse));
    }

    #[test]
    fn single_status_parse_is_strict() {
        assert_eq!("延期".parse::<Status>().ok(), Some(Status::Delayed));
        assert_eq!("on-time".parse::<Status>().ok(), Some(Status::OnTime));
        assert_eq!("Unknown".parse::<Status>().ok(), Some(Status::Unknown));
        assert!(matches!(
            "lost".parse::<Status>(),
            Err(ReportError::InvalidArgument { name: "status", .. })
        ));
        assert!("".parse::<Status>().is_err());
    }

    #[test]
    fn metric_set_lookup_skips_missing_values() {
        let set: MetricSet = [("ship_to_pickup", Some(2.0)), ("pickup_to_port", None)]
            .into_iter()
            .collect();
        assert_eq!(set.get("ship_to_pickup"), Some(2.0));
        assert_eq!(set.get("pickup_to_port"), None);
        assert_eq!(set.get("absent"), None);
        assert_eq!(set.len(), 2);
    }
}
