//! Period-over-period aggregation of shipment records.
//!
//! `aggregate` filters a record slice, groups it by period (and optionally a
//! dimension and the status), averages every numeric field it finds, pins a
//! summary row on top and annotates each group with its change against the
//! previous period of the same series.
use crate::error::{ReportError, Result};
use crate::types::{Category, Dimension, ShipmentRecord, Status, StatusFilter};
use crate::util::{average, is_valid_period, period_key};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateQuery {
    pub period_start: String,
    pub period_end: String,
    pub status_filter: StatusFilter,
    pub dimension: Option<Dimension>,
    pub include_status_breakdown: bool,
    pub category: Option<Category>,
    pub forwarder: Option<String>,
    pub warehouse: Option<String>,
}

impl AggregateQuery {
    /// All statuses, no dimension, no breakdown, no record filters.
    pub fn new(period_start: impl Into<String>, period_end: impl Into<String>) -> Self {
        Self {
            period_start: period_start.into(),
            period_end: period_end.into(),
            status_filter: StatusFilter::All,
            dimension: None,
            include_status_breakdown: false,
            category: None,
            forwarder: None,
            warehouse: None,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_status_filter(mut self, filter: StatusFilter) -> Self {
        self.status_filter = filter;
        self
    }

    pub fn with_status_breakdown(mut self) -> Self {
        self.include_status_breakdown = true;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("period start", &self.period_start),
            ("period end", &self.period_end),
        ] {
            if !is_valid_period(value) {
                return Err(ReportError::invalid_argument(name, value.as_str(), "YYYY-MM"));
            }
        }
        Ok(())
    }

    fn matches_record_filters(&self, r: &ShipmentRecord) -> bool {
        self.category.map_or(true, |c| r.category == c)
            && self.forwarder.as_deref().map_or(true, |f| r.forwarder == f)
            && self.warehouse.as_deref().map_or(true, |w| r.warehouse == w)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub period: String,
    pub dimension: Option<String>,
    pub status: Option<Status>,
}

/// Change against the previous row of the same series. `means` lines up
/// with `Aggregation::metric_names`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodDelta {
    pub count: i64,
    pub on_time_rate: f64,
    pub means: Vec<f64>,
}

impl PeriodDelta {
    fn zero(metrics: usize) -> Self {
        Self {
            count: 0,
            on_time_rate: 0.0,
            means: vec![0.0; metrics],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.count == 0 && self.on_time_rate == 0.0 && self.means.iter().all(|d| *d == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationGroup {
    pub key: GroupKey,
    pub count: usize,
    pub on_time_rate: f64,
    pub means: Vec<f64>,
    pub delta: PeriodDelta,
}

/// Average of the group rows. `count` is the mean records per group, not
/// the total of the filtered range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub groups: usize,
    pub count: f64,
    pub on_time_rate: f64,
    pub means: Vec<f64>,
}

/// Records left out because they lack a period or a status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipReport {
    pub missing_period: usize,
    pub missing_status: usize,
}

impl SkipReport {
    pub fn total(&self) -> usize {
        self.missing_period + self.missing_status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub metric_names: Vec<String>,
    pub summary: SummaryRow,
    pub groups: Vec<AggregationGroup>,
    pub skipped: SkipReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportRow<'a> {
    Summary(&'a SummaryRow),
    Group(&'a AggregationGroup),
}

impl Aggregation {
    /// Summary first, then the groups in period order.
    pub fn rows(&self) -> Vec<ReportRow<'_>> {
        std::iter::once(ReportRow::Summary(&self.summary))
            .chain(self.groups.iter().map(ReportRow::Group))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_names.iter().position(|n| n == name)
    }
}

// BTreeMap key: integer period first so malformed periods (key 0) lead,
// then the raw period string to keep those deterministic.
type SortKey = (u32, String, Option<String>, Option<Status>);

struct Acc {
    count: usize,
    on_time: usize,
    sums: Vec<f64>,
    present: Vec<usize>,
}

impl Acc {
    fn new(metrics: usize) -> Self {
        Self {
            count: 0,
            on_time: 0,
            sums: vec![0.0; metrics],
            present: vec![0; metrics],
        }
    }

    fn on_time_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.on_time as f64 / self.count as f64
        }
    }

    // A field with no values in the group reports 0.
    fn means(&self) -> Vec<f64> {
        self.sums
            .iter()
            .zip(&self.present)
            .map(|(s, n)| if *n == 0 { 0.0 } else { s / *n as f64 })
            .collect()
    }
}

pub fn aggregate(records: &[ShipmentRecord], query: &AggregateQuery) -> Result<Aggregation> {
    query.validate()?;

    let start = period_key(&query.period_start);
    let end = period_key(&query.period_end);
    let range_is_empty = start > end;

    let mut skipped = SkipReport::default();
    let mut kept: Vec<(&ShipmentRecord, &str, Status)> = Vec::new();
    for r in records.iter().filter(|r| query.matches_record_filters(r)) {
        let Some(period) = r.period_str() else {
            skipped.missing_period += 1;
            continue;
        };
        let Some(status) = r.status else {
            skipped.missing_status += 1;
            continue;
        };
        if range_is_empty {
            continue;
        }
        // Malformed periods (key 0) are kept regardless of the bounds.
        let key = period_key(period);
        if key != 0 && (key < start || key > end) {
            continue;
        }
        if !query.status_filter.accepts(status) {
            continue;
        }
        kept.push((r, period.trim(), status));
    }

    let metric_names = discover_metrics(kept.iter().map(|(r, _, _)| *r));
    let index: HashMap<&str, usize> = metric_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut buckets: BTreeMap<SortKey, Acc> = BTreeMap::new();
    for (r, period, status) in &kept {
        let key: SortKey = (
            period_key(period),
            period.to_string(),
            query.dimension.map(|d| d.value_of(r).to_string()),
            query.include_status_breakdown.then_some(*status),
        );
        let acc = buckets
            .entry(key)
            .or_insert_with(|| Acc::new(metric_names.len()));
        acc.count += 1;
        if status.is_on_time() {
            acc.on_time += 1;
        }
        for (name, value) in r.metric_values() {
            if let (Some(v), Some(&i)) = (value, index.get(name)) {
                acc.sums[i] += v;
                acc.present[i] += 1;
            }
        }
    }

    let mut groups: Vec<AggregationGroup> = buckets
        .into_iter()
        .map(|((_, period, dimension, status), acc)| AggregationGroup {
            key: GroupKey {
                period,
                dimension,
                status,
            },
            count: acc.count,
            on_time_rate: acc.on_time_rate(),
            means: acc.means(),
            delta: PeriodDelta::zero(metric_names.len()),
        })
        .collect();

    apply_deltas(&mut groups);
    let summary = summarize(&groups, metric_names.len());

    debug!(
        input = records.len(),
        kept = kept.len(),
        groups = groups.len(),
        skipped = skipped.total(),
        "aggregated shipment records"
    );

    Ok(Aggregation {
        metric_names,
        summary,
        groups,
        skipped,
    })
}

/// Numeric field names in first-seen order across the records.
fn discover_metrics<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ShipmentRecord>,
{
    let mut names: Vec<String> = Vec::new();
    for r in records {
        for (name, _) in r.metric_values() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

// Groups arrive sorted by period, so the last row seen for a series is the
// previous period of that series.
fn apply_deltas(groups: &mut [AggregationGroup]) {
    let mut last: HashMap<(Option<String>, Option<Status>), (usize, f64, Vec<f64>)> =
        HashMap::new();
    for g in groups.iter_mut() {
        let series = (g.key.dimension.clone(), g.key.status);
        if let Some((count, rate, means)) = last.get(&series) {
            g.delta = PeriodDelta {
                count: g.count as i64 - *count as i64,
                on_time_rate: g.on_time_rate - rate,
                means: g.means.iter().zip(means).map(|(c, p)| c - p).collect(),
            };
        }
        last.insert(series, (g.count, g.on_time_rate, g.means.clone()));
    }
}

fn summarize(groups: &[AggregationGroup], metrics: usize) -> SummaryRow {
    let counts: Vec<f64> = groups.iter().map(|g| g.count as f64).collect();
    let rates: Vec<f64> = groups.iter().map(|g| g.on_time_rate).collect();
    let means = (0..metrics)
        .map(|i| average(&groups.iter().map(|g| g.means[i]).collect::<Vec<_>>()))
        .collect();
    SummaryRow {
        groups: groups.len(),
        count: average(&counts),
        on_time_rate: average(&rates),
        means,
    }
}
