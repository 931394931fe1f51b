use crate::engine::{Aggregation, ReportRow};
use crate::error::{ReportError, Result};
use crate::types::{
    HistogramRow, ReportTable, ShipmentRecord, SnapshotCard, Status, ABS_DEVIATION, DEVIATION,
};
use crate::util::{
    format_delta, format_int, format_number, format_percent, is_valid_period, mean_present,
    percent_change, period_key, prev_month,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// A month chosen by the user must be a well-formed `YYYY-MM`.
pub fn require_month(month: &str) -> Result<()> {
    if is_valid_period(month) {
        Ok(())
    } else {
        Err(ReportError::invalid_argument("month", month, "YYYY-MM"))
    }
}

/// Distinct periods present in the data, newest first.
pub fn available_periods(data: &[ShipmentRecord]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut periods: Vec<String> = data
        .iter()
        .filter_map(|r| r.period_str())
        .filter(|p| seen.insert(*p))
        .map(str::to_string)
        .collect();
    periods.sort_by(|a, b| period_key(b).cmp(&period_key(a)).then_with(|| b.cmp(a)));
    periods
}

/// Default trend window: the last three valid periods, or fewer if the data
/// does not have that many.
pub fn default_range(periods_newest_first: &[String]) -> Option<(String, String)> {
    let valid: Vec<&String> = periods_newest_first
        .iter()
        .filter(|p| period_key(p) != 0)
        .collect();
    let end = valid.first()?;
    let start = valid.get(2).or(valid.last())?;
    Some(((*start).clone(), (*end).clone()))
}

/// Render an aggregation as a table: summary row first, one column per
/// metric, each followed by its delta column.
pub fn trend_table(
    agg: &Aggregation,
    dimension_label: Option<&str>,
    breakdown: bool,
) -> ReportTable {
    let mut headers = vec!["Period".to_string()];
    if let Some(label) = dimension_label {
        headers.push(label.to_string());
    }
    if breakdown {
        headers.push("Status".to_string());
    }
    for h in ["Orders", "OnTimeRate"] {
        headers.push(h.to_string());
        headers.push(format!("{h}Δ"));
    }
    for name in &agg.metric_names {
        headers.push(format!("Avg_{name}"));
        headers.push(format!("Avg_{name}Δ"));
    }

    let two = |v: f64| format_number(v, 2);
    let rows = agg
        .rows()
        .into_iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(headers.len());
            match row {
                ReportRow::Summary(s) => {
                    cells.push("Average".to_string());
                    if dimension_label.is_some() {
                        cells.push("-".to_string());
                    }
                    if breakdown {
                        cells.push("-".to_string());
                    }
                    cells.push(two(s.count));
                    cells.push(String::new());
                    cells.push(format_percent(s.on_time_rate));
                    cells.push(String::new());
                    for m in &s.means {
                        cells.push(two(*m));
                        cells.push(String::new());
                    }
                }
                ReportRow::Group(g) => {
                    cells.push(g.key.period.clone());
                    if dimension_label.is_some() {
                        cells.push(g.key.dimension.clone().unwrap_or_default());
                    }
                    if breakdown {
                        cells.push(g.key.status.map(|s| s.to_string()).unwrap_or_default());
                    }
                    cells.push(format_int(g.count));
                    cells.push(format_delta(g.delta.count as f64, |v| format!("{v:.0}")));
                    cells.push(format_percent(g.on_time_rate));
                    cells.push(format_delta(g.delta.on_time_rate, format_percent));
                    for (m, d) in g.means.iter().zip(&g.delta.means) {
                        cells.push(two(*m));
                        cells.push(format_delta(*d, two));
                    }
                }
            }
            cells
        })
        .collect();

    ReportTable { headers, rows }
}

/// One KPI compared with the previous calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricChange {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub percent: f64,
}

impl MetricChange {
    pub fn new(current: f64, previous: f64) -> Self {
        Self {
            current,
            previous,
            delta: current - previous,
            percent: percent_change(current, previous),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Mean deviation is positive: shipments land ahead of the estimate.
    Ahead,
    Behind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSnapshot {
    pub month: String,
    pub previous_month: Option<String>,
    pub orders: MetricChange,
    pub on_time: MetricChange,
    pub delayed: MetricChange,
    pub mean_abs_deviation: MetricChange,
    pub mean_deviation: MetricChange,
    pub verdict: Verdict,
}

struct MonthKpis {
    orders: f64,
    on_time: f64,
    delayed: f64,
    mean_abs_deviation: f64,
    mean_deviation: f64,
}

fn month_kpis(data: &[ShipmentRecord], month: Option<&str>) -> MonthKpis {
    let rows: Vec<&ShipmentRecord> = match month {
        Some(m) => data.iter().filter(|r| r.period_str() == Some(m)).collect(),
        None => Vec::new(),
    };
    let count_status = |pred: fn(Status) -> bool| {
        rows.iter().filter(|r| r.status.is_some_and(pred)).count() as f64
    };
    MonthKpis {
        orders: rows.len() as f64,
        on_time: count_status(Status::is_on_time),
        delayed: count_status(|s| s == Status::Delayed),
        mean_abs_deviation: mean_present(rows.iter().map(|r| r.abs_deviation)).unwrap_or(0.0),
        mean_deviation: mean_present(rows.iter().map(|r| r.deviation)).unwrap_or(0.0),
    }
}

/// Headline numbers for one month against the calendar month before it.
pub fn month_snapshot(data: &[ShipmentRecord], month: &str) -> Result<MonthSnapshot> {
    require_month(month)?;
    let previous_month = prev_month(month);
    let cur = month_kpis(data, Some(month));
    let prev = month_kpis(data, previous_month.as_deref());
    Ok(MonthSnapshot {
        month: month.to_string(),
        previous_month,
        orders: MetricChange::new(cur.orders, prev.orders),
        on_time: MetricChange::new(cur.on_time, prev.on_time),
        delayed: MetricChange::new(cur.delayed, prev.delayed),
        mean_abs_deviation: MetricChange::new(cur.mean_abs_deviation, prev.mean_abs_deviation),
        mean_deviation: MetricChange::new(cur.mean_deviation, prev.mean_deviation),
        verdict: if cur.mean_deviation > 0.0 {
            Verdict::Ahead
        } else {
            Verdict::Behind
        },
    })
}

impl Verdict {
    pub fn sentence(self) -> &'static str {
        match self {
            Verdict::Ahead => {
                "Some shipments were late, but on balance arrivals ran ahead of estimate."
            }
            Verdict::Behind => {
                "Some shipments were early, but on balance arrivals ran behind estimate."
            }
        }
    }
}

/// How each KPI moved against the previous month, one sentence per KPI,
/// closed by the verdict.
pub fn snapshot_narrative(s: &MonthSnapshot) -> String {
    let count = |v: f64| format!("{v:.0}");
    let two = |v: f64| format_number(v, 2);
    let previous = s.previous_month.as_deref().unwrap_or("the previous month");
    let line = |label: &str, c: &MetricChange, render: &dyn Fn(f64) -> String| {
        let current = render(c.current);
        let step = render(c.delta.abs());
        if c.delta > 0.0 && step != render(0.0) {
            format!("{label} rose to {current}, up {step} on {previous}.")
        } else if c.delta < 0.0 && step != render(0.0) {
            format!("{label} fell to {current}, down {step} on {previous}.")
        } else {
            format!("{label} held at {current}, unchanged on {previous}.")
        }
    };
    [
        line("Orders", &s.orders, &count),
        line("Early/on-time orders", &s.on_time, &count),
        line("Delayed orders", &s.delayed, &count),
        line("Mean absolute deviation", &s.mean_abs_deviation, &two),
        line("Mean deviation", &s.mean_deviation, &two),
        s.verdict.sentence().to_string(),
    ]
    .join("\n")
}

pub fn snapshot_cards(s: &MonthSnapshot) -> Vec<SnapshotCard> {
    let count = |v: f64| format!("{v:.0}");
    let two = |v: f64| format_number(v, 2);
    let card = |metric: &str, c: &MetricChange, render: &dyn Fn(f64) -> String| SnapshotCard {
        metric: metric.to_string(),
        current: render(c.current),
        change: match format_delta(c.delta, render) {
            d if d.is_empty() => "—".to_string(),
            d => d,
        },
        previous: render(c.previous),
    };
    vec![
        card("Orders", &s.orders, &count),
        card("Early/OnTime", &s.on_time, &count),
        card("Delayed", &s.delayed, &count),
        card("MeanAbsDeviation", &s.mean_abs_deviation, &two),
        card("MeanDeviation", &s.mean_deviation, &two),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub days: i64,
    pub count: usize,
    pub bar_len: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviationHistogram {
    /// Deviation >= 0 days, largest first.
    pub early: Vec<HistogramBucket>,
    /// Deviation < 0 days, most delayed first.
    pub delayed: Vec<HistogramBucket>,
}

pub const MAX_BAR_LEN: usize = 20;

/// Deviation counts per whole day. Halves round to the even day, so -0.5
/// and 0.5 both land on 0.
pub fn deviation_histogram(data: &[ShipmentRecord], month: &str) -> Result<DeviationHistogram> {
    require_month(month)?;
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for r in data.iter().filter(|r| r.period_str() == Some(month)) {
        if let Some(d) = r.deviation {
            *counts.entry(d.round_ties_even() as i64).or_default() += 1;
        }
    }
    let max = counts.values().copied().max().unwrap_or(0);
    let bucket = |(days, count): (&i64, &usize)| HistogramBucket {
        days: *days,
        count: *count,
        bar_len: if max == 0 { 0 } else { count * MAX_BAR_LEN / max },
    };
    Ok(DeviationHistogram {
        early: counts.range(0..).rev().map(bucket).collect(),
        delayed: counts.range(..0).map(bucket).collect(),
    })
}

pub fn histogram_rows(buckets: &[HistogramBucket]) -> Vec<HistogramRow> {
    buckets
        .iter()
        .map(|b| HistogramRow {
            days: if b.days > 0 {
                format!("+{}", b.days)
            } else {
                b.days.to_string()
            },
            bar: "█".repeat(b.bar_len),
            count: b.count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub order_id: String,
    pub shop: String,
    pub warehouse: String,
    pub forwarder: String,
    pub status: Option<Status>,
    pub values: Vec<Option<f64>>,
    /// Per value: strictly above the column average.
    pub above_average: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailListing {
    pub month: String,
    pub metric_names: Vec<String>,
    pub averages: Vec<f64>,
    pub rows: Vec<DetailRow>,
}

/// Records of one month, most delayed first, with column averages.
pub fn detail_rows(data: &[ShipmentRecord], month: &str) -> Result<DetailListing> {
    require_month(month)?;
    let mut rows: Vec<&ShipmentRecord> = data
        .iter()
        .filter(|r| r.period_str() == Some(month))
        .collect();
    rows.sort_by(|a, b| match (a.deviation, b.deviation) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let metric_names = metric_names_of(&rows);
    let averages: Vec<f64> = metric_names
        .iter()
        .map(|n| mean_present(rows.iter().map(|r| r.metric(n))).unwrap_or(0.0))
        .collect();

    let rows = rows
        .into_iter()
        .map(|r| {
            let values: Vec<Option<f64>> = metric_names.iter().map(|n| r.metric(n)).collect();
            let above_average = values
                .iter()
                .zip(&averages)
                .map(|(v, avg)| v.is_some_and(|v| v > *avg))
                .collect();
            DetailRow {
                order_id: r.order_id.clone(),
                shop: r.shop.clone(),
                warehouse: r.warehouse.clone(),
                forwarder: r.forwarder.clone(),
                status: r.status,
                values,
                above_average,
            }
        })
        .collect();

    Ok(DetailListing {
        month: month.to_string(),
        metric_names,
        averages,
        rows,
    })
}

fn metric_names_of(rows: &[&ShipmentRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for r in rows {
        for (name, _) in r.metric_values() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn format_value(v: Option<f64>) -> String {
    match v {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format_number(v, 2),
        None => String::new(),
    }
}

/// Detail listing as a table. Cells above the column average carry a `*`.
pub fn detail_table(listing: &DetailListing) -> ReportTable {
    let mut headers: Vec<String> = ["Period", "Status", "OrderId", "Shop", "Warehouse", "Forwarder"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(listing.metric_names.iter().cloned());

    let mut average_row = vec!["Average".to_string()];
    average_row.extend(std::iter::repeat("-".to_string()).take(5));
    average_row.extend(listing.averages.iter().map(|v| format_number(*v, 2)));

    let mut rows = vec![average_row];
    for r in &listing.rows {
        let mut cells = vec![
            listing.month.clone(),
            r.status.map(|s| s.to_string()).unwrap_or_default(),
            r.order_id.clone(),
            r.shop.clone(),
            r.warehouse.clone(),
            r.forwarder.clone(),
        ];
        for (v, flag) in r.values.iter().zip(&r.above_average) {
            let s = format_value(*v);
            cells.push(if *flag { format!("{s}*") } else { s });
        }
        rows.push(cells);
    }

    ReportTable { headers, rows }
}

/// Row filter for browsing the cleaned sheet. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFilter {
    pub month: Option<String>,
    pub warehouse: Option<String>,
    pub forwarder: Option<String>,
    pub status: Option<Status>,
}

impl SourceFilter {
    fn accepts(&self, r: &ShipmentRecord) -> bool {
        self.month.as_deref().map_or(true, |m| r.period_str() == Some(m))
            && self.warehouse.as_deref().map_or(true, |w| r.warehouse == w)
            && self.forwarder.as_deref().map_or(true, |f| r.forwarder == f)
            && self.status.map_or(true, |s| r.status == Some(s))
    }
}

/// Cleaned rows that passed a `SourceFilter`, in sheet order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceListing<'a> {
    pub rows: Vec<&'a ShipmentRecord>,
    pub metric_names: Vec<String>,
    /// Rows in the data before filtering.
    pub total: usize,
}

impl SourceListing<'_> {
    pub fn matched(&self) -> usize {
        self.rows.len()
    }
}

pub fn source_rows<'a>(
    data: &'a [ShipmentRecord],
    filter: &SourceFilter,
) -> Result<SourceListing<'a>> {
    if let Some(m) = &filter.month {
        require_month(m)?;
    }
    let rows: Vec<&ShipmentRecord> = data.iter().filter(|r| filter.accepts(r)).collect();
    let metric_names = metric_names_of(&rows);
    Ok(SourceListing {
        rows,
        metric_names,
        total: data.len(),
    })
}

pub fn source_table(listing: &SourceListing<'_>) -> ReportTable {
    let mut headers: Vec<String> = ["Period", "OrderId", "Shop", "Warehouse", "Forwarder", "Note"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(listing.metric_names.iter().cloned());
    headers.push("Status".to_string());

    let rows = listing
        .rows
        .iter()
        .map(|r| {
            let mut cells = vec![
                r.period.clone().unwrap_or_default(),
                r.order_id.clone(),
                r.shop.clone(),
                r.warehouse.clone(),
                r.forwarder.clone(),
                r.note.clone().unwrap_or_default(),
            ];
            cells.extend(listing.metric_names.iter().map(|n| format_value(r.metric(n))));
            cells.push(r.status.map(|s| s.to_string()).unwrap_or_default());
            cells
        })
        .collect();

    ReportTable { headers, rows }
}

/// Lookup helper used by the CLI summary line.
pub fn summary_deviation(agg: &Aggregation) -> Option<(f64, f64)> {
    let abs = agg.metric_index(ABS_DEVIATION)?;
    let dev = agg.metric_index(DEVIATION)?;
    Some((agg.summary.means[abs], agg.summary.means[dev]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{aggregate, AggregateQuery};
    use crate::types::{Category, Dimension, MetricSet};
    use pretty_assertions::assert_eq;

    fn rec(period: &str, status: Status, deviation: f64) -> ShipmentRecord {
        ShipmentRecord {
            order_id: format!("FBA-{deviation}"),
            category: Category::RedTag,
            shop: "S".into(),
            warehouse: "W".into(),
            forwarder: "F".into(),
            note: None,
            period: Some(period.into()),
            stages: MetricSet::new(),
            deviation: Some(deviation),
            abs_deviation: Some(deviation.abs()),
            status: Some(status),
        }
    }

    #[test]
    fn periods_listed_newest_first_with_default_window() {
        let data = vec![
            rec("2024-01", Status::OnTime, 1.0),
            rec("2024-03", Status::OnTime, 1.0),
            rec("2024-02", Status::OnTime, 1.0),
            rec("2023-12", Status::OnTime, 1.0),
            rec("2024-03", Status::OnTime, 1.0),
        ];
        let periods = available_periods(&data);
        assert_eq!(periods, vec!["2024-03", "2024-02", "2024-01", "2023-12"]);
        assert_eq!(
            default_range(&periods),
            Some(("2024-01".to_string(), "2024-03".to_string()))
        );
        assert_eq!(
            default_range(&["2024-05".to_string()]),
            Some(("2024-05".to_string(), "2024-05".to_string()))
        );
        assert_eq!(default_range(&[]), None);
    }

    #[test]
    fn snapshot_compares_with_previous_calendar_month() {
        let data = vec![
            rec("2023-12", Status::OnTime, 2.0),
            rec("2024-01", Status::OnTime, 3.0),
            rec("2024-01", Status::Early, 1.0),
            rec("2024-01", Status::Delayed, -2.0),
        ];
        let s = month_snapshot(&data, "2024-01").unwrap();
        assert_eq!(s.previous_month.as_deref(), Some("2023-12"));
        assert_eq!(s.orders, MetricChange::new(3.0, 1.0));
        assert_eq!(s.orders.percent, 200.0);
        assert_eq!(s.on_time.current, 2.0);
        assert_eq!(s.delayed.delta, 1.0);
        assert_eq!(s.delayed.percent, 100.0);
        assert_eq!(s.mean_abs_deviation.current, 2.0);
        assert_eq!(s.mean_deviation.current, 2.0 / 3.0);
        assert_eq!(s.verdict, Verdict::Ahead);

        let cards = snapshot_cards(&s);
        assert_eq!(cards[0].current, "3");
        assert_eq!(cards[0].change, "↑2");
        assert_eq!(cards[0].previous, "1");
    }

    #[test]
    fn snapshot_of_month_without_predecessor_data() {
        let data = vec![rec("2024-01", Status::Delayed, -1.0)];
        let s = month_snapshot(&data, "2024-01").unwrap();
        assert_eq!(s.orders.previous, 0.0);
        assert_eq!(s.verdict, Verdict::Behind);
    }

    #[test]
    fn histogram_splits_and_orders_buckets() {
        let data = vec![
            rec("2024-01", Status::OnTime, 0.2),
            rec("2024-01", Status::Early, 2.0),
            rec("2024-01", Status::Early, 2.4),
            rec("2024-01", Status::Delayed, -1.0),
            rec("2024-01", Status::Delayed, -3.0),
            rec("2024-02", Status::Delayed, -9.0),
        ];
        let h = deviation_histogram(&data, "2024-01").unwrap();
        let early: Vec<(i64, usize, usize)> =
            h.early.iter().map(|b| (b.days, b.count, b.bar_len)).collect();
        assert_eq!(early, vec![(2, 2, 20), (0, 1, 10)]);
        let delayed: Vec<i64> = h.delayed.iter().map(|b| b.days).collect();
        assert_eq!(delayed, vec![-3, -1]);

        let rows = histogram_rows(&h.early);
        assert_eq!(rows[0].days, "+2");
        assert_eq!(rows[1].days, "0");
        assert_eq!(rows[1].bar.chars().count(), 10);
    }

    #[test]
    fn histogram_rounds_half_days_to_even() {
        let data = vec![
            rec("2024-01", Status::OnTime, -0.5),
            rec("2024-01", Status::OnTime, 0.5),
            rec("2024-01", Status::Early, 2.5),
        ];
        let h = deviation_histogram(&data, "2024-01").unwrap();
        let early: Vec<(i64, usize)> = h.early.iter().map(|b| (b.days, b.count)).collect();
        assert_eq!(early, vec![(2, 1), (0, 2)]);
        assert!(h.delayed.is_empty());

        let h = deviation_histogram(
            &[rec("2024-01", Status::OnTime, -0.5), rec("2024-01", Status::Early, 2.5)],
            "2024-01",
        )
        .unwrap();
        let days: Vec<i64> = h.early.iter().map(|b| b.days).collect();
        assert_eq!(days, vec![2, 0]);
        assert!(h.delayed.is_empty());
    }

    #[test]
    fn malformed_months_are_rejected() {
        let data = vec![rec("2024-01", Status::OnTime, 1.0)];
        for bad in ["2024-1", "2024/01", "Jan 2024", "2024-13", ""] {
            assert!(matches!(
                month_snapshot(&data, bad),
                Err(ReportError::InvalidArgument { name: "month", expected: "YYYY-MM", .. })
            ));
            assert!(deviation_histogram(&data, bad).is_err());
            assert!(detail_rows(&data, bad).is_err());
        }
        let filter = SourceFilter {
            month: Some("24-01".into()),
            ..SourceFilter::default()
        };
        assert!(source_rows(&data, &filter).is_err());
    }

    #[test]
    fn snapshot_narrative_describes_each_movement() {
        let data = vec![
            rec("2023-12", Status::OnTime, 2.0),
            rec("2024-01", Status::OnTime, 3.0),
            rec("2024-01", Status::Early, 1.0),
            rec("2024-01", Status::Delayed, -2.0),
        ];
        let s = month_snapshot(&data, "2024-01").unwrap();
        let text = snapshot_narrative(&s);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Orders rose to 3, up 2 on 2023-12.",
                "Early/on-time orders rose to 2, up 1 on 2023-12.",
                "Delayed orders rose to 1, up 1 on 2023-12.",
                "Mean absolute deviation held at 2.00, unchanged on 2023-12.",
                "Mean deviation fell to 0.67, down 1.33 on 2023-12.",
                Verdict::Ahead.sentence(),
            ]
        );
    }

    #[test]
    fn source_rows_apply_every_filter_and_count_matches() {
        let mut a = rec("2024-01", Status::OnTime, 1.0);
        a.warehouse = "LAX9".into();
        a.forwarder = "Matson".into();
        a.note = Some("hold".into());
        let mut b = rec("2024-01", Status::Delayed, -2.0);
        b.warehouse = "LAX9".into();
        b.forwarder = "COSCO".into();
        let mut c = rec("2024-02", Status::Delayed, -3.5);
        c.warehouse = "ONT8".into();
        let mut d = rec("2024-02", Status::OnTime, 0.0);
        d.period = None;
        let data = vec![a, b, c, d];

        let all = source_rows(&data, &SourceFilter::default()).unwrap();
        assert_eq!((all.matched(), all.total), (4, 4));

        let filter = SourceFilter {
            month: Some("2024-01".into()),
            warehouse: Some("LAX9".into()),
            ..SourceFilter::default()
        };
        let listing = source_rows(&data, &filter).unwrap();
        assert_eq!((listing.matched(), listing.total), (2, 4));

        let filter = SourceFilter {
            status: Some(Status::Delayed),
            forwarder: Some("COSCO".into()),
            ..SourceFilter::default()
        };
        let listing = source_rows(&data, &filter).unwrap();
        assert_eq!(listing.matched(), 1);
        assert_eq!(listing.rows[0].deviation, Some(-2.0));

        let filter = SourceFilter {
            month: Some("2024-01".into()),
            forwarder: Some("Matson".into()),
            ..SourceFilter::default()
        };
        let table = source_table(&source_rows(&data, &filter).unwrap());
        assert_eq!(
            table.headers,
            vec![
                "Period", "OrderId", "Shop", "Warehouse", "Forwarder", "Note",
                "abs_deviation", "deviation", "Status"
            ]
        );
        assert_eq!(
            table.rows,
            vec![vec!["2024-01", "FBA-1", "S", "LAX9", "Matson", "hold", "1", "1", "OnTime"]]
        );

        let none = SourceFilter {
            month: Some("2030-01".into()),
            ..SourceFilter::default()
        };
        let empty = source_rows(&data, &none).unwrap();
        assert_eq!((empty.matched(), empty.total), (0, 4));
        assert!(source_table(&empty).is_empty());
    }

    #[test]
    fn detail_rows_sorted_by_deviation_with_averages() {
        let mut missing = rec("2024-01", Status::OnTime, 0.0);
        missing.deviation = None;
        missing.abs_deviation = None;
        let data = vec![
            missing,
            rec("2024-01", Status::OnTime, 4.0),
            rec("2024-01", Status::Delayed, -2.0),
        ];
        let listing = detail_rows(&data, "2024-01").unwrap();
        let devs: Vec<Option<f64>> = listing.rows.iter().map(|r| r.values[1]).collect();
        assert_eq!(devs, vec![Some(-2.0), Some(4.0), None]);
        assert_eq!(listing.averages, vec![3.0, 1.0]);
        assert_eq!(listing.rows[1].above_average, vec![true, true]);

        let table = detail_table(&listing);
        assert_eq!(table.rows[0][0], "Average");
        assert_eq!(table.rows[0][6], "3.00");
        assert_eq!(table.rows[2][7], "4*");
    }

    #[test]
    fn trend_table_pins_summary_and_renders_deltas() {
        let data = vec![
            rec("2024-01", Status::OnTime, 1.0),
            rec("2024-01", Status::Delayed, -1.0),
            rec("2024-02", Status::OnTime, 2.0),
        ];
        let q = AggregateQuery::new("2024-01", "2024-02").with_dimension(Dimension::Forwarder);
        let agg = aggregate(&data, &q).unwrap();
        let table = trend_table(&agg, Some("Forwarder"), false);
        assert_eq!(
            &table.headers[..6],
            &["Period", "Forwarder", "Orders", "OrdersΔ", "OnTimeRate", "OnTimeRateΔ"]
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][0], "Average");
        assert_eq!(table.rows[0][1], "-");
        assert_eq!(table.rows[0][2], "1.50");
        assert_eq!(table.rows[1][3], "");
        assert_eq!(table.rows[2][3], "↓1");
        assert_eq!(table.rows[2][4], "100.00%");
        assert_eq!(table.rows[2][5], "↑50.00%");
        assert_eq!(summary_deviation(&agg), Some((1.5, 1.0)));
    }
}
