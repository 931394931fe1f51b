//! Command-line configuration.
use crate::engine::AggregateQuery;
use crate::reports::SourceFilter;
use crate::types::{Category, Dimension, Status, StatusFilter};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shipment_report")]
#[command(about = "On-time and delay reports for red-tag and air shipments", long_about = None)]
pub struct Cli {
    /// CSV export of the tracking sheet
    #[arg(short, long, value_name = "CSV")]
    pub data: PathBuf,

    /// Which sheet the CSV was exported from (red-tag or air)
    #[arg(short, long, default_value = "red-tag")]
    pub category: Category,

    /// Directory report files are written to
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Maximum data rows printed per table
    #[arg(long, default_value_t = 20)]
    pub preview_rows: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List arrival months present in the data, newest first
    Periods,
    /// Headline numbers for one month against the month before
    Snapshot {
        /// Arrival month (YYYY-MM); defaults to the newest month
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Month-over-month trend table
    Trend(TrendArgs),
    /// Every shipment of one month with column averages
    Detail {
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Distribution of deviation days for one month
    Histogram {
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Browse cleaned rows, optionally narrowed by month, warehouse, forwarder or status
    Records(RecordsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RecordsArgs {
    /// Arrival month (YYYY-MM); all months when omitted
    #[arg(short, long)]
    pub month: Option<String>,

    #[arg(long)]
    pub warehouse: Option<String>,

    #[arg(long)]
    pub forwarder: Option<String>,

    /// early, on-time, delayed or unknown
    #[arg(short, long)]
    pub status: Option<Status>,
}

impl RecordsArgs {
    pub fn to_filter(&self) -> SourceFilter {
        SourceFilter {
            month: self.month.clone(),
            warehouse: self.warehouse.clone(),
            forwarder: self.forwarder.clone(),
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct TrendArgs {
    /// First month of the range (YYYY-MM); defaults to two months before --to
    #[arg(long)]
    pub from: Option<String>,

    /// Last month of the range (YYYY-MM); defaults to the newest month
    #[arg(long)]
    pub to: Option<String>,

    /// all, on-time or delayed
    #[arg(short, long, default_value = "all")]
    pub status: StatusFilter,

    /// Group by forwarder or warehouse as well as month
    #[arg(long)]
    pub dimension: Option<Dimension>,

    /// One row per status within each group
    #[arg(long)]
    pub breakdown: bool,

    /// Only this forwarder
    #[arg(long)]
    pub forwarder: Option<String>,

    /// Only this warehouse
    #[arg(long)]
    pub warehouse: Option<String>,
}

impl TrendArgs {
    pub fn to_query(&self, start: String, end: String, category: Category) -> AggregateQuery {
        AggregateQuery {
            period_start: start,
            period_end: end,
            status_filter: self.status,
            dimension: self.dimension,
            include_status_breakdown: self.breakdown,
            category: Some(category),
            forwarder: self.forwarder.clone(),
            warehouse: self.warehouse.clone(),
        }
    }
}
