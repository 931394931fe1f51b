use crate::error::{ReportError, Result};
use crate::types::{
    Category, MetricSet, RawRow, ShipmentRecord, Status, ABS_DEVIATION_HEADERS, PERIOD_HEADERS,
    STATUS_HEADERS,
};
use crate::util::{normalize_period, parse_f64_safe};
use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub missing_period: usize,
    pub missing_status: usize,
    pub malformed_numbers: usize,
}

// Stage columns as they appear in the tracking workbook, with the name the
// rest of the crate uses for them.
const STAGES: [(&str, &str); 8] = [
    ("发货-提取", "ship_to_pickup"),
    ("提取-到港", "pickup_to_port"),
    ("到港-签收", "port_to_signed"),
    ("签收-完成上架", "signed_to_shelved"),
    ("发货-签收", "ship_to_signed"),
    ("发货-完成上架", "ship_to_shelved"),
    ("签收-发货时间", "signed_since_ship"),
    ("上架完成-发货时间", "shelved_since_ship"),
];

static STAGE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (sheet_name, name) in STAGES {
        m.insert(sheet_name, name);
        m.insert(name, name);
    }
    m
});

/// Stage fields each sheet is expected to carry. Air shipments skip the
/// combined ship-to-signed/ship-to-shelved columns.
static CATEGORY_STAGES: Lazy<HashMap<Category, Vec<&'static str>>> = Lazy::new(|| {
    let all: Vec<&'static str> = STAGES.iter().map(|(_, n)| *n).collect();
    let air = all
        .iter()
        .copied()
        .filter(|n| !matches!(*n, "ship_to_signed" | "ship_to_shelved"))
        .collect();
    HashMap::from([(Category::RedTag, all), (Category::Air, air)])
});

pub fn stage_names(category: Category) -> &'static [&'static str] {
    CATEGORY_STAGES
        .get(&category)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn clean_header(raw: &str) -> &str {
    raw.trim().trim_start_matches('\u{feff}')
}

fn resolve_stage(raw: &str) -> Option<&'static str> {
    let h = clean_header(raw);
    STAGE_ALIASES
        .get(h)
        .or_else(|| STAGE_ALIASES.get(h.to_ascii_lowercase().as_str()))
        .copied()
}

/// Header layout of one sheet: where its stage columns sit and whether the
/// absolute deviation is provided or has to be derived.
struct SheetLayout {
    headers: StringRecord,
    stages: Vec<(usize, &'static str)>,
    has_abs_deviation: bool,
}

impl SheetLayout {
    fn from_headers(headers: &StringRecord, category: Category) -> Result<Self> {
        // Normalised copy so serde sees the bare column names.
        let headers: StringRecord = headers.iter().map(clean_header).collect();
        let has = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
        for (names, label) in [(PERIOD_HEADERS, "到货年月"), (STATUS_HEADERS, "提前/延期")] {
            if !has(names) {
                return Err(ReportError::MissingColumn {
                    column: label.to_string(),
                });
            }
        }

        let allowed = stage_names(category);
        let mut stages = Vec::new();
        for (i, h) in headers.iter().enumerate() {
            match resolve_stage(h) {
                Some(name) if allowed.contains(&name) => stages.push((i, name)),
                Some(_) => debug!(column = h, %category, "stage column not used for this category"),
                None => {}
            }
        }
        let has_abs_deviation = has(ABS_DEVIATION_HEADERS);
        Ok(Self {
            headers,
            stages,
            has_abs_deviation,
        })
    }
}

pub fn load_and_clean<P: AsRef<Path>>(
    path: P,
    category: Category,
) -> Result<(Vec<ShipmentRecord>, LoadReport)> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let out = load_from_reader(file, category)?;
    info!(
        path = %path.display(),
        %category,
        rows = out.1.total_rows,
        loaded = out.1.loaded_rows,
        "loaded shipment sheet"
    );
    Ok(out)
}

pub fn load_from_reader<R: Read>(
    reader: R,
    category: Category,
) -> Result<(Vec<ShipmentRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let layout = SheetLayout::from_headers(rdr.headers()?, category)?;

    let mut report = LoadReport::default();
    let mut records: Vec<ShipmentRecord> = Vec::new();

    for result in rdr.records() {
        report.total_rows += 1;
        let parsed = result.map_err(ReportError::from).and_then(|mut row| {
            while row.len() < layout.headers.len() {
                row.push_field("");
            }
            let raw: RawRow = row.deserialize(Some(&layout.headers))?;
            Ok((row, raw))
        });
        let (row, raw) = match parsed {
            Ok(r) => r,
            Err(e) => {
                warn!(row = report.total_rows, error = %e, "skipping unreadable row");
                report.parse_errors += 1;
                continue;
            }
        };
        let record = clean_row(raw, &row, &layout, category, &mut report);
        if record.period.is_none() {
            report.missing_period += 1;
        }
        if record.status.is_none() {
            report.missing_status += 1;
        }
        records.push(record);
    }

    report.loaded_rows = records.len();
    if report.malformed_numbers > 0 {
        warn!(
            cells = report.malformed_numbers,
            "non-numeric values in numeric columns were treated as missing"
        );
    }
    Ok((records, report))
}

fn clean_row(
    raw: RawRow,
    row: &StringRecord,
    layout: &SheetLayout,
    category: Category,
    report: &mut LoadReport,
) -> ShipmentRecord {
    let mut number = |cell: Option<&str>| -> Option<f64> {
        let v = parse_f64_safe(cell);
        if v.is_none() && cell.is_some_and(|c| !c.trim().is_empty()) {
            report.malformed_numbers += 1;
        }
        v
    };
    let present = |cell: Option<String>| cell.filter(|s| !s.trim().is_empty());
    let text = |cell: Option<String>| present(cell).unwrap_or_else(|| "Unknown".to_string());

    let deviation = number(raw.deviation.as_deref());
    let abs_deviation = if layout.has_abs_deviation {
        number(raw.abs_deviation.as_deref())
    } else {
        deviation.map(f64::abs)
    };
    let stages: MetricSet = layout
        .stages
        .iter()
        .map(|&(i, name)| (name, number(row.get(i))))
        .collect();

    ShipmentRecord {
        order_id: present(raw.order_id).unwrap_or_default(),
        category,
        shop: text(raw.shop),
        warehouse: text(raw.warehouse),
        forwarder: text(raw.forwarder),
        note: present(raw.note),
        period: normalize_period(raw.period.as_deref()),
        stages,
        deviation,
        abs_deviation,
        status: Status::from_label(raw.status.as_deref()),
    }
}
