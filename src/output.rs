use crate::error::Result;
use crate::types::ReportTable;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

/// Spreadsheet export of a report table; the summary row stays first.
pub fn write_table_csv(path: &Path, table: &ReportTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = table.rows.len(), "wrote csv");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn render_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no data)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

/// Markdown rendering of a dynamic table. `max_rows` counts data rows; a
/// table with only its summary row still renders as "(no data)".
pub fn render_table(table: &ReportTable, max_rows: usize, has_summary: bool) -> String {
    let data_rows = table.rows.len() - usize::from(has_summary && !table.rows.is_empty());
    if data_rows == 0 {
        return "(no data)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    let keep = max_rows + usize::from(has_summary);
    for row in table.rows.iter().take(keep) {
        builder.push_record(row.iter().cloned());
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    rendered.to_string()
}

pub fn preview_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_rows(rows, max_rows));
}

pub fn preview_table(table: &ReportTable, max_rows: usize, has_summary: bool) {
    println!("{}", render_table(table, max_rows, has_summary));
    let data_rows = table.rows.len().saturating_sub(usize::from(has_summary));
    if data_rows > max_rows {
        println!("({} more rows not shown)", data_rows - max_rows);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistogramRow;

    fn table(rows: Vec<Vec<&str>>) -> ReportTable {
        ReportTable {
            headers: vec!["Period".into(), "Orders".into()],
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        }
    }

    #[test]
    fn summary_only_table_renders_no_data() {
        let t = table(vec![vec!["Average", "0.00"]]);
        assert_eq!(render_table(&t, 10, true), "(no data)");
        assert_eq!(render_rows::<HistogramRow>(&[], 5), "(no data)");
    }

    #[test]
    fn renders_summary_plus_limited_rows() {
        let t = table(vec![
            vec!["Average", "2.00"],
            vec!["2024-01", "1"],
            vec!["2024-02", "3"],
        ]);
        let out = render_table(&t, 1, true);
        assert!(out.contains("Average"));
        assert!(out.contains("2024-01"));
        assert!(!out.contains("2024-02"));
    }

    #[test]
    fn csv_export_keeps_summary_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.csv");
        let t = table(vec![vec!["Average", "2.00"], vec!["2024-01", "1"]]);
        write_table_csv(&path, &t).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines, vec!["Period,Orders", "Average,2.00", "2024-01,1"]);
    }
}
