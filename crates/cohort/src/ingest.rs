//! CSV ingestion into [`CohortFrame`]
//!
//! The header decides which schema columns a frame carries. Unknown headers
//! are ignored; `date_idx`, `installs` and `cost` are mandatory. Empty cells,
//! `\N` (ClickHouse null) and non-finite numbers in optional columns are read
//! as missing values. Writing goes the other way, with missing values as
//! `\N` so ClickHouse reads them back as NULL.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::errors::{CohortError, Result};
use crate::frame::{CohortFrame, CohortRow};
use crate::schema::Column;

const NULL_MARKER: &str = "\\N";

impl CohortFrame {
    /// Read a frame from CSV with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let layout: Vec<(usize, Column)> = csv_reader
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| Column::from_name(name).map(|c| (idx, c)))
            .collect();

        let mut rows = Vec::new();
        for (record_idx, record) in csv_reader.records().enumerate() {
            let record = record?;
            let record_no = record_idx as u64 + 1;
            let mut row = CohortRow::default();
            for &(idx, column) in &layout {
                let cell = record.get(idx).unwrap_or("");
                parse_cell(&mut row, column, cell).map_err(|message| CohortError::Parse {
                    record: record_no,
                    message: format!("column {column}: {message}"),
                })?;
            }
            rows.push(row);
        }

        debug!(rows = rows.len(), columns = layout.len(), "parsed cohort csv");
        CohortFrame::new(layout.into_iter().map(|(_, c)| c), rows)
    }

    /// Read a frame from a CSV file
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Write the frame's columns in schema order under a header row
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let columns: Vec<Column> = Column::all().filter(|c| self.has(*c)).collect();
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(columns.iter().map(Column::name))?;
        for row in self.rows() {
            out.write_record(columns.iter().map(|&column| format_cell(row, column)))?;
        }
        out.flush()?;
        Ok(())
    }
}

fn format_cell(row: &CohortRow, column: Column) -> String {
    match column {
        Column::DateIdx => row.date_idx.to_string(),
        Column::Dimension(dim) => row.dimension(dim).unwrap_or(NULL_MARKER).to_string(),
        numeric => row
            .value(numeric)
            .map_or_else(|| NULL_MARKER.to_string(), |v| v.to_string()),
    }
}

fn is_null(cell: &str) -> bool {
    cell.is_empty() || cell == NULL_MARKER
}

fn parse_cell(row: &mut CohortRow, column: Column, cell: &str) -> std::result::Result<(), String> {
    match column {
        Column::DateIdx => {
            row.date_idx = parse_date_idx(cell)?;
        }
        Column::Installs => {
            row.installs = parse_volume(cell)?;
        }
        Column::Cost => {
            row.cost = parse_volume(cell)?;
        }
        Column::Cpi => {
            row.cpi = parse_optional(cell)?;
        }
        Column::Dimension(dim) => {
            let label = if is_null(cell) { None } else { Some(cell.to_string()) };
            row.set_dimension(dim, label);
        }
        Column::Metric(metric, day) => {
            row.set_metric(metric, day, parse_optional(cell)?);
        }
    }
    Ok(())
}

fn parse_date_idx(cell: &str) -> std::result::Result<i64, String> {
    if let Ok(value) = cell.parse::<i64>() {
        return Ok(value);
    }
    // Tolerate integral floats such as "17.0" written by dataframe exports
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(format!("invalid day index '{cell}'")),
    }
}

fn parse_volume(cell: &str) -> std::result::Result<f64, String> {
    if is_null(cell) {
        return Err("missing value".to_string());
    }
    let value: f64 = cell
        .parse()
        .map_err(|_| format!("invalid number '{cell}'"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("expected a non-negative finite number, got '{cell}'"));
    }
    Ok(value)
}

fn parse_optional(cell: &str) -> std::result::Result<Option<f64>, String> {
    if is_null(cell) {
        return Ok(None);
    }
    let value: f64 = cell
        .parse()
        .map_err(|_| format!("invalid number '{cell}'"))?;
    Ok(value.is_finite().then_some(value))
}
