//! Cohort rows and column-aware frames

use std::collections::BTreeSet;

use crate::errors::{CohortError, Result};
use crate::schema::{Column, Day, Dimension, Metric, REQUIRED_COLUMNS};

/// Values of one metric family indexed by elapsed day
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayValues([Option<f64>; 5]);

impl DayValues {
    pub fn get(&self, day: Day) -> Option<f64> {
        self.0[day.index()]
    }

    pub fn set(&mut self, day: Day, value: Option<f64>) {
        self.0[day.index()] = value;
    }
}

/// One cohort record.
///
/// At micro granularity this is a single (opt group, conversion window,
/// country, date) slice. Aggregated rows reuse the same shape; dimensions
/// outside the level key are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortRow {
    pub date_idx: i64,
    pub opt_group_map: Option<String>,
    pub conv_window_map: Option<String>,
    pub country_map: Option<String>,
    pub installs: f64,
    pub cost: f64,
    pub cpi: Option<f64>,
    pub payers: DayValues,
    pub iaa_roas: DayValues,
    pub iap_roas: DayValues,
    pub rv_acpu: DayValues,
}

impl CohortRow {
    pub fn dimension(&self, dim: Dimension) -> Option<&str> {
        match dim {
            Dimension::OptGroup => self.opt_group_map.as_deref(),
            Dimension::ConvWindow => self.conv_window_map.as_deref(),
            Dimension::Country => self.country_map.as_deref(),
        }
    }

    pub fn set_dimension(&mut self, dim: Dimension, label: Option<String>) {
        match dim {
            Dimension::OptGroup => self.opt_group_map = label,
            Dimension::ConvWindow => self.conv_window_map = label,
            Dimension::Country => self.country_map = label,
        }
    }

    fn series(&self, metric: Metric) -> &DayValues {
        match metric {
            Metric::Payers => &self.payers,
            Metric::IaaRoas => &self.iaa_roas,
            Metric::IapRoas => &self.iap_roas,
            Metric::RvAcpu => &self.rv_acpu,
        }
    }

    fn series_mut(&mut self, metric: Metric) -> &mut DayValues {
        match metric {
            Metric::Payers => &mut self.payers,
            Metric::IaaRoas => &mut self.iaa_roas,
            Metric::IapRoas => &mut self.iap_roas,
            Metric::RvAcpu => &mut self.rv_acpu,
        }
    }

    pub fn metric(&self, metric: Metric, day: Day) -> Option<f64> {
        self.series(metric).get(day)
    }

    pub fn set_metric(&mut self, metric: Metric, day: Day, value: Option<f64>) {
        self.series_mut(metric).set(day, value);
    }

    /// Numeric value of a column; `None` for missing values and dimensions
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::DateIdx => Some(self.date_idx as f64),
            Column::Installs => Some(self.installs),
            Column::Cost => Some(self.cost),
            Column::Cpi => self.cpi,
            Column::Dimension(_) => None,
            Column::Metric(metric, day) => self.metric(metric, day),
        }
    }
}

/// Rows plus the set of schema columns the rows actually carry.
///
/// Absent columns are tracked explicitly instead of being read as missing
/// values, so every downstream step intersects against the canonical schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortFrame {
    columns: BTreeSet<Column>,
    rows: Vec<CohortRow>,
}

impl CohortFrame {
    /// Build a frame over the given columns; fails if a required column is absent
    pub fn new(columns: impl IntoIterator<Item = Column>, rows: Vec<CohortRow>) -> Result<Self> {
        let columns: BTreeSet<Column> = columns.into_iter().collect();
        for required in REQUIRED_COLUMNS {
            if !columns.contains(&required) {
                return Err(CohortError::MissingColumn(required.name()));
            }
        }
        Ok(Self { columns, rows })
    }

    /// Frame carrying every schema column
    pub fn with_all_columns(rows: Vec<CohortRow>) -> Self {
        Self {
            columns: Column::all().collect(),
            rows,
        }
    }

    pub(crate) fn from_parts(columns: BTreeSet<Column>, rows: Vec<CohortRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &BTreeSet<Column> {
        &self.columns
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Fail loudly when a column the caller depends on is absent
    pub fn require(&self, column: Column) -> Result<()> {
        if self.has(column) {
            Ok(())
        } else {
            Err(CohortError::MissingColumn(column.name()))
        }
    }

    /// Present metric columns in schema order
    pub fn metric_columns(&self) -> impl Iterator<Item = (Metric, Day)> + '_ {
        self.columns.iter().filter_map(|c| match c {
            Column::Metric(metric, day) => Some((*metric, *day)),
            _ => None,
        })
    }

    pub fn rows(&self) -> &[CohortRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CohortRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep the rows matching `predicate`; the column set is unchanged
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&CohortRow) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_column_rejected() {
        let err = CohortFrame::new([Column::DateIdx, Column::Installs], Vec::new()).unwrap_err();
        assert!(matches!(err, CohortError::MissingColumn(name) if name == "cost"));
    }

    #[test]
    fn test_row_value_accessors() {
        let mut row = CohortRow {
            date_idx: 12,
            installs: 40.0,
            cost: 80.0,
            ..Default::default()
        };
        row.set_metric(Metric::IaaRoas, Day::D7, Some(0.25));
        row.set_dimension(Dimension::Country, Some("US".to_string()));

        assert_eq!(row.value(Column::DateIdx), Some(12.0));
        assert_eq!(row.value(Column::Metric(Metric::IaaRoas, Day::D7)), Some(0.25));
        assert_eq!(row.value(Column::Metric(Metric::IaaRoas, Day::D0)), None);
        assert_eq!(row.dimension(Dimension::Country), Some("US"));
        assert_eq!(row.dimension(Dimension::OptGroup), None);
    }

    #[test]
    fn test_filter_keeps_columns() {
        let frame = CohortFrame::with_all_columns(vec![
            CohortRow { date_idx: 1, ..Default::default() },
            CohortRow { date_idx: 2, ..Default::default() },
        ]);
        let filtered = frame.filter(|r| r.date_idx > 1);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.columns(), frame.columns());
    }
}
