//! Row predicate pushed down to the source

use roas_cohort::{CohortRow, Dimension};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SourceError};

/// Inclusive `date_idx` range plus optional equality filters.
///
/// Empty strings are treated as "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub date_from: i64,
    pub date_to: i64,
    #[serde(default)]
    pub opt_group_map: Option<String>,
    #[serde(default)]
    pub conv_window_map: Option<String>,
    #[serde(default)]
    pub country_map: Option<String>,
}

impl RowFilter {
    pub fn new(date_from: i64, date_to: i64) -> Result<Self> {
        let filter = Self {
            date_from,
            date_to,
            opt_group_map: None,
            conv_window_map: None,
            country_map: None,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Every row in the source
    pub fn all() -> Self {
        Self {
            date_from: i64::MIN,
            date_to: i64::MAX,
            opt_group_map: None,
            conv_window_map: None,
            country_map: None,
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension, label: impl Into<String>) -> Self {
        let label = Some(label.into()).filter(|l| !l.is_empty());
        match dimension {
            Dimension::OptGroup => self.opt_group_map = label,
            Dimension::ConvWindow => self.conv_window_map = label,
            Dimension::Country => self.country_map = label,
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.date_from > self.date_to {
            return Err(SourceError::InvalidFilter(format!(
                "date_from {} is after date_to {}",
                self.date_from, self.date_to
            )));
        }
        Ok(())
    }

    /// Active equality filters in a fixed order
    pub fn dimensions(&self) -> Vec<(Dimension, &str)> {
        [
            (Dimension::OptGroup, &self.opt_group_map),
            (Dimension::Country, &self.country_map),
            (Dimension::ConvWindow, &self.conv_window_map),
        ]
        .into_iter()
        .filter_map(|(dim, label)| {
            label
                .as_deref()
                .filter(|l| !l.is_empty())
                .map(|l| (dim, l))
        })
        .collect()
    }

    pub fn matches(&self, row: &CohortRow) -> bool {
        (self.date_from..=self.date_to).contains(&row.date_idx)
            && self
                .dimensions()
                .into_iter()
                .all(|(dim, label)| row.dimension(dim) == Some(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date_idx: i64, country: Option<&str>) -> CohortRow {
        CohortRow {
            date_idx,
            country_map: country.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_inclusive_range() {
        let filter = RowFilter::new(3, 5).unwrap();
        assert!(!filter.matches(&row(2, None)));
        assert!(filter.matches(&row(3, None)));
        assert!(filter.matches(&row(5, None)));
        assert!(!filter.matches(&row(6, None)));
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(matches!(RowFilter::new(5, 3), Err(SourceError::InvalidFilter(_))));
        assert!(RowFilter::new(4, 4).is_ok());
    }

    #[test]
    fn test_equality_filters() {
        let filter = RowFilter::new(0, 10).unwrap().with_dimension(Dimension::Country, "US");
        assert!(filter.matches(&row(1, Some("US"))));
        assert!(!filter.matches(&row(1, Some("DE"))));
        assert!(!filter.matches(&row(1, None)));
    }

    #[test]
    fn test_empty_label_is_no_filter() {
        let filter = RowFilter::new(0, 10).unwrap().with_dimension(Dimension::Country, "");
        assert!(filter.dimensions().is_empty());
        assert!(filter.matches(&row(1, None)));

        let mut raw = RowFilter::new(0, 10).unwrap();
        raw.opt_group_map = Some(String::new());
        assert!(raw.dimensions().is_empty());
    }
}
