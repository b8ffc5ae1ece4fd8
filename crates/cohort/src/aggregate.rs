//! Level aggregation with weighted reconstruction of ratio metrics
//!
//! Ratio metrics cannot be averaged directly: a plain mean gives every row
//! the same importance regardless of spend. Each ratio is therefore turned
//! back into its additive numerator before grouping:
//!
//! - `*_roas_d*` → revenue = `roas * cost`, re-divided by the group cost
//! - `rv_acpu_d*` → views = `rv_acpu * installs`, re-divided by group installs
//!
//! so the aggregated ratio is exactly `Σ r_i·w_i / Σ w_i`. A group whose
//! denominator is zero gets a missing value, never zero.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::errors::{CohortError, Result};
use crate::frame::{CohortFrame, CohortRow};
use crate::schema::{Column, Day, Dimension, Level, Metric, Weighting};

/// Grouping key. Dimensions outside the level key are always `None`;
/// a missing label inside the key forms its own group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    dims: [Option<String>; 3],
    date_idx: i64,
}

impl GroupKey {
    fn for_row(row: &CohortRow, level: Level) -> Self {
        let mut dims: [Option<String>; 3] = Default::default();
        for &dim in level.key_dimensions() {
            dims[dim.index()] = row.dimension(dim).map(str::to_string);
        }
        Self {
            dims,
            date_idx: row.date_idx,
        }
    }
}

/// Running sums for one group
#[derive(Debug, Default)]
struct GroupAccumulator {
    installs: f64,
    cost: f64,
    cpi_sum: f64,
    cpi_count: usize,
    /// Counts, reconstructed revenues or reconstructed views, per metric/day
    numerators: [[f64; 5]; 4],
    /// Rows that carried a value, per metric/day
    observed: [[u32; 5]; 4],
}

impl GroupAccumulator {
    fn add(&mut self, row: &CohortRow, metrics: &[(Metric, Day)]) {
        self.installs += row.installs;
        self.cost += row.cost;
        if let Some(cpi) = row.cpi {
            self.cpi_sum += cpi;
            self.cpi_count += 1;
        }
        for &(metric, day) in metrics {
            // Missing values add nothing; the row's weight still counts below
            let Some(value) = row.metric(metric, day) else {
                continue;
            };
            let term = match metric.weighting() {
                Weighting::Sum => value,
                Weighting::Cost => value * row.cost,
                Weighting::Installs => value * row.installs,
            };
            self.numerators[metric.index()][day.index()] += term;
            self.observed[metric.index()][day.index()] += 1;
        }
    }

    fn finish(self, key: GroupKey, metrics: &[(Metric, Day)], has_cpi: bool) -> CohortRow {
        let mut row = CohortRow {
            date_idx: key.date_idx,
            installs: self.installs,
            cost: self.cost,
            cpi: if has_cpi && self.cpi_count > 0 {
                Some(self.cpi_sum / self.cpi_count as f64)
            } else {
                None
            },
            ..Default::default()
        };
        for (dim, label) in Dimension::ALL.into_iter().zip(key.dims) {
            row.set_dimension(dim, label);
        }
        for &(metric, day) in metrics {
            let observed = self.observed[metric.index()][day.index()] > 0;
            let numerator = self.numerators[metric.index()][day.index()];
            let value = match metric.weighting() {
                // an unreported count sums to zero
                Weighting::Sum => Some(numerator),
                Weighting::Cost if observed => ratio(numerator, self.cost),
                Weighting::Installs if observed => ratio(numerator, self.installs),
                Weighting::Cost | Weighting::Installs => None,
            };
            row.set_metric(metric, day, value);
        }
        row
    }
}

/// `numerator / denominator`, missing when the denominator is exactly zero
pub(crate) fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Collapse `frame` to one row per `level` grouping key.
///
/// Installs, cost and payer counts are summed, `cpi` is averaged
/// arithmetically, ROAS and `rv_acpu` are re-derived from reconstructed
/// totals. Payer counts no row reports sum to zero; a ratio metric no row
/// of the group carries stays missing. Output rows are ordered by grouping
/// key, independent of the input order. The output frame drops dimension
/// columns outside the key.
pub fn aggregate(frame: &CohortFrame, level: Level) -> Result<CohortFrame> {
    if frame.is_empty() {
        return Err(CohortError::NoData(format!(
            "nothing to aggregate at {level} level"
        )));
    }
    for &dim in level.key_dimensions() {
        frame.require(Column::Dimension(dim))?;
    }

    let metrics: Vec<(Metric, Day)> = frame.metric_columns().collect();
    let has_cpi = frame.has(Column::Cpi);

    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    for row in frame.rows() {
        groups
            .entry(GroupKey::for_row(row, level))
            .or_default()
            .add(row, &metrics);
    }

    let rows: Vec<CohortRow> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key, &metrics, has_cpi))
        .collect();

    let columns: BTreeSet<Column> = frame
        .columns()
        .iter()
        .copied()
        .filter(|c| match c {
            Column::Dimension(dim) => level.key_dimensions().contains(dim),
            _ => true,
        })
        .collect();

    debug!(%level, input_rows = frame.len(), groups = rows.len(), "aggregated cohort rows");
    Ok(CohortFrame::from_parts(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(opt_group: &str, date_idx: i64, installs: f64, cost: f64) -> CohortRow {
        CohortRow {
            date_idx,
            opt_group_map: Some(opt_group.to_string()),
            conv_window_map: Some("cw".to_string()),
            country_map: Some("US".to_string()),
            installs,
            cost,
            cpi: Some(if installs > 0.0 { cost / installs } else { 0.0 }),
            ..Default::default()
        }
    }

    #[test]
    fn test_mid_level_cost_weighted_roas() {
        let mut a = row("og", 5, 10.0, 100.0);
        a.set_metric(Metric::IaaRoas, Day::D0, Some(0.1));
        let mut b = row("og", 5, 10.0, 50.0);
        b.set_metric(Metric::IaaRoas, Day::D0, Some(0.4));

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Mid).unwrap();
        assert_eq!(out.len(), 1);
        let got = out.rows()[0].metric(Metric::IaaRoas, Day::D0).unwrap();
        assert!((got - 0.2).abs() < 1e-12, "got {got}");
        assert_eq!(out.rows()[0].cost, 150.0);
    }

    #[test]
    fn test_rv_acpu_install_weighted() {
        let mut a = row("og", 1, 30.0, 10.0);
        a.set_metric(Metric::RvAcpu, Day::D3, Some(1.0));
        let mut b = row("og", 1, 10.0, 10.0);
        b.set_metric(Metric::RvAcpu, Day::D3, Some(3.0));

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Macro).unwrap();
        let got = out.rows()[0].metric(Metric::RvAcpu, Day::D3).unwrap();
        assert!((got - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cost_group_is_missing() {
        let mut a = row("og", 1, 10.0, 0.0);
        a.set_metric(Metric::IapRoas, Day::D7, Some(0.3));
        a.set_metric(Metric::RvAcpu, Day::D7, Some(0.5));

        let out = aggregate(&CohortFrame::with_all_columns(vec![a]), Level::Micro).unwrap();
        let agg = &out.rows()[0];
        assert_eq!(agg.metric(Metric::IapRoas, Day::D7), None);
        assert_eq!(agg.metric(Metric::RvAcpu, Day::D7), Some(0.5));
    }

    #[test]
    fn test_zero_installs_group_is_missing_rv() {
        let mut a = row("og", 1, 0.0, 10.0);
        a.set_metric(Metric::RvAcpu, Day::D0, Some(2.0));

        let out = aggregate(&CohortFrame::with_all_columns(vec![a]), Level::Macro).unwrap();
        assert_eq!(out.rows()[0].metric(Metric::RvAcpu, Day::D0), None);
    }

    #[test]
    fn test_payers_summed_and_cpi_averaged() {
        let mut a = row("og", 1, 10.0, 20.0);
        a.set_metric(Metric::Payers, Day::D1, Some(2.0));
        let mut b = row("og", 1, 30.0, 30.0);
        b.set_metric(Metric::Payers, Day::D1, Some(5.0));

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Mid).unwrap();
        let agg = &out.rows()[0];
        assert_eq!(agg.metric(Metric::Payers, Day::D1), Some(7.0));
        assert_eq!(agg.installs, 40.0);
        // (2.0 + 1.0) / 2, not 50 / 40
        assert_eq!(agg.cpi, Some(1.5));
    }

    #[test]
    fn test_unobserved_metric_stays_missing() {
        let mut a = row("og", 1, 10.0, 10.0);
        a.set_metric(Metric::IaaRoas, Day::D1, Some(0.5));
        let b = row("og", 1, 10.0, 30.0);

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Mid).unwrap();
        let agg = &out.rows()[0];
        assert_eq!(agg.metric(Metric::IaaRoas, Day::D3), None);
        assert_eq!(agg.metric(Metric::RvAcpu, Day::D3), None);
        // b has no revenue for d1 but its cost still counts
        assert_eq!(agg.metric(Metric::IaaRoas, Day::D1), Some(0.125));
    }

    #[test]
    fn test_unreported_payers_sum_to_zero() {
        use crate::schema::Feature;

        let mut a = row("og", 1, 10.0, 10.0);
        a.set_metric(Metric::IaaRoas, Day::D7, Some(0.2));
        let b = row("og", 1, 30.0, 10.0);

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Mid).unwrap();
        let agg = &out.rows()[0];
        assert_eq!(agg.metric(Metric::Payers, Day::D7), Some(0.0));

        // the payer rate stays defined, so the row survives feature selection
        let derived = crate::derived::derive(&out);
        let payer_rate = Feature::Derived(crate::schema::Derived::PayerRateD7);
        assert_eq!(derived.feature_value(0, payer_rate), Some(0.0));
    }

    #[test]
    fn test_absent_payer_column_stays_absent() {
        let columns = [Column::DateIdx, Column::Installs, Column::Cost];
        let frame = CohortFrame::new(columns, vec![row("og", 1, 10.0, 10.0)]).unwrap();
        let out = aggregate(&frame, Level::Macro).unwrap();
        assert!(!out.has(Column::Metric(Metric::Payers, Day::D7)));
    }

    #[test]
    fn test_missing_key_label_forms_own_group() {
        let a = row("og", 1, 1.0, 1.0);
        let mut b = row("og", 1, 1.0, 1.0);
        b.opt_group_map = None;

        let out = aggregate(&CohortFrame::with_all_columns(vec![a, b]), Level::Mid).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows()[0].opt_group_map, None);
        assert_eq!(out.rows()[1].opt_group_map.as_deref(), Some("og"));
    }

    #[test]
    fn test_out_of_key_dimensions_dropped() {
        let out = aggregate(
            &CohortFrame::with_all_columns(vec![row("og", 1, 1.0, 1.0)]),
            Level::Mid,
        )
        .unwrap();
        assert!(out.has(Column::Dimension(Dimension::OptGroup)));
        assert!(!out.has(Column::Dimension(Dimension::Country)));
        assert_eq!(out.rows()[0].country_map, None);
    }

    #[test]
    fn test_empty_frame_is_no_data() {
        let err = aggregate(&CohortFrame::with_all_columns(Vec::new()), Level::Macro).unwrap_err();
        assert!(matches!(err, CohortError::NoData(_)));
    }

    #[test]
    fn test_key_column_required() {
        let frame = CohortFrame::new(
            [Column::DateIdx, Column::Installs, Column::Cost],
            vec![row("og", 1, 1.0, 1.0)],
        )
        .unwrap();
        assert!(aggregate(&frame, Level::Macro).is_ok());
        let err = aggregate(&frame, Level::Mid).unwrap_err();
        assert!(matches!(err, CohortError::MissingColumn(name) if name == "opt_group_map"));
    }
}
