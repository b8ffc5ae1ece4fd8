//! Point-in-time features derived from aggregated rows
//!
//! Called by both the trainer and the prediction path, always after
//! [`aggregate`](crate::aggregate::aggregate). Derived values are never
//! persisted.

use std::collections::BTreeSet;

use crate::frame::{CohortFrame, CohortRow};
use crate::schema::{Column, Day, Derived, Feature, Metric, GROWTH_EPSILON};

/// The six derived values of one row, indexed by [`Derived`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedValues([Option<f64>; 6]);

impl DerivedValues {
    pub fn get(&self, derived: Derived) -> Option<f64> {
        self.0[derived.index()]
    }

    fn compute(row: &CohortRow, available: &BTreeSet<Derived>) -> Self {
        let mut values = [None; 6];
        for &derived in available {
            values[derived.index()] = match derived {
                Derived::PayerRateD7 => payer_rate(row.metric(Metric::Payers, Day::D7), row.installs),
                Derived::IaaGrowth07 => growth(row, Metric::IaaRoas),
                Derived::IapGrowth07 => growth(row, Metric::IapRoas),
                Derived::RvGrowth07 => growth(row, Metric::RvAcpu),
                Derived::LogInstalls => Some(row.installs.ln_1p()),
                Derived::LogCost => Some(row.cost.ln_1p()),
            };
        }
        Self(values)
    }
}

/// Zero installs give a payer rate of exactly zero, unlike ROAS where a zero
/// denominator stays missing.
fn payer_rate(payers: Option<f64>, installs: f64) -> Option<f64> {
    if installs == 0.0 {
        return Some(0.0);
    }
    payers.map(|p| p / installs)
}

fn growth(row: &CohortRow, metric: Metric) -> Option<f64> {
    let d0 = row.metric(metric, Day::D0)?;
    let d7 = row.metric(metric, Day::D7)?;
    Some((d7 + GROWTH_EPSILON) / (d0 + GROWTH_EPSILON))
}

/// An aggregated frame together with its derived features
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFrame {
    frame: CohortFrame,
    values: Vec<DerivedValues>,
    available: BTreeSet<Derived>,
}

impl DerivedFrame {
    pub fn frame(&self) -> &CohortFrame {
        &self.frame
    }

    /// Derived features whose inputs are all present
    pub fn available(&self) -> &BTreeSet<Derived> {
        &self.available
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::Column(column) => self.frame.has(column),
            Feature::Derived(derived) => self.available.contains(&derived),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (&CohortRow, &DerivedValues)> {
        self.frame.rows().iter().zip(self.values.iter())
    }

    /// Value of a numeric feature for row `idx`
    pub fn feature_value(&self, idx: usize, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Column(column) => self.frame.rows()[idx].value(column),
            Feature::Derived(derived) => self.values[idx].get(derived),
        }
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Keep the rows matching `predicate`
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&CohortRow, &DerivedValues) -> bool,
    {
        let (rows, values): (Vec<CohortRow>, Vec<DerivedValues>) = self
            .rows()
            .filter(|(row, values)| predicate(row, values))
            .map(|(row, values)| (row.clone(), *values))
            .unzip();
        Self {
            frame: CohortFrame::from_parts(self.frame.columns().clone(), rows),
            values,
            available: self.available.clone(),
        }
    }
}

/// Compute the derived features of every row; `frame` is left untouched
pub fn derive(frame: &CohortFrame) -> DerivedFrame {
    let available: BTreeSet<Derived> = Derived::ALL
        .into_iter()
        .filter(|d| d.inputs().iter().all(|c: &Column| frame.has(*c)))
        .collect();
    let values = frame
        .rows()
        .iter()
        .map(|row| DerivedValues::compute(row, &available))
        .collect();
    DerivedFrame {
        frame: frame.clone(),
        values,
        available,
    }
}
