//! Chronological train/test split over aggregated rows

use std::collections::BTreeSet;

use crate::derived::DerivedFrame;
use crate::errors::{CohortError, Result};

/// Train rows strictly before `cut_date_idx`, test rows from it onwards
#[derive(Debug, Clone)]
pub struct TimeSplit {
    pub train: DerivedFrame,
    pub test: DerivedFrame,
    pub cut_date_idx: i64,
}

/// Split on the distinct sorted day indices.
///
/// The cut is the day at position `floor(n * (1 - test_frac))`. With a
/// single distinct day there is no time axis and every row goes to train.
pub fn time_split(frame: &DerivedFrame, test_frac: f64) -> Result<TimeSplit> {
    if !(0.0..1.0).contains(&test_frac) {
        return Err(CohortError::InvalidParameter(format!(
            "test fraction must be in [0, 1), got {test_frac}"
        )));
    }

    let dates: Vec<i64> = frame
        .frame()
        .rows()
        .iter()
        .map(|r| r.date_idx)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    match dates.as_slice() {
        [] => Err(CohortError::NoData("no day indices to split on".to_string())),
        [only] => Ok(TimeSplit {
            train: frame.clone(),
            test: frame.filter(|_, _| false),
            cut_date_idx: *only,
        }),
        _ => {
            let position = ((dates.len() as f64) * (1.0 - test_frac)) as usize;
            let cut = dates[position.min(dates.len() - 1)];
            Ok(TimeSplit {
                train: frame.filter(|row, _| row.date_idx < cut),
                test: frame.filter(|row, _| row.date_idx >= cut),
                cut_date_idx: cut,
            })
        }
    }
}
