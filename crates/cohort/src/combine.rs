//! Row predictions → one forecast for the whole query

use crate::errors::{CohortError, Result};
use crate::schema::{Column, Feature};
use crate::select::FeatureMatrix;

/// Combine per-row predictions into a single ROAS forecast.
///
/// Predictions are clipped at zero. With a `cost` column summing to a
/// strictly positive total the result is the cost-weighted mean, matching
/// how ROAS re-aggregates in [`aggregate`](crate::aggregate::aggregate);
/// otherwise it is the plain mean of the clipped predictions.
pub fn combine(predictions: &[f64], matrix: &FeatureMatrix) -> Result<f64> {
    if predictions.is_empty() {
        return Err(CohortError::NoData("no predictions to combine".to_string()));
    }
    if predictions.len() != matrix.len() {
        return Err(CohortError::ShapeMismatch {
            predictions: predictions.len(),
            rows: matrix.len(),
        });
    }

    let clipped: Vec<f64> = predictions.iter().map(|p| p.max(0.0)).collect();

    if let Some(costs) = matrix.numeric_column(Feature::Column(Column::Cost)) {
        let costs: Vec<f64> = costs.into_iter().map(|c| c.unwrap_or(0.0)).collect();
        let total: f64 = costs.iter().sum();
        if total > 0.0 {
            let weighted: f64 = clipped.iter().zip(&costs).map(|(p, c)| p * c).sum();
            return Ok(weighted / total);
        }
    }

    Ok(clipped.iter().sum::<f64>() / clipped.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::derive;
    use crate::frame::{CohortFrame, CohortRow};
    use crate::schema::Level;
    use crate::select::{select, FeatureRow};

    fn matrix_with_costs(costs: &[f64]) -> FeatureMatrix {
        let rows = costs
            .iter()
            .enumerate()
            .map(|(i, &cost)| CohortRow {
                date_idx: i as i64,
                installs: 1.0,
                cost,
                ..Default::default()
            })
            .collect();
        let frame = CohortFrame::with_all_columns(rows);
        let (matrix, _) = select(&derive(&frame), Level::Macro).unwrap();
        matrix
    }

    #[test]
    fn test_zero_cost_row_carries_no_weight() {
        let matrix = matrix_with_costs(&[10.0, 0.0, 10.0]);
        let got = combine(&[1.0, 2.0, 3.0], &matrix).unwrap();
        assert!((got - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_costs_give_mean() {
        let matrix = matrix_with_costs(&[10.0, 10.0, 10.0]);
        let got = combine(&[1.0, 2.0, 3.0], &matrix).unwrap();
        assert!((got - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_cost_weighting() {
        let matrix = matrix_with_costs(&[30.0, 10.0]);
        let got = combine(&[1.0, 5.0], &matrix).unwrap();
        assert!((got - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_predictions_clipped() {
        let matrix = matrix_with_costs(&[10.0, 10.0]);
        let got = combine(&[-4.0, 2.0], &matrix).unwrap();
        assert!((got - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_cost_falls_back_to_mean() {
        let matrix = matrix_with_costs(&[0.0, 0.0]);
        let got = combine(&[1.0, 2.0], &matrix).unwrap();
        assert!((got - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_absent_cost_column_falls_back_to_mean() {
        let numeric = vec![Feature::Column(Column::DateIdx), Feature::Column(Column::Installs)];
        let rows = vec![
            FeatureRow { categories: vec![], numeric: vec![Some(0.0), Some(100.0)] },
            FeatureRow { categories: vec![], numeric: vec![Some(1.0), Some(1.0)] },
        ];
        let matrix = FeatureMatrix::new(vec![], numeric, rows).unwrap();
        let got = combine(&[1.0, 2.0], &matrix).unwrap();
        assert!((got - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let matrix = matrix_with_costs(&[1.0, 1.0]);
        assert!(matches!(
            combine(&[1.0], &matrix),
            Err(CohortError::ShapeMismatch { predictions: 1, rows: 2 })
        ));
        assert!(matches!(combine(&[], &matrix), Err(CohortError::NoData(_))));
    }
}
