//! Weighted statistics used for initial scores, leaves and evaluation

/// `Σ w·x / Σ w`, `None` when the weights sum to zero
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    (total > 0.0).then(|| values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total)
}

/// Lowest value whose cumulative weight reaches half the total
pub fn weighted_median(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let mut pairs: Vec<(f64, f64)> = values.iter().copied().zip(weights.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (value, weight) in &pairs {
        cumulative += weight;
        if cumulative >= half {
            return Some(*value);
        }
    }
    pairs.last().map(|(v, _)| *v)
}

/// Weighted mean absolute error
pub fn weighted_mae(predictions: &[f64], targets: &[f64], weights: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = predictions.iter().zip(targets).map(|(p, t)| (p - t).abs()).collect();
    weighted_mean(&errors, weights)
}

/// Weighted mean squared error
pub fn weighted_mse(predictions: &[f64], targets: &[f64], weights: &[f64]) -> Option<f64> {
    let errors: Vec<f64> = predictions.iter().zip(targets).map(|(p, t)| (p - t).powi(2)).collect();
    weighted_mean(&errors, weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_mean() {
        assert_eq!(weighted_mean(&[1.0, 3.0], &[3.0, 1.0]), Some(1.5));
        assert_eq!(weighted_mean(&[1.0], &[0.0]), None);
    }

    #[test]
    fn test_weighted_median() {
        assert_eq!(weighted_median(&[3.0, 1.0, 2.0], &[1.0, 1.0, 1.0]), Some(2.0));
        assert_eq!(weighted_median(&[1.0, 10.0], &[1.0, 5.0]), Some(10.0));
        assert_eq!(weighted_median(&[1.0, 10.0], &[1.0, 1.0]), Some(1.0));
        assert_eq!(weighted_median(&[], &[]), None);
    }

    #[test]
    fn test_weighted_mae() {
        let got = weighted_mae(&[1.0, 2.0], &[0.0, 0.0], &[100.0, 50.0]).unwrap();
        assert!((got - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(weighted_mse(&[2.0], &[0.0], &[1.0]), Some(4.0));
    }
}
