//! Small statistics helpers shared by the indicators.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N, not N-1).
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Least-squares slope of `values` against x = 0, 1, 2, ...
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 { 0.0 } else { num / den }
}

/// The last `n` elements of `values` (all of them when shorter).
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stddev_known_values() {
        // mean 20, squared diffs 100 + 0 + 100 → variance 200/3
        let sd = population_stddev(&[10.0, 20.0, 30.0]);
        assert!((sd - (200.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn stddev_constant_is_zero() {
        assert_eq!(population_stddev(&[5.0; 8]), 0.0);
    }

    #[test]
    fn slope_of_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        assert!((slope(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn slope_short_input() {
        assert_eq!(slope(&[1.0]), 0.0);
        assert_eq!(slope(&[]), 0.0);
    }

    #[test]
    fn tail_shorter_than_n() {
        assert_eq!(tail(&[1.0, 2.0], 5), &[1.0, 2.0]);
        assert_eq!(tail(&[1.0, 2.0, 3.0], 2), &[2.0, 3.0]);
    }
}
