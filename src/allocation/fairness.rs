/// Gini coefficient of a workload distribution: 0 when every guard carries
/// the same load, approaching 1 as the load concentrates on one guard.
/// Empty and all-zero inputs are perfectly even.
pub fn gini(loads: &[u64]) -> f64 {
    let n = loads.len();
    let total: u64 = loads.iter().sum();
    if n == 0 || total == 0 {
        return 0.0;
    }

    let mut sorted = loads.to_vec();
    sorted.sort_unstable();

    // G = sum_i (2i - n - 1) x_i / (n * sum x), with 1-based i over ascending x.
    let weighted: i128 = sorted
        .iter()
        .enumerate()
        .map(|(i, &x)| (2 * (i as i128 + 1) - n as i128 - 1) * x as i128)
        .sum();

    weighted as f64 / (n as f64 * total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_load_is_zero() {
        assert_eq!(gini(&[3, 3, 3, 3]), 0.0);
    }

    #[test]
    fn empty_and_zero_loads_are_zero() {
        assert_eq!(gini(&[]), 0.0);
        assert_eq!(gini(&[0, 0]), 0.0);
    }

    #[test]
    fn concentrated_load_approaches_one() {
        // One of four guards does everything: (n - 1) / n.
        assert!((gini(&[0, 0, 0, 8]) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn order_does_not_matter() {
        assert_eq!(gini(&[5, 1, 3]), gini(&[1, 3, 5]));
        assert!((gini(&[1, 3, 5]) - 8.0 / 27.0).abs() < 1e-9);
    }
}
