/// Arithmetic mean, `None` for no samples.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation, `None` for no samples.
pub fn std_dev(samples: &[f64]) -> Option<f64> {
    let centre = mean(samples)?;
    let variance = samples
        .iter()
        .map(|s| (s - centre).powi(2))
        .sum::<f64>()
        / samples.len() as f64;
    Some(variance.sqrt())
}

/// `part` as a percentage of `whole`; 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_response_times() {
        assert_eq!(mean(&[1.5, 2.5, 3.5]), Some(2.5));
        assert_eq!(mean(&[4.0]), Some(4.0));
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
        assert_eq!(std_dev(&[3.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_std_dev_uneven_samples() {
        let result = std_dev(&[0.8, 1.2, 4.0]).unwrap();
        assert!((result - 1.4236104336041748).abs() < 1e-9);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(3, 4), 75.0);
        assert_eq!(percentage(0, 5), 0.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
