pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// `round(100 * part / whole)` with halves rounded up; 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;

    ((200 * part + whole) / (2 * whole)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[15., 7., 55., 12., 4.]), Some(18.6));
    }

    #[test]
    fn test_mean_single_value() {
        assert_eq!(mean(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(2, 2), 100);
        assert_eq!(percent(0, 5), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
    }

    #[test]
    fn test_percent_rounds_halves_up() {
        // 1/8 = 12.5%, 3/8 = 37.5%
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(3, 8), 38);
    }

    #[test]
    fn test_percent_zero_total() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(3, 0), 0);
    }

    #[test]
    fn test_percent_matches_float_rounding() {
        for whole in 1..=60usize {
            for part in 0..=whole {
                let expected = (100.0 * part as f64 / whole as f64).round() as u8;
                assert_eq!(percent(part, whole), expected, "{part}/{whole}");
            }
        }
    }
}
