/// Rescale the per-port actions so their sum stays within [-1, 1].
///
/// The station capacity is shared proportionally: when the actions ask for
/// more than the whole station (sum above 1, or below -1 when discharging),
/// every action is divided by the magnitude of the sum, which keeps the
/// port-to-port ratios intact. Otherwise the actions are returned as is.
pub(crate) fn normalize_actions(actions: &[f64]) -> Vec<f64> {
    let total: f64 = actions.iter().sum();
    if total > 1.0 {
        actions.iter().map(|a| a / total).collect()
    } else if total < -1.0 {
        actions.iter().map(|a| a / -total).collect()
    } else {
        actions.to_vec()
    }
}

/// Round to 5 decimal places, which absorbs the noise left by the division.
pub(crate) fn round_action(action: f64) -> f64 {
    (action * 1e5).round() / 1e5
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_charging_surplus_sums_to_one() {
        let actions = [0.6, 0.6];
        let normalized = normalize_actions(&actions);
        assert_abs_diff_eq!(normalized[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(normalized[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ratios_are_preserved() {
        let actions = [1.0, 0.5, 0.25, 0.0];
        let normalized = normalize_actions(&actions);

        assert_abs_diff_eq!(normalized.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalized[0] / normalized[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalized[1] / normalized[2], 2.0, epsilon = 1e-12);
        assert_eq!(normalized[3], 0.0);
    }

    #[test]
    fn test_discharging_surplus_sums_to_minus_one() {
        let actions = [-0.9, -0.3, -0.6];
        let normalized = normalize_actions(&actions);

        assert_abs_diff_eq!(normalized.iter().sum::<f64>(), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalized[0] / normalized[1], 3.0, epsilon = 1e-12);
        assert!(normalized.iter().all(|a| *a < 0.0));
    }

    #[test]
    fn test_within_bounds_is_untouched() {
        let actions = [0.3, -0.2, 0.5];
        assert_eq!(normalize_actions(&actions), actions.to_vec());

        // Mixed signs are judged on their net sum only
        let mixed = [0.9, 0.9, -0.9];
        assert_eq!(normalize_actions(&mixed), mixed.to_vec());
    }

    #[test]
    fn test_round_action() {
        assert_eq!(round_action(1.0 / 3.0), 0.33333);
        assert_eq!(round_action(-0.123456), -0.12346);
        assert_eq!(round_action(0.999999999), 1.0);
        assert!(round_action(f64::NAN).is_nan());
    }
}
