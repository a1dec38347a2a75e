use crate::models::AlertCondition;

/// Whether `condition` holds for `current_price`.
///
/// `change_percent` is the move since the previous check; it is `None` when the
/// coin has no usable history yet, in which case percentage conditions never hold.
pub fn should_trigger(
    condition: &AlertCondition,
    current_price: f64,
    change_percent: Option<f64>,
) -> bool {
    match *condition {
        AlertCondition::PriceAbove(target) => current_price >= target,
        AlertCondition::PriceBelow(target) => current_price <= target,
        AlertCondition::PercentIncrease(target) => change_percent.is_some_and(|c| c >= target),
        AlertCondition::PercentDecrease(target) => change_percent.is_some_and(|c| c <= -target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alert_monitor::price_history::PriceSnapshot;

    fn change(previous: f64, current: f64) -> Option<f64> {
        PriceSnapshot::first(previous).next(current).percent_change()
    }

    #[test]
    fn above_is_inclusive() {
        let c = AlertCondition::PriceAbove(50_000.0);
        assert!(should_trigger(&c, 50_000.0, None));
        assert!(should_trigger(&c, 50_500.0, None));
        assert!(!should_trigger(&c, 49_999.99, None));
    }

    #[test]
    fn below_is_inclusive() {
        let c = AlertCondition::PriceBelow(1.5);
        assert!(should_trigger(&c, 1.5, None));
        assert!(should_trigger(&c, 0.9, None));
        assert!(!should_trigger(&c, 1.51, None));
    }

    #[test]
    fn price_conditions_ignore_history() {
        let c = AlertCondition::PriceAbove(10.0);
        assert!(should_trigger(&c, 11.0, Some(-50.0)));
    }

    #[test]
    fn increase_needs_a_large_enough_positive_move() {
        let moved = change(100.0, 115.0);
        assert_eq!(moved, Some(15.0));
        assert!(should_trigger(&AlertCondition::PercentIncrease(10.0), 115.0, moved));
        assert!(!should_trigger(&AlertCondition::PercentIncrease(20.0), 115.0, moved));

        // a fall never satisfies "increase", whatever its size
        let fell = change(100.0, 70.0);
        assert!(!should_trigger(&AlertCondition::PercentIncrease(10.0), 70.0, fell));
    }

    #[test]
    fn decrease_needs_a_large_enough_negative_move() {
        let moved = change(100.0, 85.0);
        assert_eq!(moved, Some(-15.0));
        assert!(should_trigger(&AlertCondition::PercentDecrease(10.0), 85.0, moved));
        assert!(!should_trigger(&AlertCondition::PercentDecrease(20.0), 85.0, moved));

        let rose = change(100.0, 130.0);
        assert!(!should_trigger(&AlertCondition::PercentDecrease(10.0), 130.0, rose));
    }

    #[test]
    fn percentage_conditions_are_false_without_history() {
        for c in [
            AlertCondition::PercentIncrease(0.0001),
            AlertCondition::PercentDecrease(0.0001),
            AlertCondition::PercentIncrease(50.0),
        ] {
            assert!(!should_trigger(&c, 100.0, None));
        }

        // first observation carries no usable change
        let first = PriceSnapshot::first(100.0).percent_change();
        assert!(!should_trigger(&AlertCondition::PercentIncrease(0.0001), 100.0, first));
    }

    #[test]
    fn zero_previous_price_gives_no_change() {
        assert_eq!(change(0.0, 10.0), None);
    }
}
