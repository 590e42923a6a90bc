// src/utils/precision.rs
use rust_decimal::Decimal;

/// Rounds a quantity DOWN to a multiple of the symbol's LOT_SIZE step.
/// amount=0.0019, step=0.001 -> 0.001
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    ((amount / step_size).floor() * step_size).normalize()
}

/// Rounds a price to the NEAREST multiple of the PRICE_FILTER tick.
/// price=100.16, tick=0.1 -> 100.2
pub fn normalize_price(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    ((price / tick_size).round() * tick_size).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantity_is_floored_to_step() {
        assert_eq!(normalize_quantity(dec!(0.0019), dec!(0.001)), dec!(0.001));
        assert_eq!(normalize_quantity(dec!(10.999), dec!(1)), dec!(10));
        assert_eq!(normalize_quantity(dec!(0.0005), dec!(0.001)), dec!(0));
    }

    #[test]
    fn price_is_rounded_to_tick() {
        assert_eq!(normalize_price(dec!(100.16), dec!(0.1)), dec!(100.2));
        assert_eq!(normalize_price(dec!(100.14), dec!(0.1)), dec!(100.1));
    }

    #[test]
    fn zero_step_leaves_value_untouched() {
        assert_eq!(normalize_quantity(dec!(0.123456), Decimal::ZERO), dec!(0.123456));
        assert_eq!(normalize_price(dec!(42.4242), Decimal::ZERO), dec!(42.4242));
    }
}
