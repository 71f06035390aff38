use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal as a dollar amount with thousands separators: $1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let mut cents = val
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    cents.rescale(2);
    let cents = cents.to_string();
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Confidence as a percentage, blank when there was no match.
pub fn confidence(val: Option<u8>) -> String {
    match val {
        Some(c) if c > 0 => format!("{c}%"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec!(1234.56)), "$1,234.56");
        assert_eq!(money(dec!(-500.00)), "-$500.00");
        assert_eq!(money(dec!(0)), "$0.00");
        assert_eq!(money(dec!(1000000.99)), "$1,000,000.99");
        assert_eq!(money(dec!(42.1)), "$42.10");
        assert_eq!(money(dec!(2.005)), "$2.01");
    }

    #[test]
    fn test_confidence_formatting() {
        assert_eq!(confidence(Some(95)), "95%");
        assert_eq!(confidence(Some(0)), "");
        assert_eq!(confidence(None), "");
    }
}
