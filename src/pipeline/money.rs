//! Monetary normalisation: Brazilian currency text → canonical `1234.56`.
//!
//! DARM forms print amounts as `R$ 1.234,56`, but extraction also meets
//! `1234,56`, `1234.56`, and bare integers. The decimal convention is decided
//! from which separators are present:
//!
//! | Separators   | Convention                              | Example          |
//! |--------------|-----------------------------------------|------------------|
//! | `.` and `,`  | `.` thousands, `,` decimal point        | `1.234,56`       |
//! | only `,`     | `,` decimal point                       | `1234,56`        |
//! | only `.`     | already canonical                       | `1234.56`        |
//! | none         | already canonical                       | `1234`           |
//!
//! The result always carries exactly two fraction digits and normalisation
//! never fails: anything unparseable becomes `"0.00"`.

/// Canonical value used for empty or unparseable input.
pub const ZERO: &str = "0.00";

/// Normalise currency text to a fixed-point string with two fraction digits.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return ZERO.to_string();
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, 'R' | '$') && !c.is_whitespace())
        .collect();

    let canonical = match (cleaned.contains('.'), cleaned.contains(',')) {
        (true, true) => cleaned.replace('.', "").replace(',', "."),
        (false, true) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    match canonical.parse::<f64>() {
        // `f64::from_str` also accepts "inf" and "NaN"; neither is money.
        Ok(value) if value.is_finite() => format!("{value:.2}"),
        _ => ZERO.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brazilian_formats() {
        let cases = [
            ("R$ 1.234,56", "1234.56"),
            ("1.234,56", "1234.56"),
            ("1234,56", "1234.56"),
            ("1234.56", "1234.56"),
            ("R$ 0,00", "0.00"),
            ("R$ 1.000.000,00", "1000000.00"),
            ("1.000.000,00", "1000000.00"),
            ("R$\u{a0}9.014,06", "9014.06"),
            ("42", "42.00"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(normalize(""), "0.00");
        assert_eq!(normalize("   "), "0.00");
        assert_eq!(normalize("R$"), "0.00");
    }

    #[test]
    fn garbage_is_zero() {
        assert_eq!(normalize("abc"), "0.00");
        assert_eq!(normalize("1.2.3"), "0.00");
        assert_eq!(normalize("inf"), "0.00");
        assert_eq!(normalize("NaN"), "0.00");
    }

    #[test]
    fn idempotent() {
        for input in [
            "R$ 1.234,56",
            "",
            "1.000.000,00",
            "0,5",
            "-12,30",
            "abc",
            "1.000",
            "99999999999,99",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn only_dots_are_left_alone() {
        // A lone dot is read as a decimal point, never as a thousands separator.
        assert_eq!(normalize("1.000"), "1.00");
    }
}
