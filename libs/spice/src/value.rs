//! SPICE numeric values.

use rust_decimal::Decimal;

/// Scale suffixes, longest first so that `meg` wins over `m`.
const SUFFIXES: [(&str, i64, u32); 10] = [
    ("meg", 1_000_000, 0),
    ("t", 1_000_000_000_000, 0),
    ("g", 1_000_000_000, 0),
    ("k", 1_000, 0),
    ("m", 1, 3),
    ("u", 1, 6),
    ("n", 1, 9),
    ("p", 1, 12),
    ("f", 1, 15),
    ("a", 1, 18),
];

/// Parses a SPICE number such as `100n`, `0.15`, `2.5u` or `1meg`.
///
/// Suffixes are case-insensitive. Returns [`None`] if the value is not a plain
/// numeric literal (for example, a parameter expression).
///
/// # Examples
///
/// ```
/// # use rust_decimal::Decimal;
/// # use std::str::FromStr;
/// assert_eq!(spice::parse_value("100n"), Some(Decimal::from_str("0.0000001").unwrap()));
/// assert_eq!(spice::parse_value("2k"), Some(Decimal::from(2000)));
/// assert_eq!(spice::parse_value("w"), None);
/// ```
pub fn parse_value(s: &str) -> Option<Decimal> {
    let lower = s.trim().to_ascii_lowercase();
    for (suffix, mul, scale) in SUFFIXES {
        if let Some(num) = lower.strip_suffix(suffix) {
            let base: Decimal = num.parse().ok()?;
            return base
                .checked_mul(Decimal::from(mul))?
                .checked_mul(Decimal::new(1, scale));
        }
    }
    lower.parse().ok()
}
