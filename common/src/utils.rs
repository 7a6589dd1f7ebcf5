// Common Crate - utils.rs
// common/src/utils.rs
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::error::{Error, Result};

/// Number of decimals in the chain's native unit (1 NEAR = 10^24 yocto)
pub const NEAR_NOMINATION_EXP: u32 = 24;

/// Level named by `log_level`, INFO when it is not a level name
pub fn tracing_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}

/// Setup tracing for consistent logging across services
pub fn setup_tracing(level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(tracing_level(level)).finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set tracing subscriber: {e}")))
}

/// Convert a human readable amount ("0.1") into yocto units
pub fn parse_near_amount(amount: &str) -> Result<u128> {
    let amount = amount.trim().replace(',', "");
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount.as_str(), ""),
    };

    if fraction.len() > NEAR_NOMINATION_EXP as usize {
        return Err(Error::Config(format!(
            "amount {amount} has more than {NEAR_NOMINATION_EXP} fractional digits"
        )));
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Config(format!("invalid amount: {amount}")));
    }

    let padded = format!("{fraction:0<width$}", width = NEAR_NOMINATION_EXP as usize);
    format!("{whole}{padded}")
        .parse::<u128>()
        .map_err(|e| Error::Config(format!("invalid amount {amount}: {e}")))
}

/// Format a yocto amount with at most `decimals` fractional digits
pub fn format_near_amount(yocto: u128, decimals: usize) -> String {
    let base = 10u128.pow(NEAR_NOMINATION_EXP);
    let whole = yocto / base;
    let fraction = format!("{:0>24}", yocto % base);
    let fraction = fraction[..decimals.min(fraction.len())].trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Serde adapter for u128 values carried as decimal strings (U128 in contracts)
pub mod u128_dec_format {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// Same as [`u128_dec_format`] for nullable values
pub mod option_u128_dec_format {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| s.parse().map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_near_amount() {
        assert_eq!(parse_near_amount("0.1").unwrap(), 100_000_000_000_000_000_000_000);
        assert_eq!(parse_near_amount("5").unwrap(), 5 * 10u128.pow(24));
        assert_eq!(parse_near_amount("1,000").unwrap(), 1000 * 10u128.pow(24));
        assert_eq!(parse_near_amount(".5").unwrap(), 5 * 10u128.pow(23));
    }

    #[test]
    fn test_parse_near_amount_rejects_garbage() {
        assert!(parse_near_amount("abc").is_err());
        assert!(parse_near_amount("1.0000000000000000000000001").is_err());
    }

    #[test]
    fn test_format_near_amount() {
        assert_eq!(format_near_amount(10u128.pow(23), 2), "0.1");
        assert_eq!(format_near_amount(15 * 10u128.pow(24), 2), "15");
        assert_eq!(format_near_amount(1_234_567 * 10u128.pow(18), 2), "1.23");
    }
}
