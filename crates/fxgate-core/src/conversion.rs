//! Amount conversion and time-series statistics.

use crate::currency::CurrencyPair;
use crate::error::{FxError, Result};
use crate::models::RatePoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Result of converting an amount at a given rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub rate: f64,
    pub result: f64,
    /// Date of the rate used.
    pub date: NaiveDate,
}

impl Conversion {
    /// The converted amount with two decimals.
    pub fn display_result(&self) -> String {
        format!("{:.2}", self.result)
    }
}

/// Parse a user-supplied amount.
pub fn parse_amount(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FxError::validation("amount", "amount is required"));
    }
    let amount: f64 = trimmed
        .parse()
        .map_err(|_| FxError::validation("amount", format!("'{}' is not a number", trimmed)))?;
    check_amount(amount)?;
    Ok(amount)
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(FxError::validation(
            "amount",
            "amount must be a non-negative number",
        ));
    }
    Ok(())
}

/// Convert `amount` of `pair.from` into `pair.to` at `rate`.
pub fn convert(pair: &CurrencyPair, amount: f64, rate: f64, date: NaiveDate) -> Result<Conversion> {
    check_amount(amount)?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(FxError::MissingRate {
            currency: pair.to.to_string(),
        });
    }
    Ok(Conversion {
        from: pair.from.to_string(),
        to: pair.to.to_string(),
        amount,
        rate,
        result: amount * rate,
        date,
    })
}

/// Summary statistics of a rate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub count: usize,
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl SeriesStats {
    /// Compute statistics, `None` for an empty series.
    pub fn from_points(points: &[RatePoint]) -> Option<Self> {
        let first = points.first()?.rate;
        let last = points.last()?.rate;

        let (min, max, sum) = points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), p| (min.min(p.rate), max.max(p.rate), sum + p.rate),
        );
        let change = last - first;

        Some(Self {
            count: points.len(),
            first,
            last,
            min,
            max,
            mean: sum / points.len() as f64,
            change,
            change_percent: if first != 0.0 { change / first * 100.0 } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_convert_multiplies() {
        let pair = CurrencyPair::parse("EUR", "USD").unwrap();
        let conversion = convert(&pair, 250.0, 1.0842, day(5)).unwrap();
        assert!((conversion.result - 271.05).abs() < 1e-9);
        assert_eq!(conversion.display_result(), "271.05");
        assert_eq!(conversion.from, "EUR");
    }

    #[test]
    fn test_convert_rejects_bad_rate() {
        let pair = CurrencyPair::parse("EUR", "USD").unwrap();
        assert!(matches!(
            convert(&pair, 1.0, 0.0, day(5)),
            Err(FxError::MissingRate { .. })
        ));
        assert!(convert(&pair, -1.0, 1.1, day(5)).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.5 ").unwrap(), 12.5);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-3").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_series_stats() {
        let points = vec![
            RatePoint { date: day(1), rate: 1.0 },
            RatePoint { date: day(2), rate: 1.5 },
            RatePoint { date: day(3), rate: 0.5 },
            RatePoint { date: day(4), rate: 1.2 },
        ];
        let stats = SeriesStats::from_points(&points).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 1.5);
        assert!((stats.mean - 1.05).abs() < 1e-9);
        assert!((stats.change_percent - 20.0).abs() < 1e-9);

        assert!(SeriesStats::from_points(&[]).is_none());
    }
}
