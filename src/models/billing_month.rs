use crate::errors::ServiceError;
use chrono::{Datelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Year and month a reading is billed against.
///
/// Ordered by `(year, month)`. Rendered as zero-padded `YYYY-MM`, which
/// sorts identically as text, so stored keys can be compared in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillingMonth {
    year: u16,
    month: u8,
}

impl BillingMonth {
    pub fn new(year: u16, month: u8) -> Result<Self, ServiceError> {
        if !(1..=9999).contains(&year) {
            return Err(ServiceError::ValidationError(format!(
                "year {} is outside 1..=9999",
                year
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(ServiceError::ValidationError(format!(
                "month {} is outside 1..=12",
                month
            )));
        }
        Ok(Self { year, month })
    }

    /// Month containing the current UTC instant
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year().clamp(1, 9999) as u16,
            month: today.month() as u8,
        }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Storage key, identical to the `Display` form
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingMonth {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ServiceError::ValidationError(format!("invalid month '{}', expected YYYY-MM", s));

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4
            || month.len() != 2
            || !year.bytes().all(|b| b.is_ascii_digit())
            || !month.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let year = year.parse::<u16>().map_err(|_| invalid())?;
        let month = month.parse::<u8>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl Serialize for BillingMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillingMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-01", 2024, 1)]
    #[case("0001-12", 1, 12)]
    #[case(" 2023-09 ", 2023, 9)]
    fn parses_padded_months(#[case] raw: &str, #[case] year: u16, #[case] month: u8) {
        let parsed: BillingMonth = raw.parse().unwrap();
        assert_eq!(parsed.year(), year);
        assert_eq!(parsed.month(), month);
    }

    #[rstest]
    #[case("2024-1")]
    #[case("24-01")]
    #[case("2024-13")]
    #[case("0000-05")]
    #[case("2024/01")]
    #[case("+024-01")]
    #[case("")]
    fn rejects_malformed_months(#[case] raw: &str) {
        assert!(matches!(
            raw.parse::<BillingMonth>(),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn orders_chronologically_across_years() {
        let dec = BillingMonth::new(2023, 12).unwrap();
        let jan = BillingMonth::new(2024, 1).unwrap();
        assert!(dec < jan);
        assert!(dec.key() < jan.key());
    }

    #[test]
    fn serde_uses_text_form() {
        let month = BillingMonth::new(2024, 2).unwrap();
        assert_eq!(serde_json::to_string(&month).unwrap(), "\"2024-02\"");
        let back: BillingMonth = serde_json::from_str("\"2024-02\"").unwrap();
        assert_eq!(back, month);
        assert!(serde_json::from_str::<BillingMonth>("\"2024-00\"").is_err());
    }
}
