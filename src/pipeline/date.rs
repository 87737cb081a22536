//! Date conversion: Brazilian `DD/MM/YYYY` → ISO `YYYY-MM-DD`.
//!
//! Parsing is strict: day 32, month 13, or 29/02 in a common year fail
//! instead of rolling over into the next month.

use crate::error::DateError;
use chrono::NaiveDate;

const BR_FORMAT: &str = "%d/%m/%Y";
const ISO_FORMAT: &str = "%Y-%m-%d";

/// Parse a Brazilian `DD/MM/YYYY` date into a calendar date.
pub fn parse_br(text: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(text.trim(), BR_FORMAT).map_err(|_| DateError {
        input: text.to_string(),
    })
}

/// Convert `DD/MM/YYYY` text into `YYYY-MM-DD`.
pub fn to_iso(text: &str) -> Result<String, DateError> {
    parse_br(text).map(|date| date.format(ISO_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_valid_date() {
        assert_eq!(to_iso("15/12/2024").unwrap(), "2024-12-15");
        assert_eq!(to_iso(" 01/01/2025 ").unwrap(), "2025-01-01");
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(to_iso("32/13/2024").is_err());
        assert!(to_iso("32/12/2024").is_err());
        assert!(to_iso("15/13/2024").is_err());
        assert!(to_iso("00/12/2024").is_err());
    }

    #[test]
    fn leap_years() {
        assert_eq!(to_iso("29/02/2024").unwrap(), "2024-02-29");
        assert!(to_iso("29/02/2023").is_err());
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(to_iso("2024-12-15").is_err());
        assert!(to_iso("").is_err());
        assert!(to_iso("15/12").is_err());
    }

    #[test]
    fn error_carries_input() {
        let err = parse_br("31/04/2024").unwrap_err();
        assert_eq!(err.input, "31/04/2024");
    }
}
