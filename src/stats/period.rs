use crate::error::{Error, Result};
use crate::model::Period;
use chrono::NaiveDate;

/// Parse a calendar-period shorthand into an inclusive date range:
///   - `YYYY`: the whole year
///   - `YYYY-HN` (N in 1..2): half-year
///   - `YYYY-QN` (N in 1..4): quarter
///   - `YYYY-MM`: the whole month
/// H/Q are case-insensitive. The label is the trimmed input.
pub fn parse_period(s: &str) -> Result<Period> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidPeriod("period is empty".into()));
    }

    if s.len() == 4 && is_digits(s) {
        let year: i32 = s.parse().map_err(|_| invalid(s))?;
        return Ok(Period {
            label: s.to_string(),
            start: month_start(year, 1)?,
            end: month_end(year, 12)?,
        });
    }

    let (year_str, rest) = s.split_once('-').ok_or_else(|| invalid(s))?;
    if year_str.len() != 4 || !is_digits(year_str) {
        return Err(Error::InvalidPeriod(format!("{s:?}: invalid year")));
    }
    let year: i32 = year_str.parse().map_err(|_| invalid(s))?;

    // YYYY-MM
    if rest.len() == 2 && is_digits(rest) {
        let month: u32 = rest.parse().map_err(|_| invalid(s))?;
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidPeriod(format!("{s:?}: month must be 01-12")));
        }
        return Ok(Period {
            label: s.to_string(),
            start: month_start(year, month)?,
            end: month_end(year, month)?,
        });
    }

    // YYYY-HN / YYYY-QN
    if rest.len() == 2 {
        let prefix = rest.as_bytes()[0];
        let digit = rest.as_bytes()[1];
        if !digit.is_ascii_digit() {
            return Err(invalid(s));
        }
        let n = (digit - b'0') as u32;

        match prefix {
            b'H' | b'h' => {
                if !(1..=2).contains(&n) {
                    return Err(Error::InvalidPeriod(format!(
                        "{s:?}: half must be H1 or H2"
                    )));
                }
                let start_month = if n == 2 { 7 } else { 1 };
                return Ok(Period {
                    label: s.to_string(),
                    start: month_start(year, start_month)?,
                    end: month_end(year, start_month + 5)?,
                });
            }
            b'Q' | b'q' => {
                if !(1..=4).contains(&n) {
                    return Err(Error::InvalidPeriod(format!(
                        "{s:?}: quarter must be Q1-Q4"
                    )));
                }
                let start_month = 1 + 3 * (n - 1);
                return Ok(Period {
                    label: s.to_string(),
                    start: month_start(year, start_month)?,
                    end: month_end(year, start_month + 2)?,
                });
            }
            _ => {}
        }
    }

    Err(invalid(s))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn invalid(s: &str) -> Error {
    Error::InvalidPeriod(format!(
        "{s:?} (expected YYYY, YYYY-HN, YYYY-QN, or YYYY-MM)"
    ))
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidPeriod(format!("no such month: {year}-{month:02}")))
}

/// Last day of the month, computed as the day before the first of the next.
fn month_end(year: i32, month: u32) -> Result<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    month_start(next_year, next_month)?
        .pred_opt()
        .ok_or_else(|| Error::InvalidPeriod(format!("no such month: {year}-{month:02}")))
}
