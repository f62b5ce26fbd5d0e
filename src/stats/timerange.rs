use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Weekday};

/// Attach 00:00 of `date` in `tz`. Falls forward by whole hours when a DST
/// transition removes midnight.
pub fn day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    for hour in 0..3 {
        let naive = match date.and_hms_opt(hour, 0, 0) {
            Some(naive) => naive,
            None => break,
        };
        if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
            return Ok(dt);
        }
    }
    Err(Error::InvalidDate(format!("no valid start of day for {date}")))
}

/// Normalize to 00:00 of the same calendar day, in the instant's own zone.
pub fn beginning_of_day<Tz: TimeZone>(t: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    day_start(&t.timezone(), t.date_naive())
}

/// Parse a user date input, relative to `now`:
///   - `YYYY-MM-DD`
///   - `YYYY-MM` (first of that month)
///   - `<n><unit>` with unit in w/m/y (case-insensitive): n weeks, calendar
///     months, or years before `now`
/// The result is normalized to 00:00 in `now`'s zone.
pub fn parse_date<Tz: TimeZone>(s: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidDate("date is empty".into()));
    }

    let tz = now.timezone();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return day_start(&tz, date);
    }

    // YYYY-MM: first day of the month.
    if s.len() == 7 && s.as_bytes()[4] == b'-' {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            return day_start(&tz, date);
        }
    }

    // Relative: <n><unit>.
    if s.len() >= 2 {
        let unit = s.as_bytes()[s.len() - 1];
        if let Ok(n) = s[..s.len() - 1].trim().parse::<i64>() {
            if n <= 0 {
                return Err(Error::InvalidDate(format!(
                    "relative date must be > 0, got {s:?}"
                )));
            }
            let base = now.date_naive();
            let target = u32::try_from(n).ok().and_then(|n| match unit {
                b'w' | b'W' => base.checked_sub_days(chrono::Days::new(7 * u64::from(n))),
                b'm' | b'M' => base.checked_sub_months(Months::new(n)),
                b'y' | b'Y' => n
                    .checked_mul(12)
                    .and_then(|months| base.checked_sub_months(Months::new(months))),
                _ => None,
            });
            if let Some(date) = target {
                return day_start(&tz, date);
            }
        }
    }

    Err(Error::InvalidDate(format!(
        "invalid date {s:?} (expected YYYY-MM-DD, YYYY-MM, or relative like 2m/1w/1y)"
    )))
}

/// The heatmap window start: `months` calendar months before `from`, walked
/// backward to the nearest Sunday so the rendered columns are week-aligned.
pub fn heatmap_start_date(from: NaiveDate, months: u32) -> Result<NaiveDate> {
    let mut start = from
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| Error::InvalidDate(format!("window start underflows from {from}")))?;
    while start.weekday() != Weekday::Sun {
        start = start
            .pred_opt()
            .ok_or_else(|| Error::InvalidDate("window start underflows calendar".into()))?;
    }
    Ok(start)
}

/// Resolve the query window. Explicit since/until win over the months
/// default; every outcome is day-bounded, inclusive, and ordered.
pub fn time_range<Tz: TimeZone>(
    since: &str,
    until: &str,
    months: u32,
    now: &DateTime<Tz>,
) -> Result<(DateTime<Tz>, DateTime<Tz>)> {
    let since = since.trim();
    let until = until.trim();
    let tz = now.timezone();

    if since.is_empty() && until.is_empty() {
        if months == 0 {
            return Err(Error::InvalidDate("months must be > 0".into()));
        }
        let end = beginning_of_day(now)?;
        let start = day_start(&tz, heatmap_start_date(now.date_naive(), months)?)?;
        return Ok((start, end));
    }

    let start = if since.is_empty() {
        None
    } else {
        Some(
            parse_date(since, now)
                .map_err(|e| Error::InvalidDate(format!("--since: {e}")))?,
        )
    };
    let end = if until.is_empty() {
        None
    } else {
        Some(
            parse_date(until, now)
                .map_err(|e| Error::InvalidDate(format!("--until: {e}")))?,
        )
    };

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => {
            let end = beginning_of_day(now)?;
            (start, end)
        }
        (None, Some(end)) => {
            if months == 0 {
                return Err(Error::InvalidDate("months must be > 0".into()));
            }
            let start = day_start(&tz, heatmap_start_date(end.date_naive(), months)?)?;
            (start, end)
        }
        (None, None) => unreachable!(),
    };

    if start > end {
        return Err(Error::InvalidDate(format!(
            "since must be <= until (since={}, until={})",
            start.date_naive(),
            end.date_naive()
        )));
    }

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_date() {
        let got = parse_date("2024-01-15", &fixed_now()).unwrap();
        assert_eq!(got.date_naive(), date(2024, 1, 15));
        assert_eq!(got.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn parses_year_month_as_first_of_month() {
        let got = parse_date("2024-03", &fixed_now()).unwrap();
        assert_eq!(got.date_naive(), date(2024, 3, 1));
    }

    #[test]
    fn parses_relative_inputs() {
        let now = fixed_now();
        assert_eq!(
            parse_date("2w", &now).unwrap().date_naive(),
            date(2024, 6, 1)
        );
        assert_eq!(
            parse_date("1m", &now).unwrap().date_naive(),
            date(2024, 5, 15)
        );
        assert_eq!(
            parse_date("1Y", &now).unwrap().date_naive(),
            date(2023, 6, 15)
        );
    }

    #[test]
    fn rejects_non_positive_relative() {
        assert!(parse_date("0w", &fixed_now()).is_err());
        assert!(parse_date("-3m", &fixed_now()).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date("", &fixed_now()).is_err());
        assert!(parse_date("soon", &fixed_now()).is_err());
        assert!(parse_date("2024-13-01", &fixed_now()).is_err());
    }

    #[test]
    fn default_range_ends_today_and_starts_on_sunday() {
        let now = fixed_now();
        let (start, end) = time_range("", "", 6, &now).unwrap();
        assert_eq!(end.date_naive(), date(2024, 6, 15));
        // Six months back is 2023-12-15 (a Friday); the preceding Sunday is the 10th.
        assert_eq!(start.date_naive(), date(2023, 12, 10));
        assert_eq!(start.date_naive().weekday(), Weekday::Sun);
    }

    #[test]
    fn since_only_ends_today() {
        let now = fixed_now();
        let (start, end) = time_range("2024-05-01", "", 6, &now).unwrap();
        assert_eq!(start.date_naive(), date(2024, 5, 1));
        assert_eq!(end.date_naive(), date(2024, 6, 15));
    }

    #[test]
    fn until_only_walks_months_back_to_sunday() {
        let now = fixed_now();
        let (start, end) = time_range("", "2024-03-20", 1, &now).unwrap();
        assert_eq!(end.date_naive(), date(2024, 3, 20));
        // One month back is 2024-02-20 (a Tuesday); Sunday is the 18th.
        assert_eq!(start.date_naive(), date(2024, 2, 18));
    }

    #[test]
    fn explicit_bounds_are_used_verbatim() {
        let now = fixed_now();
        let (start, end) = time_range("2024-01-01", "2024-01-31", 6, &now).unwrap();
        assert_eq!(start.date_naive(), date(2024, 1, 1));
        assert_eq!(end.date_naive(), date(2024, 1, 31));
    }

    #[test]
    fn rejects_inverted_window() {
        let now = fixed_now();
        assert!(time_range("2024-02-01", "2024-01-01", 6, &now).is_err());
    }

    #[test]
    fn rejects_zero_months_when_needed() {
        let now = fixed_now();
        assert!(time_range("", "", 0, &now).is_err());
        assert!(time_range("", "2024-03-20", 0, &now).is_err());
        // With both bounds explicit, months is irrelevant.
        assert!(time_range("2024-01-01", "2024-01-31", 0, &now).is_ok());
    }
}
