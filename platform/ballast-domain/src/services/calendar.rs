use chrono::{DateTime, Datelike, Months, NaiveDate};

/// `(year, month)` of a date; month is 1-based.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    month_key(a) == month_key(b)
}

/// Difference in calendar-month numbers, ignoring the day of month
/// (Jan 31 -> Feb 1 is one month).
pub fn calendar_months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
            .unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Elapsed months from `from` to `to`, with the partial month expressed as the
/// fraction of days elapsed inside the month window that contains `to`.
///
/// Jan 1 -> Jul 1 is exactly 6.0; Jan 1 -> Jun 30 is 5 + 29/30.
pub fn fractional_months_between(from: NaiveDate, to: NaiveDate) -> f64 {
    if to < from {
        return -fractional_months_between(to, from);
    }

    let whole = calendar_months_between(from, to);
    let anchor = shift_months(from, whole);
    let (base, lower, upper) = if to < anchor {
        (whole - 1, shift_months(from, whole - 1), anchor)
    } else {
        (whole, anchor, shift_months(from, whole + 1))
    };

    let span = (upper - lower).num_days() as f64;
    let offset = (to - lower).num_days() as f64;
    let fraction = if span > 0.0 { offset / span } else { 0.0 };
    base as f64 + fraction
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` or an RFC3339 timestamp (its date part is kept).
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let value = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y/%m/%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.date_naive())
        .map_err(|_| format!("invalid date '{value}' (expected YYYY-MM-DD, YYYY/MM/DD or RFC3339)"))
}
