use chrono::{DateTime, FixedOffset, NaiveDate};

/// `Saturday, June 14, 2025`
pub const LONG_DATE_FORMAT: &str = "%A, %B %-d, %Y";

/// `7:00 PM`
pub const CLOCK_TIME_FORMAT: &str = "%-I:%M %p";

pub fn format_long_date(date: NaiveDate) -> String {
    date.format(LONG_DATE_FORMAT).to_string()
}

pub fn format_clock_time(moment: &DateTime<FixedOffset>) -> String {
    moment.format(CLOCK_TIME_FORMAT).to_string()
}

/// Formats `moment` as `YYYY-MM-DDTHH:MM`, followed by its UTC offset when
/// `with_offset` is set.
pub fn format_iso_minutes(moment: &DateTime<FixedOffset>, with_offset: bool) -> String {
    if with_offset {
        moment.format("%Y-%m-%dT%H:%M%:z").to_string()
    } else {
        moment.format("%Y-%m-%dT%H:%M").to_string()
    }
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
