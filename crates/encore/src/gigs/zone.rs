use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The timezone used for shows that don't name one.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum AmbientZone {
    /// The timezone of the machine running the build.
    #[default]
    Local,
    Named(Tz),
}

impl From<Option<Tz>> for AmbientZone {
    fn from(value: Option<Tz>) -> Self {
        match value {
            Some(tz) => Self::Named(tz),
            None => Self::Local,
        }
    }
}

/// Looks up an IANA timezone by name, ignoring case.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    let name = name.trim();

    name.parse::<Tz>()
        .ok()
        .or_else(|| Tz::from_str_insensitive(name).ok())
}

/// Returns the calendar date `now` falls on in `zone`.
pub fn today_in<Z: TimeZone>(now: DateTime<Utc>, zone: &Z) -> NaiveDate {
    now.with_timezone(zone).date_naive()
}

/// Resolves a wall-clock time in `zone` to an instant, using the offset in
/// effect on that particular date.
///
/// A repeated local time (clocks falling back) resolves to its first
/// occurrence. A skipped local time (clocks springing forward) is shifted
/// by the size of the gap, so `02:30` on a spring-forward night in a
/// one-hour-gap zone becomes `03:30`.
pub fn resolve_local<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> DateTime<Z> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(moment) => moment,
        LocalResult::Ambiguous(earliest, _latest) => earliest,
        LocalResult::None => {
            // Read the wall time as UTC, see what that instant shows in the
            // zone, and correct by the difference.
            let trial = zone.from_utc_datetime(&local);
            let delta = local - trial.naive_local();

            zone.from_utc_datetime(&(local + delta))
        }
    }
}
