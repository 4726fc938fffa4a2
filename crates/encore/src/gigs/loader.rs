use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::date::{format_clock_time, format_iso_date, format_iso_minutes, format_long_date};
use crate::gigs::{
    parse_timezone, read_records, resolve_local, today_in, Gig, LoadGigsError, RawEventRecord,
};

#[derive(Error, Debug, PartialEq)]
pub enum GigError {
    #[error("invalid date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid time '{value}': {source}")]
    InvalidTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Loads the upcoming gigs from the CSV file at `path`.
///
/// A show is upcoming when its date is on or after the date `now` falls on
/// in the show's own timezone, or in `ambient` when it names none. The
/// result is sorted by date; shows on the same date keep their file order.
pub fn load_gigs<Z: TimeZone>(
    path: impl AsRef<Path>,
    now: DateTime<Utc>,
    ambient: &Z,
) -> Result<Vec<Gig>, LoadGigsError> {
    let records = read_records(path)?;

    Ok(normalize_gigs(records, now, ambient))
}

/// Like [`load_gigs`], but a missing or unreadable gig list is logged and
/// treated as an empty schedule.
pub fn load_gigs_or_empty<Z: TimeZone>(
    path: impl AsRef<Path>,
    now: DateTime<Utc>,
    ambient: &Z,
) -> Vec<Gig> {
    let path = path.as_ref();

    match load_gigs(path, now, ambient) {
        Ok(gigs) => gigs,
        Err(err) => {
            warn!("could not load gigs data: {err}");
            Vec::new()
        }
    }
}

/// Filters, sorts and formats parsed rows.
///
/// Rows with a malformed date, time or timezone are logged and skipped so
/// they don't take the rest of the schedule with them.
pub fn normalize_gigs<Z: TimeZone>(
    records: Vec<RawEventRecord>,
    now: DateTime<Utc>,
    ambient: &Z,
) -> Vec<Gig> {
    let mut scheduled = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match ScheduledGig::parse(record) {
            Ok(gig) => Some(gig),
            Err(err) => {
                warn!(record = index + 1, "skipping gig: {err}");
                None
            }
        })
        .filter(|gig| gig.is_upcoming(now, ambient))
        .collect::<Vec<_>>();

    scheduled.sort_by_key(|gig| gig.date);

    scheduled
        .into_iter()
        .map(|gig| gig.into_gig(ambient))
        .collect()
}

/// A row whose date, time and timezone have been parsed.
#[derive(Debug)]
struct ScheduledGig {
    record: RawEventRecord,
    date: NaiveDate,
    time: Option<NaiveTime>,
    zone: Option<Tz>,
}

impl ScheduledGig {
    fn parse(record: RawEventRecord) -> Result<Self, GigError> {
        let date = NaiveDate::parse_from_str(record.date(), "%Y-%m-%d").map_err(|source| {
            GigError::InvalidDate {
                value: record.date().to_string(),
                source,
            }
        })?;

        let time = record.time().map(parse_time).transpose()?;

        let zone = record
            .timezone()
            .map(|name| {
                parse_timezone(name).ok_or_else(|| GigError::UnknownTimezone(name.to_string()))
            })
            .transpose()?;

        Ok(Self {
            record,
            date,
            time,
            zone,
        })
    }

    fn is_upcoming<Z: TimeZone>(&self, now: DateTime<Utc>, ambient: &Z) -> bool {
        let today = match self.zone.as_ref() {
            Some(zone) => today_in(now, zone),
            None => today_in(now, ambient),
        };

        self.date >= today
    }

    fn into_gig<Z: TimeZone>(self, ambient: &Z) -> Gig {
        let Some(time) = self.time else {
            return Gig::new(
                self.record,
                format_long_date(self.date),
                String::new(),
                format_iso_date(self.date),
            );
        };

        let local = self.date.and_time(time);
        let moment = match self.zone.as_ref() {
            Some(zone) => resolve_local(zone, local).fixed_offset(),
            None => resolve_local(ambient, local).fixed_offset(),
        };

        Gig::new(
            self.record,
            format_long_date(moment.date_naive()),
            format_clock_time(&moment),
            format_iso_minutes(&moment, self.zone.is_some()),
        )
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, GigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|source| GigError::InvalidTime {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use crate::gigs::parse_records;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn normalize(text: &str) -> Vec<Gig> {
        normalize_gigs(parse_records(text).unwrap(), now(), &Utc)
    }

    fn titles(gigs: &[Gig]) -> Vec<&str> {
        gigs.iter()
            .map(|gig| gig.get("title").unwrap_or_default())
            .collect()
    }

    struct WarningCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarningCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarningCounter(warnings.clone()));

        let value = tracing::subscriber::with_default(subscriber, f);

        (value, warnings.load(Ordering::SeqCst))
    }

    #[test]
    fn test_future_gig_with_timezone() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2099-01-01,19:00,America/Chicago,Test
        "});

        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].formatted_date, "Thursday, January 1, 2099");
        assert_eq!(gigs[0].formatted_time, "7:00 PM");
        assert_eq!(gigs[0].iso_date_time, "2099-01-01T19:00-06:00");
    }

    #[test]
    fn test_past_gig_is_excluded() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2000-01-01,19:00,,Past
            2024-12-31,23:59,,Yesterday
            2025-01-01,08:00,,Today
        "});

        assert_eq!(titles(&gigs), vec!["Today"]);
    }

    #[test]
    fn test_future_gig_without_time() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2099-03-01,,America/Chicago,NoTime
        "});

        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].formatted_date, "Sunday, March 1, 2099");
        assert_eq!(gigs[0].formatted_time, "");
        assert_eq!(gigs[0].iso_date_time, "2099-03-01");
    }

    #[test]
    fn test_gig_without_timezone_has_no_offset() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2030-07-04,21:15,,Local
        "});

        assert_eq!(gigs[0].formatted_time, "9:15 PM");
        assert_eq!(gigs[0].iso_date_time, "2030-07-04T21:15");
    }

    #[test]
    fn test_offset_follows_daylight_saving() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2030-01-10,19:00,America/Chicago,Winter
            2030-07-10,19:00,America/Chicago,Summer
        "});

        assert_eq!(gigs[0].iso_date_time, "2030-01-10T19:00-06:00");
        assert_eq!(gigs[1].iso_date_time, "2030-07-10T19:00-05:00");
        assert_eq!(gigs[0].formatted_time, "7:00 PM");
        assert_eq!(gigs[1].formatted_time, "7:00 PM");
    }

    #[test]
    fn test_sorted_by_date_and_stable() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2030-05-01,20:00,,C
            2030-03-01,21:00,,A
            2030-03-01,18:00,,B
            2030-04-01,,,D
        "});

        assert_eq!(titles(&gigs), vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn test_today_is_observed_in_gig_timezone() {
        // 03:00 UTC on Jan 2 is still the evening of Jan 1 in Chicago.
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 0, 0).unwrap();
        let records = parse_records(indoc! {"
            date,time,timezone,title
            2025-01-01,20:00,America/Chicago,Chicago
            2025-01-01,20:00,,Ambient
        "})
        .unwrap();

        let gigs = normalize_gigs(records, now, &Utc);

        assert_eq!(titles(&gigs), vec!["Chicago"]);
    }

    #[test]
    fn test_fields_are_preserved() {
        let text = indoc! {r#"
            date,time,timezone,title,venue,tickets
            2099-01-01,19:00,America/Chicago,Test,"Hall, Upstairs",https://example.com/t
        "#};
        let records = parse_records(text).unwrap();
        let gigs = normalize_gigs(records.clone(), now(), &Utc);

        assert_eq!(gigs[0].fields, records[0]);
    }

    #[test]
    fn test_timezone_name_ignores_case() {
        let gigs = normalize(indoc! {"
            date,time,timezone,title
            2099-01-01,19:00,america/chicago,A
        "});

        assert_eq!(titles(&gigs), vec!["A"]);
        assert_eq!(gigs[0].iso_date_time, "2099-01-01T19:00-06:00");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let (gigs, warnings) = count_warnings(|| {
            normalize(indoc! {"
                date,time,timezone,title
                next friday,19:00,,BadDate
                2099-01-01,7pm,,BadTime
                2099-01-01,19:00,Mars/Olympus_Mons,BadZone
                2099-01-02,19:00,Europe/Berlin,Good
            "})
        });

        assert_eq!(titles(&gigs), vec!["Good"]);
        assert_eq!(gigs[0].iso_date_time, "2099-01-02T19:00+01:00");
        assert_eq!(warnings, 3);
    }

    #[test]
    fn test_idempotent() {
        let text = indoc! {"
            date,time,timezone,title
            2099-01-01,19:00,America/Chicago,A
            2099-01-01,,,B
        "};

        assert_eq!(normalize(text), normalize(text));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gigs.csv");
        fs::write(
            &path,
            "date,time,timezone,title\n2099-01-01,19:00,America/Chicago,Test\n",
        )
        .unwrap();

        let gigs = load_gigs(&path, now(), &Utc).unwrap();

        assert_eq!(titles(&gigs), vec!["Test"]);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let (gigs, warnings) =
            count_warnings(|| load_gigs_or_empty("does/not/exist/gigs.csv", now(), &Utc));

        assert_eq!(gigs, Vec::new());
        assert_eq!(warnings, 1);
    }
}
