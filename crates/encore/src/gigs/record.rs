use indexmap::IndexMap;
use serde::Serialize;

pub const DATE_FIELD: &str = "date";
pub const TIME_FIELD: &str = "time";
pub const TIMEZONE_FIELD: &str = "timezone";

/// A row from the gig list, keyed by header name in column order.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RawEventRecord(IndexMap<String, String>);

impl RawEventRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    /// Returns whether every field of the row is empty.
    pub fn is_blank(&self) -> bool {
        self.0.values().all(|value| value.trim().is_empty())
    }

    pub fn date(&self) -> &str {
        self.get(DATE_FIELD).map(str::trim).unwrap_or_default()
    }

    /// The published start time, or `None` when the show has no time yet.
    pub fn time(&self) -> Option<&str> {
        non_empty(self.get(TIME_FIELD))
    }

    /// The IANA timezone of the venue, or `None` for the ambient timezone.
    pub fn timezone(&self) -> Option<&str> {
        non_empty(self.get(TIMEZONE_FIELD))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl<K, V> FromIterator<(K, V)> for RawEventRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

/// A show ready for display.
///
/// Serializes as a single flat map: every column of the source row plus
/// `formattedDate`, `formattedTime` and `isoDateTime`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Gig {
    #[serde(flatten)]
    pub fields: RawEventRecord,
    #[serde(rename = "formattedDate")]
    pub formatted_date: String,
    #[serde(rename = "formattedTime")]
    pub formatted_time: String,
    #[serde(rename = "isoDateTime")]
    pub iso_date_time: String,
}

impl Gig {
    pub const DERIVED_FIELDS: [&'static str; 3] = ["formattedDate", "formattedTime", "isoDateTime"];

    pub fn new(
        mut fields: RawEventRecord,
        formatted_date: String,
        formatted_time: String,
        iso_date_time: String,
    ) -> Self {
        // Derived values win over source columns of the same name.
        for field in Self::DERIVED_FIELDS {
            fields.0.shift_remove(field);
        }

        Self {
            fields,
            formatted_date,
            formatted_time,
            iso_date_time,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field)
    }
}
