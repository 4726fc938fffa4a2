use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use crate::gigs::RawEventRecord;

#[derive(Error, Debug)]
pub enum LoadGigsError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse gig list: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads every non-blank row of the CSV file at `path`.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawEventRecord>, LoadGigsError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadGigsError::Io {
        path: path.to_owned(),
        source,
    })?;

    parse_records(&text)
}

/// Parses CSV text whose first row names the columns.
///
/// Short rows are padded with empty values, extra trailing values are
/// dropped, and rows with nothing but empty fields are skipped.
pub fn parse_records(text: &str) -> Result<Vec<RawEventRecord>, LoadGigsError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();

    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;

        let record = headers
            .iter()
            .enumerate()
            .map(|(index, header)| (header.as_str(), row.get(index).unwrap_or_default()))
            .collect::<RawEventRecord>();

        if record.is_blank() {
            continue;
        }

        records.push(record);
    }

    Ok(records)
}
