//! Delimited record codec for snapshot files.
//!
//! Fields containing the delimiter, a double quote, or a line break are
//! wrapped in double quotes with inner quotes doubled, so any field value
//! survives a write/read cycle.

use csv::{ReaderBuilder, Terminator, WriterBuilder};

/// Encode records, one `\n`-terminated line each.
pub fn encode_records<'a, I>(records: I, delimiter: u8) -> std::io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in records {
        writer.write_record(record)?;
    }
    writer.into_inner().map_err(|e| e.into_error())
}

/// Decode every record in `input`. Blank lines are ignored and records of
/// any length are returned; unreadable records are skipped with a warning.
pub fn decode_records(input: &str, delimiter: u8) -> Vec<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(input.as_bytes());

    reader
        .records()
        .filter_map(|record| match record {
            Ok(record) => Some(record.iter().map(str::to_string).collect()),
            Err(e) => {
                log::warn!("Skipping unreadable record: {}", e);
                None
            }
        })
        .collect()
}
