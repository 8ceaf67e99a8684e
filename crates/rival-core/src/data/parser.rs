//! Readers that populate [`DataModel`]s from text sources.
//!
//! Two line formats are supported:
//!
//! ```text
//! user<TAB>item<TAB>score[<TAB>timestamp]      (SimpleParser, delimiter configurable)
//! user<TAB>[item:score,item:score,...]         (ListParser)
//! ```

use super::{DataModel, Id};
use crate::error::DataError;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, warn};

/// Parser for one-preference-per-line files (tab-separated or CSV).
#[derive(Debug, Clone)]
pub struct SimpleParser {
    delimiter: char,
    skip_header: bool,
    lenient: bool,
}

impl Default for SimpleParser {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            skip_header: false,
            lenient: false,
        }
    }
}

impl SimpleParser {
    /// Tab-separated parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Comma-separated parser.
    pub fn csv() -> Self {
        Self {
            delimiter: ',',
            ..Self::default()
        }
    }

    /// Uses a custom column delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Skips the first line.
    pub fn skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    /// Skips malformed lines with a warning instead of failing.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Reads every line of `reader` into a new model.
    pub fn parse<U, I, R>(&self, reader: R) -> Result<DataModel<U, I>, DataError>
    where
        U: Id + FromStr,
        I: Id + FromStr,
        R: BufRead,
    {
        let mut model = DataModel::new();
        let mut skipped = 0usize;

        // Raw lines, so a line that is not UTF-8 is malformed rather than an
        // I/O failure and lenient mode can skip it.
        for (idx, bytes) in reader.split(b'\n').enumerate() {
            let bytes = bytes?;
            let line_no = idx + 1;
            if self.skip_header && idx == 0 {
                continue;
            }
            let parsed = match decode_line(bytes, line_no) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.parse_line::<U, I>(&line, line_no),
                Err(err) => Err(err),
            };
            match parsed {
                Ok((user, item, score, timestamp)) => {
                    if let Some(ts) = timestamp {
                        model.add_timestamp(user.clone(), item.clone(), ts);
                    }
                    model.add_preference(user, item, score);
                }
                Err(err) if self.lenient => {
                    warn!("Skipping line: {}", err);
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            "Parsed {} preferences ({} users, {} items, {} skipped)",
            model.num_preferences(),
            model.num_users(),
            model.num_items(),
            skipped
        );
        Ok(model)
    }

    fn parse_line<U, I>(
        &self,
        line: &str,
        line_no: usize,
    ) -> Result<(U, I, f64, Option<i64>), DataError>
    where
        U: FromStr,
        I: FromStr,
    {
        let fields: Vec<&str> = line.split(self.delimiter).map(str::trim).collect();
        if fields.len() < 3 {
            return Err(malformed(
                line_no,
                format!("expected at least 3 fields, found {}", fields.len()),
            ));
        }

        let user = parse_id::<U>(fields[0], line_no, "user")?;
        let item = parse_id::<I>(fields[1], line_no, "item")?;
        let score = fields[2]
            .parse::<f64>()
            .map_err(|_| malformed(line_no, format!("invalid score '{}'", fields[2])))?;
        let timestamp = match fields.get(3) {
            Some(raw) if !raw.is_empty() => Some(
                raw.parse::<i64>()
                    .map_err(|_| malformed(line_no, format!("invalid timestamp '{}'", raw)))?,
            ),
            _ => None,
        };

        Ok((user, item, score, timestamp))
    }
}

/// Parser for `user<TAB>[item:score,item:score,...]` recommendation lists.
#[derive(Debug, Clone, Default)]
pub struct ListParser;

impl ListParser {
    pub fn new() -> Self {
        Self
    }

    /// Reads every line of `reader` into a new model.
    pub fn parse<U, I, R>(&self, reader: R) -> Result<DataModel<U, I>, DataError>
    where
        U: Id + FromStr,
        I: Id + FromStr,
        R: BufRead,
    {
        let mut model = DataModel::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            let (user_raw, list_raw) = line
                .split_once('\t')
                .ok_or_else(|| malformed(line_no, "missing tab after user".to_string()))?;
            let user = parse_id::<U>(user_raw.trim(), line_no, "user")?;

            let list = list_raw
                .trim()
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(|| malformed(line_no, "list must be enclosed in [ ]".to_string()))?;

            for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                // Items may contain ':' themselves, so split on the last one.
                let (item_raw, score_raw) = entry
                    .rsplit_once(':')
                    .ok_or_else(|| malformed(line_no, format!("entry '{}' lacks ':'", entry)))?;
                let item = parse_id::<I>(item_raw.trim(), line_no, "item")?;
                let score = score_raw.trim().parse::<f64>().map_err(|_| {
                    malformed(line_no, format!("invalid score '{}'", score_raw.trim()))
                })?;
                model.add_preference(user.clone(), item, score);
            }
        }

        debug!(
            "Parsed {} list entries for {} users",
            model.num_preferences(),
            model.num_users()
        );
        Ok(model)
    }
}

fn parse_id<T: FromStr>(raw: &str, line: usize, what: &str) -> Result<T, DataError> {
    raw.parse::<T>()
        .map_err(|_| malformed(line, format!("invalid {} id '{}'", what, raw)))
}

fn decode_line(bytes: Vec<u8>, line: usize) -> Result<String, DataError> {
    String::from_utf8(bytes).map_err(|_| malformed(line, "not valid UTF-8".to_string()))
}

fn malformed(line: usize, reason: String) -> DataError {
    DataError::Malformed { line, reason }
}
