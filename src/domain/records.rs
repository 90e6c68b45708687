//! Rows of the raw result table and the time slots derived from them.

use super::error::ConversionError;
use regex::Regex;
use std::sync::LazyLock;

static TIME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d{1,2}):(\d{1,2})(?:\.(\d+))?$").unwrap());

const FIELD_COUNT: usize = 5;

/// One detected movement: `identifier,tier,start,end,type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub id: String,
    pub tier: String,
    pub start: String,
    pub end: String,
    pub kind: String,
}

impl OutputRecord {
    /// Parses one comma-delimited row. `line` is 1-based and only used in errors.
    pub fn parse(row: &str, line: usize) -> Result<Self, ConversionError> {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < FIELD_COUNT {
            return Err(ConversionError::MalformedRow {
                line,
                found: fields.len(),
            });
        }
        for time in &fields[2..4] {
            parse_millis(time, line)?;
        }
        Ok(Self {
            id: fields[0].to_string(),
            tier: fields[1].to_string(),
            start: fields[2].to_string(),
            end: fields[3].to_string(),
            kind: fields[4].to_string(),
        })
    }
}

/// Parses the whole raw table. Blank lines are skipped; there is no header row.
pub fn parse_table(text: &str) -> Result<Vec<OutputRecord>, ConversionError> {
    text.lines()
        .enumerate()
        .filter(|(_, row)| !row.trim().is_empty())
        .map(|(index, row)| OutputRecord::parse(row, index + 1))
        .collect()
}

/// Converts `H:MM:SS.fff` to whole milliseconds, truncating below a millisecond.
pub fn parse_millis(value: &str, line: usize) -> Result<u64, ConversionError> {
    let malformed = || ConversionError::MalformedTime {
        line,
        value: value.to_string(),
    };
    let caps = TIME_FIELD.captures(value).ok_or_else(malformed)?;

    let hours: u64 = caps[1].parse().map_err(|_| malformed())?;
    let minutes: u64 = caps[2].parse().map_err(|_| malformed())?;
    let seconds: u64 = caps[3].parse().map_err(|_| malformed())?;
    let fraction = caps.get(4).map(|m| m.as_str()).unwrap_or("");
    let mut millis_digits: String = fraction.chars().take(3).collect();
    while millis_digits.len() < 3 {
        millis_digits.push('0');
    }
    let millis: u64 = millis_digits.parse().map_err(|_| malformed())?;

    hours
        .checked_mul(3_600_000)
        .and_then(|total| total.checked_add(minutes * 60_000))
        .and_then(|total| total.checked_add(seconds * 1000))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(malformed)
}

/// A point in time referenced by annotation blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub id: u32,
    pub millis: u64,
}

impl TimeSlot {
    pub fn slot_ref(&self) -> String {
        format!("ts{}", self.id)
    }
}

/// Start and end slot generated for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPair {
    pub start: TimeSlot,
    pub end: TimeSlot,
}

/// Generates two slots per record in row order, with ids counting up from 1.
pub fn time_slots(records: &[OutputRecord]) -> Result<Vec<SlotPair>, ConversionError> {
    let mut next_id = 1u32;
    let mut pairs = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let start = TimeSlot {
            id: next_id,
            millis: parse_millis(&record.start, index + 1)?,
        };
        let end = TimeSlot {
            id: next_id + 1,
            millis: parse_millis(&record.end, index + 1)?,
        };
        next_id += 2;
        pairs.push(SlotPair { start, end });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "0,Movements,0:00:01.200000,0:00:02.500000,movement\n\
                         1,Movements,0:01:10.040000,0:01:11.000000,movement\n\
                         2,Movements,1:00:00.001000,1:00:00.999000,movement\n";

    #[test]
    fn test_parse_table() {
        let records = parse_table(TABLE).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].id, "1");
        assert_eq!(records[1].tier, "Movements");
        assert_eq!(records[1].start, "0:01:10.040000");
        assert_eq!(records[2].kind, "movement");
    }

    #[test]
    fn test_short_row_is_rejected() {
        let err = parse_table("0,Movements,0:00:01.2,0:00:02.5\n").unwrap_err();
        assert_eq!(err, ConversionError::MalformedRow { line: 1, found: 4 });
    }

    #[test]
    fn test_bad_time_is_rejected() {
        let err = parse_table("0,Movements,1.2s,0:00:02.5,movement").unwrap_err();
        assert!(matches!(err, ConversionError::MalformedTime { line: 1, .. }));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let records = parse_table("\n0,Movements,0:00:01,0:00:02,movement\n\n").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis("0:00:01.200000", 1).unwrap(), 1200);
        assert_eq!(parse_millis("0:01:10.04", 1).unwrap(), 70_040);
        assert_eq!(parse_millis("1:00:00.001", 1).unwrap(), 3_600_001);
        assert_eq!(parse_millis("0:00:05", 1).unwrap(), 5000);
        assert_eq!(parse_millis("0:00:05.9999", 1).unwrap(), 5999);
    }

    #[test]
    fn test_oversized_hours_are_malformed() {
        let value = "9999999999999:00:00.000";
        assert_eq!(
            parse_millis(value, 4).unwrap_err(),
            ConversionError::MalformedTime {
                line: 4,
                value: value.to_string(),
            }
        );
        let err = parse_table("0,Movements,99999999999999999999:00:00.0,0:00:01.0,movement").unwrap_err();
        assert!(matches!(err, ConversionError::MalformedTime { line: 1, .. }));
    }

    #[test]
    fn test_time_slots_ids_and_values() {
        let records = parse_table(TABLE).unwrap();
        let pairs = time_slots(&records).unwrap();
        assert_eq!(pairs.len(), records.len());

        let ids: Vec<u32> = pairs.iter().flat_map(|p| [p.start.id, p.end.id]).collect();
        assert_eq!(ids, (1..=6).collect::<Vec<u32>>());
        assert_eq!(pairs[0].start.millis, 1200);
        assert_eq!(pairs[0].end.millis, 2500);
        assert_eq!(pairs[2].end.slot_ref(), "ts6");
    }
}
