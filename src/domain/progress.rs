//! Classification of the analysis process's standard output.

use regex::Regex;
use std::sync::LazyLock;

/// Phrase the analysis prints when no movement passed the thresholds.
pub const NO_DETECTIONS_SENTINEL: &str = "No movement detected";

static PROGRESS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Fraction of frames processed, in `[0, 1]`.
    Progress(f64),
    NoDetections,
    Nothing,
}

/// Classifies one line of output. Progress is only reported when the line
/// can be attributed to a file.
pub fn parse_line(line: &str, has_file: bool) -> Signal {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');

    if let Some(caps) = PROGRESS_LINE.captures(line) {
        if !has_file {
            return Signal::Nothing;
        }
        let numerator = caps[1].parse::<f64>();
        let denominator = caps[2].parse::<f64>();
        return match (numerator, denominator) {
            (Ok(n), Ok(d)) if d > 0.0 => Signal::Progress((n / d).clamp(0.0, 1.0)),
            _ => Signal::Nothing,
        };
    }

    if line.contains(NO_DETECTIONS_SENTINEL) {
        return Signal::NoDetections;
    }

    Signal::Nothing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_with_file() {
        assert_eq!(parse_line("12/50", true), Signal::Progress(0.24));
    }

    #[test]
    fn test_fraction_without_file() {
        assert_eq!(parse_line("12/50", false), Signal::Nothing);
    }

    #[test]
    fn test_not_a_fraction() {
        assert_eq!(parse_line("not a fraction", true), Signal::Nothing);
        assert_eq!(parse_line("frame 12/50", true), Signal::Nothing);
        assert_eq!(parse_line("12/50 done", true), Signal::Nothing);
    }

    #[test]
    fn test_trailing_newline_is_ignored() {
        assert_eq!(parse_line("50/50\r\n", true), Signal::Progress(1.0));
    }

    #[test]
    fn test_zero_denominator() {
        assert_eq!(parse_line("3/0", true), Signal::Nothing);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        assert_eq!(parse_line("51/50", true), Signal::Progress(1.0));
    }

    #[test]
    fn test_no_detections_sentinel() {
        assert_eq!(
            parse_line("No movement detected for keypoints [4]", true),
            Signal::NoDetections
        );
        assert_eq!(parse_line("No movement detected", false), Signal::NoDetections);
    }
}
