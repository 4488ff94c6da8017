//! Timestamp layouts for `fromTime` / `toTime` parameters
//!
//! Layouts are configured either as chrono `strftime` patterns or in the
//! reference-time style (`2006-01-02 15:04:05`). Reference layouts are
//! translated to `strftime` once, when the layout is built. Like the reference
//! style, a seconds field also accepts a fraction the layout does not spell
//! out, and a `Z07:00` zone also accepts a literal `Z` for UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Reference-time tokens, longest first so that e.g. `2006` wins over `06`
const REFERENCE_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    (".000000000", "%.9f"),
    (".999999999", "%.f"),
    (".000000", "%.6f"),
    (".999999", "%.f"),
    (".000", "%.3f"),
    (".999", "%.f"),
    ("Z07:00", "%:z"),
    ("Z0700", "%z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("15", "%H"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("PM", "%p"),
];

/// Fraction tokens that already follow a seconds field explicitly
const FRACTION_TOKENS: &[&str] = &[".0", ".9"];

/// A parsed timestamp layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLayout {
    format: String,
    /// Offset spelled in place of a trailing `Z`, for `Z07:00` style zones
    utc_offset: Option<&'static str>,
}

impl TimeLayout {
    /// Build a layout from its configured form
    pub fn new(layout: &str) -> Self {
        if layout.contains('%') {
            return Self {
                format: layout.to_string(),
                utc_offset: None,
            };
        }

        let utc_offset = if layout.contains("Z07:00") {
            Some("+00:00")
        } else if layout.contains("Z0700") {
            Some("+0000")
        } else {
            None
        };

        Self {
            format: translate_reference_layout(layout),
            utc_offset,
        }
    }

    /// The `strftime` pattern used for parsing
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Parse a timestamp. Naive values are taken as UTC.
    pub fn parse(&self, value: &str) -> Option<DateTime<Utc>> {
        let value = match (self.utc_offset, value.strip_suffix('Z')) {
            (Some(offset), Some(head)) => format!("{}{}", head, offset),
            _ => value.to_string(),
        };
        let value = value.as_str();

        if let Ok(dt) = DateTime::parse_from_str(value, &self.format) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, &self.format) {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(value, &self.format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Whole seconds from `from` to `to`, negative when `to` is earlier
    pub fn span_seconds(&self, from: &str, to: &str) -> Option<i64> {
        let from = self.parse(from)?;
        let to = self.parse(to)?;
        Some((to - from).num_seconds())
    }
}

fn translate_reference_layout(layout: &str) -> String {
    let mut format = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, directive) in REFERENCE_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                format.push_str(directive);
                // an optional fraction, unless the layout gives one
                if *token == "05" && !FRACTION_TOKENS.iter().any(|f| tail.starts_with(f)) {
                    format.push_str("%.f");
                }
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            format.push(c);
        }
        rest = chars.as_str();
    }

    format
}
