//! Format specs: output shapes and date patterns.
//!
//! Patterns use the familiar `YYYY-MM-DD HH:mm:ss` token style and are
//! translated to chrono's strftime items. Text in square brackets is copied
//! literally. Only fixed-offset timezones (`UTC`, `Z`, `+02:00`, `-0530`)
//! are understood; the locale is carried but not applied.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::{Error, Result};

/// Target shape of a formatted property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Any,
    Array,
    Boolean,
    NumberFloat,
    NumberInt,
    Object,
    Scalar,
    String,
}

/// Shape plus the optional pattern/locale/timezone/precision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormatSpec {
    pub shape: Shape,
    pub pattern: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    /// Digits after the decimal point for numbers shaped as strings.
    pub precision: Option<usize>,
}

impl FormatSpec {
    pub fn new(shape: Shape) -> Self {
        Self { shape, ..Default::default() }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn precision(mut self, digits: usize) -> Self {
        self.precision = Some(digits);
        self
    }

    fn offset(&self) -> Result<FixedOffset> {
        parse_offset(self.timezone.as_deref())
    }

    /// Render a date with this spec's pattern and timezone.
    pub fn format_date(&self, date: &DateTime<Utc>) -> Result<String> {
        let offset = self.offset()?;
        let local = date.with_timezone(&offset);
        match &self.pattern {
            Some(pattern) => {
                let items = translate_pattern(pattern);
                let mut out = String::new();
                write!(out, "{}", local.format(&items))
                    .map_err(|_| Error::Validation(format!("invalid date pattern \"{pattern}\"")))?;
                Ok(out)
            }
            None => Ok(local.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    /// Parse a date written with this spec's pattern and timezone.
    pub fn parse_date(&self, text: &str) -> Result<DateTime<Utc>> {
        let offset = self.offset()?;
        match &self.pattern {
            Some(pattern) => parse_with_pattern(text, &parse_items(pattern), &offset)
                .ok_or_else(|| {
                    Error::Validation(format!("\"{text}\" does not match date pattern \"{pattern}\""))
                }),
            None => parse_date_lenient(text, &offset),
        }
    }
}

/// Without an AM/PM marker a 12-hour field cannot be resolved when parsing,
/// so it is read as a 24-hour field.
fn parse_items(pattern: &str) -> String {
    let items = translate_pattern(pattern);
    if items.contains("%p") || items.contains("%P") {
        items
    } else {
        items.replace("%-I", "%-H").replace("%I", "%H")
    }
}

fn parse_offset(timezone: Option<&str>) -> Result<FixedOffset> {
    let utc = FixedOffset::east_opt(0).ok_or_else(|| Error::Validation("UTC offset".into()))?;
    match timezone {
        None | Some("UTC") | Some("Z") | Some("GMT") => Ok(utc),
        Some(tz) => tz
            .parse::<FixedOffset>()
            .map_err(|_| Error::Validation(format!("unsupported timezone \"{tz}\" (expected a fixed offset)"))),
    }
}

fn parse_with_pattern(text: &str, items: &str, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_str(text, items) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, items)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text, items).ok()?.and_hms_opt(0, 0, 0))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 3339 first, then the common `date time` and `date` forms.
pub fn parse_date_lenient(text: &str, offset: &FixedOffset) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d"]
        .iter()
        .find_map(|items| parse_with_pattern(text, items, offset))
        .ok_or_else(|| Error::Validation(format!("cannot parse \"{text}\" as a date")))
}

/// Translate a `YYYY-MM-DD`-style pattern into chrono strftime items.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '[' {
            i += 1;
            while i < chars.len() && chars[i] != ']' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        match token(c, run) {
            Some((items, used)) => {
                out.push_str(items);
                i += used;
            }
            None => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                i += run;
            }
        }
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Longest token for a run of `c`; returns the items and how many chars it consumed.
fn token(c: char, run: usize) -> Option<(&'static str, usize)> {
    let table: &[(usize, &'static str)] = match c {
        'Y' => &[(4, "%Y"), (2, "%y")],
        'M' => &[(4, "%B"), (3, "%b"), (2, "%m"), (1, "%-m")],
        'D' => &[(2, "%d"), (1, "%-d")],
        'd' => &[(4, "%A"), (3, "%a"), (1, "%w")],
        'H' => &[(2, "%H"), (1, "%-H")],
        'h' => &[(2, "%I"), (1, "%-I")],
        'm' => &[(2, "%M"), (1, "%-M")],
        's' => &[(2, "%S"), (1, "%-S")],
        'S' => &[(3, "%3f"), (2, "%2f"), (1, "%1f")],
        'A' => &[(1, "%p")],
        'a' => &[(1, "%P")],
        'Z' => &[(2, "%z"), (1, "%:z")],
        'X' => &[(1, "%s")],
        _ => return None,
    };
    table
        .iter()
        .find(|(len, _)| *len <= run)
        .map(|(len, items)| (*items, *len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march_24() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 24, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("YYYY-MM-DD hh:mm:ss"), "%Y-%m-%d %I:%M:%S");
        assert_eq!(translate_pattern("D/M/YY"), "%-d/%-m/%y");
        assert_eq!(translate_pattern("[at] HH%"), "at %H%%");
    }

    #[test]
    fn test_format_date_with_pattern() {
        let spec = FormatSpec::new(Shape::String).pattern("YYYY-MM-DD hh:mm:ss");
        assert_eq!(spec.format_date(&march_24()).unwrap(), "2020-03-24 10:00:00");
    }

    #[test]
    fn test_format_date_with_offset() {
        let spec = FormatSpec::new(Shape::String).pattern("YYYY-MM-DD HH:mm").timezone("+02:00");
        assert_eq!(spec.format_date(&march_24()).unwrap(), "2020-03-24 12:00");
        assert_eq!(spec.parse_date("2020-03-24 12:00").unwrap(), march_24());
    }

    #[test]
    fn test_default_format_is_rfc3339() {
        let spec = FormatSpec::new(Shape::String);
        assert_eq!(spec.format_date(&march_24()).unwrap(), "2020-03-24T10:00:00.000Z");
    }

    #[test]
    fn test_parse_round_trip() {
        let spec = FormatSpec::new(Shape::String).pattern("YYYY-MM-DD hh:mm:ss");
        assert_eq!(spec.parse_date("2020-03-24 10:00:00").unwrap(), march_24());
        assert!(spec.parse_date("24/03/2020").is_err());
    }

    #[test]
    fn test_unknown_timezone_is_an_error() {
        let spec = FormatSpec::new(Shape::String).timezone("Mars/Olympus");
        assert!(matches!(spec.format_date(&march_24()), Err(Error::Validation(_))));
    }
}
