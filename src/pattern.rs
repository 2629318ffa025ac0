//! Date-format pattern handling.
//!
//! A strftime-style pattern such as `%Y-%m-%d` serves three purposes here:
//! it is translated into a regex able to recognize any rendering of the
//! pattern inside a log line ([`format_to_regex`]), it parses the
//! user-supplied date into a timestamp, and it renders a timestamp back into
//! its canonical date string.  [`DateFormat`] bundles all three behind one
//! compiled, shareable value.
//!
//! The regex is compiled with the `bytes` API: decoded blocks start and end
//! mid-line and may split multi-byte sequences, so matching runs over raw
//! bytes rather than `&str`.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::bytes::Regex;

use crate::error::DateError;

/// Locale tables consumed by the pattern translator.
///
/// The composite directives `%c`, `%x` and `%X` expand to these templates,
/// and `%p` expands to an alternation of the two meridiem strings.  The
/// defaults are the C-locale renderings, which are also what the chrono
/// formatter emits for the composite directives.
#[derive(Debug, Clone)]
pub struct Locale {
    /// Date-and-time template substituted for `%c`.
    pub date_time: String,
    /// Date template substituted for `%x`.
    pub date: String,
    /// Time template substituted for `%X`.
    pub time: String,
    /// Ante-meridiem string.
    pub am: String,
    /// Post-meridiem string.
    pub pm: String,
}

impl Default for Locale {
    fn default() -> Self {
        Locale {
            date_time: "%a %b %e %H:%M:%S %Y".to_owned(),
            date: "%m/%d/%y".to_owned(),
            time: "%H:%M:%S".to_owned(),
            am: "AM".to_owned(),
            pm: "PM".to_owned(),
        }
    }
}

/// Translates a strftime-style pattern into a regex fragment matching any
/// rendering of that pattern.
///
/// Composite directives are substituted with the locale templates and the
/// result re-expanded until none remain; the templates are finite and do not
/// reference each other, so the iteration reaches a fixed point.  Unknown
/// directives pass through as literals.  Literal spaces become `\s` to
/// tolerate whitespace variations in log output.
pub fn format_to_regex(pattern: &str, locale: &Locale) -> String {
    let mut current = pattern.to_owned();
    loop {
        let (expanded, saw_composite) = expand_directives(&current, locale);
        current = expanded;
        if !saw_composite {
            break;
        }
    }
    current.replace(' ', "\\s")
}

/// One substitution pass over every `%X` directive in `pattern`.  Returns
/// the expanded string and whether a composite directive was inserted,
/// which means another pass is needed.
fn expand_directives(pattern: &str, locale: &Locale) -> (String, bool) {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut saw_composite = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(directive) = chars.next() else {
            // Trailing lone percent stays a literal.
            out.push('%');
            break;
        };
        match directive {
            'a' | 'A' | 'b' | 'B' => out.push_str(r"\w+"),
            'd' | 'H' | 'I' | 'j' | 'm' | 'M' | 'S' | 'U' | 'W' | 'y' => out.push_str(r"\d{2}"),
            'Y' => out.push_str(r"\d{4,}"),
            'w' => out.push_str(r"\d"),
            // Space-padded day of month, present in the C-locale `%c` template.
            'e' => out.push_str(r"[ \d]\d"),
            'p' => {
                out.push('(');
                out.push_str(&locale.am);
                out.push('|');
                out.push_str(&locale.pm);
                out.push(')');
            }
            'Z' => out.push_str("(UTC|EST|CST)?"),
            'z' => out.push_str(r"(\+\d{4})?"),
            'c' => {
                saw_composite = true;
                out.push_str(&locale.date_time);
            }
            'x' => {
                saw_composite = true;
                out.push_str(&locale.date);
            }
            'X' => {
                saw_composite = true;
                out.push_str(&locale.time);
            }
            other => {
                out.push('%');
                out.push(other);
            }
        }
    }
    (out, saw_composite)
}

/// A date-format pattern with its compiled line regex.
///
/// The regex is stateless and wraps the whole translated pattern in a single
/// capturing group, so the matched substring is directly recoverable.
#[derive(Debug, Clone)]
pub struct DateFormat {
    pattern: String,
    regex: Regex,
}

impl DateFormat {
    /// Compiles `pattern` against the given locale tables.
    pub fn new(pattern: &str, locale: &Locale) -> Result<Self, DateError> {
        let fragment = format_to_regex(pattern, locale);
        let regex = Regex::new(&format!("({fragment})")).map_err(|source| DateError::BadFormat {
            format: pattern.to_owned(),
            source,
        })?;
        Ok(DateFormat {
            pattern: pattern.to_owned(),
            regex,
        })
    }

    /// The original strftime-style pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The compiled line regex recognizing renderings of the pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Parses `date` under the pattern into seconds since the epoch.
    ///
    /// Missing components fall back the way strptime fills them: a pattern
    /// without time-of-day parses to midnight, a pattern without a date
    /// anchors to 1900-01-01.  All arithmetic is naive UTC so parsed targets
    /// and extracted block stamps stay comparable.
    pub fn to_timestamp(&self, date: &str) -> Result<i64, DateError> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date, &self.pattern) {
            return Ok(dt.and_utc().timestamp());
        }
        if let Ok(d) = NaiveDate::parse_from_str(date, &self.pattern) {
            return Ok(d.and_time(NaiveTime::MIN).and_utc().timestamp());
        }
        if let Ok(t) = NaiveTime::parse_from_str(date, &self.pattern) {
            if let Some(base) = NaiveDate::from_ymd_opt(1900, 1, 1) {
                return Ok(base.and_time(t).and_utc().timestamp());
            }
        }
        Err(DateError::Unparseable {
            date: date.to_owned(),
            format: self.pattern.clone(),
        })
    }

    /// Renders a timestamp back into its canonical date string under the
    /// pattern.  This is the literal substring the printer scans for.
    pub fn render(&self, stamp: i64) -> Result<String, DateError> {
        let dt = DateTime::<Utc>::from_timestamp(stamp, 0).ok_or(DateError::BadStamp(stamp))?;
        let mut rendered = String::new();
        write!(rendered, "{}", dt.naive_utc().format(&self.pattern))
            .map_err(|_| DateError::BadStamp(stamp))?;
        Ok(rendered)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const JAN_15: i64 = 1_579_046_400; // 2020-01-15 00:00:00 UTC

    fn convert(pattern: &str) -> String {
        format_to_regex(pattern, &Locale::default())
    }

    // ── format_to_regex ──────────────────────────────────────────────────────

    #[test]
    fn numeric_directives_expand_to_digit_classes() {
        assert_eq!(convert("%Y-%m-%d"), r"\d{4,}-\d{2}-\d{2}");
        assert_eq!(convert("%H:%M:%S"), r"\d{2}:\d{2}:\d{2}");
        assert_eq!(convert("%w"), r"\d");
    }

    #[test]
    fn word_directives_expand_to_word_class() {
        assert_eq!(convert("%a %b"), r"\w+\s\w+");
    }

    #[test]
    fn meridiem_expands_to_locale_alternation() {
        assert_eq!(convert("%I %p"), r"\d{2}\s(AM|PM)");
    }

    #[test]
    fn zone_directives_are_optional_groups() {
        assert_eq!(convert("%Z"), "(UTC|EST|CST)?");
        assert_eq!(convert("%z"), r"(\+\d{4})?");
    }

    #[test]
    fn unknown_directives_pass_through() {
        assert_eq!(convert("%Q"), "%Q");
        assert_eq!(convert("100%"), "100%");
    }

    #[test]
    fn spaces_become_whitespace_class() {
        assert_eq!(convert("%Y %m"), r"\d{4,}\s\d{2}");
    }

    #[test]
    fn composite_expands_to_fixed_point() {
        // One pass inserts the locale template, the next resolves its
        // directives; nothing composite must survive.
        assert_eq!(
            convert("%c"),
            r"\w+\s\w+\s[\s\d]\d\s\d{2}:\d{2}:\d{2}\s\d{4,}"
        );
        assert_eq!(convert("%x"), r"\d{2}/\d{2}/\d{2}");
        assert_eq!(convert("%X"), r"\d{2}:\d{2}:\d{2}");
    }

    // ── DateFormat parse / render ────────────────────────────────────────────

    #[test]
    fn parses_plain_date_to_midnight() {
        let fmt = DateFormat::new("%Y-%m-%d", &Locale::default()).unwrap();
        assert_eq!(fmt.to_timestamp("2020-01-15").unwrap(), JAN_15);
    }

    #[test]
    fn parses_date_with_time() {
        let fmt = DateFormat::new("%Y-%m-%d %H:%M:%S", &Locale::default()).unwrap();
        assert_eq!(
            fmt.to_timestamp("2020-01-15 10:30:00").unwrap(),
            JAN_15 + 10 * 3600 + 30 * 60
        );
    }

    #[test]
    fn rejects_garbage_date() {
        let fmt = DateFormat::new("%Y-%m-%d", &Locale::default()).unwrap();
        assert!(matches!(
            fmt.to_timestamp("not-a-date"),
            Err(DateError::Unparseable { .. })
        ));
    }

    #[test]
    fn renders_canonical_form() {
        let fmt = DateFormat::new("%Y-%m-%d", &Locale::default()).unwrap();
        assert_eq!(fmt.render(JAN_15).unwrap(), "2020-01-15");
        // Sloppy input parses, but the needle comes out canonical.
        let stamp = fmt.to_timestamp("2020-1-15").unwrap();
        assert_eq!(fmt.render(stamp).unwrap(), "2020-01-15");
    }

    #[test]
    fn uncompilable_pattern_is_a_format_error() {
        assert!(matches!(
            DateFormat::new("(%Y", &Locale::default()),
            Err(DateError::BadFormat { .. })
        ));
    }

    // ── Round trip: regex from P matches any rendering under P ───────────────

    #[test]
    fn regex_matches_own_rendering() {
        let locale = Locale::default();
        for pattern in ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y", "%c"] {
            let fmt = DateFormat::new(pattern, &locale).unwrap();
            for stamp in [JAN_15, JAN_15 + 37_800, 1_596_240_000] {
                let rendered = fmt.render(stamp).unwrap();
                assert!(
                    fmt.regex().is_match(rendered.as_bytes()),
                    "pattern {pattern:?} regex missed its own rendering {rendered:?}"
                );
            }
        }
    }

    #[test]
    fn composite_regex_matches_single_digit_day() {
        // `%e` renders days below ten with a leading space.
        let fmt = DateFormat::new("%c", &Locale::default()).unwrap();
        let rendered = fmt.render(1_578_304_800).unwrap(); // 2020-01-06 10:00:00
        assert!(rendered.contains("  6 "), "unexpected rendering {rendered:?}");
        assert!(fmt.regex().is_match(rendered.as_bytes()));
    }
}
