//! Per-field parsing for the extended six-field cron grammar.
//!
//! Grammar (whitespace-separated, in order): `seconds minutes hours
//! day-of-month month day-of-week`. Each field is a comma-separated list of
//! `*`, `?`, an integer, a range `a-b`, or a step `base/step`. Month and
//! weekday fields additionally accept name literals (`JAN..DEC`,
//! `SUN..SAT`), and weekday items accept a trailing ordinal/parity suffix
//! (`F`/`L`/`O`/`E`).

use regex::Regex;

use crate::error::{Result, SchedulerError};

/// Which of the six fields is being parsed; determines the legal domain,
/// whether `?` is accepted, whether name literals apply, and whether
/// trailing suffixes are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Weekday,
}

impl FieldKind {
    fn domain(self) -> (u32, u32) {
        match self {
            FieldKind::Second => (0, 59),
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::Day => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::Weekday => (1, 7),
        }
    }

    fn allows_question_mark(self) -> bool {
        matches!(self, FieldKind::Day | FieldKind::Weekday)
    }

    fn name_table(self) -> &'static [(&'static str, u32)] {
        match self {
            FieldKind::Month => &[
                ("JAN", 1),
                ("FEB", 2),
                ("MAR", 3),
                ("APR", 4),
                ("MAY", 5),
                ("JUN", 6),
                ("JUL", 7),
                ("AUG", 8),
                ("SEP", 9),
                ("OCT", 10),
                ("NOV", 11),
                ("DEC", 12),
            ],
            FieldKind::Weekday => &[
                ("SUN", 1),
                ("MON", 2),
                ("TUE", 3),
                ("WED", 4),
                ("THU", 5),
                ("FRI", 6),
                ("SAT", 7),
            ],
            _ => &[],
        }
    }

    /// Whether a value `v` (possibly carrying an ordinal/parity offset) is
    /// legal for this field.
    fn contains(self, v: u32) -> bool {
        match self {
            FieldKind::Weekday => {
                matches!(v, 1..=7 | 11..=17 | 21..=27 | 31..=37 | 41..=47)
            }
            _ => {
                let (min, max) = self.domain();
                (min..=max).contains(&v)
            }
        }
    }
}

/// A weekday ordinal/parity suffix: first/last occurrence in the month, or
/// odd/even week parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    First,
    Last,
    Odd,
    Even,
}

impl Suffix {
    fn offset(self) -> u32 {
        match self {
            Suffix::First => 10,
            Suffix::Last => 20,
            Suffix::Odd => 30,
            Suffix::Even => 40,
        }
    }

    fn from_char(c: char) -> Option<Suffix> {
        match c {
            'F' => Some(Suffix::First),
            'L' => Some(Suffix::Last),
            'O' => Some(Suffix::Odd),
            'E' => Some(Suffix::Even),
            _ => None,
        }
    }
}

/// Parse a single field's text into its sorted, deduplicated value set.
pub fn parse_field(text: &str, kind: FieldKind) -> Result<Vec<u32>> {
    let mut text = text.to_string();

    // Rule: a field starting with `/` is shorthand for `*/...`.
    if text.starts_with('/') {
        text = format!("*{text}");
    }

    // `?` is only legal on day-of-month/day-of-week, where it means `*`.
    if text.contains('?') {
        if !kind.allows_question_mark() {
            return Err(parse_error(&text, "`?` is only valid on day-of-month or day-of-week"));
        }
        text = text.replace('?', "*");
    }

    // Replace `*` with the field's full numeric range before anything else,
    // so step/range expansion downstream only ever sees concrete numbers.
    let (domain_min, domain_max) = kind.domain();
    text = text.replace('*', &format!("{domain_min}-{domain_max}"));

    // Replace month/weekday name literals with their numeral equivalents.
    for (name, value) in kind.name_table() {
        let pattern = format!(r"\b{name}\b");
        let re = Regex::new(&pattern).expect("static name pattern is valid");
        text = re.replace_all(&text, value.to_string()).to_string();
    }

    let mut values = Vec::new();
    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            return Err(parse_error(&text, "empty list item"));
        }
        values.extend(expand_item(item, kind)?);
    }

    values.retain(|v| kind.contains(*v));
    values.sort_unstable();
    values.dedup();

    if values.is_empty() {
        return Err(parse_error(&text, "field has no legal values after parsing"));
    }

    Ok(values)
}

/// Expand a single comma-list item (after name substitution) into its
/// constituent numeric values, applying any weekday ordinal/parity suffix.
fn expand_item(item: &str, kind: FieldKind) -> Result<Vec<u32>> {
    let (body, suffix) = strip_suffix(item, kind)?;

    let base_values = if let Some((base, step)) = body.split_once('/') {
        let step: u32 = step
            .parse()
            .map_err(|_| parse_error(item, "step must be a non-negative integer"))?;
        if step == 0 {
            return Err(parse_error(item, "step must be greater than zero"));
        }
        let (list, _had_range) = expand_range_or_value(base, item)?;
        let min = *list.first().unwrap();
        // Per the grammar: the step's upper bound is the list's own maximum
        // when an explicit range was given, but defaults to 59 when the base
        // was a single value -- this is deliberately not field-specific and
        // is filtered back down to the field's legal domain afterward.
        let max = if list.len() == 1 { 59 } else { *list.last().unwrap() };
        (min..=max).filter(|v| (v - min) % step == 0).collect()
    } else {
        expand_range_or_value(body, item)?.0
    };

    let offset = suffix.map(Suffix::offset).unwrap_or(0);
    Ok(base_values.into_iter().map(|v| v + offset).collect())
}

/// Strip a trailing ordinal/parity suffix letter from a weekday item, if
/// present and legal for this field.
fn strip_suffix(item: &str, kind: FieldKind) -> Result<(&str, Option<Suffix>)> {
    let Some(last) = item.chars().last() else {
        return Ok((item, None));
    };
    let Some(suffix) = Suffix::from_char(last) else {
        return Ok((item, None));
    };
    if kind != FieldKind::Weekday {
        return Err(parse_error(
            item,
            "ordinal/parity suffixes (F/L/O/E) are only valid on day-of-week",
        ));
    }
    let body = &item[..item.len() - 1];
    if body.is_empty() {
        return Err(parse_error(item, "suffix must follow a number, range, or step"));
    }
    Ok((body, Some(suffix)))
}

/// Expand a `a-b` range or a bare integer into its numeric list.
///
/// Returns `(values, was_explicit_range)`.
fn expand_range_or_value(text: &str, original_item: &str) -> Result<(Vec<u32>, bool)> {
    if let Some((a, b)) = text.split_once('-') {
        let a: u32 = a
            .parse()
            .map_err(|_| parse_error(original_item, "range start must be an integer"))?;
        let b: u32 = b
            .parse()
            .map_err(|_| parse_error(original_item, "range end must be an integer"))?;
        if a > b {
            return Err(parse_error(original_item, "range start must not exceed range end"));
        }
        Ok(((a..=b).collect(), true))
    } else {
        let v: u32 = text
            .parse()
            .map_err(|_| parse_error(original_item, "expected an integer, range, or name"))?;
        Ok((vec![v], false))
    }
}

fn parse_error(expression: &str, reason: &str) -> SchedulerError {
    SchedulerError::Parse {
        expression: expression.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_expands_to_full_domain() {
        assert_eq!(parse_field("*", FieldKind::Hour).unwrap(), (0..=23).collect::<Vec<_>>());
    }

    #[test]
    fn question_mark_behaves_like_star_on_day_fields() {
        assert_eq!(parse_field("?", FieldKind::Day).unwrap(), (1..=31).collect::<Vec<_>>());
    }

    #[test]
    fn question_mark_rejected_on_non_day_fields() {
        assert!(parse_field("?", FieldKind::Hour).is_err());
    }

    #[test]
    fn range_expands_inclusive() {
        assert_eq!(parse_field("10-12", FieldKind::Hour).unwrap(), vec![10, 11, 12]);
    }

    #[test]
    fn step_with_explicit_range() {
        assert_eq!(parse_field("10-20/5", FieldKind::Minute).unwrap(), vec![10, 15, 20]);
    }

    #[test]
    fn step_from_bare_value_uses_59_upper_bound_then_domain_filter() {
        // "0/15" in the hour field: generates 0,15,30,45 against an upper
        // bound of 59, then filtered to the legal hour domain (0..=23).
        assert_eq!(parse_field("0/15", FieldKind::Hour).unwrap(), vec![0, 15]);
        assert_eq!(parse_field("0/15", FieldKind::Minute).unwrap(), vec![0, 15, 30, 45]);
    }

    #[test]
    fn month_names_map_to_numerals() {
        assert_eq!(parse_field("JAN,JUL", FieldKind::Month).unwrap(), vec![1, 7]);
    }

    #[test]
    fn weekday_names_map_sunday_to_one() {
        assert_eq!(parse_field("SUN", FieldKind::Weekday).unwrap(), vec![1]);
        assert_eq!(parse_field("SAT", FieldKind::Weekday).unwrap(), vec![7]);
    }

    #[test]
    fn weekday_suffix_adds_ordinal_offset() {
        assert_eq!(parse_field("6L", FieldKind::Weekday).unwrap(), vec![26]);
        assert_eq!(parse_field("2F", FieldKind::Weekday).unwrap(), vec![12]);
        assert_eq!(parse_field("2O", FieldKind::Weekday).unwrap(), vec![32]);
        assert_eq!(parse_field("2E", FieldKind::Weekday).unwrap(), vec![42]);
    }

    #[test]
    fn suffix_rejected_outside_weekday_field() {
        assert!(parse_field("6L", FieldKind::Day).is_err());
    }

    #[test]
    fn leading_slash_is_shorthand_for_star_slash() {
        assert_eq!(parse_field("/15", FieldKind::Minute).unwrap(), vec![0, 15, 30, 45]);
    }
}
