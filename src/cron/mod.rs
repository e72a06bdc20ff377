//! Extended six-field cron expressions: parsing and occurrence generation.
//!
//! Field order is `seconds minutes hours day-of-month month day-of-week`.
//! Weekday numbering is Sunday = 1 .. Saturday = 7 (not ISO-8601) and is
//! preserved exactly for compatibility with existing expressions. Day-of-week
//! items may carry an ordinal/parity suffix: `F` (first such weekday in the
//! month), `L` (last), `O` (odd week), `E` (even week).

mod fields;

use chrono::{Datelike, FixedOffset, TimeZone, Timelike};

use crate::error::{Result, SchedulerError};
use crate::instant::{self, Instant};
use fields::FieldKind;

/// A parsed extended cron expression: six per-field value sets.
#[derive(Debug, Clone)]
pub struct CronExpression {
    source: String,
    seconds: Vec<u32>,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    months: Vec<u32>,
    weekdays: Vec<u32>,
}

/// Two expressions are equal when they select the same instants, regardless
/// of the source text used to express that (e.g. `?` vs `*`, or field order
/// within a comma list).
impl PartialEq for CronExpression {
    fn eq(&self, other: &Self) -> bool {
        self.seconds == other.seconds
            && self.minutes == other.minutes
            && self.hours == other.hours
            && self.days == other.days
            && self.months == other.months
            && self.weekdays == other.weekdays
    }
}

impl Eq for CronExpression {}

impl CronExpression {
    /// Parse a six-field extended cron expression.
    pub fn parse(source: &str) -> Result<Self> {
        Self::quick_check(source)?;

        let fields: Vec<&str> = source.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(SchedulerError::Parse {
                expression: source.to_string(),
                reason: format!("expected 6 fields, found {}", fields.len()),
            });
        }

        Ok(Self {
            source: source.to_string(),
            seconds: fields::parse_field(fields[0], FieldKind::Second)?,
            minutes: fields::parse_field(fields[1], FieldKind::Minute)?,
            hours: fields::parse_field(fields[2], FieldKind::Hour)?,
            days: fields::parse_field(fields[3], FieldKind::Day)?,
            months: fields::parse_field(fields[4], FieldKind::Month)?,
            weekdays: fields::parse_field(fields[5], FieldKind::Weekday)?,
        })
    }

    /// Parse without raising: returns `None` on any failure.
    pub fn try_parse(source: &str) -> Option<Self> {
        Self::parse(source).ok()
    }

    fn quick_check(source: &str) -> Result<()> {
        let re = regex::Regex::new(r"^([\*\?\-,/0-9A-Za-z]+( +|$)){6}$")
            .expect("static quick-check pattern is valid");
        if !re.is_match(source) {
            return Err(SchedulerError::Parse {
                expression: source.to_string(),
                reason: "does not match the expected six-field cron grammar".to_string(),
            });
        }
        Ok(())
    }

    /// The original source text this expression was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `second(s) ∈ seconds ∧ minute(s) ∈ minutes ∧ ...` and the
    /// weekday filter holds for `instant`. Exposed for testing invariant #2.
    pub fn matches(&self, instant: &Instant) -> bool {
        self.seconds.contains(&instant.second())
            && self.minutes.contains(&instant.minute())
            && self.hours.contains(&instant.hour())
            && self.days.contains(&instant.day())
            && self.months.contains(&instant.month())
            && weekday_matches(&self.weekdays, instant)
    }

    /// A lazy, ascending sequence of instants `>= base` satisfying this
    /// expression, optionally re-expressed in `target_zone`.
    pub fn upcoming(&self, base: Instant, target_zone: Option<FixedOffset>) -> Occurrences<'_> {
        Occurrences {
            expr: self,
            next_floor: base,
            target_zone,
            exhausted: false,
        }
    }

    /// Re-serialize this expression as six space-separated comma-lists, one
    /// per field, with weekday ordinal/parity offsets encoded back as
    /// suffix letters. Parsing this output reproduces the same value sets
    /// (round-trip property).
    pub fn to_canonical_string(&self) -> String {
        let numeric = |values: &[u32]| -> String {
            values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
        };
        let weekday = || -> String {
            self.weekdays
                .iter()
                .map(|&v| match v {
                    1..=7 => v.to_string(),
                    11..=17 => format!("{}F", v - 10),
                    21..=27 => format!("{}L", v - 20),
                    31..=37 => format!("{}O", v - 30),
                    41..=47 => format!("{}E", v - 40),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",")
        };

        format!(
            "{} {} {} {} {} {}",
            numeric(&self.seconds),
            numeric(&self.minutes),
            numeric(&self.hours),
            numeric(&self.days),
            numeric(&self.months),
            weekday(),
        )
    }
}

/// Accept `instant` against the day-of-week value set per the ordinal/parity
/// rules in the component design: a plain weekday number, or an offset
/// variant combined with "first/last occurrence in month" / "odd/even week".
fn weekday_matches(weekdays: &[u32], instant: &Instant) -> bool {
    let w = instant::weekday_number(instant);
    weekdays.contains(&w)
        || (weekdays.contains(&(10 + w)) && instant::is_first_weekday_of_month(instant))
        || (weekdays.contains(&(20 + w)) && instant::is_last_weekday_of_month(instant))
        || (weekdays.contains(&(30 + w)) && instant::is_odd_week(instant))
        || (weekdays.contains(&(40 + w)) && instant::is_even_week(instant))
}

/// Lazy ascending iterator over a [`CronExpression`]'s occurrences.
pub struct Occurrences<'a> {
    expr: &'a CronExpression,
    next_floor: Instant,
    target_zone: Option<FixedOffset>,
    exhausted: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = Instant;

    fn next(&mut self) -> Option<Instant> {
        if self.exhausted {
            return None;
        }
        match next_occurrence(self.expr, self.next_floor) {
            Some(found) => {
                self.next_floor = found + chrono::Duration::seconds(1);
                Some(match self.target_zone {
                    Some(zone) => instant::with_offset(found, zone),
                    None => found,
                })
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

/// Find the earliest instant `>= floor` satisfying `expr`, iterating the
/// field value sets outermost-to-innermost (year, month, day, hour, minute,
/// second). A field value below `floor`'s corresponding field is skipped
/// only while every outer field still equals `floor`'s -- once an outer
/// field has advanced past `floor`, inner fields are free to take their
/// smallest legal value (this is what makes e.g. an April hour of `03`
/// valid even though `floor.hour() == 23`).
fn next_occurrence(expr: &CronExpression, floor: Instant) -> Option<Instant> {
    let offset = *floor.offset();

    for year in floor.year()..=9999 {
        let year_bound = year == floor.year();

        for &month in &expr.months {
            if year_bound && month < floor.month() {
                continue;
            }
            let month_bound = year_bound && month == floor.month();

            let days_in_month = instant::days_in_month(year, month);
            for &day in &expr.days {
                if day > days_in_month {
                    continue;
                }
                if month_bound && day < floor.day() {
                    continue;
                }
                let day_bound = month_bound && day == floor.day();

                let naive_date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;

                for &hour in &expr.hours {
                    if day_bound && hour < floor.hour() {
                        continue;
                    }
                    let hour_bound = day_bound && hour == floor.hour();

                    for &minute in &expr.minutes {
                        if hour_bound && minute < floor.minute() {
                            continue;
                        }
                        let minute_bound = hour_bound && minute == floor.minute();

                        for &second in &expr.seconds {
                            if minute_bound && second < floor.second() {
                                continue;
                            }

                            let naive_time = chrono::NaiveTime::from_hms_opt(hour, minute, second)?;
                            let candidate = offset
                                .from_local_datetime(&naive_date.and_time(naive_time))
                                .single()?;

                            if candidate < floor {
                                continue;
                            }
                            if weekday_matches(&expr.weekdays, &candidate) {
                                return Some(candidate);
                            }
                        }
                    }
                }
            }
        }
    }

    None
}

/// A trigger backed by an extended cron expression, with an optional target
/// time zone applied after occurrence generation.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expr: CronExpression,
    target_zone: Option<FixedOffset>,
}

impl CronTrigger {
    pub fn new(expression: &str) -> Result<Self> {
        Ok(Self {
            expr: CronExpression::parse(expression)?,
            target_zone: None,
        })
    }

    pub fn try_parse(expression: &str) -> Option<Self> {
        CronExpression::try_parse(expression).map(|expr| Self {
            expr,
            target_zone: None,
        })
    }

    pub fn with_target_zone(expression: &str, target_zone: FixedOffset) -> Result<Self> {
        Ok(Self {
            expr: CronExpression::parse(expression)?,
            target_zone: Some(target_zone),
        })
    }

    pub fn expression(&self) -> &CronExpression {
        &self.expr
    }
}

impl crate::trigger::Trigger for CronTrigger {
    fn expression(&self) -> String {
        self.expr.source().to_string()
    }

    fn upcoming(&self, base: Instant) -> Box<dyn Iterator<Item = Instant> + Send + '_> {
        Box::new(self.expr.upcoming(base, self.target_zone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Instant {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    #[test]
    fn every_second_expression_fires_each_second() {
        let expr = CronExpression::parse("* * * * * ?").unwrap();
        let base = utc(2020, 6, 1, 0, 0, 0);
        let got: Vec<_> = expr.upcoming(base, None).take(5).collect();
        let want = vec![
            utc(2020, 6, 1, 0, 0, 0),
            utc(2020, 6, 1, 0, 0, 1),
            utc(2020, 6, 1, 0, 0, 2),
            utc(2020, 6, 1, 0, 0, 3),
            utc(2020, 6, 1, 0, 0, 4),
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn step_expression_honors_base_offset() {
        let expr = CronExpression::parse("0 0/15 * * * ?").unwrap();
        let base = utc(2020, 6, 1, 0, 7, 0);
        let got: Vec<_> = expr.upcoming(base, None).take(3).collect();
        let want = vec![
            utc(2020, 6, 1, 0, 15, 0),
            utc(2020, 6, 1, 0, 30, 0),
            utc(2020, 6, 1, 0, 45, 0),
        ];
        assert_eq!(got, want);
    }

    #[test]
    fn weekday_last_of_month_suffix_l() {
        let expr = CronExpression::parse("0 0 9 ? * 6L").unwrap();
        let base = utc(2020, 1, 1, 0, 0, 0);
        let got: Vec<_> = expr.upcoming(base, None).take(2).collect();
        assert_eq!(got, vec![utc(2020, 1, 31, 9, 0, 0), utc(2020, 2, 28, 9, 0, 0)]);
    }

    #[test]
    fn weekday_first_of_month_suffix_f() {
        let expr = CronExpression::parse("0 0 9 ? * 2F").unwrap();
        let base = utc(2020, 1, 1, 0, 0, 0);
        let got = expr.upcoming(base, None).next().unwrap();
        assert_eq!(got, utc(2020, 1, 6, 9, 0, 0));
    }

    #[test]
    fn weekday_odd_week_suffix_o() {
        let expr = CronExpression::parse("0 0 9 ? * 2O").unwrap();
        let base = utc(2001, 1, 1, 0, 0, 0);
        let got: Vec<_> = expr.upcoming(base, None).take(2).collect();
        assert_eq!(got, vec![utc(2001, 1, 1, 9, 0, 0), utc(2001, 1, 15, 9, 0, 0)]);
    }

    #[test]
    fn month_name_literals_are_accepted() {
        let expr = CronExpression::parse("0 0 0 1 JAN,JUL ?").unwrap();
        let base = utc(2020, 3, 1, 0, 0, 0);
        let got: Vec<_> = expr.upcoming(base, None).take(2).collect();
        assert_eq!(got, vec![utc(2020, 7, 1, 0, 0, 0), utc(2021, 1, 1, 0, 0, 0)]);
    }

    #[test]
    fn occurrences_are_ascending_and_match_fields() {
        let expr = CronExpression::parse("*/20 */7 * * * ?").unwrap();
        let base = utc(2020, 1, 1, 0, 0, 0);
        let occurrences: Vec<_> = expr.upcoming(base, None).take(50).collect();
        for w in occurrences.windows(2) {
            assert!(w[0] <= w[1]);
        }
        for instant in &occurrences {
            assert!(*instant >= base);
            assert!(expr.matches(instant));
        }
    }

    #[test]
    fn round_trip_preserves_value_sets() {
        let expr = CronExpression::parse("0 0 9 ? * 6L,2F").unwrap();
        let reparsed = CronExpression::parse(&expr.to_canonical_string()).unwrap();
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpression::parse("* * * * *").is_err());
        assert!(CronExpression::parse("* * * * * * *").is_err());
    }

    #[test]
    fn try_parse_returns_none_on_garbage() {
        assert!(CronExpression::try_parse("not a cron").is_none());
    }

    #[test]
    fn target_zone_is_applied_only_after_weekday_suffix_filtering() {
        // "first Monday" at 23:00 in the trigger's own (UTC) offset lands on
        // 2020-01-06. Converted into a +02:00 target zone, that same instant
        // reads as 2020-01-07 (a Tuesday there). If the target zone were
        // applied before the weekday-suffix check, the matcher would see a
        // Tuesday and never accept this candidate, skipping ahead to a later
        // occurrence instead.
        let trigger = CronTrigger::with_target_zone("0 0 23 ? * 2F", FixedOffset::east_opt(7200).unwrap()).unwrap();
        let base = utc(2020, 1, 1, 0, 0, 0);

        let got = crate::trigger::Trigger::upcoming(&trigger, base).next().unwrap();

        assert_eq!(*got.offset(), FixedOffset::east_opt(7200).unwrap());
        assert_eq!(got.with_timezone(&FixedOffset::east_opt(0).unwrap()), utc(2020, 1, 6, 23, 0, 0));
        assert_eq!(got.day(), 7);
        assert_eq!(got.weekday(), chrono::Weekday::Tue);
    }
}
