use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

static DMY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").unwrap());
static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[/.\-](\d{1,2})[/.\-](\d{1,2})\b").unwrap());
static PATH_YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Where a publication date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    DayMonthYearInText,
    YearMonthDayInText,
    YearMonthDayInPath,
    FileModified,
    RunStarted,
}

/// Tried in this order; the first rule that yields a valid date wins.
pub const DATE_RULES: &[DateRule] = &[
    DateRule::DayMonthYearInText,
    DateRule::YearMonthDayInText,
    DateRule::YearMonthDayInPath,
    DateRule::FileModified,
    DateRule::RunStarted,
];

pub struct DateInputs<'a> {
    pub raw: &'a str,
    pub relative_path: &'a str,
    pub modified: Option<SystemTime>,
    pub now: DateTime<Utc>,
}

impl DateRule {
    fn apply(self, inputs: &DateInputs) -> Option<DateTime<Utc>> {
        match self {
            DateRule::DayMonthYearInText => {
                let c = DMY_RE.captures(inputs.raw)?;
                ymd(&c[3], &c[2], &c[1])
            }
            DateRule::YearMonthDayInText => {
                let c = YMD_RE.captures(inputs.raw)?;
                ymd(&c[1], &c[2], &c[3])
            }
            DateRule::YearMonthDayInPath => {
                let c = PATH_YMD_RE.captures(inputs.relative_path)?;
                ymd(&c[1], &c[2], &c[3])
            }
            DateRule::FileModified => inputs.modified.map(DateTime::<Utc>::from),
            DateRule::RunStarted => Some(inputs.now),
        }
    }
}

/// Always produces a timestamp; `RunStarted` is the last resort.
pub fn infer(inputs: &DateInputs) -> (DateTime<Utc>, DateRule) {
    DATE_RULES
        .iter()
        .find_map(|rule| rule.apply(inputs).map(|dt| (dt, *rule)))
        .unwrap_or((inputs.now, DateRule::RunStarted))
}

/// Midnight UTC, or `None` when the parts are not a real calendar date.
fn ymd(year: &str, month: &str, day: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
