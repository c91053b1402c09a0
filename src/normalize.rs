use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

/// Wall-clock "now" for a source, used as the reference when resolving
/// relative expressions like "tomorrow". Falls back to UTC when the
/// source declares no timezone or an unknown one.
pub fn local_now(tz: Option<&str>) -> NaiveDateTime {
    if let Some(name) = tz
        && let Ok(tz) = name.parse::<Tz>()
    {
        return Utc::now().with_timezone(&tz).naive_local();
    }
    Utc::now().naive_utc()
}

static GLUED_YEAR_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})(\d{1,2}:\d{2})").expect("glued year-time regex must be valid")
});

static GLUED_MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]{3,9})\.?(\d{1,2})(?:st|nd|rd|th)?,?(\d{4})")
        .expect("glued month-day-year regex must be valid")
});

static COMPOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:mon|tues|wednes|thurs|fri|satur|sun)day,?\s+)?([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})(?:\s+(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\.?)?$",
    )
    .expect("compound date regex must be valid")
});

static TIME_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\.?").expect("time regex must be valid")
});

static NUMERIC_YMD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b").expect("ymd regex must be valid")
});

static NUMERIC_AMBIGUOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[-/](\d{1,2})[-/](\d{2,4})\b").expect("numeric date regex must be valid")
});

static DATE_FRAGMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b\d{4}-\d{1,2}-\d{1,2}\b",
        r"\b\d{4}/\d{1,2}/\d{1,2}\b",
        r"\b\d{1,2}/\d{1,2}/\d{2,4}\b",
        r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
        r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?\b",
        r"(?i)\b(?:today|tonight|tomorrow)\b",
        r"(?i)\b(?:next|this)\s+(?:mon|tues|wednes|thurs|fri|satur|sun)day\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("date fragment regex must be valid"))
    .collect()
});

/// Finds the first date-looking substring in free text. Used by the
/// CSS-heuristic and text-mining extractors to decide whether a block
/// carries a date at all; the fragment is normalized later.
pub fn detect_date_fragment(text: &str) -> Option<String> {
    for regex in DATE_FRAGMENTS.iter() {
        if let Some(found) = regex.find(text) {
            return Some(found.as_str().to_string());
        }
    }
    None
}

/// Parses a heterogeneous date/time fragment into a timestamp.
/// Strategies run in order, first success wins; malformed input yields
/// `None` and never an error.
pub fn normalize(raw: &str, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return None;
    }

    let repaired = repair_glued(&text);
    let text = repaired.as_deref().unwrap_or(&text);

    compound_datetime(text)
        .or_else(|| fuzzy_datetime(text))
        .or_else(|| relative_datetime(text, reference))
        .or_else(|| numeric_datetime(text))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Repairs known concatenation bugs ("June 14, 20257:00 PM",
/// "June142025") by re-inserting separators, then lets the general
/// strategies take over.
fn repair_glued(text: &str) -> Option<String> {
    let mut repaired = text.to_string();
    let mut touched = false;

    if GLUED_YEAR_TIME.is_match(&repaired) {
        repaired = GLUED_YEAR_TIME.replace_all(&repaired, "$1 $2").into_owned();
        touched = true;
    }

    if GLUED_MONTH_DAY_YEAR.is_match(&repaired) {
        let candidate = GLUED_MONTH_DAY_YEAR
            .replace_all(&repaired, "$1 $2, $3")
            .into_owned();
        // Only keep the rewrite when the letters were really a month
        // name; "Hall22025" style strings stay untouched.
        if candidate
            .split_whitespace()
            .next()
            .and_then(month_number)
            .is_some()
        {
            repaired = candidate;
            touched = true;
        }
    }

    touched.then_some(repaired)
}

/// Weekday + month + day + year, optionally followed by a clock time.
fn compound_datetime(text: &str) -> Option<NaiveDateTime> {
    let caps = COMPOUND.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time = match caps.get(4) {
        Some(hour) => {
            let hour: u32 = hour.as_str().parse().ok()?;
            let minute: u32 = caps
                .get(5)
                .map(|m| m.as_str().parse().ok())
                .unwrap_or(Some(0))?;
            let pm = caps
                .get(6)
                .is_some_and(|m| m.as_str().eq_ignore_ascii_case("p"));
            clock_time(hour, minute, pm)?
        }
        None => NaiveTime::MIN,
    };

    Some(date.and_time(time))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d %Y %I:%M %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Permissive parse: tries RFC timestamps, then the format table against
/// the whole string, then against the first date-looking fragment so
/// extraneous text ("Doors open June 3, 2027!") does not defeat it.
fn fuzzy_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }

    if let Some(parsed) = try_formats(text) {
        return Some(parsed);
    }

    let fragment = detect_date_fragment(text)?;
    let fragment = fragment.trim_end_matches(['.', ',', '!']);
    let parsed = try_formats(fragment)?;

    // Carry an adjacent clock time along when the fragment itself had
    // none.
    if parsed.time() == NaiveTime::MIN
        && let Some(time) = time_of_day(text)
    {
        return Some(parsed.date().and_time(time));
    }

    Some(parsed)
}

fn try_formats(text: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// "today", "tonight", "tomorrow", "next friday", "this saturday",
/// "this weekend", "this week" resolved against the reference clock.
fn relative_datetime(text: &str, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    let lower = text.to_lowercase();
    let today = reference.date();
    let time = time_of_day(&lower);

    if lower.contains("tonight") {
        let time = time.unwrap_or_else(|| NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN));
        return Some(today.and_time(time));
    }
    if lower.contains("tomorrow") {
        return Some((today + Duration::days(1)).and_time(time.unwrap_or(NaiveTime::MIN)));
    }
    if lower.contains("today") {
        return Some(today.and_time(time.unwrap_or(NaiveTime::MIN)));
    }

    if let Some(weekday) = find_weekday(&lower) {
        let current = today.weekday().num_days_from_monday() as i64;
        let target = weekday.num_days_from_monday() as i64;
        let mut offset = target - current;

        if lower.contains("next") {
            // "next Friday" is always strictly in the future.
            if offset <= 0 {
                offset += 7;
            }
        } else if lower.contains("this") {
            // Current week's occurrence, rolling forward only once it
            // has already passed.
            if offset < 0 {
                offset += 7;
            }
        } else {
            return None;
        }

        return Some((today + Duration::days(offset)).and_time(time.unwrap_or(NaiveTime::MIN)));
    }

    if lower.contains("this weekend") {
        let current = today.weekday().num_days_from_monday() as i64;
        let mut offset = Weekday::Sat.num_days_from_monday() as i64 - current;
        if offset < 0 {
            offset += 7;
        }
        return Some((today + Duration::days(offset)).and_time(time.unwrap_or(NaiveTime::MIN)));
    }

    // "this week" with no named day anchors to the reference date.
    if lower.contains("this week") {
        return Some(today.and_time(time.unwrap_or(NaiveTime::MIN)));
    }

    None
}

/// Numeric fallback. Ambiguity rule: a component over 12 must be the
/// day; otherwise month-first (US convention).
fn numeric_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Some(caps) = NUMERIC_YMD.captures(text) {
        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let day: u32 = caps.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(NaiveTime::MIN));
    }

    let caps = NUMERIC_AMBIGUOUS.captures(text)?;
    let a: u32 = caps.get(1)?.as_str().parse().ok()?;
    let b: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year_raw: i32 = caps.get(3)?.as_str().parse().ok()?;
    let year = if year_raw < 100 { year_raw + 2000 } else { year_raw };

    let (month, day) = if a > 12 { (b, a) } else { (a, b) };
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(NaiveTime::MIN))
}

fn time_of_day(text: &str) -> Option<NaiveTime> {
    let caps = TIME_FRAGMENT.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    let pm = caps
        .get(3)
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("p"));
    clock_time(hour, minute, pm)
}

fn clock_time(hour: u32, minute: u32, pm: bool) -> Option<NaiveTime> {
    if hour == 0 || hour > 12 {
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour24, minute, 0)
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };

    // Reject words that merely start like a month ("Mayor", "Marathon").
    const FULL: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let ok = lower.len() <= 4 && FULL.iter().any(|m| m.starts_with(&lower))
        || FULL.contains(&lower.as_str())
        || lower == "sept";
    ok.then_some(month)
}

fn find_weekday(text: &str) -> Option<Weekday> {
    for (needle, weekday) in [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ] {
        if text.contains(needle) {
            return Some(weekday);
        }
    }
    None
}
