//! Scheduling utilities used by calendar-style workers.
//!
//! - [`overlaps`] is the pure conflict check over half-open `[start, end)` intervals.
//! - [`parse_day`] and [`parse_time_range`] turn phrases like
//!   "tomorrow 2:30-3:30pm" into an [`Interval`].
//!
//! Nothing in here touches session state or the engine.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Duration used when a request names a start time but no end.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

/// A half-open `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    fn intersects(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Returns every interval in `existing` that intersects `candidate`.
///
/// Zero-duration intervals never conflict, and neither do intervals that only
/// touch at a boundary.
pub fn overlaps(existing: &[Interval], candidate: &Interval) -> Vec<Interval> {
    if candidate.is_empty() {
        return Vec::new();
    }

    existing
        .iter()
        .filter(|e| !e.is_empty() && e.intersects(candidate))
        .copied()
        .collect()
}

// ============= Phrase Parsing =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
    has_minutes: bool,
}

impl Clock {
    fn with_meridiem(self, meridiem: Meridiem) -> Self {
        Self {
            meridiem: Some(meridiem),
            ..self
        }
    }

    fn is_explicit(&self) -> bool {
        self.meridiem.is_some() || self.has_minutes
    }

    fn to_time(self) -> Option<NaiveTime> {
        let hour = match self.meridiem {
            Some(Meridiem::Pm) if self.hour < 12 => self.hour + 12,
            Some(Meridiem::Am) if self.hour == 12 => 0,
            _ => self.hour,
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }
}

fn parse_clock(raw: &str) -> Option<Clock> {
    let raw = raw.trim();
    let (digits, meridiem) = if let Some(rest) = raw.strip_suffix("pm") {
        (rest, Some(Meridiem::Pm))
    } else if let Some(rest) = raw.strip_suffix("am") {
        (rest, Some(Meridiem::Am))
    } else {
        (raw, None)
    };

    let (hour, minute, has_minutes) = match digits.split_once(':') {
        Some((h, m)) => {
            if m.len() != 2 {
                return None;
            }
            (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?, true)
        }
        None => (digits.parse::<u32>().ok()?, 0, false),
    };

    let hour_ok = match meridiem {
        Some(_) => (1..=12).contains(&hour),
        None => hour <= 23,
    };
    if !hour_ok || minute > 59 {
        return None;
    }

    Some(Clock {
        hour,
        minute,
        meridiem,
        has_minutes,
    })
}

/// Resolve a start/end pair, letting a bare start borrow the end's meridiem
/// ("2-3pm"), but falling back to am when that would invert the range ("11-1pm").
fn resolve_range(start: Clock, end: Clock) -> Option<(NaiveTime, NaiveTime)> {
    if !start.is_explicit() && !end.is_explicit() {
        return None;
    }

    let end_time = end.to_time()?;
    let candidates = match (start.meridiem, end.meridiem) {
        (None, Some(m)) if !start.has_minutes || start.hour <= 12 => {
            let other = if m == Meridiem::Pm {
                Meridiem::Am
            } else {
                Meridiem::Pm
            };
            vec![start.with_meridiem(m), start.with_meridiem(other)]
        }
        _ => vec![start],
    };

    candidates
        .into_iter()
        .filter_map(Clock::to_time)
        .find(|s| *s < end_time)
        .map(|s| (s, end_time))
}

/// Lowercase the text, glue detached meridiems onto their numbers and
/// collapse spaced dashes so ranges become single tokens.
fn normalize(text: &str) -> Vec<String> {
    let lowered = text
        .to_lowercase()
        .replace(&['–', '—'][..], "-")
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace(" - ", "-");

    let mut tokens: Vec<String> = Vec::new();
    for word in lowered.split_whitespace() {
        let word = word.trim_matches(|c: char| matches!(c, ',' | '.' | '?' | '!' | ';' | '(' | ')'));
        if word.is_empty() {
            continue;
        }
        if matches!(word, "am" | "pm") {
            if let Some(last) = tokens.last_mut() {
                if last.chars().last().is_some_and(|c| c.is_ascii_digit()) {
                    last.push_str(word);
                    continue;
                }
            }
        }
        tokens.push(word.to_string());
    }
    tokens
}

/// Extract a time-of-day range from free text.
///
/// Accepts `2-3pm`, `2:30-3:30pm`, `14:00-15:00`, `2pm to 3pm`, and single
/// start times (`at 4pm`, `at 9`) which get a one hour duration.
pub fn parse_time_range(text: &str) -> Option<(NaiveTime, NaiveTime)> {
    let tokens = normalize(text);

    for (i, token) in tokens.iter().enumerate() {
        if let Some((a, b)) = token.split_once('-') {
            if let (Some(start), Some(end)) = (parse_clock(a), parse_clock(b)) {
                if let Some(range) = resolve_range(start, end) {
                    return Some(range);
                }
            }
            continue;
        }

        let Some(start) = parse_clock(token) else {
            continue;
        };

        let joiner = tokens.get(i + 1).map(String::as_str);
        if matches!(joiner, Some("to" | "until" | "till")) {
            if let Some(end) = tokens.get(i + 2).and_then(|t| parse_clock(t)) {
                if let Some(range) = resolve_range(start, end) {
                    return Some(range);
                }
            }
        }

        let after_at = i > 0 && tokens[i - 1] == "at";
        if start.is_explicit() || after_at {
            let start_time = start.to_time()?;
            let end_time =
                start_time.overflowing_add_signed(Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES));
            if end_time.1 != 0 {
                // Runs past midnight.
                return None;
            }
            return Some((start_time, end_time.0));
        }
    }

    None
}

fn weekday_from_word(word: &str) -> Option<Weekday> {
    match word {
        "monday" => Some(Weekday::Mon),
        "tuesday" | "tues" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" | "thurs" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Extract the day a request refers to, relative to `today`.
///
/// Understands `today`, `tomorrow`, weekday names (`friday`, `next friday`)
/// and ISO dates (`2026-03-14`).
pub fn parse_day(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens = normalize(text);

    for (i, token) in tokens.iter().enumerate() {
        match token.as_str() {
            "today" | "tonight" => return Some(today),
            "tomorrow" => return today.succ_opt(),
            _ => {}
        }

        if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            return Some(date);
        }

        if let Some(weekday) = weekday_from_word(token) {
            let current = today.weekday().num_days_from_monday() as i64;
            let target = weekday.num_days_from_monday() as i64;
            let mut ahead = (target - current).rem_euclid(7);
            if i > 0 && tokens[i - 1] == "next" && ahead == 0 {
                ahead = 7;
            }
            return today.checked_add_signed(Duration::days(ahead));
        }
    }

    None
}

/// Combine [`parse_day`] and [`parse_time_range`]; the day defaults to `today`.
pub fn parse_event_window(text: &str, today: NaiveDate) -> Option<Interval> {
    let (start, end) = parse_time_range(text)?;
    let day = parse_day(text, today).unwrap_or(today);
    Interval::new(day.and_time(start), day.and_time(end))
}
