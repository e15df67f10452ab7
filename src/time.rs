use chrono::NaiveDate;

/// Minutes since local midnight in the league's timezone.
pub type Minutes = u32;

const MINUTES_PER_DAY: Minutes = 24 * 60;

/// Half-open time-of-day range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Minutes,
    pub end: Minutes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    BadDate(String),
    BadTime { field: &'static str, value: String },
    EmptyRange { start: String, end: String },
}

impl std::fmt::Display for TimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeError::BadDate(v) => write!(f, "gameDate must be YYYY-MM-DD, got {v:?}"),
            TimeError::BadTime { field, value } => {
                write!(f, "{field} must be HH:MM, got {value:?}")
            }
            TimeError::EmptyRange { start, end } => {
                write!(f, "startTime {start} must be before endTime {end}")
            }
        }
    }
}

impl std::error::Error for TimeError {}

impl TimeRange {
    /// Parse a pair of `HH:MM` strings. Fails unless `start < end`.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        let s = parse_minutes(start).ok_or_else(|| TimeError::BadTime {
            field: "startTime",
            value: start.to_string(),
        })?;
        let e = parse_minutes(end).ok_or_else(|| TimeError::BadTime {
            field: "endTime",
            value: end.to_string(),
        })?;
        if s >= e {
            return Err(TimeError::EmptyRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start: s, end: e })
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// `"18:30"` → `1110`. Hours may be one or two digits, minutes exactly two.
pub fn parse_minutes(s: &str) -> Option<Minutes> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: Minutes = h.parse().ok()?;
    let m: Minutes = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

pub fn format_minutes(m: Minutes) -> String {
    let m = m % MINUTES_PER_DAY;
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Calendar date, no timezone conversion.
pub fn parse_game_date(s: &str) -> Result<NaiveDate, TimeError> {
    let trimmed = s.trim();
    if trimmed.len() != 10 {
        return Err(TimeError::BadDate(s.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| TimeError::BadDate(s.to_string()))
}

pub fn format_game_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
