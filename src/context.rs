use chrono::{DateTime, TimeZone, Utc};

/// Evaluation context injected into every engine call.
/// Callers hold `current_date` fixed for the duration of one evaluation so
/// that variable resolution stays deterministic.
#[derive(Clone, Debug)]
pub struct Context {
    /// The "now" every date variable resolves against (UTC calendar fields).
    pub current_date: DateTime<Utc>,
    /// Reserved for future knobs; built-in variables render English names.
    pub locale: Option<String>,
    /// Reserved for future knobs; all built-in arithmetic is UTC.
    pub timezone: Option<String>,
}

impl Context {
    /// Context pinned to a specific instant. The normal constructor for
    /// tests and reproducible evaluations.
    pub fn fixed(current_date: DateTime<Utc>) -> Self {
        Self {
            current_date,
            locale: None,
            timezone: None,
        }
    }

    /// Context pinned to the wall clock at call time.
    pub fn now() -> Self {
        Self::fixed(Utc::now())
    }

    /// Convenience for `fixed` from a calendar date at UTC midnight.
    /// Returns `None` for out-of-range dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .map(Self::fixed)
    }
}
