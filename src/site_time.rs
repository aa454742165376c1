//! Wall-clock conversion for the site's configured UTC offset.
//!
//! Dates are stored and compared in UTC. Only form input and rendered dates go
//! through the site offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

const DISPLAY_FORMAT: &str = "%d %B %Y, %H:%M";
const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteTime {
    offset: FixedOffset,
}

impl Default for SiteTime {
    fn default() -> Self {
        Self::utc()
    }
}

impl SiteTime {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Accepts `UTC`, `Z` or a `+HH:MM` / `-HH:MM` offset.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
            return Some(Self::utc());
        }
        DateTime::parse_from_str(&format!("2000-01-01 00:00 {}", value), "%Y-%m-%d %H:%M %:z")
            .ok()
            .map(|dt| Self {
                offset: *dt.offset(),
            })
    }

    /// `UTC`, or the offset as `+03:00`.
    pub fn label(&self) -> String {
        if self.offset.local_minus_utc() == 0 {
            "UTC".to_owned()
        } else {
            self.offset.to_string()
        }
    }

    /// Site wall-clock time, as typed into a form, to stored UTC.
    pub fn to_utc(&self, local: NaiveDateTime) -> NaiveDateTime {
        local - Duration::seconds(i64::from(self.offset.local_minus_utc()))
    }

    pub fn to_local(&self, utc: NaiveDateTime) -> NaiveDateTime {
        self.offset.from_utc_datetime(&utc).naive_local()
    }

    pub fn display(&self, utc: NaiveDateTime) -> String {
        self.to_local(utc).format(DISPLAY_FORMAT).to_string()
    }

    /// Value for a `datetime-local` input.
    pub fn input_value(&self, utc: NaiveDateTime) -> String {
        self.to_local(utc).format(INPUT_FORMAT).to_string()
    }
}
