use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Current time in the station's display timezone
pub fn now_in(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// Render a UTC instant for the operator in the display timezone
pub fn display_stamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .format("%Y-%m-%d %H:%M:%S %z")
        .to_string()
}
