use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::model::db::{Meeting, MeetingCore};

/// Interpret a query parameter as milliseconds since the epoch.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::BadRequest(format!("Timestamp out of range: {millis}")))
}

/// Borrow the core of every meeting, for the aggregation functions.
pub fn cores(meetings: &[Meeting]) -> Vec<&MeetingCore> {
    meetings.iter().map(|meeting| &meeting.meeting).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::meeting::examples::nine_am;

    #[test]
    fn millis() {
        assert_eq!(from_millis(1704099600000).unwrap(), nine_am());
        assert!(matches!(from_millis(i64::MAX), Err(Error::BadRequest(_))));
    }
}
