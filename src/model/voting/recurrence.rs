use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::Identity, db::NewMeeting};

/// The most occurrences a single expansion may produce.
pub const MAX_OCCURRENCES: u32 = 366;

/// How a meeting repeats.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatRule {
    Once,
    /// Monday to Friday.
    EveryWeekday,
    Weekly,
    Biweekly,
    FourWeekly,
    /// Same day of the month, clamped to the month's last day.
    Monthly,
}

/// The parts every occurrence of a meeting shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingTemplate {
    pub meeting_name: String,
    pub participants: BTreeSet<Identity>,
}

impl RepeatRule {
    /// The local calendar date of the `index`th occurrence, for fixed-step rules.
    fn nth_date(self, anchor: NaiveDate, index: u32) -> Option<NaiveDate> {
        let days = |step: i64| anchor.checked_add_signed(Duration::days(step * i64::from(index)));
        match self {
            Self::Once => (index == 0).then_some(anchor),
            Self::Weekly => days(7),
            Self::Biweekly => days(14),
            Self::FourWeekly => days(28),
            Self::Monthly => anchor.checked_add_months(Months::new(index)),
            Self::EveryWeekday => None,
        }
    }
}

/// The local dates of `count` occurrences starting at `anchor`.
fn occurrence_dates(rule: RepeatRule, anchor: NaiveDate, count: u32) -> Result<Vec<NaiveDate>> {
    let overflow = || Error::InvalidRecurrence("Occurrence date is out of range".to_string());
    match rule {
        RepeatRule::Once => Ok(vec![anchor]),
        RepeatRule::EveryWeekday => {
            // The anchor always counts, even at a weekend.
            let mut dates = vec![anchor];
            let mut date = anchor;
            while dates.len() < count as usize {
                date = date.succ_opt().ok_or_else(overflow)?;
                if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                    dates.push(date);
                }
            }
            Ok(dates)
        }
        _ => (0..count)
            .map(|i| rule.nth_date(anchor, i).ok_or_else(overflow))
            .collect(),
    }
}

/// Expand a template into its occurrences, earliest first.
///
/// Calendar arithmetic is done on the anchor's local date in its time zone,
/// keeping the local time of day. Each occurrence gets its own voting window
/// and an empty ledger. Either every occurrence is produced or none is.
pub fn expand<Tz: TimeZone>(
    template: &MeetingTemplate,
    rule: RepeatRule,
    count: u32,
    anchor: DateTime<Tz>,
    now: DateTime<Utc>,
) -> Result<Vec<NewMeeting>> {
    if count == 0 {
        return Err(Error::InvalidRecurrence(
            "Occurrence count must be positive".to_string(),
        ));
    }
    if count > MAX_OCCURRENCES {
        return Err(Error::InvalidRecurrence(format!(
            "At most {MAX_OCCURRENCES} occurrences can be created at once"
        )));
    }

    let tz = anchor.timezone();
    let local = anchor.naive_local();
    occurrence_dates(rule, local.date(), count)?
        .into_iter()
        .map(|date| {
            let naive = date.and_time(local.time());
            let start_time = tz
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| {
                    Error::InvalidRecurrence(format!("{naive} does not exist in this time zone"))
                })?
                .with_timezone(&Utc);
            NewMeeting::new(
                template.meeting_name.clone(),
                start_time,
                template.participants.iter().cloned(),
                now,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::FixedOffset;

    use crate::model::db::meeting::examples::{nine_am, DAVE, RICK};

    fn template() -> MeetingTemplate {
        MeetingTemplate {
            meeting_name: "Planning".to_string(),
            participants: [RICK, DAVE].map(String::from).into_iter().collect(),
        }
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    fn starts(meetings: &[NewMeeting]) -> Vec<DateTime<Utc>> {
        meetings.iter().map(|m| m.start_time).collect()
    }

    #[test]
    fn weekly() {
        let meetings = expand(&template(), RepeatRule::Weekly, 4, utc(2024, 1, 1), nine_am()).unwrap();
        assert_eq!(
            starts(&meetings),
            vec![utc(2024, 1, 1), utc(2024, 1, 8), utc(2024, 1, 15), utc(2024, 1, 22)]
        );
        for meeting in &meetings {
            assert_eq!(meeting.voting_start_time, meeting.start_time - Duration::minutes(5));
            assert_eq!(meeting.voting_end_time, meeting.start_time + Duration::minutes(5));
            assert!(meeting.votes.is_empty());
            assert!(meeting.winner.is_none());
            assert!(!meeting.winner_declared);
            assert_eq!(meeting.participants, template().participants);
        }
    }

    #[test]
    fn longer_steps() {
        let anchor = utc(2024, 1, 1);
        let biweekly = expand(&template(), RepeatRule::Biweekly, 3, anchor, nine_am()).unwrap();
        assert_eq!(
            starts(&biweekly),
            vec![anchor, utc(2024, 1, 15), utc(2024, 1, 29)]
        );
        let four_weekly = expand(&template(), RepeatRule::FourWeekly, 2, anchor, nine_am()).unwrap();
        assert_eq!(starts(&four_weekly), vec![anchor, utc(2024, 1, 29)]);
    }

    #[test]
    fn once_ignores_count() {
        let meetings = expand(&template(), RepeatRule::Once, 5, utc(2024, 3, 1), nine_am()).unwrap();
        assert_eq!(starts(&meetings), vec![utc(2024, 3, 1)]);
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let leap = expand(&template(), RepeatRule::Monthly, 2, utc(2024, 1, 31), nine_am()).unwrap();
        assert_eq!(starts(&leap), vec![utc(2024, 1, 31), utc(2024, 2, 29)]);

        let common = expand(&template(), RepeatRule::Monthly, 2, utc(2023, 1, 31), nine_am()).unwrap();
        assert_eq!(starts(&common), vec![utc(2023, 1, 31), utc(2023, 2, 28)]);

        // Each month is offset from the anchor, not from the clamped month before.
        let months = expand(&template(), RepeatRule::Monthly, 3, utc(2024, 1, 31), nine_am()).unwrap();
        assert_eq!(starts(&months)[2], utc(2024, 3, 31));
    }

    #[test]
    fn weekdays_skip_weekends() {
        // Thursday 2024-01-04.
        let meetings =
            expand(&template(), RepeatRule::EveryWeekday, 4, utc(2024, 1, 4), nine_am()).unwrap();
        assert_eq!(
            starts(&meetings),
            vec![utc(2024, 1, 4), utc(2024, 1, 5), utc(2024, 1, 8), utc(2024, 1, 9)]
        );
    }

    #[test]
    fn weekend_anchor_is_kept() {
        // Saturday 2024-01-06.
        let meetings =
            expand(&template(), RepeatRule::EveryWeekday, 3, utc(2024, 1, 6), nine_am()).unwrap();
        assert_eq!(
            starts(&meetings),
            vec![utc(2024, 1, 6), utc(2024, 1, 8), utc(2024, 1, 9)]
        );
    }

    #[test]
    fn local_calendar_is_used() {
        // 00:30 on the 31st in UTC+2 is still the 30th in UTC.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let anchor = tz.with_ymd_and_hms(2024, 1, 31, 0, 30, 0).unwrap();
        let meetings = expand(&template(), RepeatRule::Monthly, 2, anchor, nine_am()).unwrap();
        let expected = tz.with_ymd_and_hms(2024, 2, 29, 0, 30, 0).unwrap();
        assert_eq!(meetings[1].start_time, expected.with_timezone(&Utc));
    }

    #[test]
    fn rejects_bad_input() {
        let anchor = utc(2024, 1, 1);
        for count in [0, MAX_OCCURRENCES + 1] {
            let err = expand(&template(), RepeatRule::Weekly, count, anchor, nine_am()).unwrap_err();
            assert!(matches!(err, Error::InvalidRecurrence(_)));
        }
        assert_eq!(
            expand(&template(), RepeatRule::Weekly, MAX_OCCURRENCES, anchor, nine_am())
                .unwrap()
                .len(),
            MAX_OCCURRENCES as usize
        );

        let nameless = MeetingTemplate {
            meeting_name: "  ".to_string(),
            ..template()
        };
        let err = expand(&nameless, RepeatRule::Weekly, 2, anchor, nine_am()).unwrap_err();
        assert!(matches!(err, Error::InvalidMeeting(_)));

        let empty = MeetingTemplate {
            participants: BTreeSet::new(),
            ..template()
        };
        let err = expand(&empty, RepeatRule::Once, 1, anchor, nine_am()).unwrap_err();
        assert!(matches!(err, Error::InvalidMeeting(_)));
    }

    #[test]
    fn rule_names() {
        let rules: Vec<RepeatRule> =
            rocket::serde::json::serde_json::from_str(r#"["once", "every_weekday", "four_weekly", "monthly"]"#).unwrap();
        assert_eq!(
            rules,
            vec![
                RepeatRule::Once,
                RepeatRule::EveryWeekday,
                RepeatRule::FourWeekly,
                RepeatRule::Monthly
            ]
        );
    }
}
