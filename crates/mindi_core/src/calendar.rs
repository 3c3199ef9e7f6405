//! crates/mindi_core/src/calendar.rs
//!
//! Calendar arithmetic shared by the report workflow, the scheduler and the
//! weekly-status queries.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use uuid::Uuid;

use crate::domain::{ConversationLog, DayConversations, ReportPeriod};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
}

/// Every date in `[start, end]`, ascending. Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// The Monday-Sunday week containing `date`.
pub fn week_containing(date: NaiveDate) -> ReportPeriod {
    let offset = date.weekday().num_days_from_monday() as u64;
    let start = date - Days::new(offset);
    ReportPeriod {
        start_date: start,
        end_date: start + Days::new(6),
    }
}

/// The Monday-Sunday week that ended most recently before the week of `run_date`.
///
/// A run on any day of a week analyses the previous full week, so a Sunday run
/// does not include the day it runs on.
pub fn previous_week(run_date: NaiveDate) -> ReportPeriod {
    let back = run_date.weekday().num_days_from_monday() as u64 + 1;
    let end = run_date - Days::new(back);
    ReportPeriod {
        start_date: end - Days::new(6),
        end_date: end,
    }
}

/// The first instant strictly after `now` that falls on `weekday` at `at`.
pub fn next_weekly_run(now: NaiveDateTime, weekday: Weekday, at: NaiveTime) -> NaiveDateTime {
    let today = now.date();
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let candidate = (today + Days::new(ahead as u64)).and_time(at);
    if candidate > now {
        candidate
    } else {
        candidate + Days::new(7)
    }
}

/// Groups a user's logs into one bucket per day of `[start, end]`.
///
/// Buckets are produced for every day, empty or not. Logs belonging to other
/// users or falling outside the range are dropped, and each bucket is ordered
/// by creation time.
pub fn bucket_by_day(
    user_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    logs: Vec<ConversationLog>,
) -> Vec<DayConversations> {
    let mut buckets: Vec<DayConversations> = days_inclusive(start, end)
        .into_iter()
        .map(|date| DayConversations {
            date,
            conversations: Vec::new(),
        })
        .collect();

    for log in logs {
        if log.user_id != user_id || log.conversation_date < start || log.conversation_date > end {
            continue;
        }
        let index = (log.conversation_date - start).num_days() as usize;
        buckets[index].conversations.push(log);
    }

    for bucket in &mut buckets {
        bucket.conversations.sort_by_key(|log| log.created_at);
    }
    buckets
}
