use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};

use crate::model::{ArrivalItem, TimeSource};

/// Approximates the current time as the last server reference plus local ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceClock {
    pub server_now: DateTime<Utc>,
    pub ticks: u64,
}

impl ReferenceClock {
    pub fn new(server_now: DateTime<Utc>) -> Self {
        ReferenceClock {
            server_now,
            ticks: 0,
        }
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn reset(&mut self, server_now: DateTime<Utc>) {
        *self = ReferenceClock::new(server_now);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.server_now + chrono::Duration::seconds(self.ticks as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedItem {
    pub item: ArrivalItem,
    pub eta_seconds: u64,
}

pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Whole seconds from `now` until `time` on the local date of `now`, rounded
/// half up and floored at zero.
pub fn seconds_until(time: NaiveTime, now: DateTime<Utc>, offset: FixedOffset) -> u64 {
    let local_date = now.with_timezone(&offset).date_naive();
    let Some(target) = offset.from_local_datetime(&local_date.and_time(time)).single() else {
        return 0;
    };
    let millis = (target.with_timezone(&Utc) - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    ((millis + 500) / 1000) as u64
}

/// Minute-granularity estimates lose the sub-minute tick phase and restart at
/// the full value every 60 ticks.
pub fn seconds_from_minutes(minutes: i64, ticks: u64) -> u64 {
    let phase = (ticks % 60) as i64;
    minutes.saturating_mul(60).saturating_sub(phase).max(0) as u64
}

pub fn eta_seconds(item: &ArrivalItem, reference: &ReferenceClock, offset: FixedOffset) -> u64 {
    match item.time_source() {
        Some(TimeSource::Scheduled(raw)) => match parse_time_of_day(raw) {
            Some(time) => seconds_until(time, reference.now(), offset),
            None => {
                log::debug!("Unparseable scheduled time {:?} for route {}", raw, item.route_id);
                item.arrival_in_minutes
                    .map(|minutes| seconds_from_minutes(minutes, reference.ticks))
                    .unwrap_or(0)
            }
        },
        Some(TimeSource::InMinutes(minutes)) => seconds_from_minutes(minutes, reference.ticks),
        None => 0,
    }
}

/// Computes every item's ETA and sorts ascending. The sort is stable, so equal
/// ETAs keep their snapshot order.
pub fn project(
    items: &[ArrivalItem],
    reference: &ReferenceClock,
    offset: FixedOffset,
) -> Vec<ProjectedItem> {
    let mut projected: Vec<ProjectedItem> = items
        .iter()
        .map(|item| ProjectedItem {
            item: item.clone(),
            eta_seconds: eta_seconds(item, reference, offset),
        })
        .collect();
    projected.sort_by_key(|projected| projected.eta_seconds);
    projected
}
