//! Schedule selection — which timeline event applies at a given instant.
//!
//! Candidates for "today" must be enabled, run on today's weekday and have
//! already started. Among them the highest `priority` wins, then the latest
//! `start_time`. What happens when nothing matched today is a
//! [`FallbackPolicy`].

use std::cmp::Ordering;

use chrono::{Days, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::time::{day_index_of, minute_of_day};
use crate::timeline::TimelineEvent;

/// What to do when no event started today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Nothing applies until today's first event starts.
    #[default]
    TodayOnly,
    /// Carry over the winning event of the most recent previous day that
    /// had one, looking back at most `days` days.
    LookBack { days: u8 },
}

/// Where the selected event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Today,
    /// Carried over from `days_ago` days before.
    CarriedOver { days_ago: u8 },
}

/// The event chosen for an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub event: &'a TimelineEvent,
    pub origin: Origin,
}

/// Ordering used for tie-breaks: priority first, then start time, both
/// descending. The smaller element in this order wins.
fn precedence(a: &TimelineEvent, b: &TimelineEvent) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.start_time.cmp(&a.start_time))
}

fn best_of<'a>(candidates: impl Iterator<Item = &'a TimelineEvent>) -> Option<&'a TimelineEvent> {
    candidates.min_by(|a, b| precedence(a, b))
}

/// Pick the event that applies at wall-clock time `at`.
#[must_use]
pub fn select_event(
    events: &[TimelineEvent],
    at: NaiveDateTime,
    policy: FallbackPolicy,
) -> Option<Selection<'_>> {
    let today = day_index_of(at);
    let minute = minute_of_day(at);

    let today_best = best_of(
        events
            .iter()
            .filter(|ev| ev.enabled && ev.runs_on(today) && ev.start_time <= minute),
    );
    if let Some(event) = today_best {
        return Some(Selection {
            event,
            origin: Origin::Today,
        });
    }

    let FallbackPolicy::LookBack { days } = policy else {
        return None;
    };

    (1..=days.min(7)).find_map(|days_ago| {
        let day = day_index_of(at.checked_sub_days(Days::new(u64::from(days_ago)))?);
        best_of(events.iter().filter(|ev| ev.enabled && ev.runs_on(day))).map(|event| {
            Selection {
                event,
                origin: Origin::CarriedOver { days_ago },
            }
        })
    })
}
