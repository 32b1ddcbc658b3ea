use crate::model::{OneTimeReminder, RecurrenceUnit, RecurringReminder, Reminder, TimeOfDay};
use time::{Duration, OffsetDateTime, Time};

/// Days scanned forward when looking for the next weekly slot.
const WEEKLY_SCAN_DAYS: i64 = 14;

/// Whether `reminder` is due at `now`.
///
/// One-time reminders fire only inside their own calendar minute; a minute
/// that was slept through is never caught up. Hourly reminders fire once
/// `every` hours have elapsed since the last firing. Daily and weekly
/// reminders fire only when `now` sits on their time-of-day minute (and, for
/// weekly ones, on a selected weekday) and the elapsed-interval floor has
/// passed.
pub fn should_fire(reminder: &Reminder, now: OffsetDateTime) -> bool {
    match reminder {
        Reminder::Once(once) => should_fire_once(once, now),
        Reminder::Recurring(recurring) => should_fire_recurring(recurring, now),
    }
}

fn should_fire_once(reminder: &OneTimeReminder, now: OffsetDateTime) -> bool {
    if reminder.fired {
        return false;
    }
    reminder
        .datetime
        .is_some_and(|datetime| same_minute(now, datetime))
}

fn should_fire_recurring(reminder: &RecurringReminder, now: OffsetDateTime) -> bool {
    if reminder.unit == RecurrenceUnit::Hours {
        return floor_passed(reminder, now);
    }

    if now.hour() != reminder.time.hour || now.minute() != reminder.time.minute {
        return false;
    }

    if reminder.unit == RecurrenceUnit::Weeks && !weekday_selected(reminder, now) {
        return false;
    }

    floor_passed(reminder, now)
}

/// Advisory next due instant, for display only.
pub fn next_fire_time(reminder: &Reminder, now: OffsetDateTime) -> Option<OffsetDateTime> {
    match reminder {
        Reminder::Once(once) => {
            if once.fired {
                return None;
            }
            once.datetime
                .filter(|datetime| *datetime > now)
                .map(|datetime| datetime.to_offset(now.offset()))
        }
        Reminder::Recurring(recurring) => match recurring.unit {
            RecurrenceUnit::Hours => next_hourly(recurring, now),
            RecurrenceUnit::Days => next_daily(recurring, now),
            RecurrenceUnit::Weeks => next_weekly(recurring, now),
        },
    }
}

/// Earliest instant the interval floor allows, in `now`'s offset.
///
/// `Err(())` when the floor lies beyond the representable range; such a
/// reminder has no next fire time.
fn earliest_after_floor(
    reminder: &RecurringReminder,
    now: OffsetDateTime,
) -> Result<Option<OffsetDateTime>, ()> {
    match reminder.last_fired {
        None => Ok(None),
        Some(last_fired) => last_fired
            .to_offset(now.offset())
            .checked_add(interval(reminder))
            .map(Some)
            .ok_or(()),
    }
}

fn next_hourly(reminder: &RecurringReminder, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let earliest = earliest_after_floor(reminder, now).ok()?;
    Some(earliest.map_or(now, |next| next.max(now)))
}

fn next_daily(reminder: &RecurringReminder, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let earliest = earliest_after_floor(reminder, now).ok()?;
    let slot = slot_time(reminder.time);
    let mut candidate = now.replace_time(slot);
    if candidate <= now {
        candidate = candidate.checked_add(Duration::DAY)?;
    }

    if let Some(earliest) = earliest.map(|earliest| earliest.replace_time(slot))
        && earliest > candidate
    {
        return Some(earliest);
    }

    Some(candidate)
}

fn next_weekly(reminder: &RecurringReminder, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let days = reminder.days_of_week.as_deref().filter(|days| !days.is_empty())?;
    let earliest = earliest_after_floor(reminder, now).ok()?;
    let slot = slot_time(reminder.time);

    (0..=WEEKLY_SCAN_DAYS)
        .filter_map(|offset| now.checked_add(Duration::days(offset)))
        .map(|day| day.replace_time(slot))
        .filter(|candidate| *candidate > now)
        .filter(|candidate| days.contains(&candidate.weekday().number_days_from_sunday()))
        .find(|candidate| earliest.is_none_or(|earliest| *candidate >= earliest))
}

fn same_minute(now: OffsetDateTime, other: OffsetDateTime) -> bool {
    let other = other.to_offset(now.offset());
    now.date() == other.date() && now.hour() == other.hour() && now.minute() == other.minute()
}

fn weekday_selected(reminder: &RecurringReminder, now: OffsetDateTime) -> bool {
    let today = now.weekday().number_days_from_sunday();
    reminder
        .days_of_week
        .as_deref()
        .is_some_and(|days| days.contains(&today))
}

fn floor_passed(reminder: &RecurringReminder, now: OffsetDateTime) -> bool {
    match reminder.last_fired {
        None => true,
        Some(last_fired) => now - last_fired >= interval(reminder),
    }
}

fn interval(reminder: &RecurringReminder) -> Duration {
    let every = i64::from(reminder.every.get());
    match reminder.unit {
        RecurrenceUnit::Hours => Duration::hours(every),
        RecurrenceUnit::Days => Duration::days(every),
        RecurrenceUnit::Weeks => Duration::weeks(every),
    }
}

fn slot_time(time_of_day: TimeOfDay) -> Time {
    Time::from_hms(time_of_day.hour, time_of_day.minute, 0).unwrap_or(Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use super::{next_fire_time, should_fire};
    use crate::model::{
        OneTimeReminder, RecurrenceUnit, RecurringReminder, Reminder, TimeOfDay,
    };
    use std::num::NonZeroU32;
    use time::macros::{datetime, offset};
    use time::{Duration, OffsetDateTime};

    fn once(datetime: OffsetDateTime, fired: bool) -> Reminder {
        Reminder::Once(OneTimeReminder {
            id: "r1".to_string(),
            datetime: Some(datetime),
            fired,
        })
    }

    fn recurring(
        unit: RecurrenceUnit,
        every: u32,
        time: &str,
        days_of_week: Option<Vec<u8>>,
        last_fired: Option<OffsetDateTime>,
    ) -> Reminder {
        Reminder::Recurring(RecurringReminder {
            id: "r1".to_string(),
            unit,
            every: NonZeroU32::new(every).unwrap(),
            time: time.parse::<TimeOfDay>().unwrap(),
            days_of_week,
            last_fired,
        })
    }

    #[test]
    fn one_time_fires_within_its_minute() {
        let reminder = once(datetime!(2024-06-01 09:00:00 UTC), false);

        assert!(should_fire(&reminder, datetime!(2024-06-01 09:00:30 UTC)));
        assert!(should_fire(&reminder, datetime!(2024-06-01 09:00:59.999 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-01 09:01:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-01 08:59:59 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-02 09:00:00 UTC)));
    }

    #[test]
    fn one_time_compares_in_the_local_offset() {
        let reminder = once(datetime!(2024-06-01 09:00:00 UTC), false);
        let local_now = datetime!(2024-06-01 11:00:10 +02:00);
        assert!(should_fire(&reminder, local_now));
    }

    #[test]
    fn fired_or_blank_one_time_never_fires() {
        let at = datetime!(2024-06-01 09:00:00 UTC);
        assert!(!should_fire(&once(at, true), at));

        let blank = Reminder::one_time();
        assert!(!should_fire(&blank, at));
    }

    #[test]
    fn hourly_without_last_fired_always_fires() {
        let reminder = recurring(RecurrenceUnit::Hours, 3, "09:00", None, None);
        assert!(should_fire(&reminder, datetime!(2024-06-01 00:00 UTC)));
        assert!(should_fire(&reminder, datetime!(2031-12-31 23:59:59 UTC)));
    }

    #[test]
    fn hourly_fires_on_the_elapsed_boundary() {
        let last = datetime!(2024-06-01 10:00:00 UTC);
        let reminder = recurring(RecurrenceUnit::Hours, 2, "09:00", None, Some(last));

        assert!(should_fire(&reminder, datetime!(2024-06-01 12:00:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-01 11:59:00 UTC)));
        assert!(!should_fire(
            &reminder,
            last + Duration::hours(2) - Duration::milliseconds(1)
        ));
        assert!(should_fire(&reminder, datetime!(2024-06-03 04:17:00 UTC)));
    }

    #[test]
    fn daily_fires_only_on_its_minute() {
        let reminder = recurring(RecurrenceUnit::Days, 1, "09:00", None, None);

        assert!(should_fire(&reminder, datetime!(2024-06-01 09:00:00 UTC)));
        assert!(should_fire(&reminder, datetime!(2025-01-17 09:00:45 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-01 09:01:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-01 08:59:00 UTC)));
    }

    #[test]
    fn daily_respects_the_interval_floor() {
        let last = datetime!(2024-06-01 09:00:00 UTC);
        let reminder = recurring(RecurrenceUnit::Days, 2, "09:00", None, Some(last));

        assert!(!should_fire(&reminder, datetime!(2024-06-02 09:00:00 UTC)));
        assert!(should_fire(&reminder, datetime!(2024-06-03 09:00:00 UTC)));
    }

    #[test]
    fn weekly_requires_a_selected_day() {
        let reminder = recurring(RecurrenceUnit::Weeks, 1, "09:00", Some(vec![1, 3]), None);

        // 2024-06-03 is a Monday.
        assert!(should_fire(&reminder, datetime!(2024-06-03 09:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-04 09:00 UTC)));
        assert!(should_fire(&reminder, datetime!(2024-06-05 09:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-03 09:01 UTC)));
    }

    #[test]
    fn weekly_with_empty_or_absent_days_never_fires() {
        let monday = datetime!(2024-06-03 09:00 UTC);
        let empty = recurring(RecurrenceUnit::Weeks, 1, "09:00", Some(Vec::new()), None);
        let absent = recurring(RecurrenceUnit::Weeks, 1, "09:00", None, None);

        assert!(!should_fire(&empty, monday));
        assert!(!should_fire(&absent, monday));
        assert_eq!(next_fire_time(&empty, monday), None);
        assert_eq!(next_fire_time(&absent, monday), None);
    }

    #[test]
    fn weekly_respects_the_interval_floor() {
        let last = datetime!(2024-06-03 09:00 UTC);
        let reminder = recurring(RecurrenceUnit::Weeks, 1, "09:00", Some(vec![1, 3]), Some(last));

        assert!(!should_fire(&reminder, datetime!(2024-06-05 09:00 UTC)));
        assert!(should_fire(&reminder, datetime!(2024-06-10 09:00 UTC)));
    }

    #[test]
    fn next_fire_time_for_one_time() {
        let at = datetime!(2024-06-01 09:00 UTC);
        let before = datetime!(2024-06-01 08:00 UTC);

        assert_eq!(next_fire_time(&once(at, false), before), Some(at));
        assert_eq!(next_fire_time(&once(at, false), at), None);
        assert_eq!(next_fire_time(&once(at, true), before), None);
    }

    #[test]
    fn next_fire_time_for_hours() {
        let now = datetime!(2024-06-01 12:30 UTC);
        let never = recurring(RecurrenceUnit::Hours, 2, "09:00", None, None);
        assert_eq!(next_fire_time(&never, now), Some(now));

        let recent = recurring(
            RecurrenceUnit::Hours,
            2,
            "09:00",
            None,
            Some(datetime!(2024-06-01 12:00 UTC)),
        );
        assert_eq!(next_fire_time(&recent, now), Some(datetime!(2024-06-01 14:00 UTC)));

        let stale = recurring(
            RecurrenceUnit::Hours,
            2,
            "09:00",
            None,
            Some(datetime!(2024-05-30 12:00 UTC)),
        );
        assert_eq!(next_fire_time(&stale, now), Some(now));
    }

    #[test]
    fn next_fire_time_for_days() {
        let reminder = recurring(RecurrenceUnit::Days, 1, "09:00", None, None);

        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-01 08:00 UTC)),
            Some(datetime!(2024-06-01 09:00 UTC))
        );
        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-01 09:00 UTC)),
            Some(datetime!(2024-06-02 09:00 UTC))
        );

        let every_three = recurring(
            RecurrenceUnit::Days,
            3,
            "09:00",
            None,
            Some(datetime!(2024-06-01 09:00 UTC)),
        );
        assert_eq!(
            next_fire_time(&every_three, datetime!(2024-06-01 10:00 UTC)),
            Some(datetime!(2024-06-04 09:00 UTC))
        );
    }

    #[test]
    fn next_fire_time_for_days_uses_the_local_offset() {
        let reminder = recurring(RecurrenceUnit::Days, 1, "09:00", None, None);
        let now = datetime!(2024-06-01 08:00 +02:00);
        let next = next_fire_time(&reminder, now).unwrap();

        assert_eq!(next.offset(), offset!(+02:00));
        assert_eq!(next, datetime!(2024-06-01 09:00 +02:00));
    }

    #[test]
    fn next_fire_time_for_weeks() {
        let reminder = recurring(RecurrenceUnit::Weeks, 1, "09:00", Some(vec![1, 3]), None);

        // Saturday -> Monday.
        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-01 10:00 UTC)),
            Some(datetime!(2024-06-03 09:00 UTC))
        );
        // Monday after the slot -> Wednesday.
        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-03 09:00 UTC)),
            Some(datetime!(2024-06-05 09:00 UTC))
        );

        let fortnightly = recurring(
            RecurrenceUnit::Weeks,
            2,
            "09:00",
            Some(vec![1]),
            Some(datetime!(2024-06-03 09:00 UTC)),
        );
        assert_eq!(
            next_fire_time(&fortnightly, datetime!(2024-06-03 09:05 UTC)),
            Some(datetime!(2024-06-17 09:00 UTC))
        );
    }

    #[test]
    fn huge_intervals_have_no_next_fire_time() {
        let last = Some(datetime!(2024-06-01 09:00 UTC));
        let now = datetime!(2024-06-01 10:00 UTC);

        for unit in [RecurrenceUnit::Hours, RecurrenceUnit::Days, RecurrenceUnit::Weeks] {
            let reminder = recurring(unit, u32::MAX, "09:00", Some(vec![1, 3]), last);
            assert_eq!(next_fire_time(&reminder, now), None);
            assert!(!should_fire(&reminder, now));
        }

        let days = recurring(RecurrenceUnit::Days, 5_000_000, "09:00", None, last);
        assert_eq!(next_fire_time(&days, now), None);
    }

    #[test]
    fn huge_interval_never_fired_still_fires_first() {
        let now = datetime!(2024-06-03 09:00 UTC);
        let hourly = recurring(RecurrenceUnit::Hours, u32::MAX, "09:00", None, None);
        assert_eq!(next_fire_time(&hourly, now), Some(now));
        assert!(should_fire(&hourly, now));
    }

    #[test]
    fn weekly_duplicate_days_are_harmless() {
        let reminder = recurring(RecurrenceUnit::Weeks, 1, "09:00", Some(vec![1, 1, 3]), None);

        assert!(should_fire(&reminder, datetime!(2024-06-03 09:00 UTC)));
        assert!(!should_fire(&reminder, datetime!(2024-06-04 09:00 UTC)));
        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-03 09:00 UTC)),
            Some(datetime!(2024-06-05 09:00 UTC))
        );
    }

    #[test]
    fn next_fire_time_for_weeks_gives_up_past_the_scan_window() {
        let reminder = recurring(
            RecurrenceUnit::Weeks,
            4,
            "09:00",
            Some(vec![1]),
            Some(datetime!(2024-06-03 09:00 UTC)),
        );
        assert_eq!(
            next_fire_time(&reminder, datetime!(2024-06-03 10:00 UTC)),
            None
        );
    }
}
