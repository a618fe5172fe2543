use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Bookable slot length. Calendar events are created one minute shorter so
/// that back-to-back bookings never overlap on the backend.
pub const SLOT_MINUTES: u32 = 30;

/// Business shifts as (start hour, end hour): mornings 09-12, afternoons 13-17.
pub const SHIFTS: [(u32, u32); 2] = [(9, 12), (13, 17)];

/// Weekdays on which insurance consultations are accepted.
pub const INSURANCE_WEEKDAYS: [Weekday; 2] = [Weekday::Tue, Weekday::Thu];

/// How many upcoming dates a weekday search returns.
pub const WEEKDAY_SEARCH_COUNT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub free: bool,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("shift times are within a day")
}

/// All slot start/end pairs of a business day, in order.
pub fn day_windows() -> Vec<(NaiveTime, NaiveTime)> {
    let mut windows = Vec::new();
    for (start_hour, end_hour) in SHIFTS {
        let mut minute_of_day = start_hour * 60;
        let shift_end = end_hour * 60;
        while minute_of_day + SLOT_MINUTES <= shift_end {
            let slot_end = minute_of_day + SLOT_MINUTES;
            windows.push((hm(minute_of_day / 60, minute_of_day % 60), hm(slot_end / 60, slot_end % 60)));
            minute_of_day = slot_end;
        }
    }
    windows
}

/// Partitions a business day into fixed slots and marks each free or busy
/// against the day's events. A slot is busy when any event covers its start.
pub fn partition_day(date: NaiveDate, busy: &[(NaiveDateTime, NaiveDateTime)]) -> Vec<SlotWindow> {
    day_windows()
        .into_iter()
        .map(|(start, end)| {
            let slot_start = date.and_time(start);
            let occupied = busy.iter().any(|(event_start, event_end)| {
                *event_start <= slot_start && slot_start < *event_end
            });
            SlotWindow { start, end, free: !occupied }
        })
        .collect()
}

/// Next `count` occurrences of `weekday` strictly after `from`.
pub fn next_weekday_dates(from: NaiveDate, weekday: Weekday, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut cursor = from;
    while dates.len() < count {
        cursor = match cursor.succ_opt() {
            Some(next) => next,
            None => break,
        };
        if cursor.weekday() == weekday {
            dates.push(cursor);
        }
    }
    dates
}

/// Next `count` insurance-eligible dates (Tuesdays and Thursdays) after `from`.
pub fn next_insurance_dates(from: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut cursor = from;
    while dates.len() < count {
        cursor = match cursor.succ_opt() {
            Some(next) => next,
            None => break,
        };
        if insurance_day(cursor.weekday()) {
            dates.push(cursor);
        }
    }
    dates
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn insurance_day(weekday: Weekday) -> bool {
    INSURANCE_WEEKDAYS.contains(&weekday)
}

/// Whether a time names the start of a bookable slot.
pub fn slot_aligned(time: NaiveTime) -> bool {
    day_windows().iter().any(|(start, _)| *start == time)
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

    use super::{
        day_windows, insurance_day, is_business_day, next_insurance_dates, next_weekday_dates,
        parse_weekday, partition_day, slot_aligned,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn a_business_day_has_fourteen_slots_across_two_shifts() {
        let windows = day_windows();
        assert_eq!(windows.len(), 14);
        assert_eq!(windows.first(), Some(&(time(9, 0), time(9, 30))));
        assert_eq!(windows[5], (time(11, 30), time(12, 0)));
        assert_eq!(windows[6], (time(13, 0), time(13, 30)));
        assert_eq!(windows.last(), Some(&(time(16, 30), time(17, 0))));
    }

    #[test]
    fn partition_marks_slots_covered_by_events_as_busy() {
        let day = date(2026, 8, 11);
        let busy = vec![(day.and_time(time(9, 0)), day.and_time(time(10, 0)))];

        let slots = partition_day(day, &busy);

        assert!(!slots[0].free, "09:00 is inside the event");
        assert!(!slots[1].free, "09:30 is inside the event");
        assert!(slots[2].free, "10:00 starts exactly when the event ends");
        assert!(slots.iter().skip(2).all(|slot| slot.free));
    }

    #[test]
    fn next_weekday_dates_start_strictly_after_the_reference_day() {
        // 2026-08-06 is a Thursday; the next Thursday must be the 13th.
        let dates = next_weekday_dates(date(2026, 8, 6), Weekday::Thu, 3);
        assert_eq!(dates, vec![date(2026, 8, 13), date(2026, 8, 20), date(2026, 8, 27)]);
    }

    #[test]
    fn insurance_dates_interleave_tuesdays_and_thursdays() {
        let dates = next_insurance_dates(date(2026, 8, 6), 4);
        assert_eq!(
            dates,
            vec![date(2026, 8, 11), date(2026, 8, 13), date(2026, 8, 18), date(2026, 8, 20)]
        );
        assert!(dates.iter().all(|d| insurance_day(d.weekday())));
    }

    #[test]
    fn weekends_are_not_business_days() {
        assert!(is_business_day(date(2026, 8, 7)));
        assert!(!is_business_day(date(2026, 8, 8)));
        assert!(!is_business_day(date(2026, 8, 9)));
    }

    #[test]
    fn slot_alignment_rejects_lunch_break_and_off_grid_times() {
        assert!(slot_aligned(time(9, 0)));
        assert!(slot_aligned(time(16, 30)));
        assert!(!slot_aligned(time(12, 0)), "noon starts the lunch break");
        assert!(!slot_aligned(time(12, 30)));
        assert!(!slot_aligned(time(9, 15)));
        assert!(!slot_aligned(time(17, 0)), "closing time is not bookable");
    }

    #[test]
    fn weekday_parsing_accepts_full_and_short_names() {
        assert_eq!(parse_weekday("Tuesday"), Some(Weekday::Tue));
        assert_eq!(parse_weekday("thu"), Some(Weekday::Thu));
        assert_eq!(parse_weekday("someday"), None);
    }
}
