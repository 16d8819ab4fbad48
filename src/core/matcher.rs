//! 依照偏好從列出的時段中挑出最佳候選。純函式，不碰網站狀態。

use crate::domain::model::{BookingPreference, Slot};
use chrono::NaiveDate;

/// 所有符合條件的時段，依優先順序排列
///
/// 條件：可預約、日期等於目標日、星期在偏好內、時間完全落在窗口內。
/// 排序：球場在 `court_priority` 中的位置（不在列表中視為最後），再依開始時間。
/// 排序是穩定的，同分的時段保留網站列出的順序。
pub fn rank_candidates<'a>(
    slots: &'a [Slot],
    preference: &BookingPreference,
    target_date: NaiveDate,
) -> Vec<&'a Slot> {
    let mut candidates: Vec<&Slot> = slots
        .iter()
        .filter(|slot| slot.available)
        .filter(|slot| slot.date == target_date)
        .filter(|slot| preference.is_preferred_day(slot.weekday()))
        .filter(|slot| {
            preference
                .time_window
                .contains(slot.start_time, slot.end_time)
        })
        .collect();

    candidates.sort_by_key(|slot| {
        (
            preference.court_rank(&slot.court_id).unwrap_or(usize::MAX),
            slot.start_time,
        )
    });

    candidates
}

/// 最佳候選，沒有符合的時段時回傳 `None`
pub fn select_slot<'a>(
    slots: &'a [Slot],
    preference: &BookingPreference,
    target_date: NaiveDate,
) -> Option<&'a Slot> {
    rank_candidates(slots, preference, target_date)
        .into_iter()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TimeWindow;
    use chrono::{NaiveTime, Weekday};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2026-10-24 是星期六
    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()
    }

    fn preference() -> BookingPreference {
        BookingPreference {
            preferred_days: vec![Weekday::Sat],
            time_window: TimeWindow::new(t(8, 0), t(11, 0)).unwrap(),
            court_priority: vec!["Court 1".to_string(), "Court 2".to_string()],
            advance_booking_days: 7,
        }
    }

    fn slot(court: &str, start: u32, available: bool) -> Slot {
        Slot::new(saturday(), court, t(start, 0), t(start + 1, 0), available)
    }

    #[test]
    fn test_court_priority_beats_earlier_start() {
        let slots = vec![
            slot("Court 2", 8, true),
            slot("Court 1", 9, true),
            slot("Court 1", 11, true),
        ];

        let best = select_slot(&slots, &preference(), saturday()).unwrap();
        assert_eq!(best.court_id, "Court 1");
        assert_eq!(best.start_time, t(9, 0));
    }

    #[test]
    fn test_no_match_when_nothing_qualifies() {
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let slots = vec![
            // 超出時間窗口
            slot("Court 1", 11, true),
            slot("Court 1", 10, false),
            Slot::new(sunday, "Court 1", t(9, 0), t(10, 0), true),
        ];

        assert!(select_slot(&slots, &preference(), saturday()).is_none());
        // 星期日不在偏好中
        assert!(select_slot(&slots, &preference(), sunday).is_none());
    }

    #[test]
    fn test_slot_partially_outside_window_is_rejected() {
        let slots = vec![Slot::new(saturday(), "Court 1", t(10, 30), t(11, 30), true)];
        assert!(select_slot(&slots, &preference(), saturday()).is_none());
    }

    #[test]
    fn test_unlisted_courts_rank_last_in_start_order() {
        let slots = vec![
            slot("Court 9", 9, true),
            slot("Court 7", 8, true),
            slot("Court 2", 10, true),
        ];

        let ranked = rank_candidates(&slots, &preference(), saturday());
        let courts: Vec<&str> = ranked.iter().map(|s| s.court_id.as_str()).collect();
        assert_eq!(courts, vec!["Court 2", "Court 7", "Court 9"]);
    }

    #[test]
    fn test_unlisted_courts_with_same_start_keep_listing_order() {
        let slots = vec![slot("Court B", 9, true), slot("Court A", 9, true)];

        let ranked = rank_candidates(&slots, &preference(), saturday());
        assert_eq!(ranked[0].court_id, "Court B");
        assert_eq!(ranked[1].court_id, "Court A");
    }

    #[test]
    fn test_same_court_prefers_earlier_start() {
        let slots = vec![slot("Court 1", 10, true), slot("Court 1", 8, true)];
        let best = select_slot(&slots, &preference(), saturday()).unwrap();
        assert_eq!(best.start_time, t(8, 0));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let slots = vec![
            slot("Court 2", 8, true),
            slot("Court 1", 9, true),
            slot("Court 1", 10, true),
            slot("Court 3", 8, true),
        ];
        let pref = preference();

        let first = select_slot(&slots, &pref, saturday()).cloned();
        for _ in 0..10 {
            assert_eq!(select_slot(&slots, &pref, saturday()).cloned(), first);
        }
    }
}
