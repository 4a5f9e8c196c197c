use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{Discipline, ReviewStatus, UserSettings};
use crate::scoring;

/// Review cycles never shrink below one day.
pub const MIN_CYCLE_DAYS: u32 = 1;

pub fn next_review_from(now: DateTime<Utc>, cycle_days: u32) -> DateTime<Utc> {
    now + Duration::days(cycle_days as i64)
}

/// Schedule a freshly created discipline: first review one full cycle out.
pub fn initialize(discipline: &mut Discipline, now: DateTime<Utc>) {
    discipline.next_review = Some(next_review_from(now, discipline.review_cycle_days));
}

/// Derive the review state by comparing the stored next-review date to
/// `today`. Strictly past dates are overdue; an unscheduled discipline
/// counts as scheduled.
pub fn review_status(discipline: &Discipline, today: NaiveDate) -> ReviewStatus {
    match discipline.next_review {
        None => ReviewStatus::Scheduled,
        Some(next) => {
            let next_date = next.date_naive();
            if next_date == today {
                ReviewStatus::DueToday
            } else if next_date < today {
                ReviewStatus::Overdue
            } else {
                ReviewStatus::Scheduled
            }
        }
    }
}

/// The only state-changing transition: record a completed review and
/// schedule the next one.
///
/// When auto-scheduling and adaptive learning are both enabled and the
/// discipline is struggling (average below the weak threshold, or any weak
/// topic on a high-weight discipline), the cycle is halved first, floored
/// at one day. Topic data is never touched here.
pub fn mark_reviewed(discipline: &mut Discipline, now: DateTime<Utc>, settings: &UserSettings) {
    if settings.auto_schedule_reviews && settings.adaptive_learning && needs_shorter_cycle(discipline)
    {
        discipline.review_cycle_days = (discipline.review_cycle_days / 2).max(MIN_CYCLE_DAYS);
    }

    discipline.last_review = Some(now);
    discipline.total_reviews += 1;
    discipline.next_review = Some(next_review_from(now, discipline.review_cycle_days));
}

fn needs_shorter_cycle(discipline: &Discipline) -> bool {
    match scoring::discipline_average(discipline) {
        Some(avg) if avg < scoring::WEAK_THRESHOLD => true,
        // No recorded questions: nothing to adapt on.
        None => false,
        _ => {
            discipline.weight >= scoring::HIGH_WEIGHT
                && !scoring::weak_topics(discipline).is_empty()
        }
    }
}

/// Clear the review history of the schedule itself: last review is
/// forgotten and the next review starts a fresh cycle from `now`.
pub fn reset_schedule(discipline: &mut Discipline, now: DateTime<Utc>) {
    discipline.last_review = None;
    discipline.next_review = Some(next_review_from(now, discipline.review_cycle_days));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn discipline(cycle_days: u32) -> Discipline {
        Discipline::new("d", "#1a237e", 10, cycle_days, Utc::now())
    }

    fn weak_topic() -> crate::models::Topic {
        let mut t = crate::models::Topic::new("t", Utc::now());
        t.performance.record(10, 4, Utc::now());
        t
    }

    fn strong_topic() -> crate::models::Topic {
        let mut t = crate::models::Topic::new("t", Utc::now());
        t.performance.record(10, 9, Utc::now());
        t
    }

    #[test]
    fn mark_reviewed_advances_by_cycle() {
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let mut d = discipline(3);
        d.topics = vec![strong_topic()];
        let topics_before = d.topics.clone();

        mark_reviewed(&mut d, day, &UserSettings::default());

        assert_eq!(d.last_review, Some(day));
        assert_eq!(d.next_review, Some(day + Duration::days(3)));
        assert_eq!(d.total_reviews, 1);
        assert_eq!(d.review_cycle_days, 3);
        // Topic data untouched.
        assert_eq!(d.topics.len(), topics_before.len());
        assert_eq!(d.topics[0].performance, topics_before[0].performance);
    }

    #[test]
    fn struggling_discipline_halves_its_cycle() {
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let mut d = discipline(6);
        d.topics = vec![weak_topic()]; // average 40

        mark_reviewed(&mut d, day, &UserSettings::default());

        assert_eq!(d.review_cycle_days, 3);
        assert_eq!(d.next_review, Some(day + Duration::days(3)));
    }

    #[test]
    fn cycle_never_drops_below_one_day() {
        let mut d = discipline(1);
        d.topics = vec![weak_topic()];
        mark_reviewed(&mut d, Utc::now(), &UserSettings::default());
        assert_eq!(d.review_cycle_days, 1);
    }

    #[test]
    fn shrink_is_gated_by_settings() {
        let mut d = discipline(6);
        d.topics = vec![weak_topic()];
        let settings = UserSettings {
            auto_schedule_reviews: false,
            ..UserSettings::default()
        };
        mark_reviewed(&mut d, Utc::now(), &settings);
        assert_eq!(d.review_cycle_days, 6);
    }

    #[test]
    fn fresh_discipline_keeps_its_cycle() {
        // No recorded questions anywhere: average is absent, not zero.
        let mut d = discipline(4);
        mark_reviewed(&mut d, Utc::now(), &UserSettings::default());
        assert_eq!(d.review_cycle_days, 4);
    }

    #[test]
    fn high_weight_discipline_shrinks_on_any_weak_topic() {
        let mut d = discipline(4);
        d.weight = 15;
        // Average is 65 (above the weak threshold) but one topic is weak.
        d.topics = vec![weak_topic(), strong_topic()];
        mark_reviewed(&mut d, Utc::now(), &UserSettings::default());
        assert_eq!(d.review_cycle_days, 2);
    }

    #[test]
    fn status_is_derived_from_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let mut d = discipline(3);

        d.next_review = Some(Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap());
        assert_eq!(review_status(&d, today), ReviewStatus::DueToday);

        d.next_review = Some(Utc.with_ymd_and_hms(2024, 3, 9, 1, 0, 0).unwrap());
        assert_eq!(review_status(&d, today), ReviewStatus::Overdue);

        d.next_review = Some(Utc.with_ymd_and_hms(2024, 3, 12, 1, 0, 0).unwrap());
        assert_eq!(review_status(&d, today), ReviewStatus::Scheduled);

        d.next_review = None;
        assert_eq!(review_status(&d, today), ReviewStatus::Scheduled);
    }

    #[test]
    fn reset_restarts_the_cycle() {
        let day = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let mut d = discipline(5);
        d.last_review = Some(day - Duration::days(5));
        d.next_review = Some(day - Duration::days(1));

        reset_schedule(&mut d, day);

        assert_eq!(d.last_review, None);
        assert_eq!(d.next_review, Some(day + Duration::days(5)));
    }
}
