use chrono::{DateTime, Duration, Utc};

use crate::models::{Discipline, Performance, Topic};
use crate::scoring;

fn sample_topic(
    text: &str,
    completed: bool,
    confidence: u8,
    total: u32,
    correct: u32,
    now: DateTime<Utc>,
) -> Topic {
    let mut topic = Topic::new(text, now);
    topic.completed = completed;
    topic.completed_at = completed.then_some(now);
    topic.confidence_score = confidence;
    if total > 0 {
        topic.performance = Performance {
            total_questions: total,
            correct_answers: correct,
            average_score: crate::models::percentage(correct, total),
            last_practice: Some(now),
        };
    }
    topic
}

/// The built-in sample dataset. Seeds an empty store and serves as the
/// recovery fallback when persisted data cannot be parsed.
pub fn default_disciplines(now: DateTime<Utc>) -> Vec<Discipline> {
    let mut constitutional = Discipline::new("Constitutional Law", "#00c853", 20, 2, now);
    constitutional.topics = vec![
        sample_topic("Fundamental rights", true, 50, 20, 16, now),
        sample_topic("Separation of powers", false, 40, 10, 5, now),
    ];
    constitutional.progress = scoring::progress_percent(&constitutional.topics);
    constitutional.last_review = Some(now - Duration::days(2));
    constitutional.next_review = Some(now);
    constitutional.total_reviews = 3;

    let mut civil = Discipline::new("Civil Law", "#1a237e", 15, 3, now);
    civil.topics = vec![
        sample_topic("Introductory provisions", true, 80, 25, 23, now),
        sample_topic("Natural persons", true, 75, 20, 18, now),
    ];
    civil.progress = scoring::progress_percent(&civil.topics);
    civil.last_review = Some(now);
    civil.next_review = Some(now + Duration::days(1));
    civil.total_reviews = 5;

    vec![constitutional, civil]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_data_is_consistent() {
        let now = Utc::now();
        for discipline in default_disciplines(now) {
            assert!(!discipline.name.is_empty());
            assert!((1..=20).contains(&discipline.weight));
            assert!(discipline.review_cycle_days >= 1);
            assert_eq!(
                discipline.progress,
                scoring::progress_percent(&discipline.topics)
            );
            for topic in &discipline.topics {
                let perf = &topic.performance;
                assert!(perf.correct_answers <= perf.total_questions);
                assert_eq!(
                    perf.average_score,
                    crate::models::percentage(perf.correct_answers, perf.total_questions)
                );
            }
        }
    }
}
