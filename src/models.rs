use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integer-rounded percentage, 0 when `total` is 0.
pub fn percentage(part: u32, total: u32) -> u8 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u8
    }
}

fn default_confidence() -> u8 {
    50
}

/// Accumulated quiz results for a single topic.
///
/// Invariant: `average_score == round(correct_answers / total_questions * 100)`
/// whenever `total_questions > 0`, else 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub average_score: u8,
    pub last_practice: Option<DateTime<Utc>>,
}

impl Performance {
    /// Merge a new batch of answered questions into the running totals.
    /// Counts accumulate; they are never replaced.
    pub fn record(&mut self, attempted: u32, correct: u32, now: DateTime<Utc>) {
        self.total_questions += attempted;
        self.correct_answers += correct;
        self.average_score = percentage(self.correct_answers, self.total_questions);
        self.last_practice = Some(now);
    }

    pub fn has_data(&self) -> bool {
        self.total_questions > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_confidence")]
    pub confidence_score: u8,
    #[serde(default)]
    pub performance: Performance,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
            completed_at: None,
            confidence_score: default_confidence(),
            performance: Performance::default(),
            created_at: now,
        }
    }
}

/// A study subject: the top-level trackable entity. Owns its topics
/// exclusively; topic insertion order is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discipline {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Exam weight, 1-20, higher = more important.
    pub weight: u8,
    /// Days between scheduled reviews.
    pub review_cycle_days: u32,
    /// Derived: completed topics / total topics, as a percentage.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Discipline {
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        weight: u8,
        review_cycle_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color: color.into(),
            weight,
            review_cycle_days,
            progress: 0,
            last_review: None,
            next_review: None,
            total_reviews: 0,
            notes: String::new(),
            created_at: now,
            topics: Vec::new(),
        }
    }

    pub fn topic_mut(&mut self, topic_id: &str) -> Option<&mut Topic> {
        self.topics.iter_mut().find(|t| t.id == topic_id)
    }
}

/// Derived review state; computed against the current date, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStatus {
    Scheduled,
    DueToday,
    Overdue,
}

/// Append-only record of a completed review session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    pub discipline_id: String,
    pub discipline_name: String,
    pub date: DateTime<Utc>,
}

/// Append-only record of a batch of practice questions. Kept for
/// historical display; never fed back into scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLogEntry {
    pub discipline_id: String,
    pub discipline_name: String,
    pub topic_id: String,
    pub topic_text: String,
    pub date: DateTime<Utc>,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Target number of reviews per day, shown against today's count.
    pub daily_goal: u32,
    /// Gates the adaptive cycle shrink together with `adaptive_learning`.
    pub auto_schedule_reviews: bool,
    pub adaptive_learning: bool,
    pub show_weights: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            daily_goal: 5,
            auto_schedule_reviews: true,
            adaptive_learning: true,
            show_weights: true,
        }
    }
}

/// The four persisted collections, held together in memory. Each is
/// saved under its own store key with no combined transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyData {
    pub disciplines: Vec<Discipline>,
    pub review_history: Vec<ReviewLogEntry>,
    pub question_history: Vec<QuestionLogEntry>,
    pub settings: UserSettings,
}

/// Full-state backup produced by export and consumed by import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub disciplines: Vec<Discipline>,
    #[serde(default)]
    pub review_history: Vec<ReviewLogEntry>,
    #[serde(default)]
    pub question_history: Vec<QuestionLogEntry>,
    #[serde(default)]
    pub settings: UserSettings,
    pub exported_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_zero_without_data() {
        let perf = Performance::default();
        assert_eq!(perf.average_score, 0);
        assert!(!perf.has_data());
    }

    #[test]
    fn recording_accumulates() {
        let mut perf = Performance::default();
        let now = Utc::now();
        perf.record(10, 7, now);
        assert_eq!(perf.average_score, 70);
        perf.record(10, 3, now);
        assert_eq!(perf.total_questions, 20);
        assert_eq!(perf.correct_answers, 10);
        assert_eq!(perf.average_score, 50);
        assert_eq!(perf.last_practice, Some(now));
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 0), 0);
    }
}
