use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{
    Backup, Discipline, QuestionLogEntry, ReviewLogEntry, ReviewStatus, StudyData, Topic,
    UserSettings,
};
use crate::scheduler;
use crate::scoring;
use crate::store::Store;

/// Boundary rejections. The offending operation performs no mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("discipline name must not be empty")]
    EmptyName,
    #[error("topic text must not be empty")]
    EmptyTopic,
    #[error("exam weight must be between 1 and 20, got {0}")]
    WeightOutOfRange(u8),
    #[error("review cycle must be at least one day")]
    InvalidCycle,
    #[error("invalid question counts: {correct} correct out of {attempted} attempted")]
    InvalidQuestionCounts { attempted: u32, correct: u32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisciplineInput {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub weight: u8,
    pub review_cycle_days: u32,
    #[serde(default)]
    pub notes: String,
}

fn default_color() -> String {
    "#1a237e".to_string()
}

fn validate(input: &DisciplineInput) -> Result<(), InputError> {
    if input.name.trim().is_empty() {
        return Err(InputError::EmptyName);
    }
    if !(1..=20).contains(&input.weight) {
        return Err(InputError::WeightOutOfRange(input.weight));
    }
    if input.review_cycle_days < 1 {
        return Err(InputError::InvalidCycle);
    }
    Ok(())
}

/// One topic per non-empty line of free-text notes.
fn topics_from_notes(notes: &str, now: chrono::DateTime<Utc>) -> Vec<Topic> {
    notes
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| Topic::new(line, now))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Disciplines,
    WeakTopics,
    History,
}

impl View {
    fn next(self) -> Self {
        match self {
            View::Disciplines => View::WeakTopics,
            View::WeakTopics => View::History,
            View::History => View::Disciplines,
        }
    }
}

/// The single owning application state: all persisted collections plus the
/// dashboard's view state. Every mutation goes through here.
pub struct App {
    pub store: Store,
    pub data: StudyData,
    pub view: View,
    pub selected: usize,
    pub notice: Option<String>,
    pub exit: bool,
}

impl App {
    pub async fn new(store: Store) -> anyhow::Result<Self> {
        let data = store.load_all().await?;
        Ok(Self {
            store,
            data,
            view: View::Disciplines,
            selected: 0,
            notice: None,
            exit: false,
        })
    }

    // ----- derived views -----

    pub fn ranked(&self) -> Vec<&Discipline> {
        scoring::ranked(&self.data.disciplines)
    }

    pub fn status_of(&self, discipline: &Discipline) -> ReviewStatus {
        scheduler::review_status(discipline, Utc::now().date_naive())
    }

    pub fn due_today(&self) -> usize {
        let today = Utc::now().date_naive();
        self.data
            .disciplines
            .iter()
            .filter(|d| scheduler::review_status(d, today) == ReviewStatus::DueToday)
            .count()
    }

    /// Reviews already logged today, measured against the daily goal.
    pub fn reviews_today(&self) -> usize {
        let today = Utc::now().date_naive();
        self.data
            .review_history
            .iter()
            .filter(|e| e.date.date_naive() == today)
            .count()
    }

    pub fn overall_progress(&self) -> u8 {
        let ds = &self.data.disciplines;
        if ds.is_empty() {
            return 0;
        }
        let sum: u32 = ds.iter().map(|d| d.progress as u32).sum();
        (sum as f64 / ds.len() as f64).round() as u8
    }

    pub fn mastered_count(&self) -> usize {
        self.data
            .disciplines
            .iter()
            .filter(|d| scoring::is_mastered(d))
            .count()
    }

    pub fn high_priority_count(&self) -> usize {
        self.data
            .disciplines
            .iter()
            .filter(|d| scoring::is_high_priority(d))
            .count()
    }

    // ----- discipline operations -----

    pub async fn add_discipline(&mut self, input: DisciplineInput) -> anyhow::Result<String> {
        validate(&input)?;

        let now = Utc::now();
        let mut discipline = Discipline::new(
            input.name.trim(),
            input.color,
            input.weight,
            input.review_cycle_days,
            now,
        );
        discipline.notes = input.notes.clone();
        discipline.topics = topics_from_notes(&input.notes, now);
        discipline.progress = scoring::progress_percent(&discipline.topics);
        scheduler::initialize(&mut discipline, now);

        let id = discipline.id.clone();
        self.data.disciplines.push(discipline);
        self.store.save_disciplines(&self.data.disciplines).await?;
        Ok(id)
    }

    /// Missing ids silently no-op, here and in every operation below.
    pub async fn update_discipline(
        &mut self,
        id: &str,
        input: DisciplineInput,
    ) -> anyhow::Result<()> {
        validate(&input)?;

        let Some(discipline) = self.data.disciplines.iter_mut().find(|d| d.id == id) else {
            return Ok(());
        };
        discipline.name = input.name.trim().to_string();
        discipline.color = input.color;
        discipline.weight = input.weight;
        discipline.review_cycle_days = input.review_cycle_days;
        discipline.notes = input.notes;

        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn delete_discipline(&mut self, id: &str) -> anyhow::Result<()> {
        let before = self.data.disciplines.len();
        self.data.disciplines.retain(|d| d.id != id);
        if self.data.disciplines.len() == before {
            return Ok(());
        }
        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn reset_discipline(&mut self, id: &str) -> anyhow::Result<()> {
        let Some(discipline) = self.data.disciplines.iter_mut().find(|d| d.id == id) else {
            return Ok(());
        };

        discipline.progress = 0;
        discipline.total_reviews = 0;
        scheduler::reset_schedule(discipline, Utc::now());
        for topic in &mut discipline.topics {
            topic.completed = false;
            topic.completed_at = None;
            topic.confidence_score = 50;
            topic.performance = Default::default();
        }

        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn mark_reviewed(&mut self, id: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let Some(discipline) = self.data.disciplines.iter_mut().find(|d| d.id == id) else {
            return Ok(());
        };

        scheduler::mark_reviewed(discipline, now, &self.data.settings);
        let entry = ReviewLogEntry {
            discipline_id: discipline.id.clone(),
            discipline_name: discipline.name.clone(),
            date: now,
        };
        self.data.review_history.push(entry);

        // Two independent writes; no combined transaction.
        self.store.save_disciplines(&self.data.disciplines).await?;
        self.store
            .save_review_history(&self.data.review_history)
            .await
    }

    // ----- topic operations -----

    pub async fn add_topic(
        &mut self,
        discipline_id: &str,
        text: &str,
    ) -> anyhow::Result<Option<String>> {
        if text.trim().is_empty() {
            return Err(InputError::EmptyTopic.into());
        }
        let Some(discipline) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
        else {
            return Ok(None);
        };

        let topic = Topic::new(text.trim(), Utc::now());
        let id = topic.id.clone();
        discipline.topics.push(topic);
        discipline.progress = scoring::progress_percent(&discipline.topics);

        self.store.save_disciplines(&self.data.disciplines).await?;
        Ok(Some(id))
    }

    pub async fn rename_topic(
        &mut self,
        discipline_id: &str,
        topic_id: &str,
        text: &str,
    ) -> anyhow::Result<()> {
        if text.trim().is_empty() {
            return Err(InputError::EmptyTopic.into());
        }
        let Some(topic) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
            .and_then(|d| d.topic_mut(topic_id))
        else {
            return Ok(());
        };
        topic.text = text.trim().to_string();
        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn toggle_topic(&mut self, discipline_id: &str, topic_id: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        let Some(discipline) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
        else {
            return Ok(());
        };
        let Some(topic) = discipline.topic_mut(topic_id) else {
            return Ok(());
        };

        topic.completed = !topic.completed;
        topic.completed_at = topic.completed.then_some(now);
        if topic.completed {
            topic.confidence_score = (topic.confidence_score + 10).min(100);
        }
        discipline.progress = scoring::progress_percent(&discipline.topics);

        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn delete_topic(&mut self, discipline_id: &str, topic_id: &str) -> anyhow::Result<()> {
        let Some(discipline) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
        else {
            return Ok(());
        };
        let before = discipline.topics.len();
        discipline.topics.retain(|t| t.id != topic_id);
        if discipline.topics.len() == before {
            return Ok(());
        }
        discipline.progress = scoring::progress_percent(&discipline.topics);
        self.store.save_disciplines(&self.data.disciplines).await
    }

    pub async fn reset_topic(&mut self, discipline_id: &str, topic_id: &str) -> anyhow::Result<()> {
        let Some(topic) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
            .and_then(|d| d.topic_mut(topic_id))
        else {
            return Ok(());
        };
        topic.performance = Default::default();
        topic.confidence_score = 50;
        self.store.save_disciplines(&self.data.disciplines).await
    }

    /// Record a batch of practice questions against a topic. The batch is
    /// merged into the running totals and appended to the question log.
    pub async fn record_questions(
        &mut self,
        discipline_id: &str,
        topic_id: &str,
        attempted: u32,
        correct: u32,
    ) -> anyhow::Result<()> {
        if attempted < 1 || correct > attempted {
            return Err(InputError::InvalidQuestionCounts { attempted, correct }.into());
        }

        let now = Utc::now();
        let Some(discipline) = self
            .data
            .disciplines
            .iter_mut()
            .find(|d| d.id == discipline_id)
        else {
            return Ok(());
        };
        let discipline_name = discipline.name.clone();
        let Some(topic) = discipline.topic_mut(topic_id) else {
            return Ok(());
        };

        topic.performance.record(attempted, correct, now);

        let accuracy = crate::models::percentage(correct, attempted);
        let bump: i16 = if accuracy >= scoring::STRONG_THRESHOLD {
            10
        } else if accuracy >= scoring::WEAK_THRESHOLD {
            5
        } else {
            -5
        };
        topic.confidence_score = (topic.confidence_score as i16 + bump).clamp(0, 100) as u8;

        let entry = QuestionLogEntry {
            discipline_id: discipline_id.to_string(),
            discipline_name,
            topic_id: topic_id.to_string(),
            topic_text: topic.text.clone(),
            date: now,
            total_questions: attempted,
            correct_answers: correct,
            accuracy,
        };
        self.data.question_history.push(entry);

        self.store.save_disciplines(&self.data.disciplines).await?;
        self.store
            .save_question_history(&self.data.question_history)
            .await
    }

    // ----- settings / backup -----

    pub async fn update_settings(&mut self, settings: UserSettings) -> anyhow::Result<()> {
        self.data.settings = settings;
        self.store.save_settings(&self.data.settings).await
    }

    pub fn export_json(&self) -> anyhow::Result<String> {
        let backup = Backup {
            disciplines: self.data.disciplines.clone(),
            review_history: self.data.review_history.clone(),
            question_history: self.data.question_history.clone(),
            settings: self.data.settings.clone(),
            exported_at: Utc::now(),
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Replace all collections with the backup's contents and persist them.
    pub async fn import_json(&mut self, raw: &str) -> anyhow::Result<()> {
        let backup: Backup = serde_json::from_str(raw)?;

        self.data.disciplines = backup.disciplines;
        self.data.review_history = backup.review_history;
        self.data.question_history = backup.question_history;
        self.data.settings = backup.settings;

        self.store.save_disciplines(&self.data.disciplines).await?;
        self.store
            .save_review_history(&self.data.review_history)
            .await?;
        self.store
            .save_question_history(&self.data.question_history)
            .await?;
        self.store.save_settings(&self.data.settings).await
    }

    // ----- dashboard input -----

    pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        self.notice = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.exit = true,
            KeyCode::Tab => {
                self.view = self.view.next();
                self.selected = 0;
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                let count = self.data.disciplines.len();
                if count > 0 && self.selected < count - 1 {
                    self.selected += 1;
                }
            }
            KeyCode::Char('r') => {
                let id = self.ranked().get(self.selected).map(|d| d.id.clone());
                if let Some(id) = id {
                    self.mark_reviewed(&id).await?;
                    self.notice = Some("Review recorded".to_string());
                }
            }
            KeyCode::Char('a') => {
                let mut settings = self.data.settings.clone();
                settings.auto_schedule_reviews = !settings.auto_schedule_reviews;
                let enabled = settings.auto_schedule_reviews;
                self.update_settings(settings).await?;
                self.notice = Some(format!(
                    "Auto-scheduling {}",
                    if enabled { "on" } else { "off" }
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    async fn test_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tutor.db");
        let store = Store::open(path.to_str().unwrap()).await.expect("open");
        let mut app = App::new(store).await.expect("app");
        // Start from a clean slate instead of the sample dataset.
        app.data = StudyData::default();
        (dir, app)
    }

    fn input(name: &str, weight: u8, cycle: u32, notes: &str) -> DisciplineInput {
        DisciplineInput {
            name: name.to_string(),
            color: default_color(),
            weight,
            review_cycle_days: cycle,
            notes: notes.to_string(),
        }
    }

    #[tokio::test]
    async fn add_discipline_builds_topics_from_notes() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies\n\n  Licensing  \n"))
            .await
            .unwrap();

        let d = app.data.disciplines.iter().find(|d| d.id == id).unwrap();
        assert_eq!(d.topics.len(), 2);
        assert_eq!(d.topics[0].text, "Agencies");
        assert_eq!(d.topics[1].text, "Licensing");
        assert_eq!(d.progress, 0);
        assert!(d.next_review.is_some());
    }

    #[tokio::test]
    async fn invalid_discipline_input_is_rejected_without_mutation() {
        let (_dir, mut app) = test_app().await;

        let err = app.add_discipline(input("", 10, 3, "")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::EmptyName));

        let err = app.add_discipline(input("X", 0, 3, "")).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::WeightOutOfRange(0))
        );

        let err = app.add_discipline(input("X", 10, 0, "")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::InvalidCycle));

        assert!(app.data.disciplines.is_empty());
    }

    #[tokio::test]
    async fn record_questions_accumulates_and_logs() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();
        let topic_id = app.data.disciplines[0].topics[0].id.clone();

        app.record_questions(&id, &topic_id, 10, 7).await.unwrap();
        app.record_questions(&id, &topic_id, 10, 3).await.unwrap();

        let topic = &app.data.disciplines[0].topics[0];
        assert_eq!(topic.performance.total_questions, 20);
        assert_eq!(topic.performance.correct_answers, 10);
        assert_eq!(topic.performance.average_score, 50);

        assert_eq!(app.data.question_history.len(), 2);
        assert_eq!(app.data.question_history[0].accuracy, 70);
        assert_eq!(app.data.question_history[1].accuracy, 30);
    }

    #[tokio::test]
    async fn out_of_range_counts_are_rejected_without_mutation() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();
        let topic_id = app.data.disciplines[0].topics[0].id.clone();

        let err = app.record_questions(&id, &topic_id, 10, 11).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::InvalidQuestionCounts {
                attempted: 10,
                correct: 11
            })
        );
        let err = app.record_questions(&id, &topic_id, 0, 0).await.unwrap_err();
        assert!(err.downcast_ref::<InputError>().is_some());

        let topic = &app.data.disciplines[0].topics[0];
        assert!(!topic.performance.has_data());
        assert!(app.data.question_history.is_empty());
    }

    #[tokio::test]
    async fn missing_ids_no_op_silently() {
        let (_dir, mut app) = test_app().await;
        app.add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();

        app.mark_reviewed("missing").await.unwrap();
        app.record_questions("missing", "also-missing", 10, 5)
            .await
            .unwrap();
        app.delete_discipline("missing").await.unwrap();
        app.toggle_topic("missing", "nope").await.unwrap();

        assert_eq!(app.data.disciplines.len(), 1);
        assert_eq!(app.data.disciplines[0].total_reviews, 0);
        assert!(app.data.review_history.is_empty());
        assert!(app.data.question_history.is_empty());
    }

    #[tokio::test]
    async fn mark_reviewed_schedules_and_logs() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();

        app.mark_reviewed(&id).await.unwrap();

        let d = &app.data.disciplines[0];
        assert_eq!(d.total_reviews, 1);
        assert!(d.last_review.is_some());
        let gap = d.next_review.unwrap() - d.last_review.unwrap();
        assert_eq!(gap.num_days(), 3);
        assert_eq!(app.data.review_history.len(), 1);
        assert_eq!(app.data.review_history[0].discipline_id, id);
    }

    #[tokio::test]
    async fn toggle_topic_updates_progress_and_confidence() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies\nLicensing"))
            .await
            .unwrap();
        let topic_id = app.data.disciplines[0].topics[0].id.clone();

        app.toggle_topic(&id, &topic_id).await.unwrap();
        let d = &app.data.disciplines[0];
        assert!(d.topics[0].completed);
        assert_eq!(d.topics[0].confidence_score, 60);
        assert_eq!(d.progress, 50);

        app.toggle_topic(&id, &topic_id).await.unwrap();
        let d = &app.data.disciplines[0];
        assert!(!d.topics[0].completed);
        assert_eq!(d.progress, 0);
    }

    #[tokio::test]
    async fn reset_discipline_clears_progress_but_keeps_topics() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();
        let topic_id = app.data.disciplines[0].topics[0].id.clone();
        app.record_questions(&id, &topic_id, 10, 9).await.unwrap();
        app.toggle_topic(&id, &topic_id).await.unwrap();
        app.mark_reviewed(&id).await.unwrap();

        app.reset_discipline(&id).await.unwrap();

        let d = &app.data.disciplines[0];
        assert_eq!(d.progress, 0);
        assert_eq!(d.total_reviews, 0);
        assert_eq!(d.last_review, None);
        assert_eq!(d.topics.len(), 1);
        assert!(!d.topics[0].completed);
        assert!(!d.topics[0].performance.has_data());
        // History is append-only; a reset does not rewrite it.
        assert_eq!(app.data.review_history.len(), 1);
    }

    #[tokio::test]
    async fn export_import_round_trips() {
        let (_dir, mut app) = test_app().await;
        let id = app
            .add_discipline(input("Admin Law", 12, 3, "Agencies"))
            .await
            .unwrap();
        let topic_id = app.data.disciplines[0].topics[0].id.clone();
        app.record_questions(&id, &topic_id, 10, 7).await.unwrap();

        let exported = app.export_json().unwrap();

        app.data = StudyData::default();
        app.import_json(&exported).await.unwrap();

        assert_eq!(app.data.disciplines.len(), 1);
        assert_eq!(app.data.disciplines[0].id, id);
        assert_eq!(app.data.question_history.len(), 1);
    }

    #[tokio::test]
    async fn import_rejects_garbage() {
        let (_dir, mut app) = test_app().await;
        assert!(app.import_json("{not json").await.is_err());
    }

    #[tokio::test]
    async fn keys_drive_selection_view_and_exit() {
        let (_dir, mut app) = test_app().await;
        app.add_discipline(input("A", 10, 3, "")).await.unwrap();
        app.add_discipline(input("B", 10, 3, "")).await.unwrap();

        app.handle_key(KeyEvent::from(KeyCode::Down)).await.unwrap();
        assert_eq!(app.selected, 1);
        app.handle_key(KeyEvent::from(KeyCode::Down)).await.unwrap();
        assert_eq!(app.selected, 1); // clamped at the last row

        app.handle_key(KeyEvent::from(KeyCode::Up)).await.unwrap();
        assert_eq!(app.selected, 0);

        app.handle_key(KeyEvent::from(KeyCode::Tab)).await.unwrap();
        assert_eq!(app.view, View::WeakTopics);

        app.handle_key(KeyEvent::from(KeyCode::Char('r'))).await.unwrap();
        assert_eq!(app.data.review_history.len(), 1);

        app.handle_key(KeyEvent::from(KeyCode::Char('q'))).await.unwrap();
        assert!(app.exit);
    }
}
