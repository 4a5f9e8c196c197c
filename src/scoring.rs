use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::models::{Discipline, ReviewLogEntry, Topic};

/// Topics scoring below this (with recorded questions) are weak.
pub const WEAK_THRESHOLD: u8 = 60;
/// Topics scoring at or above this are strong.
pub const STRONG_THRESHOLD: u8 = 80;

// Priority policy: weight * 10 + weak topics * 20 - average * 0.5.
// Higher score = more urgent. Uncapped; a missing average counts as 0.
pub const WEIGHT_FACTOR: f64 = 10.0;
pub const WEAK_TOPIC_FACTOR: f64 = 20.0;
pub const AVERAGE_FACTOR: f64 = 0.5;

/// Exam weight at or above which a discipline is treated as high stakes.
pub const HIGH_WEIGHT: u8 = 15;

pub fn is_weak(topic: &Topic) -> bool {
    topic.performance.has_data() && topic.performance.average_score < WEAK_THRESHOLD
}

pub fn is_strong(topic: &Topic) -> bool {
    topic.performance.has_data() && topic.performance.average_score >= STRONG_THRESHOLD
}

pub fn weak_topics(discipline: &Discipline) -> Vec<&Topic> {
    discipline.topics.iter().filter(|t| is_weak(t)).collect()
}

pub fn strong_topics(discipline: &Discipline) -> Vec<&Topic> {
    discipline.topics.iter().filter(|t| is_strong(t)).collect()
}

/// Unweighted mean of the average scores of topics with recorded
/// questions. `None` when no topic has any data, which is distinct from a
/// genuine 0% average.
pub fn discipline_average(discipline: &Discipline) -> Option<u8> {
    let scored: Vec<u32> = discipline
        .topics
        .iter()
        .filter(|t| t.performance.has_data())
        .map(|t| t.performance.average_score as u32)
        .collect();

    if scored.is_empty() {
        return None;
    }
    let sum: u32 = scored.iter().sum();
    Some((sum as f64 / scored.len() as f64).round() as u8)
}

/// Urgency of attention for a discipline. Drives the default sort and the
/// focus recommendations.
pub fn priority_score(discipline: &Discipline) -> f64 {
    let avg = discipline_average(discipline).unwrap_or(0);
    let weak = weak_topics(discipline).len();

    discipline.weight as f64 * WEIGHT_FACTOR + weak as f64 * WEAK_TOPIC_FACTOR
        - avg as f64 * AVERAGE_FACTOR
}

/// Disciplines ordered by descending priority. The sort is stable, so
/// equal scores keep insertion order.
pub fn ranked(disciplines: &[Discipline]) -> Vec<&Discipline> {
    let mut out: Vec<&Discipline> = disciplines.iter().collect();
    out.sort_by(|a, b| {
        priority_score(b)
            .partial_cmp(&priority_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

/// Completed topics over total topics, as a percentage.
pub fn progress_percent(topics: &[Topic]) -> u8 {
    let completed = topics.iter().filter(|t| t.completed).count();
    crate::models::percentage(completed as u32, topics.len() as u32)
}

pub fn is_mastered(discipline: &Discipline) -> bool {
    discipline.progress >= 90 && discipline_average(discipline).unwrap_or(0) >= STRONG_THRESHOLD
}

pub fn is_high_priority(discipline: &Discipline) -> bool {
    discipline.weight >= HIGH_WEIGHT || !weak_topics(discipline).is_empty()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PerformanceStats {
    pub total_questions: u64,
    /// Mean of discipline averages, over disciplines with data.
    pub average_score: u8,
    pub strong_areas: usize,
    pub weak_areas: usize,
    pub disciplines_with_data: usize,
}

pub fn performance_stats(disciplines: &[Discipline]) -> PerformanceStats {
    let mut total_questions: u64 = 0;
    let mut total_score: u32 = 0;
    let mut with_data = 0;
    let mut strong = 0;
    let mut weak = 0;

    for discipline in disciplines {
        total_questions += discipline
            .topics
            .iter()
            .map(|t| t.performance.total_questions as u64)
            .sum::<u64>();

        let avg = discipline_average(discipline).unwrap_or(0);
        if avg > 0 {
            total_score += avg as u32;
            with_data += 1;
            if avg >= STRONG_THRESHOLD {
                strong += 1;
            }
            if avg < WEAK_THRESHOLD {
                weak += 1;
            }
        }
    }

    PerformanceStats {
        total_questions,
        average_score: if with_data > 0 {
            (total_score as f64 / with_data as f64).round() as u8
        } else {
            0
        },
        strong_areas: strong,
        weak_areas: weak,
        disciplines_with_data: with_data,
    }
}

/// Mean of discipline averages across disciplines with a nonzero average.
pub fn overall_average(disciplines: &[Discipline]) -> u8 {
    let scores: Vec<u32> = disciplines
        .iter()
        .filter_map(discipline_average)
        .filter(|s| *s > 0)
        .map(u32::from)
        .collect();

    if scores.is_empty() {
        return 0;
    }
    (scores.iter().sum::<u32>() as f64 / scores.len() as f64).round() as u8
}

/// Distinct review days as a share of the days elapsed since the first
/// logged review.
pub fn study_consistency(history: &[ReviewLogEntry], now: DateTime<Utc>) -> u8 {
    let Some(first) = history.first() else {
        return 0;
    };

    let study_days: BTreeSet<_> = history.iter().map(|e| e.date.date_naive()).collect();
    let elapsed_days = ((now - first.date).num_seconds() as f64 / 86_400.0).max(1.0);

    ((study_days.len() as f64 / elapsed_days) * 100.0).round().min(100.0) as u8
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FocusArea {
    pub name: String,
    pub current_score: u8,
    pub target_score: u8,
    pub weight: u8,
}

/// Top three disciplines with data that still score below the strong
/// threshold, by priority.
pub fn focus_areas(disciplines: &[Discipline]) -> Vec<FocusArea> {
    let mut candidates: Vec<&Discipline> = disciplines
        .iter()
        .filter(|d| matches!(discipline_average(d), Some(avg) if avg > 0 && avg < STRONG_THRESHOLD))
        .collect();
    candidates.sort_by(|a, b| {
        priority_score(b)
            .partial_cmp(&priority_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    candidates
        .into_iter()
        .take(3)
        .map(|d| {
            let current = discipline_average(d).unwrap_or(0);
            FocusArea {
                name: d.name.clone(),
                current_score: current,
                target_score: (current + 20).min(90),
                weight: d.weight,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Critical,
    Consistency,
    Maintain,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

pub fn recommendations(
    disciplines: &[Discipline],
    history: &[ReviewLogEntry],
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let critical = disciplines.iter().find(|d| {
        matches!(discipline_average(d), Some(avg) if avg < 50) && d.weight >= HIGH_WEIGHT
    });
    if let Some(d) = critical {
        let avg = discipline_average(d).unwrap_or(0);
        out.push(Recommendation {
            kind: RecommendationKind::Critical,
            message: format!("Focus on {} ({avg}%)", d.name),
        });
    }

    let consistency = study_consistency(history, now);
    if !history.is_empty() && consistency < 60 {
        out.push(Recommendation {
            kind: RecommendationKind::Consistency,
            message: format!("Study more regularly ({consistency}% consistency)"),
        });
    }

    if overall_average(disciplines) >= STRONG_THRESHOLD {
        out.push(Recommendation {
            kind: RecommendationKind::Maintain,
            message: "Strong performance across the board, keep it up".to_string(),
        });
    }

    out
}
