//! Keyword extraction and relevance scoring for runs.

use chrono::{DateTime, Utc};
use learnloop_types::{Outcome, Run};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Added for each (keyword, tag) pair that matches ignoring case.
pub const TAG_WEIGHT: f64 = 3.0;
/// Added for each keyword found in the task text.
pub const TASK_WEIGHT: f64 = 2.0;
/// Added for each keyword found in the touched-files list.
pub const FILE_WEIGHT: f64 = 1.5;
/// Per-day rate of the exponential recency decay.
pub const DECAY_RATE: f64 = 0.1;

static TOKEN_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s,.:;()\[\]"']+"#).expect("Invalid token split regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "is", "it",
        "this", "that", "with", "from", "by", "be", "as", "are", "was", "were", "been", "have",
        "has", "had", "do", "does", "did", "will", "would", "can", "could", "should", "may",
        "might", "shall", "not", "no", "i", "we", "you", "he", "she", "they", "me", "my",
    ]
    .into_iter()
    .collect()
});

/// Lower-cased, de-duplicated keywords from free text, in first-seen order.
///
/// Tokens shorter than two characters and common stop words are dropped.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TOKEN_SPLIT_RE
        .split(text)
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Flat bonus by outcome; failures carry the most information.
pub fn outcome_bonus(outcome: Outcome) -> f64 {
    match outcome {
        Outcome::Failure => 1.0,
        Outcome::Partial => 0.5,
        Outcome::Success => 0.3,
        Outcome::Error => 0.0,
    }
}

/// Multiplier for a run `days` old: 1.0 at age zero, approaching 0.5 as the
/// run ages. A timestamp ahead of `now` gives a negative age and a factor
/// above 1.0.
pub fn recency_factor(days: f64) -> f64 {
    let decay = (-DECAY_RATE * days).exp();
    0.5 + 0.5 * decay
}

/// Relevance of `run` to a set of already-extracted `keywords` at time `now`.
pub fn score_run(run: &Run, keywords: &[String], now: DateTime<Utc>) -> f64 {
    let task = run.task.to_lowercase();
    let files = serde_json::to_string(&run.files_touched)
        .unwrap_or_else(|_| "[]".to_string())
        .to_lowercase();

    let mut score = 0.0;
    for kw in keywords {
        let kw = kw.to_lowercase();
        let tag_hits = run.tags.iter().filter(|t| t.to_lowercase() == kw).count();
        score += TAG_WEIGHT * tag_hits as f64;
        if task.contains(&kw) {
            score += TASK_WEIGHT;
        }
        if files.contains(&kw) {
            score += FILE_WEIGHT;
        }
    }

    score += outcome_bonus(run.outcome);

    if let Some(ts) = run.parsed_timestamp() {
        let days = (now - ts).num_seconds() as f64 / 86_400.0;
        score *= recency_factor(days);
    }

    score
}
