//! Answer-key scoring for exam parts.
//!
//! Scoring is a pure function of the submitted answer map and a part's key.
//! Keys live only on the server (see `exam_catalog`); the client never sees
//! them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CompareMode {
    /// Compared as typed, case-sensitive.
    Exact,
    /// Uppercased with whitespace and punctuation removed.
    Normalized,
    /// True/false answers; accepts JSON booleans and common spellings.
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum ScoringRule {
    Match { mode: CompareMode },
    Graph {
        #[serde(default)]
        directed: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PartKey {
    pub(crate) part: u32,
    #[serde(default)]
    pub(crate) title: String,
    pub(crate) rule: ScoringRule,
    pub(crate) max_score: u32,
    #[serde(default)]
    pub(crate) scale_divisor: Option<f64>,
    pub(crate) answers: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PartScore {
    pub(crate) raw: i64,
    pub(crate) max_score: u32,
    /// `raw / scale_divisor`, two decimals. May exceed `max_score`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scaled: Option<f64>,
}

pub(crate) fn score_part(key: &PartKey, submitted: &Map<String, Value>) -> PartScore {
    let raw = match key.rule {
        ScoringRule::Match { mode } => count_matches(mode, &key.answers, submitted),
        ScoringRule::Graph { directed } => graph_score(directed, &key.answers, submitted),
    };

    let scaled = key
        .scale_divisor
        .filter(|divisor| *divisor > 0.0)
        .map(|divisor| round_two_decimals(raw as f64 / divisor));

    PartScore { raw, max_score: key.max_score, scaled }
}

pub(crate) fn score_parts<'a>(
    parts: impl IntoIterator<Item = &'a PartKey>,
    submitted: &Map<String, Value>,
) -> BTreeMap<u32, PartScore> {
    parts.into_iter().map(|key| (key.part, score_part(key, submitted))).collect()
}

fn count_matches(
    mode: CompareMode,
    expected: &BTreeMap<String, Value>,
    submitted: &Map<String, Value>,
) -> i64 {
    expected
        .iter()
        .filter(|(question, correct)| {
            submitted
                .get(question.as_str())
                .is_some_and(|given| answer_matches(mode, given, correct))
        })
        .count() as i64
}

pub(crate) fn answer_matches(mode: CompareMode, given: &Value, correct: &Value) -> bool {
    match mode {
        CompareMode::Exact => match (as_text(given), as_text(correct)) {
            (Some(given), Some(correct)) => !given.is_empty() && given == correct,
            _ => false,
        },
        CompareMode::Normalized => match (as_text(given), as_text(correct)) {
            (Some(given), Some(correct)) => {
                let given = normalize(&given);
                !given.is_empty() && given == normalize(&correct)
            }
            _ => false,
        },
        CompareMode::Boolean => match (as_bool(given), as_bool(correct)) {
            (Some(given), Some(correct)) => given == correct,
            _ => false,
        },
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Uppercase and keep only alphanumerics: `" b) "` and `"B"` compare equal.
pub(crate) fn normalize(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_uppercase).collect()
}

fn graph_score(
    directed: bool,
    expected: &BTreeMap<String, Value>,
    submitted: &Map<String, Value>,
) -> i64 {
    let mut net = 0i64;

    for (question, correct) in expected {
        let correct_edges: BTreeSet<Edge> = edge_items(correct)
            .iter()
            .filter_map(|item| Edge::parse(item, directed))
            .collect();

        let Some(given) = submitted.get(question.as_str()) else {
            continue;
        };

        let mut seen = BTreeSet::new();
        for item in edge_items(given) {
            match Edge::parse(&item, directed) {
                Some(edge) if !seen.insert(edge.clone()) => {}
                Some(edge) if correct_edges.contains(&edge) => net += 1,
                _ => net -= 1,
            }
        }
    }

    net.max(0)
}

fn edge_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Array(pair) if pair.len() == 2 => {
                    let from = as_text(&pair[0])?;
                    let to = as_text(&pair[1])?;
                    Some(format!("{from}-{to}"))
                }
                other => Some(other.to_string()),
            })
            .filter(|item| !item.is_empty())
            .collect(),
        Value::String(text) => text
            .split([';', '\n'])
            .flat_map(|chunk| {
                // "A-B, B-C" style lists; a lone "A,B" is a single edge.
                if chunk.contains('-') {
                    chunk.split(',').map(str::to_string).collect::<Vec<_>>()
                } else {
                    vec![chunk.to_string()]
                }
            })
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Edge(String, String);

impl Edge {
    fn parse(raw: &str, directed: bool) -> Option<Self> {
        let cleaned = raw.trim().trim_matches(|c: char| matches!(c, '(' | ')' | '{' | '}'));
        let (from, to) =
            ["->", "-", ","].iter().find_map(|separator| cleaned.split_once(*separator))?;

        let from = normalize(from);
        let to = normalize(to);
        if from.is_empty() || to.is_empty() || from == to {
            return None;
        }

        if !directed && to < from {
            Some(Self(to, from))
        } else {
            Some(Self(from, to))
        }
    }
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
