//! Commit message classification.
//!
//! This module provides heuristic classification of commit messages:
//! whether the commit was produced with an AI coding tool, and which
//! conventional-commit type it carries. The heuristics sit behind the
//! [`Classifier`] trait so an alternative strategy can be swapped in
//! through the analytics context.

use crate::types::{CommitInfo, CommitType, Verdict};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Strategy for classifying commit messages.
pub trait Classifier: Send + Sync {
    /// Classifies one commit message.
    fn classify(&self, message: &str) -> Verdict;
}

/// Built-in AI-assistance markers, matched against the lowercased message.
const AI_KEYWORDS: [&str; 16] = [
    "cursor",
    "copilot",
    "claude",
    "chatgpt",
    "gpt-",
    "codeium",
    "tabnine",
    "windsurf",
    "gemini",
    "ai-assisted",
    "ai-generated",
    "auto-generated",
    "generated by ai",
    "自动生成",
    "代码生成",
    "ai生成",
];

static PREFIX_PATTERNS: LazyLock<Vec<(CommitType, Regex)>> = LazyLock::new(|| {
    CommitType::PREFIXED
        .iter()
        .map(|ty| {
            let pattern = format!(r"(?i)^\s*{}(?:\([^)]*\)|\[[^\]]*\])?!?:", ty.as_str());
            (*ty, Regex::new(&pattern).expect("valid commit prefix regex"))
        })
        .collect()
});

/// Keyword and prefix based classifier.
#[derive(Debug, Clone)]
pub struct CommitClassifier {
    keywords: Vec<String>,
}

impl Default for CommitClassifier {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl CommitClassifier {
    /// Creates a classifier with the built-in keywords plus `extra_keywords`.
    pub fn new(extra_keywords: &[String]) -> Self {
        let mut keywords: Vec<String> = AI_KEYWORDS.iter().map(|k| k.to_string()).collect();
        for extra in extra_keywords {
            let extra = extra.trim().to_lowercase();
            if !extra.is_empty() && !keywords.contains(&extra) {
                keywords.push(extra);
            }
        }
        Self { keywords }
    }

    /// Returns true when the message mentions an AI tool or generation marker.
    pub fn is_ai_assisted(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Summarizes a batch of classified commits.
    pub fn analyze_patterns(commits: &[CommitInfo]) -> CommitPatterns {
        let mut by_author: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<CommitType, usize> = BTreeMap::new();
        let mut ai_assisted = 0;

        for commit in commits {
            *by_author.entry(commit.author.clone()).or_default() += 1;
            *by_type.entry(commit.commit_type).or_default() += 1;
            if commit.is_ai_assisted {
                ai_assisted += 1;
            }
        }

        // Name-ascending iteration: a later author must strictly exceed to win.
        let most_active_author = by_author
            .iter()
            .fold(None::<(&String, usize)>, |best, (author, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((author, count)),
            })
            .map(|(author, _)| author.clone());

        let total = commits.len();
        CommitPatterns {
            total_commits: total,
            ai_assisted_commits: ai_assisted,
            ai_rate: if total == 0 {
                0.0
            } else {
                ai_assisted as f64 / total as f64
            },
            by_author,
            by_type,
            most_active_author,
        }
    }
}

impl Classifier for CommitClassifier {
    fn classify(&self, message: &str) -> Verdict {
        Verdict {
            is_ai_assisted: self.is_ai_assisted(message),
            commit_type: commit_type_of(message),
        }
    }
}

/// Returns the first conventional-commit prefix the message carries.
pub fn commit_type_of(message: &str) -> CommitType {
    for (ty, pattern) in PREFIX_PATTERNS.iter() {
        if pattern.is_match(message) {
            return *ty;
        }
    }
    CommitType::Other
}

/// Aggregate view over a list of commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitPatterns {
    pub total_commits: usize,
    pub ai_assisted_commits: usize,
    /// AI-assisted commits / total commits, 0 when there are none.
    pub ai_rate: f64,
    pub by_author: BTreeMap<String, usize>,
    pub by_type: BTreeMap<CommitType, usize>,
    pub most_active_author: Option<String>,
}
