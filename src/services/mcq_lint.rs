//! 选择题静态检查
//!
//! 检查必填字段、选项集合、常见命题缺陷以及过于相近的选项，按问题数量给出 1-10 分。

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 最少选项数
pub const MIN_OPTIONS: usize = 3;
/// 选项词数与平均值的最大偏差
pub const MAX_LENGTH_DEVIATION: f64 = 5.0;
/// 选项词集合 Jaccard 相似度上限
pub const MAX_OPTION_JACCARD: f64 = 0.8;

static NEGATIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bnot\b",
        r"\bexcept\b",
        r"\bunless\b",
        r"\bwithout\b",
        r"which of the following is not",
        r"which is not",
        r"which are not",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

const PROBLEMATIC_PHRASES: [&str; 3] = ["all of the above", "none of the above", "both a and b"];

/// 待检查的选择题，选项以字母键区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct McqDraft {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub correct: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub quality_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLintItem {
    pub question: String,
    pub validation: LintReport,
}

fn check_missing_fields(mcq: &McqDraft) -> Vec<String> {
    let mut errors = Vec::new();
    if mcq.question.trim().is_empty() {
        errors.push("Missing required field: question".to_string());
    }
    if mcq.options.is_empty() {
        errors.push("Missing required field: options".to_string());
    }
    if mcq.correct.trim().is_empty() {
        errors.push("Missing required field: correct".to_string());
    }
    errors
}

fn check_options(mcq: &McqDraft) -> Vec<String> {
    let mut errors = Vec::new();
    if mcq.options.is_empty() {
        errors.push("Options must be a non-empty mapping".to_string());
        return errors;
    }

    if mcq.options.len() < MIN_OPTIONS {
        errors.push(format!(
            "Too few options: {}. At least {} required.",
            mcq.options.len(),
            MIN_OPTIONS
        ));
    }

    if !mcq.correct.is_empty() && !mcq.options.contains_key(&mcq.correct) {
        errors.push(format!(
            "Correct answer '{}' not found in options",
            mcq.correct
        ));
    }

    let mut seen = HashSet::new();
    if !mcq
        .options
        .values()
        .all(|v| seen.insert(v.trim().to_lowercase()))
    {
        errors.push("Duplicate option values detected".to_string());
    }

    errors
}

fn check_common_flaws(mcq: &McqDraft) -> Vec<String> {
    let mut errors = Vec::new();
    let question = mcq.question.to_lowercase();

    if NEGATIVE_PATTERNS.iter().any(|re| re.is_match(&question)) {
        errors.push("Question contains negative phrasing".to_string());
    }

    let options: Vec<String> = mcq.options.values().map(|v| v.to_lowercase()).collect();
    for option in &options {
        if let Some(phrase) = PROBLEMATIC_PHRASES.iter().find(|p| option.contains(*p)) {
            errors.push(format!("Option contains problematic phrase: '{}'", phrase));
        }
    }

    if !options.is_empty() {
        let lengths: Vec<f64> = options
            .iter()
            .map(|o| o.split_whitespace().count() as f64)
            .collect();
        let average = lengths.iter().sum::<f64>() / lengths.len() as f64;
        if lengths
            .iter()
            .any(|len| (len - average).abs() > MAX_LENGTH_DEVIATION)
        {
            errors.push("Options have significantly different lengths".to_string());
        }
    }

    errors
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn check_option_similarity(mcq: &McqDraft) -> Vec<String> {
    let options: Vec<&String> = mcq.options.values().collect();
    let sets: Vec<HashSet<String>> = options.iter().map(|o| word_set(o)).collect();
    let mut errors = Vec::new();

    for i in 0..options.len() {
        for j in (i + 1)..options.len() {
            let union = sets[i].union(&sets[j]).count();
            if union == 0 {
                continue;
            }
            let jaccard = sets[i].intersection(&sets[j]).count() as f64 / union as f64;
            if jaccard > MAX_OPTION_JACCARD {
                errors.push(format!(
                    "Options are too similar: '{}' and '{}'",
                    options[i], options[j]
                ));
            }
        }
    }

    errors
}

/// 检查单道题
pub fn lint_mcq(mcq: &McqDraft) -> LintReport {
    let errors: Vec<String> = [
        check_missing_fields(mcq),
        check_options(mcq),
        check_common_flaws(mcq),
        check_option_similarity(mcq),
    ]
    .concat();

    let quality_score = 10usize.saturating_sub(errors.len()).max(1) as u8;
    LintReport {
        is_valid: errors.is_empty(),
        errors,
        quality_score,
    }
}

/// 批量检查
pub fn lint_mcq_batch(questions: &[McqDraft]) -> Vec<BatchLintItem> {
    questions
        .iter()
        .map(|mcq| BatchLintItem {
            question: mcq.question.clone(),
            validation: lint_mcq(mcq),
        })
        .collect()
}
