//! DROP evaluation - reading comprehension with span answers, scored by
//! exact match and bag-of-token F1

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static ANSWER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Answer\s*:\s*([^\n]+)").unwrap());

const QUERY_TEMPLATE: &str = "Read the passage and answer the question with a short span. \
The last line of your response should be of the form Answer: $SPAN (without quotes).";

struct DropExample {
    passage: &'static str,
    question: &'static str,
    /// Acceptable reference spans, separated by '|'
    answers: &'static str,
}

const DROP_TEST_SAMPLES: &[DropExample] = &[
    DropExample {
        passage: "The Eagles opened the season with a 24-17 win over the Giants. Quarterback Mark Reed threw for 312 yards and two touchdowns, while running back Leo Santos added 94 rushing yards and the game-sealing score in the fourth quarter.",
        question: "How many touchdowns did Mark Reed throw?",
        answers: "two|2",
    },
    DropExample {
        passage: "The city's population grew from 180,000 in 1990 to 245,000 in 2010, driven largely by migration from surrounding rural counties.",
        question: "By how many people did the population grow between 1990 and 2010?",
        answers: "65,000|65000",
    },
    DropExample {
        passage: "Construction of the bridge began in March 1932 and was completed in November 1936, two months ahead of the revised schedule.",
        question: "In what year was the bridge completed?",
        answers: "1936",
    },
    DropExample {
        passage: "Of the company's 1,200 employees, 720 work in manufacturing, 300 in logistics, and the remainder in administration.",
        question: "How many employees work in administration?",
        answers: "180",
    },
    DropExample {
        passage: "The expedition reached base camp on May 2. After a week of acclimatization they pushed to Camp Two, and on May 21 the lead pair stood on the summit.",
        question: "On what date did the lead pair reach the summit?",
        answers: "May 21|21 May",
    },
];

/// SQuAD-style normalization: lowercase, drop punctuation and articles
fn normalize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|token| !matches!(*token, "a" | "an" | "the"))
        .map(|token| token.to_string())
        .collect()
}

fn exact_match(predicted: &str, reference: &str) -> f64 {
    if normalize(predicted) == normalize(reference) {
        1.0
    } else {
        0.0
    }
}

/// Bag-of-token F1 between prediction and one reference
fn f1(predicted: &str, reference: &str) -> f64 {
    let pred_tokens = normalize(predicted);
    let ref_tokens = normalize(reference);
    if pred_tokens.is_empty() || ref_tokens.is_empty() {
        return if pred_tokens == ref_tokens { 1.0 } else { 0.0 };
    }

    let mut ref_counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for token in &ref_tokens {
        *ref_counts.entry(token.as_str()).or_insert(0) += 1;
    }
    let mut overlap = 0usize;
    for token in &pred_tokens {
        if let Some(count) = ref_counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / pred_tokens.len() as f64;
    let recall = overlap as f64 / ref_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Best scores over all '|'-separated reference spans
fn best_scores(predicted: &str, answers: &str) -> (f64, f64) {
    answers
        .split('|')
        .map(|reference| (exact_match(predicted, reference), f1(predicted, reference)))
        .fold((0.0, 0.0), |(best_em, best_f1), (em, f1)| {
            (best_em.max(em), best_f1.max(f1))
        })
}

fn extract_answer(response: &str) -> Option<String> {
    ANSWER_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn format_prompt(example: &DropExample) -> String {
    format!(
        "{}\n\nPassage: {}\n\nQuestion: {}",
        QUERY_TEMPLATE, example.passage, example.question
    )
}

pub struct DropEval {
    examples: Vec<&'static DropExample>,
}

impl DropEval {
    pub fn new(num_examples: Option<usize>) -> Self {
        let limit = num_examples.unwrap_or(DROP_TEST_SAMPLES.len());
        Self {
            examples: DROP_TEST_SAMPLES.iter().take(limit).collect(),
        }
    }

    async fn grade_one(&self, sampler: &dyn Sampler, example: &DropExample) -> SingleEvalResult {
        let convo = vec![Message::user(&format_prompt(example))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, example.answers, &err),
        };

        let extracted = extract_answer(&response).unwrap_or_default();
        let (em, f1_score) = best_scores(&extracted, example.answers);

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(Some(em));
        result.metrics.insert("em".to_string(), em);
        result.metrics.insert("f1_score".to_string(), f1_score);
        result.html = Some(report::render_example(
            &full_convo,
            Some(em),
            example.answers,
            &extracted,
        ));
        result.convo = Some(full_convo);
        result
    }
}

#[async_trait]
impl Eval for DropEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |example| {
            self.grade_one(sampler, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "drop"
    }
}
