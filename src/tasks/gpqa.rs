//! GPQA evaluation - graduate-level science multiple choice

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Answer\s*:\s*\$?([A-D])\$?").unwrap());

const QUERY_TEMPLATE: &str = "What is the correct answer to this question? \
The last line of your response should be of the following format: 'Answer: $LETTER' \
(without quotes) where LETTER is one of ABCD. Think step by step before answering.";

const LETTERS: [&str; 4] = ["A", "B", "C", "D"];

struct GpqaExample {
    question: &'static str,
    /// Correct choice first; presentation order is rotated per example
    choices: [&'static str; 4],
}

const GPQA_TEST_SAMPLES: &[GpqaExample] = &[
    GpqaExample {
        question: "In quantum mechanics, what is the dimensionality of the Hilbert space describing the spin state of a single electron?",
        choices: ["2", "1", "3", "4"],
    },
    GpqaExample {
        question: "Which amino acid residue most commonly coordinates zinc ions in zinc-finger protein domains?",
        choices: ["Cysteine", "Glycine", "Alanine", "Proline"],
    },
    GpqaExample {
        question: "What is the term symbol of the ground state of atomic carbon?",
        choices: ["3P0", "1S0", "1D2", "5S2"],
    },
    GpqaExample {
        question: "For an ideal monatomic gas, what is the ratio of specific heats gamma = Cp/Cv?",
        choices: ["5/3", "7/5", "4/3", "3/2"],
    },
    GpqaExample {
        question: "Which cosmological observation first indicated the accelerating expansion of the universe?",
        choices: [
            "Type Ia supernova distance measurements",
            "Cosmic microwave background anisotropies",
            "Galaxy rotation curves",
            "Lyman-alpha forest absorption",
        ],
    },
    GpqaExample {
        question: "In organic chemistry, Markovnikov addition of HBr to propene yields predominantly which product?",
        choices: ["2-bromopropane", "1-bromopropane", "1,2-dibromopropane", "propane"],
    },
];

/// Deterministic per-example rotation of the choices, so the correct
/// letter is not always A.
fn presented_choices(example: &GpqaExample, index: usize) -> ([&'static str; 4], &'static str) {
    let shift = index % 4;
    let mut presented = [""; 4];
    for (slot, choice) in example.choices.iter().enumerate() {
        presented[(slot + shift) % 4] = choice;
    }
    (presented, LETTERS[shift])
}

fn format_prompt(question: &str, choices: &[&str; 4]) -> String {
    format!(
        "{}\n\n{}\n\nA) {}\nB) {}\nC) {}\nD) {}",
        QUERY_TEMPLATE, question, choices[0], choices[1], choices[2], choices[3],
    )
}

fn extract_answer(response: &str) -> Option<String> {
    ANSWER_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

pub struct GpqaEval {
    examples: Vec<(usize, &'static GpqaExample)>,
}

impl GpqaEval {
    pub fn new(num_examples: Option<usize>) -> Self {
        let limit = num_examples.unwrap_or(GPQA_TEST_SAMPLES.len());
        Self {
            examples: GPQA_TEST_SAMPLES.iter().enumerate().take(limit).collect(),
        }
    }

    async fn grade_one(
        &self,
        sampler: &dyn Sampler,
        index: usize,
        example: &GpqaExample,
    ) -> SingleEvalResult {
        let (choices, correct_letter) = presented_choices(example, index);
        let convo = vec![Message::user(&format_prompt(example.question, &choices))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, correct_letter, &err),
        };

        let extracted = extract_answer(&response).unwrap_or_default();
        let score = if extracted == correct_letter { 1.0 } else { 0.0 };

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(Some(score));
        result.html = Some(report::render_example(
            &full_convo,
            Some(score),
            correct_letter,
            &extracted,
        ));
        result.convo = Some(full_convo);
        result
    }
}

#[async_trait]
impl Eval for GpqaEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |(index, example)| {
            self.grade_one(sampler, *index, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "gpqa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_moves_correct_letter() {
        let (choices, letter) = presented_choices(&GPQA_TEST_SAMPLES[0], 0);
        assert_eq!(letter, "A");
        assert_eq!(choices[0], GPQA_TEST_SAMPLES[0].choices[0]);

        let (choices, letter) = presented_choices(&GPQA_TEST_SAMPLES[0], 1);
        assert_eq!(letter, "B");
        assert_eq!(choices[1], GPQA_TEST_SAMPLES[0].choices[0]);

        let (_, letter) = presented_choices(&GPQA_TEST_SAMPLES[0], 7);
        assert_eq!(letter, "D");
    }

    #[test]
    fn test_rotation_keeps_all_choices() {
        let (choices, _) = presented_choices(&GPQA_TEST_SAMPLES[1], 3);
        for original in GPQA_TEST_SAMPLES[1].choices {
            assert!(choices.contains(&original));
        }
    }

    #[test]
    fn test_extract_answer() {
        assert_eq!(extract_answer("Answer: A"), Some("A".to_string()));
        assert_eq!(extract_answer("thinking...\nAnswer: $b$"), Some("B".to_string()));
    }

    #[test]
    fn test_num_examples_cap() {
        assert_eq!(GpqaEval::new(Some(2)).examples.len(), 2);
    }
}
