//! MMLU evaluation - multiple-choice questions across academic subjects

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for extracting "Answer: X" with an optional $ wrapper
static ANSWER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Answer\s*:\s*\$?([A-D])\$?").unwrap());

const QUERY_TEMPLATE: &str = "Answer the following multiple choice question. \
The last line of your response should be of the following format: 'Answer: $LETTER' \
(without quotes) where LETTER is one of ABCD. Think step by step before answering.";

struct MmluExample {
    subject: &'static str,
    question: &'static str,
    options: [&'static str; 4],
    answer: &'static str,
}

/// Embedded MMLU-style questions (loaded from the published CSV split in
/// a full deployment)
const MMLU_TEST_SAMPLES: &[MmluExample] = &[
    MmluExample {
        subject: "astronomy",
        question: "Which planet in the solar system has the shortest orbital period?",
        options: ["Mercury", "Venus", "Mars", "Neptune"],
        answer: "A",
    },
    MmluExample {
        subject: "college_biology",
        question: "Which organelle is the primary site of ATP synthesis in eukaryotic cells?",
        options: ["Ribosome", "Golgi apparatus", "Mitochondrion", "Lysosome"],
        answer: "C",
    },
    MmluExample {
        subject: "high_school_mathematics",
        question: "What is the derivative of x^3 with respect to x?",
        options: ["x^2", "3x^2", "3x", "x^3/3"],
        answer: "B",
    },
    MmluExample {
        subject: "world_history",
        question: "The Treaty of Westphalia in 1648 is most associated with which development?",
        options: [
            "The start of the Hundred Years' War",
            "The unification of Germany",
            "The modern system of sovereign states",
            "The dissolution of the Ottoman Empire",
        ],
        answer: "C",
    },
    MmluExample {
        subject: "computer_science",
        question: "What is the worst-case time complexity of binary search on a sorted array of n elements?",
        options: ["O(n)", "O(n log n)", "O(log n)", "O(1)"],
        answer: "C",
    },
    MmluExample {
        subject: "chemistry",
        question: "What is the pH of a neutral aqueous solution at 25 degrees Celsius?",
        options: ["0", "7", "14", "1"],
        answer: "B",
    },
    MmluExample {
        subject: "economics",
        question: "Ceteris paribus, an increase in the supply of a good will typically cause its equilibrium price to",
        options: ["rise", "fall", "stay constant", "become indeterminate"],
        answer: "B",
    },
    MmluExample {
        subject: "physics",
        question: "A ball is thrown straight up. At the highest point of its trajectory, its acceleration is",
        options: [
            "zero",
            "9.8 m/s^2 upward",
            "9.8 m/s^2 downward",
            "dependent on its mass",
        ],
        answer: "C",
    },
];

fn format_prompt(example: &MmluExample) -> String {
    format!(
        "{}\n\n{}\n\nA) {}\nB) {}\nC) {}\nD) {}",
        QUERY_TEMPLATE,
        example.question,
        example.options[0],
        example.options[1],
        example.options[2],
        example.options[3],
    )
}

fn extract_answer(response: &str) -> Option<String> {
    ANSWER_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

pub struct MmluEval {
    examples: Vec<&'static MmluExample>,
}

impl MmluEval {
    pub fn new(num_examples: Option<usize>) -> Self {
        let limit = num_examples.unwrap_or(MMLU_TEST_SAMPLES.len());
        Self {
            examples: MMLU_TEST_SAMPLES.iter().take(limit).collect(),
        }
    }

    async fn grade_one(&self, sampler: &dyn Sampler, example: &MmluExample) -> SingleEvalResult {
        let convo = vec![Message::user(&format_prompt(example))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, example.answer, &err),
        };

        let extracted = extract_answer(&response).unwrap_or_default();
        let score = if extracted == example.answer { 1.0 } else { 0.0 };

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(Some(score));
        result
            .metrics
            .insert(format!("subject:{}", example.subject), score);
        result.html = Some(report::render_example(
            &full_convo,
            Some(score),
            example.answer,
            &extracted,
        ));
        result.convo = Some(full_convo);
        result
    }
}

#[async_trait]
impl Eval for MmluEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |example| {
            self.grade_one(sampler, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "mmlu"
    }
}
