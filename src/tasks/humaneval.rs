//! HumanEval-style code completion, graded by static comparison of the
//! extracted code against the canonical solution body. Execution-based
//! grading is deliberately not part of this harness.

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced code block, with or without a language tag
static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:python)?\n([\s\S]*?)```").unwrap());

const QUERY_TEMPLATE: &str = "Complete the following Python function. \
Reply with the full function definition inside a single code block.";

struct HumanEvalExample {
    /// Function signature plus docstring, as handed to the model
    prompt: &'static str,
    /// Canonical solution body used for grading
    canonical_body: &'static str,
}

const HUMANEVAL_TEST_SAMPLES: &[HumanEvalExample] = &[
    HumanEvalExample {
        prompt: "def add(a: int, b: int) -> int:\n    \"\"\"Return the sum of a and b.\"\"\"\n",
        canonical_body: "return a + b",
    },
    HumanEvalExample {
        prompt: "def double(x: int) -> int:\n    \"\"\"Return x multiplied by two.\"\"\"\n",
        canonical_body: "return x * 2",
    },
    HumanEvalExample {
        prompt: "def is_even(n: int) -> bool:\n    \"\"\"Return True if n is even.\"\"\"\n",
        canonical_body: "return n % 2 == 0",
    },
    HumanEvalExample {
        prompt: "def last_char(s: str) -> str:\n    \"\"\"Return the last character of s.\"\"\"\n",
        canonical_body: "return s[-1]",
    },
    HumanEvalExample {
        prompt: "def maximum(xs: list) -> int:\n    \"\"\"Return the largest element of xs.\"\"\"\n",
        canonical_body: "return max(xs)",
    },
];

/// Prefer a fenced code block; otherwise take the raw response
fn extract_code(response: &str) -> String {
    CODE_BLOCK_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| response.to_string())
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whitespace-insensitive containment of the canonical body
fn matches_canonical(code: &str, canonical_body: &str) -> bool {
    strip_whitespace(code).contains(&strip_whitespace(canonical_body))
}

fn format_prompt(example: &HumanEvalExample) -> String {
    format!("{}\n\n```python\n{}```", QUERY_TEMPLATE, example.prompt)
}

pub struct HumanEval {
    examples: Vec<&'static HumanEvalExample>,
}

impl HumanEval {
    pub fn new(num_examples: Option<usize>) -> Self {
        let limit = num_examples.unwrap_or(HUMANEVAL_TEST_SAMPLES.len());
        Self {
            examples: HUMANEVAL_TEST_SAMPLES.iter().take(limit).collect(),
        }
    }

    async fn grade_one(
        &self,
        sampler: &dyn Sampler,
        example: &HumanEvalExample,
    ) -> SingleEvalResult {
        let convo = vec![Message::user(&format_prompt(example))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, example.canonical_body, &err),
        };

        let code = extract_code(&response);
        let score = if matches_canonical(&code, example.canonical_body) {
            1.0
        } else {
            0.0
        };

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(Some(score));
        result.html = Some(report::render_example(
            &full_convo,
            Some(score),
            example.canonical_body,
            &code,
        ));
        result.convo = Some(full_convo);
        result
    }
}

#[async_trait]
impl Eval for HumanEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |example| {
            self.grade_one(sampler, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "humaneval"
    }
}
