//! MATH evaluation - free-form answers judged for equivalence by a
//! second sampler

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

static ANSWER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Answer\s*:\s*([^\n]+)").unwrap());

const QUERY_TEMPLATE: &str = "Solve the following math problem step by step. \
The last line of your response should be of the form Answer: $ANSWER (without quotes) \
where $ANSWER is the answer to the problem.";

const EQUALITY_TEMPLATE: &str = "Look at the following two expressions (answers to a math \
problem) and judge whether they are equivalent. Only perform trivial simplifications.\n\n\
Expression 1: {expr1}\nExpression 2: {expr2}\n\n\
Respond with only \"Yes\" or \"No\".";

struct MathExample {
    problem: &'static str,
    answer: &'static str,
}

const MATH_TEST_SAMPLES: &[MathExample] = &[
    MathExample {
        problem: "What is the value of 3 + 4 * 2?",
        answer: "11",
    },
    MathExample {
        problem: "Simplify the fraction 6/8 to lowest terms.",
        answer: "3/4",
    },
    MathExample {
        problem: "If f(x) = 2x + 1, what is f(5)?",
        answer: "11",
    },
    MathExample {
        problem: "What is the probability of rolling a sum of 12 with two fair six-sided dice?",
        answer: "1/36",
    },
    MathExample {
        problem: "Solve for x: 2x - 6 = 0.",
        answer: "3",
    },
    MathExample {
        problem: "What is the area of a circle with radius 2, in terms of pi?",
        answer: "4\\pi",
    },
    MathExample {
        problem: "Compute the sum of the first 10 positive integers.",
        answer: "55",
    },
];

fn format_prompt(example: &MathExample) -> String {
    format!("{}\n\n{}", QUERY_TEMPLATE, example.problem)
}

fn extract_answer(response: &str) -> Option<String> {
    ANSWER_RE
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

pub struct MathEval {
    examples: Vec<&'static MathExample>,
    equality_checker: Arc<dyn Sampler>,
}

impl MathEval {
    /// The equality checker is a required constructor parameter; a math
    /// eval cannot exist without one.
    pub fn new(num_examples: Option<usize>, equality_checker: Arc<dyn Sampler>) -> Self {
        let limit = num_examples.unwrap_or(MATH_TEST_SAMPLES.len());
        Self {
            examples: MATH_TEST_SAMPLES.iter().take(limit).collect(),
            equality_checker,
        }
    }

    /// Ask the judge whether the two expressions are equivalent.
    /// Returns None when the judge itself fails.
    async fn check_equality(&self, expected: &str, actual: &str) -> Option<bool> {
        let prompt = EQUALITY_TEMPLATE
            .replace("{expr1}", expected)
            .replace("{expr2}", actual);
        let convo = vec![Message::user(&prompt)];
        match self.equality_checker.sample(&convo).await {
            Ok(verdict) => Some(verdict.trim().to_lowercase().starts_with("yes")),
            Err(err) => {
                warn!("Equality checker failed, leaving example ungraded: {}", err);
                None
            }
        }
    }

    async fn grade_one(&self, sampler: &dyn Sampler, example: &MathExample) -> SingleEvalResult {
        let convo = vec![Message::user(&format_prompt(example))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, example.answer, &err),
        };

        let extracted = extract_answer(&response).unwrap_or_default();
        let score = if extracted.is_empty() {
            Some(0.0)
        } else {
            self.check_equality(example.answer, &extracted)
                .await
                .map(|equal| if equal { 1.0 } else { 0.0 })
        };

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(score);
        result.html = Some(report::render_example(
            &full_convo,
            score,
            example.answer,
            &extracted,
        ));
        result.convo = Some(full_convo);
        result
    }
}

#[async_trait]
impl Eval for MathEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |example| {
            self.grade_one(sampler, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "math"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SimpEvalError};
    use crate::types::MessageList;

    struct FixedSampler(&'static str);

    #[async_trait]
    impl Sampler for FixedSampler {
        async fn sample(&self, _message_list: &MessageList) -> Result<String> {
            Ok(self.0.to_string())
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingSampler;

    #[async_trait]
    impl Sampler for FailingSampler {
        async fn sample(&self, _message_list: &MessageList) -> Result<String> {
            Err(SimpEvalError::ApiError("down".to_string()))
        }
        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_extract_answer() {
        assert_eq!(
            extract_answer("Working it out...\nAnswer: 3/4"),
            Some("3/4".to_string())
        );
        assert_eq!(extract_answer("answer:  11 "), Some("11".to_string()));
        assert_eq!(extract_answer("no structured answer"), None);
    }

    #[tokio::test]
    async fn test_judge_yes_scores_correct() {
        let eval = MathEval::new(Some(2), Arc::new(FixedSampler("Yes")));
        let result = eval.run(&FixedSampler("Answer: 11"), 1).await.unwrap();
        assert_eq!(result.score, Some(1.0));
        assert_eq!(result.htmls.len(), 2);
        assert_eq!(result.convos.len(), 2);
    }

    #[tokio::test]
    async fn test_judge_no_scores_incorrect() {
        let eval = MathEval::new(Some(1), Arc::new(FixedSampler("No")));
        let result = eval.run(&FixedSampler("Answer: 12"), 1).await.unwrap();
        assert_eq!(result.score, Some(0.0));
    }

    #[tokio::test]
    async fn test_judge_failure_leaves_null_score() {
        let eval = MathEval::new(Some(1), Arc::new(FailingSampler));
        let result = eval.run(&FixedSampler("Answer: 11"), 1).await.unwrap();
        // The only example is ungraded, so there is no aggregate score,
        // but it is still counted in the transcript vectors.
        assert_eq!(result.score, None);
        assert_eq!(result.htmls.len(), 1);
        assert_eq!(result.convos.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_response_scores_zero_without_judge_call() {
        let eval = MathEval::new(Some(1), Arc::new(FailingSampler));
        let result = eval.run(&FixedSampler("I refuse to answer"), 1).await.unwrap();
        assert_eq!(result.score, Some(0.0));
    }
}
