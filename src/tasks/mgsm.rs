//! MGSM evaluation - multilingual grade-school math word problems

use crate::error::Result;
use crate::report;
use crate::tasks::failed_sample_result;
use crate::types::{
    aggregate_results, map_batched, Eval, EvalResult, Message, Sampler, SingleEvalResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for candidate numbers in a response
static NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?[0-9][0-9.,]*").unwrap());

struct MgsmExample {
    language: &'static str,
    /// Per-language instruction asking for a bare numeric answer
    instruction: &'static str,
    question: &'static str,
    answer: &'static str,
}

const MGSM_TEST_SAMPLES: &[MgsmExample] = &[
    MgsmExample {
        language: "en",
        instruction: "Solve this math problem. Give the final numeric answer on the last line prefixed by \"Answer:\".",
        question: "Roger has 5 tennis balls. He buys 2 more cans of tennis balls. Each can has 3 tennis balls. How many tennis balls does he have now?",
        answer: "11",
    },
    MgsmExample {
        language: "en",
        instruction: "Solve this math problem. Give the final numeric answer on the last line prefixed by \"Answer:\".",
        question: "A baker made 48 cookies and sold three quarters of them. How many cookies are left?",
        answer: "12",
    },
    MgsmExample {
        language: "fr",
        instruction: "Resous ce probleme de mathematiques. Donne la reponse numerique finale sur la derniere ligne, precedee de \"Answer:\".",
        question: "Marie a 24 pommes. Elle en donne un tiers a son frere. Combien de pommes lui reste-t-il ?",
        answer: "16",
    },
    MgsmExample {
        language: "de",
        instruction: "Loese diese Matheaufgabe. Gib die endgueltige numerische Antwort in der letzten Zeile mit dem Praefix \"Answer:\" an.",
        question: "Ein Zug faehrt 3 Stunden lang mit 80 km/h. Wie viele Kilometer legt er zurueck?",
        answer: "240",
    },
    MgsmExample {
        language: "es",
        instruction: "Resuelve este problema de matematicas. Da la respuesta numerica final en la ultima linea con el prefijo \"Answer:\".",
        question: "Un agricultor tiene 7 filas de 12 plantas de tomate. Cuantas plantas tiene en total?",
        answer: "84",
    },
    MgsmExample {
        language: "en",
        instruction: "Solve this math problem. Give the final numeric answer on the last line prefixed by \"Answer:\".",
        question: "A library had 120 books. It lent out 45 and received 20 returns. How many books are on the shelves now?",
        answer: "95",
    },
];

/// Normalize a numeric string: strip thousands separators and a
/// trailing period
fn normalize_number(text: &str) -> String {
    text.trim()
        .trim_end_matches('.')
        .replace(',', "")
        .to_string()
}

/// Take the last number in the response as the candidate answer
fn extract_answer(response: &str) -> Option<String> {
    NUM_RE
        .find_iter(response)
        .last()
        .map(|m| normalize_number(m.as_str()))
}

fn format_prompt(example: &MgsmExample) -> String {
    format!("{}\n\n{}", example.instruction, example.question)
}

pub struct MgsmEval {
    examples: Vec<&'static MgsmExample>,
}

impl MgsmEval {
    pub fn new(num_examples: Option<usize>) -> Self {
        let limit = num_examples.unwrap_or(MGSM_TEST_SAMPLES.len());
        Self {
            examples: MGSM_TEST_SAMPLES.iter().take(limit).collect(),
        }
    }

    async fn grade_one(&self, sampler: &dyn Sampler, example: &MgsmExample) -> SingleEvalResult {
        let convo = vec![Message::user(&format_prompt(example))];
        let response = match sampler.sample(&convo).await {
            Ok(response) => response,
            Err(err) => return failed_sample_result(convo, example.answer, &err),
        };

        let extracted = extract_answer(&response).unwrap_or_default();
        let score = if extracted == normalize_number(example.answer) {
            1.0
        } else {
            0.0
        };

        let mut full_convo = convo;
        full_convo.push(Message::assistant(&response));

        let mut result = SingleEvalResult::new(Some(score));
        result
            .metrics
            .insert(format!("lang:{}", example.language), score);
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
impl Eval for MgsmEval {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult> {
        let results = map_batched(&self.examples, batch_size, |example| {
            self.grade_one(sampler, example)
        })
        .await;
        Ok(aggregate_results(results))
    }

    fn name(&self) -> &str {
        "mgsm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_last_number() {
        assert_eq!(extract_answer("5 + 2 * 3 = 11\nAnswer: 11"), Some("11".to_string()));
        assert_eq!(extract_answer("The total is 1,234."), Some("1234".to_string()));
        assert_eq!(extract_answer("no digits"), None);
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("1,234."), "1234");
        assert_eq!(normalize_number(" 95 "), "95");
    }

    #[test]
    fn test_format_prompt_keeps_language_instruction() {
        let example = &MGSM_TEST_SAMPLES[2];
        let prompt = format_prompt(example);
        assert!(prompt.contains("Resous"));
        assert!(prompt.contains(example.question));
    }

    #[test]
    fn test_num_examples_cap() {
        assert_eq!(MgsmEval::new(Some(4)).examples.len(), 4);
        assert_eq!(MgsmEval::new(None).examples.len(), MGSM_TEST_SAMPLES.len());
    }
}
