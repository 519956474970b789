//! Task registry and benchmark implementations

pub mod drop;
pub mod gpqa;
pub mod humaneval;
pub mod math;
pub mod mgsm;
pub mod mmlu;

use crate::error::{Result, SimpEvalError};
use crate::types::{Eval, MessageList, Sampler, SingleEvalResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Per-run task construction options
#[derive(Default, Clone)]
pub struct TaskOptions {
    /// Deterministic cap on examples, for smoke runs only
    pub num_examples: Option<usize>,
    /// Judge sampler for tasks that grade by equivalence
    pub equality_checker: Option<Arc<dyn Sampler>>,
}

/// Task factory function type
type TaskFactory = fn(&TaskOptions) -> Result<Box<dyn Eval>>;

static TASK_REGISTRY: Lazy<HashMap<&'static str, TaskFactory>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, TaskFactory> = HashMap::new();
    m.insert("drop", |opts| Ok(Box::new(drop::DropEval::new(opts.num_examples))));
    m.insert("gpqa", |opts| Ok(Box::new(gpqa::GpqaEval::new(opts.num_examples))));
    m.insert("humaneval", |opts| {
        Ok(Box::new(humaneval::HumanEval::new(opts.num_examples)))
    });
    m.insert("math", |opts| {
        let checker = opts
            .equality_checker
            .clone()
            .ok_or_else(|| SimpEvalError::MissingJudge("math".to_string()))?;
        Ok(Box::new(math::MathEval::new(opts.num_examples, checker)))
    });
    m.insert("mgsm", |opts| Ok(Box::new(mgsm::MgsmEval::new(opts.num_examples))));
    m.insert("mmlu", |opts| Ok(Box::new(mmlu::MmluEval::new(opts.num_examples))));
    m
});

/// Build a task by registry name
pub fn build_task(name: &str, options: &TaskOptions) -> Result<Box<dyn Eval>> {
    let factory = TASK_REGISTRY.get(name).ok_or_else(|| {
        SimpEvalError::UnknownTask(name.to_string(), available_tasks().join(", "))
    })?;
    factory(options)
}

pub fn is_registered(name: &str) -> bool {
    TASK_REGISTRY.contains_key(name)
}

/// All registered task names, sorted
pub fn available_tasks() -> Vec<&'static str> {
    let mut names: Vec<&str> = TASK_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Record a sampler failure as an incorrect example instead of aborting
/// the task run.
pub(crate) fn failed_sample_result(
    convo: MessageList,
    correct_answer: &str,
    err: &SimpEvalError,
) -> SingleEvalResult {
    warn!("Sampler failed, scoring example as incorrect: {}", err);
    let mut result = SingleEvalResult::new(Some(0.0));
    result.html = Some(crate::report::render_example(
        &convo,
        Some(0.0),
        correct_answer,
        "",
    ));
    result.convo = Some(convo);
    result
}
