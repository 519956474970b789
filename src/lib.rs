//! simpeval - a lean harness for benchmarking LLMs through
//! OpenAI-compatible APIs
//!
//! This crate provides:
//! - The Sampler and Eval capability traits plus the shared result model
//! - A retrying chat-completion sampler
//! - Six benchmark tasks selected through a registry
//! - The execution driver with HTML/JSON artifacts and a cross-task
//!   comparison table

pub mod driver;
pub mod error;
pub mod report;
pub mod samplers;
pub mod tasks;
pub mod types;

pub use crate::driver::{merge_reports, render_table, MergeRecord, RunOptions};
pub use crate::error::{Result, SimpEvalError};
pub use crate::samplers::{available_samplers, get_sampler, SamplerConfig, TOKEN_ENV_VAR};
pub use crate::tasks::{available_tasks, build_task, TaskOptions};
pub use crate::types::{
    aggregate_results, Eval, EvalResult, Message, MessageList, Sampler, SingleEvalResult,
};
