//! Shared result model and the Sampler/Eval capability traits

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One typed content block inside a structured message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// Message content: plain text or a list of typed blocks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Flatten to plain text (image blocks are dropped)
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Chat-style message with a role and content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(content.to_string()),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new("assistant", content)
    }
}

/// Ordered conversation, the sole input unit to a Sampler call
pub type MessageList = Vec<Message>;

/// A model that answers conversations, possibly used for grading too
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Produce one completion for the conversation.
    ///
    /// Provider-rejected ("invalid request") calls resolve to an empty
    /// string so a single bad example cannot abort a batch; transient
    /// failures are retried internally and only surface as an error once
    /// the configured retry budget is exhausted.
    async fn sample(&self, message_list: &MessageList) -> Result<String>;

    /// Model name, for logging
    fn model_name(&self) -> &str;
}

/// A scored benchmark, runnable against any Sampler
#[async_trait]
pub trait Eval: Send + Sync {
    async fn run(&self, sampler: &dyn Sampler, batch_size: usize) -> Result<EvalResult>;

    fn name(&self) -> &str;
}

/// Result of grading a single example
#[derive(Debug, Clone)]
pub struct SingleEvalResult {
    /// 1.0 correct, 0.0 incorrect, None = ungraded but counted
    pub score: Option<f64>,
    pub metrics: BTreeMap<String, f64>,
    pub html: Option<String>,
    pub convo: Option<MessageList>,
}

impl SingleEvalResult {
    pub fn new(score: Option<f64>) -> Self {
        Self {
            score,
            metrics: BTreeMap::new(),
            html: None,
            convo: None,
        }
    }
}

/// Aggregate result of running one eval over many examples.
///
/// `htmls` and `convos` are index-aligned with the evaluated examples,
/// so both always have one entry per example.
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub score: Option<f64>,
    pub metrics: BTreeMap<String, f64>,
    pub htmls: Vec<String>,
    pub convos: Vec<MessageList>,
}

/// Fold per-example results into one EvalResult.
///
/// The top-line score is the mean of the non-null per-example scores;
/// null scores are excluded from the mean, not treated as zero. Each
/// metric aggregates to the mean of the examples that reported it.
pub fn aggregate_results(results: Vec<SingleEvalResult>) -> EvalResult {
    let scores: Vec<f64> = results.iter().filter_map(|r| r.score).collect();
    let score = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for result in &results {
        for (name, value) in &result.metrics {
            let entry = sums.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    let metrics = sums
        .into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect();

    let htmls = results
        .iter()
        .map(|r| r.html.clone().unwrap_or_default())
        .collect();
    let convos = results
        .into_iter()
        .map(|r| r.convo.unwrap_or_default())
        .collect();

    EvalResult {
        score,
        metrics,
        htmls,
        convos,
    }
}

/// Run `f` over `items` in batch-sized groups.
///
/// Members of one group are awaited together; groups run strictly in
/// order, so a batch size of 1 is fully sequential.
pub async fn map_batched<'a, T, F, Fut>(items: &'a [T], batch_size: usize, f: F) -> Vec<SingleEvalResult>
where
    F: Fn(&'a T) -> Fut,
    Fut: std::future::Future<Output = SingleEvalResult>,
{
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(batch_size) {
        let futures: Vec<_> = chunk.iter().map(&f).collect();
        out.extend(futures::future::join_all(futures).await);
    }
    out
}
