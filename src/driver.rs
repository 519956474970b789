//! Execution driver: runs tasks against one sampler, persists report
//! artifacts, and merges per-task results into one comparison table.

use crate::error::{Result, SimpEvalError};
use crate::report;
use crate::samplers::{self, SamplerConfig};
use crate::tasks::{self, TaskOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{info, warn};

/// Base directory for report artifacts
pub const REPORT_BASE_DIR: &str = ".logs";

/// One cell of the cross-task comparison, built from a persisted
/// per-task JSON artifact
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    pub eval_name: String,
    pub sampler_name: String,
    pub metric: Option<f64>,
}

/// One full harness invocation
pub struct RunOptions {
    pub sampler: String,
    pub model_args: String,
    pub tasks: Option<String>,
    pub output_path: Option<String>,
    pub limit: Option<usize>,
    pub judge_model: Option<String>,
    pub batch_size: usize,
    pub api_key: String,
}

fn resolve_task_names(selection: Option<&str>) -> Result<Vec<String>> {
    match selection {
        None => Ok(tasks::available_tasks()
            .into_iter()
            .map(String::from)
            .collect()),
        Some(selection) => {
            let names: Vec<String> = selection
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            for name in &names {
                if !tasks::is_registered(name) {
                    return Err(SimpEvalError::UnknownTask(
                        name.clone(),
                        tasks::available_tasks().join(", "),
                    ));
                }
            }
            Ok(names)
        }
    }
}

fn output_dir(output_path: Option<&str>) -> PathBuf {
    match output_path {
        Some(sub) => Path::new(REPORT_BASE_DIR).join(sub),
        None => PathBuf::from(REPORT_BASE_DIR),
    }
}

/// Run every selected task against the configured sampler and return
/// the merge records backing the printed comparison table.
pub async fn run(opts: &RunOptions) -> Result<Vec<MergeRecord>> {
    // All precondition checks happen before any sampling: unknown task
    // names, bad model args, and a missing judge are startup failures.
    let task_names = resolve_task_names(opts.tasks.as_deref())?;

    let sampler = samplers::get_sampler(&opts.sampler, &opts.model_args, &opts.api_key)?;

    let equality_checker = if task_names.iter().any(|name| name == "math") {
        let judge_args = opts
            .judge_model
            .as_deref()
            .ok_or_else(|| SimpEvalError::MissingJudge("math".to_string()))?;
        let judge_config = SamplerConfig::from_arg_string(&opts.model_args)?
            .with_overrides(judge_args)?;
        Some(samplers::get_sampler_with_config(
            &opts.sampler,
            judge_config,
            &opts.api_key,
        )?)
    } else {
        None
    };

    let task_options = TaskOptions {
        num_examples: opts.limit,
        equality_checker,
    };
    let selected: Vec<_> = task_names
        .iter()
        .map(|name| tasks::build_task(name, &task_options))
        .collect::<Result<_>>()?;

    let out_dir = output_dir(opts.output_path.as_deref());
    fs::create_dir_all(&out_dir)?;
    let debug_suffix = if opts.limit.is_some() { "_DEBUG" } else { "" };

    let mut result_paths: Vec<(String, PathBuf)> = Vec::new();
    for task in &selected {
        info!("Running task {}", task.name());
        let result = task.run(sampler.as_ref(), opts.batch_size).await?;

        let report_path = out_dir.join(format!("{}{}.html", task.name(), debug_suffix));
        info!("Writing report to {}", report_path.display());
        fs::write(&report_path, report::make_report(&result))?;

        let mut metrics = serde_json::Map::new();
        for (name, value) in &result.metrics {
            metrics.insert(name.clone(), serde_json::json!(value));
        }
        metrics.insert("score".to_string(), serde_json::json!(result.score));
        info!(
            "{} metrics: {}",
            task.name(),
            serde_json::Value::Object(metrics.clone())
        );
        let result_path = out_dir.join(format!("{}{}.json", task.name(), debug_suffix));
        info!("Writing results to {}", result_path.display());
        fs::write(
            &result_path,
            serde_json::to_string_pretty(&serde_json::Value::Object(metrics))?,
        )?;
        result_paths.push((task.name().to_string(), result_path));
    }

    let records = merge_reports(&result_paths, &opts.sampler);
    println!("\nAll results:");
    println!("{}", render_table(&records));
    Ok(records)
}

/// Build merge records by re-reading the persisted JSON artifacts.
///
/// Reading from disk instead of the in-memory results is deliberate: it
/// lets the merge run against artifacts left by prior invocations.
/// Unreadable artifacts are skipped, not fatal.
pub fn merge_reports(result_paths: &[(String, PathBuf)], sampler_name: &str) -> Vec<MergeRecord> {
    let mut records = Vec::new();
    for (eval_name, path) in result_paths {
        let value: serde_json::Value = match fs::read_to_string(path)
            .map_err(SimpEvalError::from)
            .and_then(|text| serde_json::from_str(&text).map_err(SimpEvalError::from))
        {
            Ok(value) => value,
            Err(err) => {
                warn!("Skipping unreadable result {}: {}", path.display(), err);
                continue;
            }
        };
        let metric = value
            .get("f1_score")
            .and_then(serde_json::Value::as_f64)
            .or_else(|| value.get("score").and_then(serde_json::Value::as_f64));
        records.push(MergeRecord {
            eval_name: eval_name.clone(),
            sampler_name: sampler_name.to_string(),
            metric,
        });
    }
    records
}

/// Pivot merge records into a display table: one row per sampler, one
/// column per eval name.
pub fn render_table(records: &[MergeRecord]) -> String {
    let mut eval_names: Vec<&str> = records.iter().map(|r| r.eval_name.as_str()).collect();
    eval_names.sort_unstable();
    eval_names.dedup();

    let mut sampler_names: Vec<&str> = Vec::new();
    for record in records {
        if !sampler_names.contains(&record.sampler_name.as_str()) {
            sampler_names.push(&record.sampler_name);
        }
    }

    let mut builder = Builder::default();
    let mut header = vec!["sampler_name".to_string()];
    header.extend(eval_names.iter().map(|s| s.to_string()));
    builder.push_record(header);

    for sampler in &sampler_names {
        let mut row = vec![sampler.to_string()];
        for eval in &eval_names {
            let cell = records
                .iter()
                .find(|r| r.sampler_name == *sampler && r.eval_name == *eval)
                .and_then(|r| r.metric)
                .map(|metric| format!("{:.4}", metric))
                .unwrap_or_else(|| "-".to_string());
            row.push(cell);
        }
        builder.push_record(row);
    }

    builder.build().with(Style::rounded()).to_string()
}
