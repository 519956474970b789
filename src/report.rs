//! HTML report rendering for eval results

use crate::types::{EvalResult, Message, MessageList};

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn message_to_html(message: &Message) -> String {
    format!(
        "<div class=\"message {role}\"><div class=\"role\">{role}</div><pre>{content}</pre></div>",
        role = escape(&message.role),
        content = escape(&message.content.as_text()),
    )
}

/// Render one graded example: the sampled conversation plus the verdict
pub fn render_example(
    convo: &MessageList,
    score: Option<f64>,
    correct_answer: &str,
    extracted_answer: &str,
) -> String {
    let messages: String = convo.iter().map(message_to_html).collect();
    let score_text = score
        .map(|s| format!("{:.1}", s))
        .unwrap_or_else(|| "ungraded".to_string());
    format!(
        "<div class=\"example\">{messages}\
<p>Correct Answer: {correct}</p>\
<p>Extracted Answer: {extracted}</p>\
<p>Score: {score}</p></div>",
        messages = messages,
        correct = escape(correct_answer),
        extracted = escape(extracted_answer),
        score = score_text,
    )
}

/// Render a full per-task report: score/metrics header plus every example
pub fn make_report(result: &EvalResult) -> String {
    let score_line = result
        .score
        .map(|s| format!("{:.4}", s))
        .unwrap_or_else(|| "n/a".to_string());
    let metric_rows: String = result
        .metrics
        .iter()
        .map(|(name, value)| {
            format!(
                "<tr><td>{}</td><td>{:.4}</td></tr>",
                escape(name),
                value
            )
        })
        .collect();
    let examples: String = result
        .htmls
        .iter()
        .map(|html| format!("{}<hr>", html))
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
<style>\n\
.message {{ margin: 8px 0; padding: 8px; border-radius: 4px; }}\n\
.message.system {{ background: #fff3cd; }}\n\
.message.user {{ background: #e7f1ff; }}\n\
.message.assistant {{ background: #e6f4ea; }}\n\
.role {{ font-weight: bold; }}\n\
pre {{ white-space: pre-wrap; margin: 4px 0 0 0; }}\n\
</style>\n</head>\n<body>\n\
<h1>Score: {score}</h1>\n\
<table border=\"1\"><tr><th>Metric</th><th>Value</th></tr>{metrics}</table>\n\
{examples}\n</body>\n</html>\n",
        score = score_line,
        metrics = metric_rows,
        examples = examples,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b & c > \"d\""), "a &lt; b &amp; c &gt; &quot;d&quot;");
    }

    #[test]
    fn test_render_example_contains_verdict() {
        let convo = vec![Message::user("What is 2+2?"), Message::assistant("Answer: 4")];
        let html = render_example(&convo, Some(1.0), "4", "4");
        assert!(html.contains("What is 2+2?"));
        assert!(html.contains("Correct Answer: 4"));
        assert!(html.contains("Score: 1.0"));
    }

    #[test]
    fn test_render_example_ungraded() {
        let html = render_example(&vec![], None, "4", "");
        assert!(html.contains("Score: ungraded"));
    }

    #[test]
    fn test_make_report_header_and_examples() {
        let mut metrics = BTreeMap::new();
        metrics.insert("f1_score".to_string(), 0.75);
        let result = EvalResult {
            score: Some(0.5),
            metrics,
            htmls: vec!["<div>one</div>".to_string(), "<div>two</div>".to_string()],
            convos: vec![vec![], vec![]],
        };
        let report = make_report(&result);
        assert!(report.contains("Score: 0.5000"));
        assert!(report.contains("f1_score"));
        assert!(report.contains("<div>one</div>"));
        assert!(report.contains("<div>two</div>"));
    }

    #[test]
    fn test_make_report_handles_null_score() {
        let result = EvalResult {
            score: None,
            metrics: BTreeMap::new(),
            htmls: vec![],
            convos: vec![],
        };
        assert!(make_report(&result).contains("Score: n/a"));
    }
}
