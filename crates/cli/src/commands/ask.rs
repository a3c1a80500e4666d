//! `voltrag ask` — Answer a single question.

use super::bootstrap;
use std::path::{Path, PathBuf};
use voltrag_agent::{QueryResult, Session};

pub async fn run(
    config_path: Option<&Path>,
    catalog: Option<PathBuf>,
    message: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = bootstrap::build(config_path, catalog).await?;
    let mut session = Session::new(runtime.orchestrator, runtime.config.memory.memory_window);

    if !json {
        eprint!("  Thinking...");
    }
    let result = session.query(message).await;
    if !json {
        eprint!("\r              \r");
    }

    let result = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render_plain(&result));
    }
    Ok(())
}

fn render_plain(result: &QueryResult) -> String {
    let mut out = result.response_text.trim_end().to_string();
    out.push_str(&format!(
        "\n\nSources: {} document(s)",
        result.retrieved_document_ids.len()
    ));
    if !result.retrieved_document_ids.is_empty() {
        out.push_str(&format!(" ({})", result.retrieved_document_ids.join(", ")));
    }
    out.push_str(&format!("\nModel: {}", result.serving_model));
    for warning in &result.warnings {
        out.push_str(&format!("\nWarning: {warning}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltrag_core::QueryWarning;

    #[test]
    fn plain_output_lists_sources_and_warnings() {
        let result = QueryResult {
            response_text: "About 55.5 Wh.\n".into(),
            retrieved_document_ids: vec!["samsung-25r".into()],
            calculation_block: None,
            serving_model: "gpt-4o-mini".into(),
            warnings: vec![QueryWarning::RetrievalEmpty {
                reason: "index offline".into(),
            }],
            attempts: 1,
        };
        let text = render_plain(&result);
        assert!(text.starts_with("About 55.5 Wh.\n\nSources: 1 document(s) (samsung-25r)"));
        assert!(text.contains("Model: gpt-4o-mini"));
        assert!(text.contains("Warning: No grounding data found: index offline"));
    }
}
