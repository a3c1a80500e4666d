//! `voltrag chat` — Interactive session with conversation memory.

use super::bootstrap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use voltrag_agent::{QueryResult, Session};
use voltrag_core::QueryError;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Clear,
    Empty,
    Query(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" | "/quit" | ":q" => Input::Exit,
        "/clear" => Input::Clear,
        query => Input::Query(query),
    }
}

pub async fn run(
    config_path: Option<&Path>,
    catalog: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = bootstrap::build(config_path, catalog).await?;
    let mut session = Session::new(runtime.orchestrator.clone(), runtime.config.memory.memory_window);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         voltrag — Interactive Session          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Models:    {}", runtime.config.generation.model_priority.join(" → "));
    println!("  Catalog:   {} battery record(s)", runtime.documents);
    println!("  Memory:    last {} interaction(s)", runtime.config.memory.memory_window);
    println!();
    println!("  Ask about cells or packs, e.g. \"energy of a 4S2P pack of Samsung 25R\".");
    println!("  Type '/clear' to forget the conversation, 'exit' to quit.");
    println!("  Ctrl+C cancels a running query.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match classify(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                session.reset();
                println!("  Conversation memory cleared.");
                println!();
            }
            Input::Query(query) => {
                let cancel = CancellationToken::new();
                let watcher = {
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            cancel.cancel();
                        }
                    })
                };

                eprint!("  ...");
                let outcome = session.query_with_cancel(query, &cancel).await;
                watcher.abort();
                eprint!("\r     \r");

                match outcome {
                    Ok(result) => print_result(&result),
                    Err(QueryError::Cancelled { .. }) => {
                        println!("  [Cancelled]");
                        println!();
                    }
                    Err(e) => {
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!();
    for line in result.response_text.lines() {
        println!("  Assistant > {line}");
    }
    println!();
    println!(
        "  Sources: {} document(s)",
        result.retrieved_document_ids.len()
    );
    println!("  Model:   {}", result.serving_model);
    for warning in &result.warnings {
        println!("  ⚠️  {warning}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words() {
        for word in ["exit", "quit", "/exit", "/quit", ":q", "  exit  "] {
            assert_eq!(classify(word), Input::Exit, "{word}");
        }
    }

    #[test]
    fn clear_and_queries() {
        assert_eq!(classify("/clear"), Input::Clear);
        assert_eq!(classify("   "), Input::Empty);
        assert_eq!(
            classify(" What is a 2S3P pack? "),
            Input::Query("What is a 2S3P pack?")
        );
        assert_eq!(classify("exit now"), Input::Query("exit now"));
    }
}
