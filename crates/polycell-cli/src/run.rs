//! Run command implementation.

use std::process::ExitCode;
use std::time::Instant;

use polycell_core::{EngineConfig, ExecutionEngine, ExecutionRequest, ExecutionResult, Language};

use crate::colors;

/// Execute one fragment and print the result.
///
/// Exits with failure when the fragment itself failed.
pub async fn execute(
    config: EngineConfig,
    code: &str,
    language: Language,
    cell_id: &str,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let engine = ExecutionEngine::new(config);

    let result = engine
        .execute(&ExecutionRequest::new(code, cell_id, language))
        .await;
    engine.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, language, start);
    }

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(result: &ExecutionResult, language: Language, start: Instant) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
    }

    match &result.error {
        None => {
            if let Some(value) = &result.result {
                println!("{}{}{}", colors::BOLD, value, colors::RESET);
            }
            println!(
                "{}ok{} {}({}, {:.2}s){}",
                colors::GREEN,
                colors::RESET,
                colors::DIM,
                language,
                start.elapsed().as_secs_f64(),
                colors::RESET
            );
        }
        Some(error) => {
            println!(
                "{}{}{}: {}",
                colors::RED,
                error.type_name,
                colors::RESET,
                error.message
            );
            if !error.traceback.is_empty() && error.traceback != result.stderr {
                println!("{}", error.traceback.trim_end());
            }
        }
    }
}
