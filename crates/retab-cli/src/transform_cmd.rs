//! The `transform` command: drive one run and print the exported table.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use retab_core::{
    GenerationBackend, ReconciliationResult, RunPhase, RunRequest, TemplateRegistry,
    TransformRunner,
};

/// Flags of the `transform` subcommand that shape the run request.
pub struct TransformArgs {
    pub template: Option<String>,
    pub columns: Option<String>,
    pub roster: Option<String>,
    pub hint: Option<String>,
}

/// Read the report text from a file, or stdin when the path is `-` or
/// absent.
pub fn read_report(input: Option<&str>) -> Result<String> {
    match input {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {path}")),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read report from stdin")?;
            Ok(text)
        }
    }
}

/// Resolve template and flag overrides into a run request.
///
/// Explicit flags win over the template; a template is optional as long as
/// `--columns` supplies the contract.
pub fn build_request(
    registry: &TemplateRegistry,
    args: &TransformArgs,
    report_text: String,
) -> Result<RunRequest> {
    let template = match &args.template {
        Some(id) => Some(
            registry
                .get(id)
                .with_context(|| format!("unknown template {id:?}; see `retab templates list`"))?,
        ),
        None => None,
    };
    if template.is_none() && args.columns.is_none() {
        bail!("pass --template or --columns");
    }

    let mut request = match template {
        Some(template) => RunRequest::from_template(template, report_text),
        None => RunRequest {
            report_text,
            columns: Vec::new(),
            hint: String::new(),
            roster: Vec::new(),
        },
    };
    if let Some(value) = &args.columns {
        request.columns = split_list(value);
    }
    if let Some(value) = &args.roster {
        request.roster = split_list(value);
    }
    if let Some(value) = &args.hint {
        request.hint = value.clone();
    }
    Ok(request)
}

/// Drive a runner to completion, echoing settled rows to stderr as they
/// arrive, and return the exportable clean snapshot.
pub async fn execute(backend: Arc<dyn GenerationBackend>, request: RunRequest) -> Result<String> {
    let column_count = request.columns.len();
    let runner = TransformRunner::new(backend);
    runner.start(request)?;

    let mut printed = 0usize;
    loop {
        let phase = runner.phase();
        let rows = runner.rows();
        // The trailing row may still grow cells while the run is live; only
        // echo rows that cannot change any more.
        let stable = if phase == RunPhase::Running {
            rows.len().saturating_sub(1)
        } else {
            rows.len()
        };
        for row in rows.iter().take(stable).skip(printed) {
            eprintln!("{}", render_row(row, column_count));
        }
        printed = printed.max(stable);
        if phase != RunPhase::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if let Some(failure) = runner.last_failure() {
        if let RunPhase::Cooldown { remaining_secs } = runner.phase() {
            bail!(
                "transform failed ({}): {} -- retry available in {remaining_secs}s",
                failure.category,
                failure.message
            );
        }
        bail!("transform failed ({}): {}", failure.category, failure.message);
    }

    match runner.reconciliation() {
        ReconciliationResult::Incomplete(names) => {
            eprintln!("missing participants: {}", names.join(", "));
        }
        ReconciliationResult::Complete => eprintln!("all expected participants reported"),
        ReconciliationResult::Unknown => {}
    }

    Ok(runner.clean_snapshot())
}

/// Split a comma-separated flag value into trimmed, non-empty entries.
/// Accepts full-width commas, since column lists are often pasted from
/// Chinese-language sheets.
fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '，'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render one row padded to the column count, with `-` in place of empty or
/// absent cells.
fn render_row(row: &[String], column_count: usize) -> String {
    let width = column_count.max(row.len()).max(1);
    (0..width)
        .map(|index| {
            row.get(index)
                .map(String::as_str)
                .filter(|cell| !cell.is_empty())
                .unwrap_or("-")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
