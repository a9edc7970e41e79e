use super::{load_config, read_document};
use crate::script::{Script, Step};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use marrow_editor::address::decode;
use marrow_editor::{Address, Editor, NodeId, Operation, Position, Selection, SelectionStatus};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Markup document to load
    pub document: PathBuf,

    /// JSON script of editing steps
    pub script: PathBuf,

    /// Config file (defaults to marrow.config.json next to the document)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print a JSON summary instead of the step log
    #[arg(long)]
    pub json: bool,
}

/// Outcome of one script step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    /// Whether the editor accepted the step
    pub applied: bool,
    pub model_changed: bool,
    pub operations: Vec<Operation>,
    pub model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplaySummary {
    model: String,
    version: u64,
    undo_levels: usize,
    redo_levels: usize,
    selection: Option<SelectionStatus>,
    steps: Vec<StepReport>,
}

pub fn replay(args: ReplayArgs) -> Result<()> {
    let config = load_config(&args.document, args.config.as_deref())?;
    let markup = read_document(&args.document)?;
    let mut editor = Editor::from_markup(&markup, config)?;
    let script = Script::load(&args.script)?;

    if !args.json {
        println!(
            "{} {} ({} steps)",
            "▶ Replaying".bright_blue().bold(),
            args.script.display(),
            script.len()
        );
        println!("  {}", editor.model_html().dimmed());
    }

    let json = args.json;
    let steps = run_script(&mut editor, &script, |report, step| {
        if !json {
            print_report(report, step);
        }
    })?;

    if json {
        let summary = ReplaySummary {
            model: editor.model_html(),
            version: editor.version(),
            undo_levels: editor.history().undo_levels(),
            redo_levels: editor.history().redo_levels(),
            selection: editor.capture_selection(),
            steps,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!(
            "{} version {}, {} undo levels",
            "✅ Done:".green(),
            editor.version(),
            editor.history().undo_levels()
        );
    }
    Ok(())
}

/// Run every step, reporting each as it completes. Stops at the first
/// step that cannot be carried out.
pub fn run_script(
    editor: &mut Editor,
    script: &Script,
    mut on_step: impl FnMut(&StepReport, &Step),
) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(script.len());

    for (index, step) in script.steps.iter().enumerate() {
        let version = editor.version();
        let applied = run_step(editor, step)
            .with_context(|| format!("Step {} ({}) failed", index + 1, step))?;
        let model_changed = editor.version() != version;
        debug!(step = %step, applied, model_changed, "Step finished");

        let operations = if model_changed && step.mutates() {
            editor.last_operations().to_vec()
        } else {
            Vec::new()
        };
        let report = StepReport {
            index: index + 1,
            step: step.to_string(),
            applied,
            model_changed,
            operations,
            model: editor.model_html(),
        };
        on_step(&report, step);
        reports.push(report);
    }
    Ok(reports)
}

fn resolve(editor: &Editor, address: &Address) -> Result<NodeId> {
    decode(editor.live(), address, editor.address_options())
        .ok_or_else(|| anyhow!("No live node at {}", address))
}

fn run_step(editor: &mut Editor, step: &Step) -> Result<bool> {
    let applied = match step {
        Step::Select {
            address,
            offset,
            focus,
        } => {
            let anchor = Position::new(resolve(editor, address)?, *offset);
            let focus = match focus {
                Some(point) => Position::new(resolve(editor, &point.address)?, point.offset),
                None => anchor,
            };
            editor.set_selection(Some(Selection::range(anchor, focus)));
            true
        }
        Step::Type { text } => editor.insert_text(text),
        Step::Key { key } => editor.handle_key(*key),
        Step::Sync => editor.sync(),
        Step::Undo => editor.undo(),
        Step::Redo => editor.redo(),
        Step::Token { token } => {
            editor.set_caret_token(*token);
            true
        }
        Step::Ignore {
            address,
            trigger,
            descendants,
        } => {
            let node = resolve(editor, address)?;
            editor.ignore(&[node], *trigger, *descendants);
            true
        }
        Step::Enqueue { operations } => editor.enqueue(operations.iter().cloned()),
    };
    Ok(applied)
}

fn print_report(report: &StepReport, step: &Step) {
    let marker = if report.applied {
        "✓".green()
    } else {
        "✗".yellow()
    };
    println!("{} {}. {}", marker, report.index, report.step);

    if !step.mutates() {
        return;
    }
    if report.model_changed {
        for operation in &report.operations {
            let line = serde_json::to_string(operation).unwrap_or_default();
            println!("    {}", line.dimmed());
        }
        println!("  {}", report.model.bright_white());
    } else {
        println!("  {}", "(model unchanged)".dimmed());
    }
}
