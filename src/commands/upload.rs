//! Upload command handler: concurrent uploads with per-file progress bars.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Result, bail};
use docvault_core::upload::MAX_UPLOAD_BYTES;
use docvault_core::{
    DuplicateAction, FilesApi, SubmitOptions, SubmitOutcome, TaskId, TransferEngine, UploadError,
    UploadEvent, UploadOrchestrator, UploadPayload, UploadState, UploadTask,
};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Context;
use crate::cli::UploadArgs;

/// Percent progress is tracked at 0.1% resolution.
const BAR_SCALE: u64 = 1000;

pub async fn run_upload_command(ctx: &Context, args: &UploadArgs) -> Result<()> {
    let engine = TransferEngine::new(ctx.client.clone(), &ctx.config);
    let catalog = Arc::new(FilesApi::new(ctx.client.clone()));
    let orchestrator = UploadOrchestrator::new(engine, catalog, &ctx.config);

    let shutdown = CancellationToken::new();
    let sweeper = orchestrator.spawn_sweeper(shutdown.clone());

    // Subscribed before any submission so no `Finished` event is missed.
    let mut events = orchestrator.subscribe();
    let options = SubmitOptions {
        skip_duplicate_check: args.no_duplicate_check,
    };
    let on_duplicate = DuplicateAction::from(args.on_duplicate);

    let mut started: Vec<TaskId> = Vec::new();
    let mut rejected = 0usize;
    let mut skipped = 0usize;

    for path in &args.files {
        let payload = match UploadPayload::from_path(path, MAX_UPLOAD_BYTES).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Upload not started");
                rejected += 1;
                continue;
            }
        };
        match submit_one(&orchestrator, payload, options, on_duplicate).await {
            Ok(Some(id)) => started.push(id),
            Ok(None) => skipped += 1,
            Err(e) => {
                warn!(error = %e, "Upload not started");
                rejected += 1;
            }
        }
    }

    let finished = track_progress(&orchestrator, &mut events, &started, ctx.quiet).await;
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        debug!(error = %e, "sweeper task ended abnormally");
    }

    let mut failed = rejected;
    for task in &finished {
        match task.state {
            UploadState::Success => info!(
                file = %task.file_name,
                file_id = ?task.result_file_id,
                "Uploaded"
            ),
            UploadState::Error => {
                failed += 1;
                warn!(
                    file = %task.file_name,
                    kind = %task.error_kind.map_or("unknown", |k| k.as_str()),
                    message = task.error_message.as_deref().unwrap_or_default(),
                    "Upload failed"
                );
            }
            UploadState::Cancelled => {
                skipped += 1;
                info!(file = %task.file_name, "Upload cancelled");
            }
            UploadState::Uploading => {}
        }
    }

    let total = args.files.len();
    info!(
        succeeded = total.saturating_sub(failed + skipped),
        failed,
        skipped,
        total,
        "Upload run complete"
    );
    if failed > 0 {
        bail!("{failed} of {total} uploads failed");
    }
    Ok(())
}

/// Submits one payload, applying `on_duplicate` to a name conflict.
async fn submit_one(
    orchestrator: &UploadOrchestrator,
    payload: UploadPayload,
    options: SubmitOptions,
    on_duplicate: DuplicateAction,
) -> Result<Option<TaskId>, UploadError> {
    match orchestrator.submit(payload, options).await? {
        SubmitOutcome::Started(id) => Ok(Some(id)),
        SubmitOutcome::Duplicate(pending) => {
            if on_duplicate == DuplicateAction::Cancel {
                info!(
                    file = %pending.payload().file_name,
                    existing_id = pending.existing().id,
                    "Skipping: a file with this name already exists (see --on-duplicate)"
                );
            }
            orchestrator
                .resolve_duplicate(pending.decide(on_duplicate))
                .await
        }
    }
}

/// Drives one bar per task from orchestrator events until every task in
/// `ids` has finished. Returns the terminal snapshots.
async fn track_progress(
    orchestrator: &UploadOrchestrator,
    events: &mut tokio::sync::broadcast::Receiver<UploadEvent>,
    ids: &[TaskId],
    quiet: bool,
) -> Vec<UploadTask> {
    let multi = if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    let style = ProgressStyle::with_template("{bar:30} {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut bars: HashMap<TaskId, ProgressBar> = HashMap::new();
    for id in ids {
        if let Some(task) = orchestrator.task(*id) {
            let bar = multi.add(ProgressBar::new(BAR_SCALE));
            bar.set_style(style.clone());
            bar.set_message(task.file_name.clone());
            bars.insert(*id, bar);
        }
    }

    let mut pending: HashSet<TaskId> = ids.iter().copied().collect();
    let mut finished = Vec::with_capacity(ids.len());
    while !pending.is_empty() {
        match events.recv().await {
            Ok(UploadEvent::Added(_)) => {}
            Ok(UploadEvent::Progress { id, percent }) => {
                if let Some(bar) = bars.get(&id) {
                    bar.set_position(scaled(percent));
                }
            }
            Ok(UploadEvent::Finished(task)) => {
                if pending.remove(&task.id) {
                    finish_bar(bars.get(&task.id), &task);
                    finished.push(task);
                }
            }
            Err(RecvError::Lagged(missed)) => {
                debug!(missed, "progress events lagged; resyncing");
                resync(orchestrator, &bars, &mut pending, &mut finished);
            }
            Err(RecvError::Closed) => break,
        }
    }
    finished
}

/// Reads task snapshots directly after missed events.
fn resync(
    orchestrator: &UploadOrchestrator,
    bars: &HashMap<TaskId, ProgressBar>,
    pending: &mut HashSet<TaskId>,
    finished: &mut Vec<UploadTask>,
) {
    pending.retain(|id| match orchestrator.task(*id) {
        Some(task) if task.state.is_terminal() => {
            finish_bar(bars.get(id), &task);
            finished.push(task);
            false
        }
        Some(task) => {
            if let Some(bar) = bars.get(id) {
                bar.set_position(scaled(task.progress));
            }
            true
        }
        None => false,
    });
}

fn finish_bar(bar: Option<&ProgressBar>, task: &UploadTask) {
    let Some(bar) = bar else {
        return;
    };
    match task.state {
        UploadState::Success => {
            bar.set_position(BAR_SCALE);
            bar.finish_with_message(format!("{} done", task.file_name));
        }
        UploadState::Error => bar.abandon_with_message(format!(
            "{} failed: {}",
            task.file_name,
            task.error_message.as_deref().unwrap_or("unknown error")
        )),
        UploadState::Cancelled => {
            bar.abandon_with_message(format!("{} cancelled", task.file_name));
        }
        UploadState::Uploading => {}
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(percent: f64) -> u64 {
    (percent.clamp(0.0, 100.0) * 10.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_clamps_and_rounds() {
        assert_eq!(scaled(-5.0), 0);
        assert_eq!(scaled(12.34), 123);
        assert_eq!(scaled(100.0), BAR_SCALE);
        assert_eq!(scaled(250.0), BAR_SCALE);
    }
}
