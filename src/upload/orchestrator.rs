//! Concurrent upload registry.
//!
//! Every started upload gets a [`TaskId`] and an entry in a `DashMap`. All
//! mutation goes through the entry's shard lock, so transitions of one task
//! are serialized. Terminal transitions only apply from `Uploading`, which
//! makes them final and makes [`UploadEvent::Finished`] fire once per task.
//! `Progress` events are sent under the entry lock, so none follows a
//! task's `Finished`. No `DashMap` guard is ever held across an `.await`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use super::classify::classify_upload_failure;
use super::duplicate::{
    DuplicateAction, DuplicateDecision, PendingUpload, find_conflict, name_key, unique_name,
};
use super::error::{UploadError, validate_size};
use super::task::{TaskId, UploadErrorKind, UploadTask};
use crate::config::ClientConfig;
use crate::files::{FileCatalog, FileReference, MAX_LIST_PAGE_SIZE};
use crate::transfer::{
    CancelHandle, ProgressCallback, TransferEngine, TransferError, TransferProgress, UploadPayload,
};

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 256;

/// Options for [`UploadOrchestrator::submit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Skip the duplicate-name check.
    pub skip_duplicate_check: bool,
}

/// What [`UploadOrchestrator::submit`] did.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A task was created and the transfer started.
    Started(TaskId),
    /// The name is taken; nothing started until the conflict is resolved.
    Duplicate(PendingUpload),
}

/// Registry changes, in the order they were applied.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// A task was registered.
    Added(UploadTask),
    /// A task's progress increased.
    Progress {
        /// The task.
        id: TaskId,
        /// New percentage.
        percent: f64,
    },
    /// A task reached its terminal state. Emitted once per task.
    Finished(UploadTask),
}

#[derive(Debug)]
struct TaskEntry {
    seq: u64,
    task: UploadTask,
    cancel: CancelHandle,
    done: watch::Sender<Option<UploadTask>>,
}

#[derive(Debug)]
struct Inner {
    engine: TransferEngine,
    catalog: Arc<dyn FileCatalog>,
    tasks: DashMap<TaskId, TaskEntry>,
    next_seq: AtomicU64,
    events: broadcast::Sender<UploadEvent>,
    retention: Duration,
    sweep_interval: Duration,
    duplicate_scan_limit: u32,
}

/// Runs uploads concurrently and keeps their records.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(engine: TransferEngine, catalog: Arc<dyn FileCatalog>, config: &ClientConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                engine,
                catalog,
                tasks: DashMap::new(),
                next_seq: AtomicU64::new(0),
                events,
                retention: config.task_retention(),
                sweep_interval: config.sweep_interval(),
                duplicate_scan_limit: config.duplicate_scan_limit,
            }),
        }
    }

    /// Validates `payload`, checks for a name conflict, and starts the upload.
    ///
    /// The duplicate check pages through up to `duplicate_scan_limit` listing
    /// entries and is best-effort: two concurrent submissions of the same new
    /// name can both go through.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Validation`] without any network call for empty
    /// or oversized payloads, and [`UploadError::DuplicateCheck`] when the
    /// listing cannot be read.
    #[instrument(skip(self, payload), fields(file_name = %payload.file_name, size = payload.size()))]
    pub async fn submit(
        &self,
        payload: UploadPayload,
        options: SubmitOptions,
    ) -> Result<SubmitOutcome, UploadError> {
        validate_size(payload.size()).map_err(|reason| {
            info!(%reason, "upload rejected by validation");
            UploadError::Validation {
                file_name: payload.file_name.clone(),
                reason,
            }
        })?;

        if !options.skip_duplicate_check {
            let files = self.listing(&payload.file_name).await?;
            if let Some(existing) = find_conflict(&files, &payload.file_name) {
                info!(existing_id = existing.id, "name already taken; awaiting decision");
                return Ok(SubmitOutcome::Duplicate(PendingUpload {
                    existing: existing.clone(),
                    payload,
                }));
            }
        }

        Ok(SubmitOutcome::Started(self.start(payload)))
    }

    /// Applies the caller's decision to a held submission.
    ///
    /// Returns the started task, or `None` for [`DuplicateAction::Cancel`].
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Replace`] if the existing file cannot be
    /// deleted and [`UploadError::DuplicateCheck`] if the listing needed for
    /// a keep-both rename cannot be read. No task is created in either case.
    #[instrument(
        skip(self, decision),
        fields(
            file_name = %decision.conflicting_file_name(),
            existing_id = decision.existing_file_id(),
            action = ?decision.action()
        )
    )]
    pub async fn resolve_duplicate(
        &self,
        decision: DuplicateDecision,
    ) -> Result<Option<TaskId>, UploadError> {
        info!("resolving duplicate");
        let (PendingUpload { payload, existing }, action) = decision.into_parts();

        match action {
            DuplicateAction::Cancel => Ok(None),
            DuplicateAction::Replace => {
                self.inner
                    .catalog
                    .delete(existing.id)
                    .await
                    .map_err(|source| UploadError::Replace {
                        file_name: payload.file_name.clone(),
                        file_id: existing.id,
                        source,
                    })?;
                debug!(file_id = existing.id, "existing file deleted for replace");
                Ok(Some(self.start(payload)))
            }
            DuplicateAction::KeepBoth => {
                let files = self.listing(&payload.file_name).await?;
                let mut taken: HashSet<String> =
                    files.iter().map(|f| name_key(&f.display_name)).collect();
                taken.insert(name_key(&existing.display_name));
                let renamed = unique_name(&payload.file_name, &taken);
                info!(renamed = %renamed, "keeping both under a new name");
                Ok(Some(self.start(payload.renamed(renamed))))
            }
        }
    }

    /// Requests cancellation of an active task.
    ///
    /// Returns `false` for unknown or terminal tasks. The task becomes
    /// `Cancelled` once the transfer has stopped.
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(entry) = self.inner.tasks.get(&id) else {
            return false;
        };
        if !entry.task.is_active() {
            return false;
        }
        entry.cancel.cancel();
        info!(task_id = %id, "upload cancellation requested");
        true
    }

    /// Raises a task's progress. Decreases and terminal tasks are ignored.
    pub fn update_progress(&self, id: TaskId, percent: f64) {
        let Some(mut entry) = self.inner.tasks.get_mut(&id) else {
            return;
        };
        // Sent under the entry lock so it can never follow the task's `Finished`.
        if entry.task.advance(percent) {
            self.emit(UploadEvent::Progress {
                id,
                percent: entry.task.progress,
            });
        }
    }

    /// Removes a task record. An active transfer is cancelled first.
    pub fn remove_task(&self, id: TaskId) -> Option<UploadTask> {
        let (_, entry) = self.inner.tasks.remove(&id)?;
        if entry.task.is_active() {
            entry.cancel.cancel();
        }
        debug!(task_id = %id, "task removed");
        Some(entry.task)
    }

    /// Removes every terminal task. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let before = self.inner.tasks.len();
        self.inner.tasks.retain(|_, entry| entry.task.is_active());
        let removed = before.saturating_sub(self.inner.tasks.len());
        debug!(removed, "cleared completed tasks");
        removed
    }

    /// Snapshot of all tasks, most recently started first.
    #[must_use]
    pub fn tasks(&self) -> Vec<UploadTask> {
        let mut entries: Vec<(u64, UploadTask)> = self
            .inner
            .tasks
            .iter()
            .map(|entry| (entry.seq, entry.task.clone()))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, task)| task).collect()
    }

    /// Snapshot of one task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<UploadTask> {
        self.inner.tasks.get(&id).map(|entry| entry.task.clone())
    }

    /// Waits for a task to reach a terminal state.
    ///
    /// Returns `None` for unknown tasks and tasks removed before finishing.
    pub async fn wait(&self, id: TaskId) -> Option<UploadTask> {
        let mut done = self.inner.tasks.get(&id)?.done.subscribe();
        let finished = done.wait_for(Option::is_some).await.ok()?;
        finished.clone()
    }

    /// Subscribes to registry events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// Evicts terminal tasks older than the retention horizon.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let retention = self.inner.retention;
        let before = self.inner.tasks.len();
        self.inner.tasks.retain(|_, entry| {
            entry.task.is_active()
                || now.saturating_duration_since(entry.task.last_transition) < retention
        });
        let evicted = before.saturating_sub(self.inner.tasks.len());
        if evicted > 0 {
            debug!(evicted, "swept finished tasks");
        }
        evicted
    }

    /// Runs [`sweep`](Self::sweep) on the configured interval until `shutdown` fires.
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let orchestrator = self.clone();
        let period = self.inner.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("upload sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        orchestrator.sweep();
                    }
                }
            }
        })
    }

    /// Reads listing pages newest first until `duplicate_scan_limit` entries
    /// are collected or the listing ends.
    async fn listing(&self, file_name: &str) -> Result<Vec<FileReference>, UploadError> {
        let limit = self.inner.duplicate_scan_limit.max(1) as usize;
        let page_size = self.inner.duplicate_scan_limit.clamp(1, MAX_LIST_PAGE_SIZE);
        let mut files = Vec::new();
        let mut page = 0_u32;
        loop {
            let listing = self
                .inner
                .catalog
                .list(page, page_size)
                .await
                .map_err(|source| {
                    warn!(page, error = %source, "could not read listing for duplicate check");
                    UploadError::DuplicateCheck {
                        file_name: file_name.to_string(),
                        source,
                    }
                })?;
            let returned = listing.files.len();
            files.extend(listing.files);
            if !listing.has_next || returned == 0 || files.len() >= limit {
                break;
            }
            page += 1;
        }
        files.truncate(limit);
        debug!(scanned = files.len(), pages = page + 1, "listing read for duplicate check");
        Ok(files)
    }

    /// Registers a task and spawns its transfer.
    fn start(&self, payload: UploadPayload) -> TaskId {
        let id = TaskId::new();
        let task = UploadTask::new(id, payload.file_name.clone(), payload.size());

        let progress_target = self.clone();
        let on_progress: ProgressCallback = Arc::new(move |progress: TransferProgress| {
            if let Some(percent) = progress.percent {
                progress_target.update_progress(id, percent);
            }
        });
        let (cancel, outcome) = self
            .inner
            .engine
            .begin_upload(payload, on_progress)
            .into_parts();

        // Registered before the transfer runs so no progress tick is lost.
        let (done, _) = watch::channel(None);
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.tasks.insert(
            id,
            TaskEntry {
                seq,
                task: task.clone(),
                cancel,
                done,
            },
        );
        info!(task_id = %id, file_name = %task.file_name, "upload started");
        self.emit(UploadEvent::Added(task));

        let orchestrator = self.clone();
        tokio::spawn(
            async move {
                let result = outcome.await;
                orchestrator.finish(id, result);
            }
            .instrument(info_span!("upload_task", task_id = %id)),
        );
        id
    }

    fn finish(&self, id: TaskId, result: Result<FileReference, TransferError>) {
        let finished = {
            let Some(mut entry) = self.inner.tasks.get_mut(&id) else {
                debug!("task removed before its transfer finished");
                return;
            };
            if !entry.task.is_active() {
                return;
            }
            // An accepted cancel is final even if the transfer already succeeded.
            if entry.cancel.is_cancelled() {
                entry.task.mark_cancelled();
            } else {
                match result {
                    Ok(file) => entry.task.succeed(file.id),
                    Err(e) if e.is_cancelled() => entry.task.mark_cancelled(),
                    Err(e) => {
                        let message = e.failure_message();
                        let kind: UploadErrorKind =
                            classify_upload_failure(&message, e.api_kind());
                        entry.task.fail(kind, message);
                    }
                }
            }
            entry.task.last_transition = Instant::now();
            let snapshot = entry.task.clone();
            entry.done.send_replace(Some(snapshot.clone()));
            snapshot
        };

        info!(
            state = %finished.state,
            error_kind = ?finished.error_kind,
            file_id = ?finished.result_file_id,
            "upload finished"
        );
        self.emit(UploadEvent::Finished(finished));
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
