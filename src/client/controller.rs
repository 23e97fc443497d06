use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use crate::client::api::{ClientError, ExamInfoApi, HttpExamInfoClient, SaveAck, SavePayload};
use crate::client::autosave::{AutosaveScheduler, SaveTask};
use crate::client::cache::{AnswerCache, CachedProgress};
use crate::client::session::{BrowserSession, SessionIdentity};
use crate::client::tab_monitor::TabMonitor;
use crate::client::ClientConfig;

pub const REGISTRATION_PATH: &str = "/exam/info";

const COMPLETED_KEY: &str = "completed";
const LOCKED_MESSAGE: &str =
    "This exam has already been submitted. Answers can no longer be changed.";
const OFFLINE_MESSAGE: &str = "Could not reach the exam server. Answers are kept on this device.";
const AUTOSAVE_FAILED_MESSAGE: &str =
    "Autosave failed. Your answers are kept on this device and will be sent again shortly.";
const SUBMIT_FAILED_MESSAGE: &str =
    "Could not save this part. Check your connection and submit again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Loading,
    Editing,
    Saving,
    Saved,
    Locked,
}

impl PageState {
    fn accepts_saves(self) -> bool {
        matches!(self, Self::Editing | Self::Saving)
    }
}

/// Banner shown above the exam form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no student is registered in this session")]
    IdentityRequired { redirect_to: &'static str },
    #[error("part {requested} is not available; continue with part {resume_at}")]
    OutOfOrder { requested: u32, resume_at: u32 },
    #[error("part {part} does not exist in this exam")]
    UnknownPart { part: u32 },
    #[error("could not load saved progress: {0}")]
    Load(#[source] ClientError),
    #[error("the page does not accept edits while {0:?}")]
    ReadOnly(PageState),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("this part is already being submitted")]
    AlreadySubmitting,
    #[error("the page cannot be submitted while {0:?}")]
    ReadOnly(PageState),
    #[error("saving the part failed: {0}")]
    SaveFailed(#[source] ClientError),
}

/// Entry point for one student's browser: registration and opening parts.
#[derive(Clone)]
pub struct ExamClient {
    api: Arc<dyn ExamInfoApi>,
    cache: AnswerCache,
    session: BrowserSession,
    debounce: Duration,
    autosave_interval: Duration,
}

impl ExamClient {
    pub fn new(
        api: Arc<dyn ExamInfoApi>,
        cache: AnswerCache,
        session: BrowserSession,
        config: &ClientConfig,
    ) -> Self {
        Self {
            api,
            cache,
            session,
            debounce: config.debounce,
            autosave_interval: config.autosave_interval,
        }
    }

    pub fn from_config(
        config: &ClientConfig,
        session: BrowserSession,
    ) -> Result<Self, ClientError> {
        let api = HttpExamInfoClient::new(&config.base_url, config.timeout)?;
        Ok(Self::new(Arc::new(api), AnswerCache::new(&config.cache_dir), session, config))
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    /// Saves the registration details and signs the student into the session.
    pub async fn register(
        &self,
        exam_id: &str,
        identity: SessionIdentity,
    ) -> Result<SaveAck, ClientError> {
        let payload = payload_for(exam_id, &identity, None, Map::new(), Vec::new(), 0, false);
        let ack = self.api.save(&payload).await?;

        tracing::info!(exam_id, student_id_number = %identity.student_id_number, "Registered");
        self.session.sign_in(identity);
        Ok(ack)
    }

    /// Loads progress and returns the page for `part` (1-based) of `total_parts`.
    pub async fn open_part(
        &self,
        exam_id: &str,
        part: u32,
        total_parts: u32,
    ) -> Result<ExamPage, PageError> {
        let identity = self
            .session
            .identity()
            .ok_or(PageError::IdentityRequired { redirect_to: REGISTRATION_PATH })?;
        if part == 0 || part > total_parts {
            return Err(PageError::UnknownPart { part });
        }

        let (server, offline) = match self.api.load(exam_id, &identity.student_id_number).await {
            Ok(record) => (record, false),
            Err(err) if err.is_transient() => {
                tracing::warn!(exam_id, error = %err, "Loading progress failed; using local cache");
                (None, true)
            }
            Err(err) => return Err(PageError::Load(err)),
        };

        let mut answers = Map::new();
        let mut completed = false;
        let mut last_saved_at = None;
        if let Some(record) = server {
            answers = record.answers;
            completed = record.completed;
            last_saved_at = Some(record.updated_at);
        }

        let cached = self
            .cache
            .read(exam_id)
            .await
            .filter(|cached| cached.student_id_number == identity.student_id_number);
        let (mut revision, mut synced_revision) = (0, 0);
        if let Some(cached) = cached {
            if offline || cached.has_unsynced_edits() {
                answers.extend(cached.answers);
            }
            revision = cached.revision;
            synced_revision = cached.synced_revision;
            last_saved_at = last_saved_at.or(cached.last_saved_at);
        }

        completed |= answers.get(COMPLETED_KEY) == Some(&Value::Bool(true));
        let locked = completed;
        if !locked {
            check_order(&answers, part, total_parts)?;
        }

        let notice = if locked {
            Some(Notice::Info(LOCKED_MESSAGE.to_string()))
        } else if offline {
            Some(Notice::Warning(OFFLINE_MESSAGE.to_string()))
        } else {
            None
        };

        let inner = Arc::new(PageInner {
            api: self.api.clone(),
            cache: self.cache.clone(),
            identity,
            exam_id: exam_id.to_string(),
            part,
            total_parts,
            shared: Mutex::new(PageShared {
                state: if locked { PageState::Locked } else { PageState::Editing },
                answers,
                revision,
                synced_revision,
                monitor: TabMonitor::restore(self.session.clone(), exam_id),
                notice,
                last_saved_at,
            }),
            submitting: AtomicBool::new(false),
            save_gate: tokio::sync::Mutex::new(()),
            cache_gate: tokio::sync::Mutex::new(()),
        });

        let autosave =
            AutosaveScheduler::new(save_task(&inner), self.debounce, self.autosave_interval);
        if !locked {
            autosave.start_periodic();
            if revision > synced_revision {
                autosave.schedule();
            }
        }

        tracing::info!(exam_id, part, locked, offline, "Exam part opened");
        Ok(ExamPage { inner, autosave })
    }
}

/// One open part of the exam.
pub struct ExamPage {
    inner: Arc<PageInner>,
    autosave: AutosaveScheduler,
}

struct PageInner {
    api: Arc<dyn ExamInfoApi>,
    cache: AnswerCache,
    identity: SessionIdentity,
    exam_id: String,
    part: u32,
    total_parts: u32,
    shared: Mutex<PageShared>,
    submitting: AtomicBool,
    // Serializes saves so a pending tab-switch delta is only ever in one request.
    save_gate: tokio::sync::Mutex<()>,
    // Held from snapshot to write so the newest snapshot is always the last on disk.
    cache_gate: tokio::sync::Mutex<()>,
}

struct PageShared {
    state: PageState,
    answers: Map<String, Value>,
    revision: u64,
    synced_revision: u64,
    monitor: TabMonitor,
    notice: Option<Notice>,
    last_saved_at: Option<String>,
}

impl ExamPage {
    pub fn state(&self) -> PageState {
        self.inner.lock().state
    }

    pub fn part(&self) -> u32 {
        self.inner.part
    }

    pub fn answers(&self) -> Map<String, Value> {
        self.inner.lock().answers.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.inner.lock().notice.clone()
    }

    pub fn last_saved_at(&self) -> Option<String> {
        self.inner.lock().last_saved_at.clone()
    }

    pub fn tab_switch_count(&self) -> i64 {
        self.inner.lock().monitor.count()
    }

    pub fn has_unsynced_edits(&self) -> bool {
        let shared = self.inner.lock();
        shared.revision > shared.synced_revision || !shared.monitor.pending().is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::SeqCst)
    }

    /// Records a field edit locally and restarts the debounce timer.
    pub async fn edit(&self, key: impl Into<String>, value: Value) -> Result<(), PageError> {
        {
            let mut shared = self.inner.lock();
            if shared.state != PageState::Editing {
                return Err(PageError::ReadOnly(shared.state));
            }
            shared.answers.insert(key.into(), value);
            shared.revision += 1;
        }

        self.inner.persist_cache().await;
        self.autosave.schedule();
        Ok(())
    }

    /// Returns the alert to show when the tab was hidden by the student.
    pub fn on_visibility_lost(&self, now: OffsetDateTime) -> Option<&'static str> {
        let alert = {
            let mut shared = self.inner.lock();
            if !shared.state.accepts_saves() {
                return None;
            }
            shared.monitor.on_visibility_lost(now)
        };
        if alert.is_some() {
            self.autosave.schedule();
        }
        alert
    }

    /// Whether closing or leaving the page should ask for confirmation.
    pub fn should_warn_on_leave(&self) -> bool {
        let shared = self.inner.lock();
        shared.state.accepts_saves() && !shared.monitor.is_navigating_away()
    }

    /// Marks the next navigation (for example a "back" link) as intended.
    pub fn mark_intentional_navigation(&self) {
        self.inner.lock().monitor.mark_navigating_away();
    }

    /// Best-effort background save. Failures only change the notice.
    pub async fn autosave(&self) {
        self.inner.autosave().await;
    }

    /// Must-succeed save of this part. On success the page is `Saved` and the
    /// next part may be opened; on failure it returns to `Editing`.
    pub async fn submit_part(&self) -> Result<SaveAck, SubmitError> {
        if self.inner.submitting.swap(true, Ordering::SeqCst) {
            return Err(SubmitError::AlreadySubmitting);
        }

        let result = self.inner.submit(&self.autosave).await;
        if result.is_ok() {
            self.autosave.stop();
        }
        self.inner.submitting.store(false, Ordering::SeqCst);
        result
    }

    /// Flushes unsynced work once and stops the timers.
    pub async fn close(self) {
        self.autosave.stop();
        self.inner.autosave().await;
    }
}

impl PageInner {
    fn lock(&self) -> MutexGuard<'_, PageShared> {
        self.shared.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(exam_id = %self.exam_id, "Page state was poisoned; continuing");
            poisoned.into_inner()
        })
    }

    async fn autosave(&self) {
        let _gate = self.save_gate.lock().await;
        {
            let shared = self.lock();
            if shared.state != PageState::Editing {
                return;
            }
            if shared.revision == shared.synced_revision && shared.monitor.pending().is_empty() {
                tracing::debug!(exam_id = %self.exam_id, "Nothing to autosave");
                return;
            }
        }

        match self.push(Map::new(), false).await {
            Ok(_) => {
                self.lock().notice = None;
                self.persist_cache().await;
            }
            Err(err) if err.is_completed_conflict() => {
                let mut shared = self.lock();
                shared.state = PageState::Locked;
                shared.notice = Some(Notice::Info(LOCKED_MESSAGE.to_string()));
            }
            Err(err) => {
                tracing::warn!(exam_id = %self.exam_id, error = %err, "Autosave failed");
                self.lock().notice = Some(Notice::Warning(AUTOSAVE_FAILED_MESSAGE.to_string()));
            }
        }
    }

    async fn submit(&self, autosave: &AutosaveScheduler) -> Result<SaveAck, SubmitError> {
        {
            let mut shared = self.lock();
            if shared.state != PageState::Editing {
                return Err(SubmitError::ReadOnly(shared.state));
            }
            shared.state = PageState::Saving;
            shared.monitor.mark_navigating_away();
        }
        autosave.cancel();

        let final_part = self.part == self.total_parts;
        let mut flags = Map::new();
        flags.insert(submitted_key(self.part), Value::Bool(true));
        if final_part {
            flags.insert(COMPLETED_KEY.to_string(), Value::Bool(true));
        }

        let _gate = self.save_gate.lock().await;
        match self.push(flags.clone(), final_part).await {
            Ok(ack) => {
                {
                    let mut shared = self.lock();
                    shared.state = PageState::Saved;
                    shared.answers.extend(flags);
                    shared.monitor.reset();
                    shared.notice = None;
                }
                if final_part {
                    let _cache = self.cache_gate.lock().await;
                    if let Err(err) = self.cache.clear(&self.exam_id).await {
                        tracing::warn!(exam_id = %self.exam_id, error = %err, "Cache clear failed");
                    }
                } else {
                    self.persist_cache().await;
                }

                tracing::info!(exam_id = %self.exam_id, part = self.part, "Exam part submitted");
                Ok(ack)
            }
            Err(err) => {
                let mut shared = self.lock();
                if err.is_completed_conflict() {
                    shared.state = PageState::Locked;
                    shared.notice = Some(Notice::Info(LOCKED_MESSAGE.to_string()));
                } else {
                    shared.state = PageState::Editing;
                    shared.notice = Some(Notice::Error(SUBMIT_FAILED_MESSAGE.to_string()));
                    shared.monitor.clear_navigating_away();
                }
                tracing::warn!(
                    exam_id = %self.exam_id,
                    part = self.part,
                    error = %err,
                    "Submitting exam part failed"
                );
                Err(SubmitError::SaveFailed(err))
            }
        }
    }

    /// Sends current answers plus `extra` and the pending tab-switch delta.
    /// Callers hold `save_gate`.
    async fn push(
        &self,
        extra: Map<String, Value>,
        completed: bool,
    ) -> Result<SaveAck, ClientError> {
        let (payload, delta, revision) = {
            let shared = self.lock();
            let mut answers = shared.answers.clone();
            answers.extend(extra);
            let delta = shared.monitor.pending();
            let payload = payload_for(
                &self.exam_id,
                &self.identity,
                i32::try_from(self.part).ok(),
                answers,
                delta.timestamps.clone(),
                delta.count,
                completed,
            );
            (payload, delta, shared.revision)
        };

        let ack = self.api.save(&payload).await?;

        let mut shared = self.lock();
        shared.monitor.acknowledge(&delta);
        shared.synced_revision = shared.synced_revision.max(revision);
        shared.last_saved_at = Some(ack.updated_at.clone());
        Ok(ack)
    }

    async fn persist_cache(&self) {
        let _cache = self.cache_gate.lock().await;
        let progress = {
            let shared = self.lock();
            CachedProgress {
                student_id_number: self.identity.student_id_number.clone(),
                answers: shared.answers.clone(),
                page_number: i32::try_from(self.part).ok(),
                revision: shared.revision,
                synced_revision: shared.synced_revision,
                last_saved_at: shared.last_saved_at.clone(),
            }
        };

        if let Err(err) = self.cache.write(&self.exam_id, &progress).await {
            tracing::warn!(exam_id = %self.exam_id, error = %err, "Answer cache write failed");
        }
    }
}

fn save_task(inner: &Arc<PageInner>) -> SaveTask {
    let weak: Weak<PageInner> = Arc::downgrade(inner);
    Arc::new(move || {
        let weak = weak.clone();
        Box::pin(async move {
            if let Some(inner) = weak.upgrade() {
                inner.autosave().await;
            }
        })
    })
}

fn submitted_key(part: u32) -> String {
    format!("part{part}Submitted")
}

fn is_submitted(answers: &Map<String, Value>, part: u32) -> bool {
    answers.get(&submitted_key(part)) == Some(&Value::Bool(true))
}

fn check_order(answers: &Map<String, Value>, part: u32, total_parts: u32) -> Result<(), PageError> {
    let resume_at = (1..=total_parts)
        .find(|candidate| !is_submitted(answers, *candidate))
        .unwrap_or(total_parts);
    let predecessor_done = part == 1 || is_submitted(answers, part - 1);

    if is_submitted(answers, part) || !predecessor_done {
        return Err(PageError::OutOfOrder { requested: part, resume_at });
    }
    Ok(())
}

fn payload_for(
    exam_id: &str,
    identity: &SessionIdentity,
    page_number: Option<i32>,
    answers: Map<String, Value>,
    tab_switch_timestamps: Vec<String>,
    tab_switch_count: i64,
    completed: bool,
) -> SavePayload {
    SavePayload {
        exam_id: exam_id.to_string(),
        student_id_number: identity.student_id_number.clone(),
        page_number,
        answers,
        tab_switch_count,
        tab_switch_timestamps,
        completed,
        first_name: identity.first_name.clone(),
        last_name: identity.last_name.clone(),
        email: identity.email.clone(),
        section: identity.section.clone(),
        exam_code: identity.exam_code.clone(),
    }
}
