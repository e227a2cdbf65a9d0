use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------- SSE event type ----------

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProvisionEvent {
    Progress { phase: String, detail: String },
    Result { data: serde_json::Value },
    Error { message: String },
    Cancelled,
    Done,
}

impl ProvisionEvent {
    pub fn to_sse_event(&self) -> Result<Event, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Event::default().data(json))
    }
}

// ---------- job status ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

// ---------- job ----------

pub struct ProvisionJob {
    pub id: String,
    pub school_name: String,
    pub status: JobStatus,
    pub tx: broadcast::Sender<ProvisionEvent>,
    pub cancel: CancellationToken,
    pub created_at: Instant,
    pub finished_at: Option<Instant>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ProvisionJob {
    pub fn new(school_name: String) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            id: Uuid::now_v7().to_string(),
            school_name,
            status: JobStatus::Running,
            tx,
            cancel: CancellationToken::new(),
            created_at: Instant::now(),
            finished_at: None,
            result: None,
            error: None,
        }
    }

    fn name_key(&self) -> String {
        self.school_name.trim().to_lowercase()
    }
}

// ---------- job store ----------

/// How long a finished job stays pollable.
pub const FINISHED_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// In-memory registry of provisioning jobs. At most one job per school name
/// runs at a time.
pub struct JobStore {
    jobs: HashMap<String, ProvisionJob>,
    /// normalised school name → job_id for running jobs.
    active_by_name: HashMap<String, String>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            active_by_name: HashMap::new(),
        }
    }

    /// Register a job. Returns Err(existing_job_id) if a job for the same
    /// school name is still running. Jobs finished longer ago than
    /// [`FINISHED_JOB_RETENTION`] are dropped first.
    pub fn try_register(&mut self, job: ProvisionJob) -> Result<&ProvisionJob, String> {
        self.prune_finished(FINISHED_JOB_RETENTION);
        let name = job.name_key();
        if let Some(existing_id) = self.active_by_name.get(&name) {
            let is_running = self
                .jobs
                .get(existing_id.as_str())
                .is_some_and(|j| j.status == JobStatus::Running);
            if is_running {
                return Err(existing_id.clone());
            }
        }

        let job_id = job.id.clone();
        self.active_by_name.insert(name, job_id.clone());
        Ok(self.jobs.entry(job_id).or_insert(job))
    }

    /// Drop finished jobs older than `retention`; returns how many went.
    pub fn prune_finished(&mut self, retention: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, j| j.finished_at.is_none_or(|at| at.elapsed() < retention));
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, job_id: &str) -> Option<&ProvisionJob> {
        self.jobs.get(job_id)
    }

    fn finish(&mut self, job_id: &str, status: JobStatus) -> Option<&mut ProvisionJob> {
        let job = self.jobs.get_mut(job_id)?;
        job.status = status;
        job.finished_at = Some(Instant::now());
        let name = job.name_key();
        if self.active_by_name.get(&name).is_some_and(|id| id == job_id) {
            self.active_by_name.remove(&name);
        }
        self.jobs.get_mut(job_id)
    }

    pub fn complete(&mut self, job_id: &str, result: serde_json::Value) {
        if let Some(job) = self.finish(job_id, JobStatus::Completed) {
            job.result = Some(result);
        }
    }

    pub fn fail(&mut self, job_id: &str, error: String) {
        if let Some(job) = self.finish(job_id, JobStatus::Failed) {
            job.error = Some(error);
        }
    }

    /// Cancel a running job (returns false if not found or not running).
    pub fn cancel(&mut self, job_id: &str) -> bool {
        let running = self
            .jobs
            .get(job_id)
            .is_some_and(|j| j.status == JobStatus::Running);
        if !running {
            return false;
        }
        if let Some(job) = self.finish(job_id, JobStatus::Failed) {
            job.cancel.cancel();
            job.error = Some("cancelled".to_string());
        }
        true
    }

    pub fn subscribe(&self, job_id: &str) -> Option<broadcast::Receiver<ProvisionEvent>> {
        self.jobs.get(job_id).map(|j| j.tx.subscribe())
    }
}
