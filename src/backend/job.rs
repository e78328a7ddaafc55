use crate::error::BackendError;
use crate::result::SamplerResult;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use uuid::Uuid;

/// Lifecycle of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Done => write!(f, "DONE"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

type JobOutput = Result<SamplerResult, BackendError>;

enum Execution {
    Finished(JobOutput),
    Worker(JoinHandle<JobOutput>),
}

/// Handle to a submitted circuit execution.
pub struct Job {
    job_id: String,
    backend_name: String,
    status: Arc<Mutex<JobStatus>>,
    execution: Execution,
}

impl Job {
    /// Allocates a fresh id of the form `<prefix>-<uuid>`.
    pub(crate) fn next_id(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }

    /// A job whose result is already known.
    pub(crate) fn completed(job_id: String, backend_name: String, output: JobOutput) -> Self {
        let status = if output.is_ok() {
            JobStatus::Done
        } else {
            JobStatus::Error
        };
        Self {
            job_id,
            backend_name,
            status: Arc::new(Mutex::new(status)),
            execution: Execution::Finished(output),
        }
    }

    /// A job executed by `handle`, which reports progress through `status`.
    pub(crate) fn spawned(
        job_id: String,
        backend_name: String,
        status: Arc<Mutex<JobStatus>>,
        handle: JoinHandle<JobOutput>,
    ) -> Self {
        Self {
            job_id,
            backend_name,
            status,
            execution: Execution::Worker(handle),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn status(&self) -> JobStatus {
        self.status
            .lock()
            .map(|status| *status)
            .unwrap_or(JobStatus::Error)
    }

    /// Blocks until the job finishes and returns its result.
    pub fn result(self) -> JobOutput {
        match self.execution {
            Execution::Finished(output) => output,
            Execution::Worker(handle) => handle.join().unwrap_or_else(|_| {
                Err(BackendError::JobFailed {
                    job_id: self.job_id.clone(),
                    reason: "worker thread panicked".to_string(),
                })
            }),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_id", &self.job_id)
            .field("backend_name", &self.backend_name)
            .field("status", &self.status())
            .finish()
    }
}

/// Updates a shared status, ignoring a poisoned lock.
pub(crate) fn set_status(status: &Mutex<JobStatus>, value: JobStatus) {
    if let Ok(mut guard) = status.lock() {
        *guard = value;
    }
}
