//! Bounded status polling for asynchronous transcription jobs.

use super::{JobStatus, TranscriptionError, TranscriptionJob};
use crate::config::TranscriptionConfig;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often and for how long a job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
            deadline: config.deadline(),
        }
    }

    /// Call `check` until it reports a terminal status.
    ///
    /// The first check runs immediately; later ones are spaced by `interval`.
    /// Gives up with [`TranscriptionError::Timeout`] after `max_attempts` checks or
    /// once `deadline` has elapsed. An error from `check` ends the wait at once.
    /// Dropping the returned future cancels the wait.
    pub async fn wait<F, Fut>(&self, job_id: &str, mut check: F) -> Result<TranscriptionJob, TranscriptionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TranscriptionJob, TranscriptionError>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut last_status = JobStatus::Queued;

        let outcome = tokio::time::timeout(self.deadline, async {
            loop {
                attempts += 1;
                let job = check().await?;

                if job.status < last_status {
                    warn!(
                        job_id,
                        from = last_status.as_str(),
                        to = job.status.as_str(),
                        "provider reported a status regression"
                    );
                } else {
                    last_status = job.status;
                }

                debug!(job_id, attempt = attempts, status = job.status.as_str(), "poll");

                if job.status.is_terminal() {
                    return Ok(job);
                }

                if attempts >= self.max_attempts {
                    return Err(TranscriptionError::Timeout {
                        attempts,
                        elapsed_secs: started.elapsed().as_secs(),
                    });
                }

                tokio::time::sleep(self.interval).await;
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(TranscriptionError::Timeout {
                attempts,
                elapsed_secs: started.elapsed().as_secs(),
            }),
        }
    }
}
