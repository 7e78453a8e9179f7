mod poller;
mod queue;

pub use poller::{PollerSettings, spawn_job_poller};
pub use queue::{
    CertificateJobQueue, JobOutcome, JobQueueSettings, MAX_BATCH_SIZE, PollSummary,
};
