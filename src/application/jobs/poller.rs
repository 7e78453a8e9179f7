use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Semaphore, watch},
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tracing::{error, info};

use super::queue::CertificateJobQueue;

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub interval: Duration,
    pub max_in_flight: usize,
}

/// Poll the queue on a fixed interval until `shutdown` flips to `true`.
///
/// Each claimed job runs on its own task, so a stalled render only holds its
/// own permit. The poller never claims more jobs than it has free permits.
/// After shutdown the returned handle resolves only once every claimed job
/// has recorded its outcome; aborting the handle aborts those executions too.
pub fn spawn_job_poller(
    queue: Arc<CertificateJobQueue>,
    settings: PollerSettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let permits = Arc::new(Semaphore::new(settings.max_in_flight.max(1)));

    tokio::spawn(async move {
        let mut executions = JoinSet::new();
        let mut interval = tokio::time::interval(settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            target = "certify::application::jobs::poller",
            interval_ms = settings.interval.as_millis() as u64,
            max_in_flight = settings.max_in_flight,
            "job poller started"
        );

        'poll: loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            while executions.try_join_next().is_some() {}

            let free = u32::try_from(permits.available_permits()).unwrap_or(u32::MAX);
            let claimed = match queue.claim_batch(free).await {
                Ok(claimed) => claimed,
                Err(err) => {
                    error!(
                        target = "certify::application::jobs::poller",
                        error = %err,
                        "claiming pending jobs failed"
                    );
                    continue;
                }
            };

            for job_id in claimed {
                let permit = match permits.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => match permits.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break 'poll,
                    },
                };
                let queue = queue.clone();
                executions.spawn(async move {
                    let _permit = permit;
                    if let Err(err) = queue.execute(job_id).await {
                        error!(
                            target = "certify::application::jobs::poller",
                            job_id = %job_id,
                            error = %err,
                            "job execution could not record its outcome"
                        );
                    }
                });
            }
        }

        if !executions.is_empty() {
            info!(
                target = "certify::application::jobs::poller",
                in_flight = executions.len(),
                "waiting for in-flight jobs"
            );
        }
        while executions.join_next().await.is_some() {}

        info!(
            target = "certify::application::jobs::poller",
            "job poller stopped"
        );
    })
}
