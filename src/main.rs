use std::{process, sync::Arc, time::Duration};

use certify::{
    application::{
        error::AppError,
        jobs::{CertificateJobQueue, JobQueueSettings, PollerSettings, spawn_job_poller},
        services::{Collaborators, ServiceOptions, Services},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        pdf::LopdfRenderer,
        qr::QrImageEncoder,
        storage::FileBlobStore,
        telemetry,
    },
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Worker(_) => run_worker(settings).await,
    }
}

struct ApplicationContext {
    api_state: ApiState,
    queue: Arc<CertificateJobQueue>,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = maybe_spawn_poller(app.queue.clone(), &settings, shutdown_rx.clone());

    let result = serve_http(&settings, app.api_state, shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    stop_poller(poller, settings.server.graceful_shutdown).await;

    result
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    if !settings.jobs.enabled {
        return Err(AppError::validation(
            "worker requires jobs.enabled = true",
        ));
    }

    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories, &settings)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = maybe_spawn_poller(app.queue, &settings, shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .map_err(InfraError::Signal)?;
    info!(target = "certify::worker", "shutdown requested");

    let _ = shutdown_tx.send(true);
    stop_poller(poller, settings.server.graceful_shutdown).await;
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(InfraError::from)?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let collaborators = Collaborators {
        renderer: Arc::new(LopdfRenderer::new()),
        encoder: Arc::new(QrImageEncoder::new()),
        blobs: Arc::new(FileBlobStore::new(settings.storage.directory.clone())?),
    };
    let options = ServiceOptions {
        verification_base_url: settings.verification.base_url.clone(),
        qr_size: settings.verification.qr_size.get(),
        jobs: JobQueueSettings {
            batch_size: settings.jobs.batch_size,
            error_message_limit: settings.jobs.error_message_limit.get() as usize,
        },
    };

    let services = Services::build(
        http_repositories.clone(),
        job_repositories,
        collaborators,
        options,
    );

    let api_state = ApiState {
        templates: services.templates,
        certificates: services.certificates,
        jobs: services.jobs.clone(),
        verification: services.verification,
        health: http_repositories,
    };

    Ok(ApplicationContext {
        api_state,
        queue: services.jobs,
    })
}

fn maybe_spawn_poller(
    queue: Arc<CertificateJobQueue>,
    settings: &config::Settings,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if !settings.jobs.enabled {
        info!(target = "certify::jobs", "job poller disabled");
        return None;
    }

    Some(spawn_job_poller(
        queue,
        PollerSettings {
            interval: settings.jobs.poll_interval,
            max_in_flight: settings.jobs.max_in_flight.get() as usize,
        },
        shutdown,
    ))
}

async fn stop_poller(handle: Option<JoinHandle<()>>, timeout: Duration) {
    let Some(mut handle) = handle else {
        return;
    };
    if tokio::time::timeout(timeout, &mut handle).await.is_err() {
        warn!(
            target = "certify::jobs",
            timeout_secs = timeout.as_secs(),
            "in-flight jobs did not finish in time; aborting them (they stay PROCESSING)"
        );
        handle.abort();
        let _ = handle.await;
    }
}

async fn serve_http(
    settings: &config::Settings,
    api_state: ApiState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let router = http::build_router(api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;

    info!(
        target = "certify::http",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!(target = "certify::http", "shutdown requested");
                }
                _ = shutdown.changed() => {}
            }
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
