use anyhow::Context;
use clap::Parser;
use queue_relay::config::{AlertConfig, RelayConfig, ReplicationConfig, StorageConfig};
use queue_relay::relay::DrainOrchestratorBuilder;
use queue_relay::sink::{AlertNotifier, ReplicationSink, StorageSink};
use queue_relay::source::SourceConnector;
use queue_relay::{LogFormat, Scheduler};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "queue-relay", version)]
#[command(about = "Drain a queue into storage, replication and alert sinks", long_about = None)]
struct Cli {
    /// Run a single drain cycle and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = RelayConfig::from_env();
    info!(
        version = queue_relay::VERSION,
        storage = config.storage.is_enabled(),
        replication = config.replication.is_enabled(),
        alert = config.alert.is_enabled(),
        "Starting queue relay"
    );
    if !config.any_sink_enabled() {
        warn!("No sink is enabled; messages will be acknowledged without being forwarded");
    }

    let orchestrator = Arc::new(
        DrainOrchestratorBuilder::from_config(&config, source_connector(&config)?)
            .storage(storage_sink(&config.storage))
            .replication(replication_sink(&config.replication))
            .alert(alert_notifier(&config.alert))
            .build(),
    );

    let result = if cli.once {
        let report = orchestrator.drain().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if report.is_success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("drain cycle ended with status {:?}", report.status))
        }
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(config.schedule.clone(), Arc::clone(&orchestrator));
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Received Ctrl-C, waiting for the current drain cycle to finish");
        shutdown_tx.send(true).ok();

        let summary = handle.await.context("Scheduler task failed")?;
        info!(
            cycles = summary.cycles,
            failed_cycles = summary.failed_cycles,
            metrics = ?orchestrator.metrics().snapshot(),
            "Queue relay stopped"
        );
        Ok(())
    };

    #[cfg(feature = "telemetry")]
    queue_relay::telemetry::shutdown_telemetry();

    result
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Plain
    };

    #[cfg(feature = "telemetry")]
    {
        if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
            let config = queue_relay::telemetry::TelemetryConfig::from_env();
            queue_relay::telemetry::init_telemetry(config, format, &cli.log_level)?;
            return Ok(());
        }
    }

    queue_relay::init_tracing_with(format, &cli.log_level);
    Ok(())
}

#[cfg(feature = "aws")]
fn source_connector(config: &RelayConfig) -> anyhow::Result<Arc<dyn SourceConnector>> {
    use queue_relay::backends::sqs::SqsSourceConnector;

    // The source reads the same AWS_* variables as the sinks
    Ok(Arc::new(SqsSourceConnector::new(config.replication.aws.clone())))
}

#[cfg(not(feature = "aws"))]
fn source_connector(_config: &RelayConfig) -> anyhow::Result<Arc<dyn SourceConnector>> {
    anyhow::bail!("no source backend compiled in; rebuild with the `aws` feature")
}

#[cfg(feature = "mongo")]
fn storage_sink(config: &StorageConfig) -> StorageSink {
    use queue_relay::backends::mongo::MongoDocumentStore;
    use queue_relay::sink::{DocumentStore, LazyClient};

    let settings = config.clone();
    StorageSink::new(
        config.clone(),
        LazyClient::new("mongo", move || {
            let settings = settings.clone();
            async move {
                let store = MongoDocumentStore::connect(&settings).await?;
                Ok(Arc::new(store) as Arc<dyn DocumentStore>)
            }
        }),
    )
}

#[cfg(not(feature = "mongo"))]
fn storage_sink(config: &StorageConfig) -> StorageSink {
    if config.is_enabled() {
        error!("Storage is enabled but no storage backend is compiled in; rebuild with the `mongo` feature");
    }
    StorageSink::disabled()
}

#[cfg(feature = "aws")]
fn replication_sink(config: &ReplicationConfig) -> ReplicationSink {
    use queue_relay::backends::sqs::SqsBatchSender;
    use queue_relay::sink::{BatchSender, LazyClient};

    let aws = config.aws.clone();
    let queue_url = config.queue_url.clone().unwrap_or_default();
    ReplicationSink::new(
        config.clone(),
        LazyClient::new("sqs", move || {
            let aws = aws.clone();
            let queue_url = queue_url.clone();
            async move {
                let sender = SqsBatchSender::connect(&aws, queue_url).await;
                Ok(Arc::new(sender) as Arc<dyn BatchSender>)
            }
        }),
    )
}

#[cfg(not(feature = "aws"))]
fn replication_sink(config: &ReplicationConfig) -> ReplicationSink {
    if config.is_enabled() {
        error!("Replication is enabled but the `aws` feature is not compiled in");
    }
    ReplicationSink::disabled()
}

#[cfg(feature = "aws")]
fn alert_notifier(config: &AlertConfig) -> AlertNotifier {
    use queue_relay::backends::sns::SnsAlertPublisher;
    use queue_relay::sink::{AlertPublisher, LazyClient};

    let aws = config.aws.clone();
    let topic_arn = config.topic_arn.clone().unwrap_or_default();
    AlertNotifier::new(
        config.clone(),
        LazyClient::new("sns", move || {
            let aws = aws.clone();
            let topic_arn = topic_arn.clone();
            async move {
                let publisher = SnsAlertPublisher::connect(&aws, topic_arn).await;
                Ok(Arc::new(publisher) as Arc<dyn AlertPublisher>)
            }
        }),
    )
}

#[cfg(not(feature = "aws"))]
fn alert_notifier(config: &AlertConfig) -> AlertNotifier {
    if config.is_enabled() {
        error!("Alerts are enabled but the `aws` feature is not compiled in");
    }
    AlertNotifier::disabled()
}
