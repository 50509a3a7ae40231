//! kafka-relay - resilient Kafka producer relay
//!
//! ## Usage
//!
//! ```bash
//! # Static brokers
//! tail -F access.log | kafka-relay --kafka-brokers kafka-0:9092,kafka-1:9092 --topic access
//!
//! # Discover brokers from the "kafka" framework scheduler
//! tail -F access.log | kafka-relay --kafka-framework kafka --topic access
//! ```

use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kafka_relay::{
    config::Args,
    input::pump_lines,
    producer::{KafkaConnector, ProducerSupervisor},
    resolver::{BrokerResolver, BrokerSource, FrameworkDiscovery, HickorySrvLookup},
    stats::spawn_stats_logger,
};

/// Lifecycle events buffered between the supervisor and the stats logger
const STATS_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    // Misconfiguration cannot heal by retrying
    if let Err(e) = args.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let producer_config = args.producer_config();
    let supervisor_config = args.supervisor_config();

    info!("======================================");
    info!("  kafka-relay");
    info!("======================================");
    info!("Topic: {}", args.topic);
    info!("Flush interval: {}ms", args.kafka_flush_ms);
    info!("Retry delay: {}ms", supervisor_config.retry_delay.as_millis());
    info!("Acks: {}", producer_config.acks.as_str());
    info!("Compression: {}", producer_config.compression.as_str());

    let resolver = match args.broker_source()? {
        BrokerSource::Static(brokers) => {
            info!("Brokers (static): {}", brokers);
            BrokerResolver::Static(brokers)
        }
        BrokerSource::Framework(framework) => {
            info!("Brokers: discovered from framework '{}'", framework);
            let built = HickorySrvLookup::from_system_conf().and_then(|srv| {
                FrameworkDiscovery::new(args.discovery_config(), Arc::new(srv))
            });
            match built {
                Ok(discovery) => BrokerResolver::framework(framework, discovery),
                Err(e) => {
                    error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
    };
    info!("======================================");

    let (message_tx, message_rx) = mpsc::channel(args.queue_capacity);
    let (stats_tx, stats_rx) = mpsc::channel(STATS_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();

    let stats_handle = spawn_stats_logger(stats_rx);

    let topic = args.topic.clone();
    let input_handle = tokio::spawn(async move {
        match pump_lines(BufReader::new(tokio::io::stdin()), &topic, message_tx).await {
            Ok(queued) => info!(queued, "Finished reading stdin"),
            Err(e) => error!(error = %e, "Failed to read stdin"),
        }
    });

    let supervisor = ProducerSupervisor::new(
        resolver,
        KafkaConnector::default(),
        producer_config,
        supervisor_config,
        stats_tx,
    );
    let mut supervisor_handle = tokio::spawn(supervisor.run(message_rx, shutdown.clone()));

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            shutdown.cancel();
            supervisor_handle.await
        }
        result = &mut supervisor_handle => result,
    };

    input_handle.abort();

    let exit_code = match result {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error!("{}", e);
            1
        }
        Err(e) => {
            error!("Supervisor task failed: {}", e);
            1
        }
    };

    match stats_handle.await {
        Ok(summary) => {
            for (event, count) in &summary.counts {
                info!(event = %event, count, "Lifecycle event total");
            }
        }
        Err(e) => warn!("Stats task failed: {}", e),
    }

    // Exit explicitly: a pending stdin read would otherwise hold the runtime open
    info!("kafka-relay shutting down");
    std::process::exit(exit_code);
}

fn init_tracing(args: &Args) {
    let mut default_filter = format!("kafka_relay={},info", args.log_level);
    if args.kafka_verbose {
        default_filter.push_str(",rdkafka=debug");
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
