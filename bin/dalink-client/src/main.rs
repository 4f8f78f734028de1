use std::{sync::Arc, time::Duration};

use dalink_common::logging;
use dalink_config::Config;
use dalink_relay::{
    commit::ScriptCommitter,
    listener::listen_loop,
    processor::RelayProcessor,
    reader::ReadProcessor,
    rpc::EdgeClient,
    sub::{ZmqSubscription, HASH_BLOCK_TOPIC, RAW_BLOCK_TOPIC},
    writer::WriteProcessor,
};
use dalink_rocksdb::{open_rocksdb_database, DbOpsConfig, RBWriterDb};
use dalink_tasks::TaskManager;
use tokio::runtime::Handle;
use tracing::*;

use crate::args::Args;

mod args;

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    if let Err(e) = main_inner(args) {
        eprintln!("FATAL ERROR: {e}");
        return Err(e);
    }

    Ok(())
}

fn main_inner(args: Args) -> anyhow::Result<()> {
    // Start runtime for async IO tasks.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("dalink-rt")
        .build()
        .expect("init: build rt");

    // Init the logging before we do anything else.
    init_logging(runtime.handle());

    let config = get_config(&args)?;

    let tag = config.relay.protocol_tag.clone().into_bytes();

    // Open and initialize the database.
    let rbdb = open_rocksdb_database(&config.client.datadir)?;
    let ops_config = DbOpsConfig::new(config.client.db_retry_count);
    let writer_db = Arc::new(RBWriterDb::new(rbdb, ops_config));

    let edge_client = Arc::new(EdgeClient::new(
        config.edge.http_url.clone(),
        Duration::from_millis(config.edge.timeout_ms),
    )?);

    let committer = ScriptCommitter::new(
        config.committer.script_dir.clone(),
        config.committer.btc_cli_path.clone(),
        Duration::from_millis(config.committer.timeout_ms),
    );

    info!("init finished, starting main tasks");

    // Connect both feeds up front so endpoint problems fail loudly.
    let raw_sub = runtime.block_on(ZmqSubscription::connect(
        &config.zmq.rawblock_endpoint,
        RAW_BLOCK_TOPIC,
    ))?;
    let hash_sub = runtime.block_on(ZmqSubscription::connect(
        &config.zmq.hashblock_endpoint,
        HASH_BLOCK_TOPIC,
    ))?;

    let task_manager = TaskManager::new(runtime.handle().clone());
    let executor = task_manager.executor();

    let read_processor: RelayProcessor<EdgeClient, ScriptCommitter, RBWriterDb> =
        RelayProcessor::Read(ReadProcessor::new(tag.clone()));
    let read_interval = config.relay.read_interval;
    executor.spawn_critical_async_with_shutdown("rawblock-listener", |shutdown| async move {
        if let Err(e) = listen_loop(raw_sub, read_processor, read_interval, shutdown).await {
            error!(err = %e, "rawblock listener exited with error");
        }
    });

    let write_processor = RelayProcessor::Write(WriteProcessor::new(
        tag,
        edge_client,
        committer,
        writer_db,
    ));
    let write_interval = config.relay.write_interval;
    executor.spawn_critical_async_with_shutdown("hashblock-listener", |shutdown| async move {
        if let Err(e) = listen_loop(hash_sub, write_processor, write_interval, shutdown).await {
            error!(err = %e, "hashblock listener exited with error");
        }
    });

    task_manager.start_signal_listeners();
    task_manager.monitor(Some(Duration::from_secs(5)))?;

    logging::finalize();
    info!("exiting");
    Ok(())
}

fn get_config(args: &Args) -> anyhow::Result<Config> {
    let config_str = std::fs::read_to_string(&args.config)?;
    let mut config: Config = toml::from_str(&config_str)?;

    if let Some(datadir) = &args.datadir {
        config.client.datadir = datadir.clone();
    }

    config.validate().map_err(anyhow::Error::from)?;
    Ok(config)
}

/// Sets up the logging system given a handle to a runtime context to possibly
/// start the OTLP output on.
fn init_logging(rt: &Handle) {
    let mut lconfig = logging::LoggerConfig::with_base_name("dalink-client");

    // Set the OpenTelemetry URL if set.
    let otlp_url = logging::get_otlp_url_from_env();
    if let Some(url) = &otlp_url {
        lconfig.set_otlp_url(url.clone());
    }

    {
        // Need to set the runtime context because of nonsense.
        let _g = rt.enter();
        logging::init(lconfig);
    }

    // Have to log this after we start the logging formally.
    if let Some(url) = &otlp_url {
        info!(%url, "using OTLP tracing output");
    }
}
