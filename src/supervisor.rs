use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use tokio::{
    process::{Child, Command},
    select,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    address::Network,
    config::Config,
    daemon_conf::DaemonConf,
    events::{Event, EventBus},
    retry::{new_backoff_constant, retry},
    rpc::{Client, QtumRpc},
    tip::sync_percentage,
};

const START_RETRY_TIMES: usize = 60;

/// A daemon under our management: the client aimed at it, where its ZMQ
/// feed lives, and the watch task that restarts it when it dies.
pub struct Supervised {
    pub client: Client,
    pub zmq_endpoint: Option<String>,
    pub reindex: bool,
    pub handle: JoinHandle<Result<()>>,
}

/// Ensures the datadir and its conf file exist, then loads and validates
/// the merged configuration.
pub fn prepare_datadir(datadir: &Path, network: Network) -> Result<DaemonConf> {
    std::fs::create_dir_all(datadir)
        .with_context(|| format!("Failed to create datadir {}", datadir.display()))?;
    let conf_path = DaemonConf::conf_path(datadir);
    if !conf_path.exists() {
        info!("Writing default daemon conf to {}", conf_path.display());
        DaemonConf::write_default(datadir)?;
    }
    let conf = DaemonConf::load(datadir, network)?;
    conf.validate()?;
    Ok(conf)
}

/// Interrupts a leftover daemon recorded in the datadir's PID file and
/// polls until it is gone. A missing or stale PID file is not an error.
pub async fn stop_stale_instance(
    pid_path: &Path,
    interval: std::time::Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    let Ok(text) = std::fs::read_to_string(pid_path) else {
        return Ok(());
    };
    let Ok(pid) = text.trim().parse::<i32>() else {
        warn!("Ignoring unparseable PID file at {}", pid_path.display());
        return Ok(());
    };
    let pid = Pid::from_raw(pid);

    info!("Interrupting running daemon with PID {}", pid);
    match kill(pid, Signal::SIGINT) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(anyhow!("Failed to interrupt PID {}: {}", pid, e)),
    }

    loop {
        select! {
            _ = sleep(interval) => {}
            _ = cancel_token.cancelled() => bail!("Cancelled while waiting for PID {} to exit", pid),
        }
        match kill(pid, None) {
            Ok(()) => info!("Waiting for PID {} to exit", pid),
            Err(Errno::ESRCH) => return Ok(()),
            Err(e) => return Err(anyhow!("Failed to probe PID {}: {}", pid, e)),
        }
    }
}

fn spawn_daemon(exec: &Path, datadir: &Path, network: Network) -> Result<Child> {
    let conf_path = DaemonConf::conf_path(datadir);
    let mut command = Command::new(exec);
    command
        .arg(format!("--conf={}", conf_path.display()))
        .arg(format!("--datadir={}", datadir.display()));
    if let Some(flag) = network.daemon_flag() {
        command.arg(flag);
    }
    command
        .spawn()
        .with_context(|| format!("Failed to spawn daemon at {}", exec.display()))
}

/// Retries the first tip load until the daemon answers or the host stops.
async fn probe(
    client: &Client,
    interval: std::time::Duration,
    cancel_token: CancellationToken,
) -> Result<String> {
    retry(
        || client.get_best_block_hash(),
        "load tip",
        new_backoff_constant(interval, START_RETRY_TIMES),
        cancel_token,
    )
    .await
}

/// Blocks until a reindexing daemon reports full verification.
async fn wait_for_reindex(
    client: &Client,
    interval: std::time::Duration,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Daemon is reindexing, waiting for completion");
    loop {
        if cancel_token.is_cancelled() {
            bail!("Cancelled while waiting for reindex");
        }
        match client.get_blockchain_info().await {
            Ok(info) if sync_percentage(info.verificationprogress) >= 100.0 => {
                info!("Reindex complete");
                return Ok(());
            }
            Ok(info) => {
                info!(
                    "Reindex progress: {:.2}%",
                    info.verificationprogress * 100.0
                );
            }
            Err(e) => warn!("Failed to poll reindex progress: {}", e),
        }
        select! {
            _ = sleep(interval) => {}
            _ = cancel_token.cancelled() => bail!("Cancelled while waiting for reindex"),
        }
    }
}

async fn orderly_stop(mut child: Child, shutdown_timeout: std::time::Duration) -> Result<()> {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGINT);
    }
    match timeout(shutdown_timeout, child.wait()).await {
        Err(_) => bail!(
            "Daemon did not exit within {:?} of being interrupted",
            shutdown_timeout
        ),
        Ok(Ok(status)) if status.success() => {
            info!("Daemon exited");
            Ok(())
        }
        Ok(Ok(status)) => bail!("Daemon exited with {} during orderly stop", status),
        Ok(Err(e)) => Err(e).context("Failed to await daemon exit"),
    }
}

/// Spawns and supervises the daemon: prepares the datadir, clears any
/// stale instance, starts the child, probes until RPC answers (waiting out
/// a reindex when flagged), then hands back a watch task that restarts the
/// daemon on unexpected exit and interrupts it on host stop.
pub async fn start(
    config: &Config,
    cancel_token: CancellationToken,
    bus: EventBus,
) -> Result<Supervised> {
    let exec = config
        .spawn_exec
        .clone()
        .context("spawn mode requires --spawn-exec")?;
    let datadir = config
        .spawn_datadir
        .clone()
        .context("spawn mode requires --spawn-datadir")?;
    let network = config.network;

    let conf = prepare_datadir(&datadir, network)?;
    let pid_path = DaemonConf::pid_path(&datadir, network);
    stop_stale_instance(&pid_path, config.spawn_stop_time(), cancel_token.clone()).await?;

    let child = spawn_daemon(&exec, &datadir, network)?;
    let client = Client::new(conf.rpc_url(network), conf.rpc_user(), conf.rpc_password())?;

    probe(&client, config.start_retry_interval(), cancel_token.clone()).await?;
    if conf.reindex() {
        wait_for_reindex(&client, config.reindex_wait(), cancel_token.clone()).await?;
    }

    let handle = watch(
        child,
        exec,
        datadir,
        network,
        client.clone(),
        config.clone(),
        cancel_token,
        bus,
    );

    Ok(Supervised {
        client,
        zmq_endpoint: conf.zmq_endpoint().map(str::to_string),
        reindex: conf.reindex(),
        handle,
    })
}

#[allow(clippy::too_many_arguments)]
fn watch(
    mut child: Child,
    exec: PathBuf,
    datadir: PathBuf,
    network: Network,
    client: Client,
    config: Config,
    cancel_token: CancellationToken,
    bus: EventBus,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        loop {
            select! {
                _ = cancel_token.cancelled() => {
                    info!("Stopping daemon");
                    return orderly_stop(child, config.shutdown_timeout()).await;
                }
                status = child.wait() => {
                    let status = status.context("Failed to await daemon exit")?;
                    if cancel_token.is_cancelled() {
                        if status.success() {
                            return Ok(());
                        }
                        bail!("Daemon exited with {} during orderly stop", status);
                    }

                    warn!("Daemon exited unexpectedly with {}", status);
                    bus.emit(Event::Error {
                        message: format!("daemon exited unexpectedly with {}", status),
                    });

                    select! {
                        _ = sleep(config.spawn_restart_time()) => {}
                        _ = cancel_token.cancelled() => return Ok(()),
                    }

                    info!("Restarting daemon");
                    child = spawn_daemon(&exec, &datadir, network)?;
                    if let Err(e) = probe(&client, config.start_retry_interval(), cancel_token.clone()).await {
                        if cancel_token.is_cancelled() {
                            return Ok(());
                        }
                        warn!("Restarted daemon did not become ready: {}", e);
                    }
                }
            }
        }
    })
}
