use std::{thread, time::Duration};

use anyhow::{Context, Result, anyhow};
use scopeguard::defer;
use tokio::{
    select,
    sync::mpsc::{self, UnboundedSender},
    task::{self, JoinHandle},
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zmq::Socket;

pub mod messages;

use messages::{DataMessage, HASHBLOCK, MonitorMessage, RAWTX};

pub const REARM_DELAY: Duration = Duration::from_secs(5);

/// What the ingest loop forwards to the hub.
#[derive(Debug)]
pub enum ZmqEvent {
    Connected,
    Disconnected(anyhow::Error),
    Message(DataMessage),
}

/// Drains one socket on a dedicated OS thread, parsing each multipart frame
/// before it crosses to the async side. ZMQ receives are blocking, so the
/// socket carries a receive timeout and the cancel token is checked between
/// frames. Both the subscriber and its monitor pair go through here, each
/// with its own frame parser.
fn pump<T: Send + 'static>(
    socket: Socket,
    label: &'static str,
    cancel_token: CancellationToken,
    tx: UnboundedSender<Result<T>>,
    parse: fn(Vec<Vec<u8>>) -> Result<T>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !cancel_token.is_cancelled() {
            let parsed = match socket.recv_multipart(0) {
                Ok(multipart) => parse(multipart),
                Err(zmq::Error::EAGAIN) => continue,
                Err(e) => Err(e.into()),
            };
            if tx.send(parsed).is_err() {
                info!("{} channel closed, exiting thread", label);
                break;
            }
        }
        info!("{} thread exited", label);
    })
}

fn parse_data(multipart: Vec<Vec<u8>>) -> Result<DataMessage> {
    let (_sequence, message) = DataMessage::from_zmq_message(multipart)?;
    Ok(message)
}

/// Connects the SUB socket for both daemon topics plus a PAIR monitor, and
/// forwards parsed messages into `tx` until cancelled or the socket fails.
/// Monitor failures end the task with an error so the caller can re-arm.
pub fn run(
    endpoint: &str,
    cancel_token: CancellationToken,
    tx: UnboundedSender<ZmqEvent>,
) -> Result<JoinHandle<Result<()>>> {
    let (socket_tx, mut socket_rx) = mpsc::unbounded_channel();
    let (monitor_tx, mut monitor_rx) = mpsc::unbounded_channel();
    let socket_cancel_token = CancellationToken::new();
    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::SUB).context("Failed to create ZMQ socket")?;
    socket.set_subscribe(HASHBLOCK.as_bytes())?;
    socket.set_subscribe(RAWTX.as_bytes())?;
    socket.set_rcvhwm(0)?;
    socket.set_rcvtimeo(1000)?;

    let monitor_endpoint = format!("inproc://{}-monitor", RAWTX);
    socket
        .monitor(&monitor_endpoint, MonitorMessage::all_events_mask())
        .context("Failed to set up socket monitor")?;
    let monitor_socket = ctx
        .socket(zmq::PAIR)
        .context("Failed to create monitor socket")?;
    monitor_socket
        .connect(&monitor_endpoint)
        .context("Failed to connect monitor socket")?;
    monitor_socket.set_rcvhwm(0)?;
    monitor_socket.set_rcvtimeo(1000)?;
    let monitor_handle = pump(
        monitor_socket,
        "monitor",
        socket_cancel_token.clone(),
        monitor_tx,
        MonitorMessage::from_zmq_message,
    );

    socket
        .connect(endpoint)
        .context("Could not connect to ZMQ endpoint")?;
    let socket_handle = pump(
        socket,
        "subscriber",
        socket_cancel_token.clone(),
        socket_tx,
        parse_data,
    );

    Ok(task::spawn(async move {
        defer! {
            socket_cancel_token.cancel();
            if socket_handle.join().is_err() {
                error!("Subscriber thread panicked on join");
            }
            if monitor_handle.join().is_err() {
                error!("Monitor thread panicked on join");
            }

            info!("Exited");
        }

        loop {
            select! {
                biased;
                _ = cancel_token.cancelled() => {
                    info!("Cancelled");
                    return Ok(())
                },
                option_monitor_event = monitor_rx.recv() => {
                    match option_monitor_event {
                        Some(Ok(event)) => {
                            if event.is_failure() {
                                return Err(anyhow!("Received failure event from monitor socket: {:?}", event));
                            }
                            if let MonitorMessage::HandshakeSucceeded = event {
                                if tx.send(ZmqEvent::Connected).is_err() {
                                    info!("Send channel is closed, exiting");
                                    return Ok(())
                                }
                            }
                        },
                        Some(Err(e)) => {
                            return Err(e.context("Monitor socket failed, exiting"));
                        },
                        None => {
                            warn!("Monitor channel drained, exiting");
                            return Ok(());
                        },
                    }
                },
                option_message = socket_rx.recv() => {
                    match option_message {
                        Some(Ok(message)) => {
                            if tx.send(ZmqEvent::Message(message)).is_err() {
                                info!("Send channel is closed, exiting");
                                return Ok(())
                            }
                        },
                        Some(Err(e)) => {
                            warn!("Dropping malformed ZMQ message: {}", e);
                        },
                        None => {
                            warn!("Subscriber channel drained, exiting");
                            return Ok(());
                        },
                    }
                },
            }
        }
    }))
}

/// Keeps one subscription alive: when the socket task dies it reports the
/// disconnect and re-arms after a pause. Disconnects are never fatal.
pub fn run_resilient(
    endpoint: String,
    cancel_token: CancellationToken,
    tx: UnboundedSender<ZmqEvent>,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        loop {
            if cancel_token.is_cancelled() {
                return Ok(());
            }

            let handle = run(&endpoint, cancel_token.clone(), tx.clone())?;

            match handle.await {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => {
                    if tx.send(ZmqEvent::Disconnected(e)).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => {
                    if tx.send(ZmqEvent::Disconnected(e.into())).is_err() {
                        return Ok(());
                    }
                }
            }

            select! {
                _ = sleep(REARM_DELAY) => {}
                _ = cancel_token.cancelled() => return Ok(()),
            }
            info!("Re-arming ZMQ subscription to {}", endpoint);
        }
    })
}
