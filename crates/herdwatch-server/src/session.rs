//! One live viewer connection.
//!
//! Two loops share the socket: the reader enforces a liveness deadline that
//! inbound traffic (pongs) keeps extending, and the writer forwards
//! snapshots from the broadcast feed and sends a ping once per period.
//! Either loop failing ends the session; the client reconnects and gets a
//! fresh snapshot on the next tick. A failed write is never retried.
//!
//! Both loops are generic over the sink/stream halves so their timing and
//! error behavior is testable without a real socket.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use herdwatch_model::ClusterSnapshot;

/// Time allowed for one socket write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// How long the peer may stay silent before the session is closed.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping period. Must stay under `PONG_WAIT` so a live peer always has a
/// ping to answer before its deadline.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Drive one session until either loop ends.
pub async fn run(socket: WebSocket, snapshots: broadcast::Receiver<ClusterSnapshot>) {
    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, snapshots));
    let mut reader = tokio::spawn(read_loop(stream));

    // Whichever loop ends first takes the session down; stop the other so
    // the socket is released exactly once.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    debug!("session closed");
}

/// Outbound loop: forward snapshots, ping on a timer.
async fn write_loop<S>(mut sink: S, mut snapshots: broadcast::Receiver<ClusterSnapshot>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    // First ping fires one full period after connect, not immediately.
    let mut ping = tokio::time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = snapshots.recv() => match received {
                Ok(snapshot) => {
                    let payload = match serde_json::to_string(&snapshot) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!(error = %e, "snapshot failed to serialize");
                            continue;
                        }
                    };
                    if write_with_deadline(&mut sink, Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Slow viewer: drop the backlog, resume at the latest.
                    debug!(missed, "viewer lagging, skipping to latest snapshot");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ping.tick() => {
                if write_with_deadline(&mut sink, Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Inbound loop: liveness only. Every received frame extends the deadline;
/// deadline expiry, a read error, or a close frame ends the loop.
async fn read_loop<R, E>(mut stream: R)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        match tokio::time::timeout(PONG_WAIT, stream.next()).await {
            Err(_) => {
                debug!("peer silent past read deadline, closing");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "socket read failed");
                break;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            // Pongs (and anything else the peer sends) count as liveness.
            Ok(Some(Ok(_))) => {}
        }
    }
}

async fn write_with_deadline<S>(sink: &mut S, message: Message) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match tokio::time::timeout(WRITE_WAIT, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "socket write failed");
            Err(())
        }
        Err(_) => {
            debug!("socket write deadline exceeded");
            Err(())
        }
    }
}
