//! The worker pool: `poll -> dispatch -> ack`, run by a configurable
//! number of concurrent workers sharing nothing but the queue and the
//! store. A handler error leaves the message unacked for redelivery
//! instead of panicking the worker.

use crate::context::EngineContext;
use crate::handlers::dispatch;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// A running set of poll-loop workers. Dropping this without calling
/// `shutdown` leaves the workers running detached; `shutdown` is the clean
/// path.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawns `config.poller.worker_count` identical workers against the
    /// given context.
    pub fn spawn(ctx: EngineContext) -> Self {
        let worker_count = ctx.config.poller.worker_count.max(1);
        let poll_interval = ctx.config.poller.poll_interval();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..worker_count)
            .map(|worker_id| {
                let ctx = ctx.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_worker(ctx, worker_id, poll_interval, shutdown_rx))
            })
            .collect();

        Self { handles, shutdown: shutdown_tx }
    }

    /// Signals every worker to stop after its current message and waits
    /// for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::warn!(%err, "worker task panicked during shutdown");
            }
        }
    }
}

async fn run_worker(
    ctx: EngineContext,
    worker_id: usize,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        poll_once(&ctx, worker_id, poll_interval).await;
        let _ = shutdown_rx.has_changed();
    }
}

async fn poll_once(ctx: &EngineContext, worker_id: usize, poll_interval: Duration) {
    match ctx.queue.poll().await {
        Ok(Some((message, token))) => {
            let span = tracing::info_span!(
                "handle_message",
                worker_id,
                kind = message.kind(),
                execution_id = %message.execution_id(),
            );
            async {
                match dispatch(ctx, message).await {
                    Ok(()) => {
                        if let Err(err) = ctx.queue.ack(token).await {
                            tracing::error!(%err, "failed to ack message");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "handler failed, leaving message for redelivery");
                    }
                }
            }
            .instrument(span)
            .await;
        }
        Ok(None) => tokio::time::sleep(poll_interval).await,
        Err(err) => {
            tracing::error!(%err, "queue poll failed");
            tokio::time::sleep(poll_interval).await;
        }
    }
}
