use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::DiscoveryError;
use crate::exec::run_capture;
use crate::extract::{peer_addresses, peers_with_app};
use crate::types::{PeerAddress, PeerWithApp};

/// Knobs for one discovery stream.
///
/// `Default` mirrors the classic invocation: `lsof -i`, a 30s execution
/// bound per listing run, tight re-polling, a small batch buffer.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Connection-listing executable. Its output must carry the application
    /// name in the first column and a `local->remote` state field in the
    /// ninth.
    pub command: String,
    /// Arguments for the listing executable.
    pub args: Vec<String>,
    /// Upper bound on one listing-process execution; expiry kills the child
    /// and fails the cycle.
    pub process_timeout: Duration,
    /// Minimum time between the starts of consecutive cycles. Zero re-polls
    /// as fast as cycles complete.
    pub min_cycle_interval: Duration,
    /// Capacity of the batch channel. A full channel pauses the loop until
    /// the consumer catches up; batches are never dropped.
    pub buffer: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command: "lsof".to_string(),
            args: vec!["-i".to_string()],
            process_timeout: Duration::from_secs(30),
            min_cycle_interval: Duration::ZERO,
            buffer: 16,
        }
    }
}

/// A continuous, failure-isolated stream of discovery results.
///
/// Each received item is one cycle's outcome: `Ok` carries that cycle's
/// deduplicated batch, `Err` its isolated failure. A transient failure never
/// ends the stream; `recv` returns `None` only after [`PeerStream::stop`]
/// (dropping the stream implies it) or after a fatal error has been emitted.
pub struct PeerStream<T> {
    rx: mpsc::Receiver<Result<Vec<T>, DiscoveryError>>,
    cancel: CancellationToken,
}

impl<T> PeerStream<T> {
    /// The next cycle outcome, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<Vec<T>, DiscoveryError>> {
        self.rx.recv().await
    }

    /// Stop discovering: no further cycle starts and an in-flight listing
    /// process is killed. Outcomes already queued can still be received.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for PeerStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start discovering `(application, peer address)` pairs.
///
/// Spawns an independent background loop; the returned stream yields one
/// outcome per discovery cycle until stopped. Streams are fully independent
/// of each other and may run concurrently.
pub fn watch_peers_with_app(config: DiscoveryConfig) -> PeerStream<PeerWithApp> {
    spawn_stream(config, peers_with_app)
}

/// Start discovering peer addresses only.
///
/// Same loop as [`watch_peers_with_app`] with the application column
/// dropped, so the dedup key is the address alone.
pub fn watch_peers(config: DiscoveryConfig) -> PeerStream<PeerAddress> {
    spawn_stream(config, peer_addresses)
}

fn spawn_stream<T, F>(config: DiscoveryConfig, extract: F) -> PeerStream<T>
where
    T: Send + 'static,
    // Sync as well: the loop shares `&extract` across its awaits.
    F: Fn(&str) -> Vec<T> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(config.buffer.max(1));
    let cancel = CancellationToken::new();
    let loop_cancel = cancel.clone();
    tokio::spawn(async move {
        run_discovery(config, extract, tx, loop_cancel).await;
    });
    PeerStream { rx, cancel }
}

/// Drive discovery cycles until cancelled, the consumer goes away, or a
/// fatal error is hit. One iteration = one cycle = one emission.
async fn run_discovery<T, F>(
    config: DiscoveryConfig,
    extract: F,
    tx: mpsc::Sender<Result<Vec<T>, DiscoveryError>>,
    cancel: CancellationToken,
) where
    F: Fn(&str) -> Vec<T>,
{
    let mut cycle: u64 = 0;
    loop {
        cycle += 1;
        let started = Instant::now();

        // Biased so a stop that already landed wins before another
        // listing process can be spawned.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = run_cycle(&config, &extract) => res,
        };

        let fatal = outcome.as_ref().err().is_some_and(DiscoveryError::is_fatal);
        match &outcome {
            Ok(batch) => debug!(cycle, peers = batch.len(), "discovery cycle completed"),
            Err(e) if fatal => error!(cycle, %e, "discovery cannot continue"),
            Err(e) => warn!(cycle, %e, "discovery cycle failed"),
        }

        // Send failure means the consumer dropped its stream handle.
        if tx.send(outcome).await.is_err() {
            break;
        }
        if fatal {
            break;
        }

        if !config.min_cycle_interval.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = time::sleep_until(started + config.min_cycle_interval) => {}
            }
        }
    }
    debug!(cycle, "discovery loop ended");
}

async fn run_cycle<T, F>(config: &DiscoveryConfig, extract: &F) -> Result<Vec<T>, DiscoveryError>
where
    F: Fn(&str) -> Vec<T>,
{
    let listing = run_capture(&config.command, &config.args, None, config.process_timeout).await?;
    Ok(extract(&listing))
}
