//! Fan-in of capture sources into one admitted packet stream.
//!
//! Each attached source gets its own blocking worker. A worker classifies
//! every datagram, asks the arbitrator for admission and pushes admitted
//! packets into a single bounded queue. A full queue drops the new packet
//! instead of stalling capture.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::arbitration::{Arbitrator, LockState};
use crate::capture::{DatagramSource, SourceEvent};
use crate::detector::is_target_protocol;
use crate::types::{Origin, Packet};

/// Shortest interval between idle sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Bound of the output queue
    pub queue_capacity: usize,
    /// Periodically release a stale lock even without traffic
    pub idle_release: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            queue_capacity: crate::config::DEFAULT_QUEUE_CAPACITY,
            idle_release: false,
        }
    }
}

#[derive(Debug, Default)]
struct InterfaceCounters {
    captured: AtomicU64,
    matched: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    dropped: AtomicU64,
    running: AtomicBool,
}

impl InterfaceCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-interface counters at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceStats {
    pub origin: String,
    /// Datagrams delivered by the capture source
    pub captured: u64,
    /// Datagrams classified as Photon
    pub matched: u64,
    /// Packets admitted and queued
    pub admitted: u64,
    /// Packets refused because another interface holds the lock
    pub rejected: u64,
    /// Packets admitted but dropped on a full queue
    pub dropped: u64,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub lock: LockState,
    pub interfaces: Vec<InterfaceStats>,
}

struct Worker {
    origin: Origin,
    counters: Arc<InterfaceCounters>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the fan-in/fan-out topology.
pub struct Router {
    arbitrator: Arc<Arbitrator>,
    /// Held across admission and enqueue so the queue is in admission order
    admission: Arc<Mutex<()>>,
    output_tx: Option<mpsc::Sender<Packet>>,
    output_rx: Option<mpsc::Receiver<Packet>>,
    stop_tx: watch::Sender<bool>,
    workers: Vec<Worker>,
    sweeper: Option<JoinHandle<()>>,
}

impl Router {
    /// Create a router. Must be called inside a tokio runtime when
    /// `idle_release` is set.
    pub fn new(arbitrator: Arc<Arbitrator>, options: RouterOptions) -> Self {
        let (output_tx, output_rx) = mpsc::channel(options.queue_capacity.max(1));
        let (stop_tx, _) = watch::channel(false);

        let sweeper = options
            .idle_release
            .then(|| spawn_sweeper(Arc::clone(&arbitrator), stop_tx.subscribe()));

        Self {
            arbitrator,
            admission: Arc::new(Mutex::new(())),
            output_tx: Some(output_tx),
            output_rx: Some(output_rx),
            stop_tx,
            workers: Vec::new(),
            sweeper,
        }
    }

    /// Register an interface and start its worker.
    ///
    /// Ignored after `shutdown` or `wait` has sealed the router.
    pub fn attach<S>(&mut self, origin: impl Into<Origin>, source: S)
    where
        S: DatagramSource + 'static,
    {
        let origin: Origin = origin.into();
        let Some(output) = self.output_tx.clone() else {
            warn!(device = %origin, "Router is sealed, not attaching");
            return;
        };

        let counters = Arc::new(InterfaceCounters::default());
        counters.running.store(true, Ordering::Relaxed);

        let ctx = WorkerContext {
            origin: origin.clone(),
            arbitrator: Arc::clone(&self.arbitrator),
            admission: Arc::clone(&self.admission),
            output,
            stop: self.stop_tx.subscribe(),
            counters: Arc::clone(&counters),
        };

        let handle = tokio::task::spawn_blocking(move || ctx.run(source));
        info!(device = %origin, "Attached capture source");

        self.workers.push(Worker {
            origin,
            counters,
            handle: Some(handle),
        });
    }

    /// The single stream of admitted packets. Returns `None` after the
    /// first call.
    pub fn output_stream(&mut self) -> Option<mpsc::Receiver<Packet>> {
        self.output_rx.take()
    }

    pub fn arbitrator(&self) -> &Arc<Arbitrator> {
        &self.arbitrator
    }

    /// Interface currently holding the lock.
    pub fn active_device(&self) -> Option<Origin> {
        self.arbitrator.active_device()
    }

    pub fn interface_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            lock: self.arbitrator.lock_state(),
            interfaces: self
                .workers
                .iter()
                .map(|w| InterfaceStats {
                    origin: w.origin.to_string(),
                    captured: w.counters.captured.load(Ordering::Relaxed),
                    matched: w.counters.matched.load(Ordering::Relaxed),
                    admitted: w.counters.admitted.load(Ordering::Relaxed),
                    rejected: w.counters.rejected.load(Ordering::Relaxed),
                    dropped: w.counters.dropped.load(Ordering::Relaxed),
                    running: w.counters.running.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }

    /// Signal every worker to stop and wait until all capture handles are
    /// released. In-flight packets are discarded.
    pub async fn shutdown(&mut self) {
        info!("Stopping capture workers");
        let _ = self.stop_tx.send(true);
        self.wait().await;
    }

    /// Wait for every source to end on its own. The output stream closes
    /// once all workers are gone.
    pub async fn wait(&mut self) {
        self.output_tx = None;

        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            if let Err(e) = handle.await {
                warn!(device = %worker.origin, error = %e, "Capture worker panicked");
                worker.counters.running.store(false, Ordering::Relaxed);
            }
        }

        let _ = self.stop_tx.send(true);
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.await;
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

struct WorkerContext {
    origin: Origin,
    arbitrator: Arc<Arbitrator>,
    admission: Arc<Mutex<()>>,
    output: mpsc::Sender<Packet>,
    stop: watch::Receiver<bool>,
    counters: Arc<InterfaceCounters>,
}

impl WorkerContext {
    fn run<S: DatagramSource>(self, mut source: S) {
        debug!(device = %self.origin, "Capture worker started");

        loop {
            if *self.stop.borrow() {
                debug!(device = %self.origin, "Stop requested");
                break;
            }

            match source.next_event() {
                Ok(SourceEvent::Datagram(datagram)) => {
                    InterfaceCounters::bump(&self.counters.captured);

                    if datagram.payload.is_empty()
                        || !is_target_protocol(
                            datagram.source_port,
                            datagram.dest_port,
                            &datagram.payload,
                        )
                    {
                        continue;
                    }
                    InterfaceCounters::bump(&self.counters.matched);

                    // try_send never blocks, so the gate is held only briefly.
                    let _gate = self.admission.lock();
                    if !self.arbitrator.admit(&self.origin, Instant::now()) {
                        InterfaceCounters::bump(&self.counters.rejected);
                        trace!(device = %self.origin, "Rejected packet from non-active device");
                        continue;
                    }

                    let packet = Packet::from_datagram(self.origin.clone(), datagram);
                    match self.output.try_send(packet) {
                        Ok(()) => InterfaceCounters::bump(&self.counters.admitted),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            InterfaceCounters::bump(&self.counters.dropped);
                            debug!(device = %self.origin, "Output queue full, dropped packet");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            debug!(device = %self.origin, "Output stream closed");
                            break;
                        }
                    }
                }
                Ok(SourceEvent::Idle) => continue,
                Ok(SourceEvent::Closed) => {
                    info!(device = %self.origin, "Capture source ended");
                    break;
                }
                Err(e) => {
                    warn!(device = %self.origin, error = %e, "Capture failed, interface excluded");
                    break;
                }
            }
        }

        drop(source);
        self.counters.running.store(false, Ordering::Relaxed);
        debug!(device = %self.origin, "Capture worker finished");
    }
}

fn spawn_sweeper(arbitrator: Arc<Arbitrator>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    let period = (arbitrator.policy().timeout / 2).max(MIN_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    arbitrator.expire(Instant::now());
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::LockPolicy;
    use crate::capture::IterSource;
    use crate::error::CaptureError;
    use crate::types::Datagram;
    use std::sync::atomic::AtomicUsize;

    fn arbitrator(threshold: u32, timeout: Duration) -> Arc<Arbitrator> {
        Arc::new(Arbitrator::new(LockPolicy { threshold, timeout }))
    }

    fn photon(seq: u8) -> Datagram {
        Datagram::new(5056, 50000, vec![0xF1, seq, 0x00, 0x00])
    }

    fn source(seqs: impl IntoIterator<Item = u8>) -> IterSource<std::vec::IntoIter<Datagram>> {
        IterSource(seqs.into_iter().map(photon).collect::<Vec<_>>().into_iter())
    }

    /// Idles until stopped; counts how often it was dropped.
    struct EndlessSource {
        drops: Arc<AtomicUsize>,
    }

    impl DatagramSource for EndlessSource {
        fn next_event(&mut self) -> Result<SourceEvent, CaptureError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(SourceEvent::Idle)
        }
    }

    impl Drop for EndlessSource {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingSource;

    impl DatagramSource for FailingSource {
        fn next_event(&mut self) -> Result<SourceEvent, CaptureError> {
            Err(CaptureError::Read {
                device: "bad0".to_string(),
                message: "interface went down".to_string(),
            })
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn stats_for(router: &Router, origin: &str) -> InterfaceStats {
        router
            .stats()
            .interfaces
            .into_iter()
            .find(|s| s.origin == origin)
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_origin_order_preserved() {
        let mut router = Router::new(arbitrator(3, Duration::from_secs(5)), RouterOptions::default());
        let mut output = router.output_stream().unwrap();
        assert!(router.output_stream().is_none());

        router.attach("eth0", source(0..50));
        router.wait().await;

        let mut seen = Vec::new();
        while let Some(packet) = output.recv().await {
            assert_eq!(&*packet.origin, "eth0");
            seen.push(packet.payload[1]);
        }
        assert_eq!(seen, (0..50).collect::<Vec<u8>>());
        assert_eq!(router.active_device().as_deref(), Some("eth0"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_non_photon_traffic_filtered() {
        let mut router = Router::new(arbitrator(1, Duration::from_secs(5)), RouterOptions::default());
        let mut output = router.output_stream().unwrap();

        let datagrams = vec![
            Datagram::new(53, 40000, vec![0x12, 0x34, 0x56]),
            Datagram::new(5056, 40000, vec![0xF1]),
            photon(7),
        ];
        router.attach("eth0", IterSource(datagrams.into_iter()));
        router.wait().await;

        let packet = output.recv().await.unwrap();
        assert_eq!(packet.payload[1], 7);
        assert!(output.recv().await.is_none());

        let stats = stats_for(&router, "eth0");
        assert_eq!(stats.captured, 3);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.admitted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_locked_device_starves_others() {
        let mut router = Router::new(arbitrator(3, Duration::from_secs(30)), RouterOptions::default());
        let mut output = router.output_stream().unwrap();

        router.attach("eth0", source(0..3));
        wait_until(|| stats_for(&router, "eth0").admitted == 3).await;
        assert_eq!(router.active_device().as_deref(), Some("eth0"));

        router.attach("wifi0", source(10..15));
        router.wait().await;

        let wifi = stats_for(&router, "wifi0");
        assert_eq!(wifi.matched, 5);
        assert_eq!(wifi.rejected, 5);
        assert_eq!(wifi.admitted, 0);

        let mut origins = Vec::new();
        while let Some(packet) = output.recv().await {
            origins.push(packet.origin.to_string());
        }
        assert_eq!(origins, vec!["eth0"; 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_queue_drops_new_packets() {
        let options = RouterOptions {
            queue_capacity: 2,
            idle_release: false,
        };
        let mut router = Router::new(arbitrator(1, Duration::from_secs(5)), options);
        let mut output = router.output_stream().unwrap();

        router.attach("eth0", source(0..10));
        router.wait().await;

        let stats = stats_for(&router, "eth0");
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.dropped, 8);

        assert_eq!(output.recv().await.unwrap().payload[1], 0);
        assert_eq!(output.recv().await.unwrap().payload[1], 1);
        assert!(output.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_source_does_not_affect_others() {
        let mut router = Router::new(arbitrator(2, Duration::from_secs(5)), RouterOptions::default());
        let mut output = router.output_stream().unwrap();

        router.attach("bad0", FailingSource);
        router.attach("eth0", source(0..4));
        router.wait().await;

        let bad = stats_for(&router, "bad0");
        assert!(!bad.running);
        assert_eq!(bad.captured, 0);

        let mut count = 0;
        while output.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_releases_each_source_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new(arbitrator(3, Duration::from_secs(5)), RouterOptions::default());
        let mut output = router.output_stream().unwrap();

        for name in ["eth0", "tun0", "wlan0"] {
            router.attach(
                name,
                EndlessSource {
                    drops: Arc::clone(&drops),
                },
            );
        }
        assert_eq!(router.interface_count(), 3);

        tokio::time::timeout(Duration::from_secs(2), router.shutdown())
            .await
            .unwrap();

        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert!(router.stats().interfaces.iter().all(|s| !s.running));
        assert!(output.recv().await.is_none());

        router.attach("late0", source(0..1));
        assert_eq!(router.interface_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queue_follows_admission_order_across_origins() {
        const THRESHOLD: u32 = 200;
        let options = RouterOptions {
            queue_capacity: 4096,
            idle_release: false,
        };
        let mut router = Router::new(arbitrator(THRESHOLD, Duration::from_secs(60)), options);
        let mut output = router.output_stream().unwrap();

        let names = ["eth0", "tun0", "wlan0", "vpn0"];
        for name in names {
            router.attach(name, source((0..=255).chain(0..=243)));
        }
        router.wait().await;

        let winner = router.active_device().unwrap().to_string();
        let mut origins = Vec::new();
        while let Some(packet) = output.recv().await {
            origins.push(packet.origin.to_string());
        }

        // The locking packet is the winner's THRESHOLD-th; nothing foreign
        // may be queued after it.
        let lock_index = origins
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == winner)
            .nth(THRESHOLD as usize - 1)
            .map(|(i, _)| i)
            .unwrap();
        assert!(origins[lock_index..].iter().all(|o| *o == winner));
        assert_eq!(origins.iter().filter(|o| **o == winner).count(), 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_release_sweeps_stale_lock() {
        let options = RouterOptions {
            queue_capacity: 16,
            idle_release: true,
        };
        let mut router = Router::new(arbitrator(1, Duration::from_millis(200)), options);
        let _output = router.output_stream().unwrap();

        router.attach("eth0", source(0..1));
        wait_until(|| stats_for(&router, "eth0").admitted == 1).await;

        let arb = Arc::clone(router.arbitrator());
        wait_until(move || arb.active_device().is_none()).await;
        router.shutdown().await;
    }
}
