use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::pacer::Pacer;
use crate::sink::PacketSink;

/// Control messages for the driver thread.
enum ControlMessage {
    Shutdown,
}

/// Background driver for a shared [`Pacer`].
///
/// Owns a thread that sleeps for [`Pacer::time_until_next_tick`] and then
/// calls [`Pacer::tick`], for as long as the runtime lives. Producers keep
/// calling the pacer directly through [`PacerRuntime::pacer`].
///
/// Dropping the runtime stops the thread. Packets still queued are dropped
/// with the pacer.
pub struct PacerRuntime<S: PacketSink + 'static, C: Clock + 'static> {
    pacer: Arc<Pacer<S, C>>,
    control_tx: Sender<ControlMessage>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<S: PacketSink + 'static, C: Clock + 'static> PacerRuntime<S, C> {
    /// Spawn the driver thread.
    pub fn start(pacer: Arc<Pacer<S, C>>) -> anyhow::Result<Self> {
        let (control_tx, control_rx) = bounded(4);
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_pacer = pacer.clone();
        let worker_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name("strata-pacer".into())
            .spawn(move || runtime_worker(worker_pacer, control_rx, worker_shutdown))
            .map_err(|e| anyhow::anyhow!("Failed to spawn pacer thread: {}", e))?;

        info!("pacer runtime started");
        Ok(Self {
            pacer,
            control_tx,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn pacer(&self) -> &Arc<Pacer<S, C>> {
        &self.pacer
    }

    /// `false` once shut down, or if the driver thread died (a panicking sink).
    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the driver thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            info!("pacer runtime stopped");
        }
    }
}

impl<S: PacketSink + 'static, C: Clock + 'static> Drop for PacerRuntime<S, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn runtime_worker<S: PacketSink, C: Clock>(
    pacer: Arc<Pacer<S, C>>,
    control_rx: Receiver<ControlMessage>,
    shutdown: Arc<AtomicBool>,
) {
    let mut ticks: u64 = 0;
    while !shutdown.load(Ordering::Relaxed) {
        match control_rx.recv_timeout(pacer.time_until_next_tick()) {
            Ok(ControlMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        pacer.tick();
        ticks += 1;
    }
    debug!(ticks, "pacer worker exiting");
}
