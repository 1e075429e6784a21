//! Background lookup worker
//!
//! Owns a small tokio runtime so the tick loop stays synchronous. Finished
//! records come back over a channel and are applied by the tick thread.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::{SerialLookup, SerialRecord};
use crate::error::Result;

/// Runs lookups concurrently and hands back their final records
pub struct LookupWorker {
    runtime: Runtime,
    client: Arc<dyn SerialLookup>,
    results_tx: Sender<SerialRecord>,
    results_rx: Receiver<SerialRecord>,
    in_flight: Arc<AtomicUsize>,
    /// Upper bound on a single lookup, after which it is reported as failed
    deadline: Duration,
}

impl LookupWorker {
    /// Start a worker around `client`
    pub fn new(client: Arc<dyn SerialLookup>, deadline: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("lookup-worker")
            .enable_all()
            .build()?;
        let (results_tx, results_rx) = unbounded();

        Ok(Self {
            runtime,
            client,
            results_tx,
            results_rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            deadline,
        })
    }

    /// Queue a lookup; returns immediately
    pub fn submit(&self, serial_number: &str) {
        let client = self.client.clone();
        let results_tx = self.results_tx.clone();
        let in_flight = self.in_flight.clone();
        let deadline = self.deadline;
        let serial = serial_number.to_string();

        in_flight.fetch_add(1, Ordering::SeqCst);
        debug!("Submitting lookup for {}", serial);

        self.runtime.spawn(async move {
            // Run the lookup as its own task so a panic surfaces as a JoinError
            let mut lookup = tokio::spawn({
                let serial = serial.clone();
                async move { client.lookup(&serial).await }
            });

            let record = match tokio::time::timeout(deadline, &mut lookup).await {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => {
                    warn!("Lookup for {} aborted: {}", serial, e);
                    SerialRecord::failed(&serial)
                }
                Err(_) => {
                    lookup.abort();
                    warn!("Lookup for {} timed out after {:?}", serial, deadline);
                    SerialRecord::failed(&serial)
                }
            };
            let _ = results_tx.send(record);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Collect every record finished since the last call
    pub fn try_drain(&self) -> Vec<SerialRecord> {
        self.results_rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next finished record
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SerialRecord> {
        self.results_rx.recv_timeout(timeout).ok()
    }

    /// Lookups submitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
