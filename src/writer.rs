//! The ephemeral clipboard-writer context.
//!
//! The orchestrator never touches the clipboard itself. Writes happen inside
//! a separately scheduled writer task that is spawned on demand, handed each
//! request over a channel, and torn down after a grace period. This module
//! owns that lifecycle: the single-slot context handle, deduplication of
//! concurrent spawns, the readiness handshake, delivery acknowledgments, and
//! the deferred teardown with its existence re-check.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::clipboard::CopyPipeline;
use crate::events::Event;

/// A copy payload, built fresh per trigger and discarded after delivery.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    /// Newline-joined tab URLs.
    pub text: String,
}

// A request in flight to the writer, with its receipt acknowledgment.
struct Delivery {
    request: CopyRequest,
    ack: oneshot::Sender<()>,
}

struct WriterHandle {
    tx: mpsc::Sender<Delivery>,
    task: JoinHandle<()>,
}

impl WriterHandle {
    async fn close(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

// The zero-or-one live context, plus the spawn currently in flight (if any).
// Both are never populated at once.
#[derive(Default)]
struct Slot {
    handle: Option<WriterHandle>,
    spawning: Option<watch::Receiver<bool>>,
}

enum Claim {
    Existing(mpsc::Sender<Delivery>),
    Wait(watch::Receiver<bool>),
    Create(watch::Sender<bool>),
}

/// Owns the writer context's lifecycle on behalf of the orchestrator.
///
/// The invariant enforced here: at most one writer context exists at any
/// instant. Callers that race an in-flight spawn await that same spawn
/// instead of starting a second one.
pub struct WriterManager {
    event_tx: mpsc::Sender<Event>,
    pipeline: Arc<CopyPipeline>,
    teardown_delay: Duration,
    slot: Arc<Mutex<Slot>>,
    spawned: Arc<AtomicUsize>,
}

impl WriterManager {
    /// Creates a manager with no live context.
    pub fn new(
        event_tx: mpsc::Sender<Event>,
        pipeline: Arc<CopyPipeline>,
        teardown_delay: Duration,
    ) -> Self {
        Self {
            event_tx,
            pipeline,
            teardown_delay,
            slot: Arc::new(Mutex::new(Slot::default())),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delivers a request to the writer context, creating the context first
    /// if none exists. Returns once the writer acknowledges receipt; the copy
    /// outcome arrives later on the event channel. Teardown of the context is
    /// scheduled from here, after the delivery.
    pub async fn deliver(&self, request: CopyRequest) -> Result<()> {
        let tx = self.ensure_context().await?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(Delivery {
            request,
            ack: ack_tx,
        })
        .await
        .ok()
        .context("writer context closed before delivery")?;
        ack_rx
            .await
            .context("writer context dropped the delivery")?;
        self.schedule_teardown();
        Ok(())
    }

    /// Whether a writer context is currently live.
    pub async fn context_exists(&self) -> bool {
        self.slot.lock().await.handle.is_some()
    }

    /// Total number of contexts spawned over this manager's lifetime.
    pub fn contexts_spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    async fn ensure_context(&self) -> Result<mpsc::Sender<Delivery>> {
        loop {
            let claim = {
                let mut slot = self.slot.lock().await;
                if let Some(handle) = &slot.handle {
                    Claim::Existing(handle.tx.clone())
                } else if let Some(rx) = &slot.spawning {
                    Claim::Wait(rx.clone())
                } else {
                    let (ready_tx, ready_rx) = watch::channel(false);
                    slot.spawning = Some(ready_rx);
                    Claim::Create(ready_tx)
                }
            };
            match claim {
                Claim::Existing(tx) => return Ok(tx),
                Claim::Wait(mut rx) => {
                    // Another caller is mid-spawn. Wait until it finishes
                    // either way, then re-check the slot; if it failed, the
                    // next pass claims the spawn for this caller.
                    let _ = rx.wait_for(|ready| *ready).await;
                }
                Claim::Create(ready_tx) => return self.spawn_context(ready_tx).await,
            }
        }
    }

    async fn spawn_context(
        &self,
        ready_tx: watch::Sender<bool>,
    ) -> Result<mpsc::Sender<Delivery>> {
        let result = self.start_writer().await;
        let mut slot = self.slot.lock().await;
        slot.spawning = None;
        match result {
            Ok(handle) => {
                let tx = handle.tx.clone();
                slot.handle = Some(handle);
                let _ = ready_tx.send(true);
                Ok(tx)
            }
            // Dropping ready_tx wakes the waiters on a closed channel and
            // they retry against the now-empty slot.
            Err(err) => Err(err),
        }
    }

    async fn start_writer(&self) -> Result<WriterHandle> {
        let (tx, rx) = mpsc::channel(8);
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(writer_loop(
            rx,
            ready_tx,
            Arc::clone(&self.pipeline),
            self.event_tx.clone(),
        ));
        ready_rx
            .await
            .ok()
            .context("writer context exited before becoming ready")?;
        let spawned = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(spawned, "writer context up");
        Ok(WriterHandle { tx, task })
    }

    // Deferred destruction. The delay is never cancelled; the slot is
    // re-checked when it fires so a context that was already torn down (or
    // replaced) is left alone.
    fn schedule_teardown(&self) {
        let slot = Arc::clone(&self.slot);
        let delay = self.teardown_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let handle = slot.lock().await.handle.take();
            if let Some(handle) = handle {
                tracing::debug!("writer context torn down");
                handle.close().await;
            }
        });
    }
}

async fn writer_loop(
    mut rx: mpsc::Receiver<Delivery>,
    ready_tx: oneshot::Sender<()>,
    pipeline: Arc<CopyPipeline>,
    event_tx: mpsc::Sender<Event>,
) {
    let _ = ready_tx.send(());
    while let Some(Delivery { request, ack }) = rx.recv().await {
        // Acknowledge receipt before the write so the sender's delivery
        // await never depends on the copy itself.
        let _ = ack.send(());
        match pipeline.write_text(&request.text).await {
            Ok(()) => {
                let _ = event_tx.send(Event::CopySucceeded).await;
            }
            Err(err) => {
                let _ = event_tx
                    .send(Event::CopyFailed {
                        error: format!("{err:#}"),
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::CopyMechanism;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    struct RecordingCopy {
        wrote: Arc<StdMutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl CopyMechanism for RecordingCopy {
        async fn copy(&self, text: &str) -> Result<()> {
            if self.fail {
                bail!("copy refused");
            }
            self.wrote.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct GatedCopy {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl CopyMechanism for GatedCopy {
        async fn copy(&self, _text: &str) -> Result<()> {
            self.gate.notified().await;
            Ok(())
        }
    }

    fn manager_with(
        primary: Box<dyn CopyMechanism>,
        teardown_delay: Duration,
    ) -> (WriterManager, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let pipeline = Arc::new(CopyPipeline::with_mechanisms(
            primary,
            Box::new(RecordingCopy {
                wrote: Arc::new(StdMutex::new(Vec::new())),
                fail: true,
            }),
        ));
        (
            WriterManager::new(event_tx, pipeline, teardown_delay),
            event_rx,
        )
    }

    fn request(text: &str) -> CopyRequest {
        CopyRequest {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn delivery_reaches_the_clipboard_and_reports_success() {
        let wrote = Arc::new(StdMutex::new(Vec::new()));
        let (manager, mut event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::clone(&wrote),
                fail: false,
            }),
            Duration::from_secs(2),
        );

        manager.deliver(request("https://example.com")).await.unwrap();

        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
        assert_eq!(wrote.lock().unwrap().as_slice(), ["https://example.com"]);
    }

    #[tokio::test]
    async fn total_failure_reports_the_error_event() {
        let (manager, mut event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::new(StdMutex::new(Vec::new())),
                fail: true,
            }),
            Duration::from_secs(2),
        );

        manager.deliver(request("payload")).await.unwrap();

        match event_rx.recv().await {
            Some(Event::CopyFailed { error }) => {
                assert!(error.contains("legacy copy command failed"));
            }
            other => panic!("expected CopyFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_deliveries_share_one_context() {
        let wrote = Arc::new(StdMutex::new(Vec::new()));
        let (manager, _event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::clone(&wrote),
                fail: false,
            }),
            Duration::from_secs(2),
        );

        let (a, b, c, d, e) = tokio::join!(
            manager.deliver(request("a")),
            manager.deliver(request("b")),
            manager.deliver(request("c")),
            manager.deliver(request("d")),
            manager.deliver(request("e")),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();
        d.unwrap();
        e.unwrap();

        assert_eq!(manager.contexts_spawned(), 1);
        assert!(manager.context_exists().await);
        assert_eq!(wrote.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn delivery_is_acknowledged_before_the_write_finishes() {
        let gate = Arc::new(Notify::new());
        let (manager, mut event_rx) = manager_with(
            Box::new(GatedCopy {
                gate: Arc::clone(&gate),
            }),
            Duration::from_secs(2),
        );

        // deliver() returns on the receipt ack while the write is still
        // parked on the gate.
        manager.deliver(request("slow")).await.unwrap();

        gate.notify_one();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
    }

    #[tokio::test]
    async fn teardown_fires_after_the_grace_delay() {
        let (manager, mut event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::new(StdMutex::new(Vec::new())),
                fail: false,
            }),
            Duration::from_millis(20),
        );

        manager.deliver(request("once")).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
        assert!(manager.context_exists().await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!manager.context_exists().await);
    }

    #[tokio::test]
    async fn context_is_recreated_after_teardown() {
        let (manager, mut event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::new(StdMutex::new(Vec::new())),
                fail: false,
            }),
            Duration::from_millis(20),
        );

        manager.deliver(request("first")).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!manager.context_exists().await);

        manager.deliver(request("second")).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
        assert_eq!(manager.contexts_spawned(), 2);
    }

    #[tokio::test]
    async fn overlapping_teardowns_do_not_double_close() {
        let (manager, mut event_rx) = manager_with(
            Box::new(RecordingCopy {
                wrote: Arc::new(StdMutex::new(Vec::new())),
                fail: false,
            }),
            Duration::from_millis(30),
        );

        manager.deliver(request("first")).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));

        // A second delivery inside the grace window schedules a second
        // teardown; whichever timer fires later finds the slot empty.
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.deliver(request("second")).await.unwrap();
        assert!(matches!(event_rx.recv().await, Some(Event::CopySucceeded)));
        assert_eq!(manager.contexts_spawned(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!manager.context_exists().await);
    }
}
