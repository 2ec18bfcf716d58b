//! Per-conversation workers
//!
//! Each conversation gets its own worker task fed by an unbounded channel.
//! A worker handles its events strictly in order, so no locking is needed
//! around a conversation's session; different conversations run
//! concurrently. Idle workers reclaim their session and exit, and are
//! respawned on the next message.

use super::machine::ConversationMachine;
use crate::error::Result;
use crate::transport::{ChatId, InboundEvent, InboundMessage, Transport};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// First delay after a failed poll
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound for the poll retry delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

struct Worker {
    sender: mpsc::UnboundedSender<InboundEvent>,
    handle: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<ChatId, Worker>>>;

/// Routes inbound messages to conversation workers
pub struct Dispatcher {
    machine: Arc<ConversationMachine>,
    idle_timeout: Duration,
    workers: Registry,
}

async fn run_worker(
    machine: Arc<ConversationMachine>,
    registry: Registry,
    chat: ChatId,
    mut events: mpsc::UnboundedReceiver<InboundEvent>,
    idle_timeout: Duration,
) {
    loop {
        let event = match tokio::time::timeout(idle_timeout, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                // Dispatcher shut down
                machine.abandon(chat).await;
                break;
            }
            Err(_) => {
                // Dispatch sends while holding the registry, so an empty
                // queue stays empty until the channel is closed
                let guard = registry.lock().await;
                match events.try_recv() {
                    Ok(event) => event,
                    Err(_) => {
                        events.close();
                        drop(guard);
                        if machine.abandon(chat).await {
                            tracing::info!(chat, "Reclaimed idle session");
                        }
                        break;
                    }
                }
            }
        };
        machine.handle(chat, event).await;
    }
    tracing::debug!(chat, "Conversation worker stopped");
}

impl Dispatcher {
    pub fn new(machine: Arc<ConversationMachine>, idle_timeout: Duration) -> Self {
        Self {
            machine,
            idle_timeout,
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of workers that are still running
    pub async fn active_workers(&self) -> usize {
        self.workers
            .lock()
            .await
            .values()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    fn spawn_worker(&self, chat: ChatId, previous: Option<JoinHandle<()>>) -> Worker {
        let (sender, receiver) = mpsc::unbounded_channel();
        let machine = Arc::clone(&self.machine);
        let registry = Arc::clone(&self.workers);
        let idle_timeout = self.idle_timeout;

        let handle = tokio::spawn(
            async move {
                // A closing worker may still be draining; keep ordering
                if let Some(previous) = previous {
                    if let Err(e) = previous.await {
                        tracing::error!(chat, "Previous worker failed: {}", e);
                    }
                }
                run_worker(machine, registry, chat, receiver, idle_timeout).await;
            }
            .instrument(tracing::info_span!("conversation", chat)),
        );

        Worker { sender, handle }
    }

    /// Hand a message to its conversation's worker, spawning one if needed
    pub async fn dispatch(&self, message: InboundMessage) {
        let InboundMessage { chat_id, event } = message;
        let mut workers = self.workers.lock().await;
        workers.retain(|_, w| !w.handle.is_finished());

        let (event, previous) = match workers.remove(&chat_id) {
            Some(worker) => match worker.sender.send(event) {
                Ok(()) => {
                    workers.insert(chat_id, worker);
                    return;
                }
                Err(SendError(event)) => (event, Some(worker.handle)),
            },
            None => (event, None),
        };

        let worker = self.spawn_worker(chat_id, previous);
        if worker.sender.send(event).is_err() {
            tracing::error!(chat = chat_id, "New conversation worker refused event");
        }
        workers.insert(chat_id, worker);
    }

    /// Poll `transport` until Ctrl-C, then shut down
    pub async fn run(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.run_until(transport, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await
    }

    /// Poll `transport` until `shutdown` resolves
    ///
    /// Polling errors back off exponentially from [`INITIAL_BACKOFF`] to
    /// [`MAX_BACKOFF`] and reset after the next successful poll.
    pub async fn run_until<F>(&self, transport: Arc<dyn Transport>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = transport.poll_updates() => polled,
            };

            match polled {
                Ok(messages) => {
                    backoff = INITIAL_BACKOFF;
                    for message in messages {
                        self.dispatch(message).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(retry_in = ?backoff, "Polling failed: {:#}", e);
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close every conversation channel and wait for the workers
    ///
    /// Workers finish their queued events first, then drop their session.
    pub async fn shutdown(&self) {
        let workers: Vec<Worker> = self
            .workers
            .lock()
            .await
            .drain()
            .map(|(_, worker)| worker)
            .collect();

        let handles: Vec<JoinHandle<()>> = workers
            .into_iter()
            .map(|Worker { sender, handle }| {
                drop(sender);
                handle
            })
            .collect();

        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Conversation worker failed: {}", e);
            }
        }
        tracing::info!(workers = count, "Dispatcher stopped");
    }
}
