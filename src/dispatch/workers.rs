//! Worker pools draining the two event queues.
//!
//! Queues and workers are owned by an explicitly-constructed
//! [`WorkerQueues`] value, never by globals; tests build as many engines
//! in one process as they like. Workers log and count processing errors
//! but never stop on them.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::WorkerConfig;
use crate::dispatch::event::{ClientEvent, FederatorEvent};
use crate::dispatch::Dispatcher;
use crate::error::{AppError, Result};
use crate::metrics;

/// Bounded queues plus the workers draining them.
pub struct WorkerQueues {
    client_tx: mpsc::Sender<ClientEvent>,
    federator_tx: mpsc::Sender<FederatorEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerQueues {
    /// Start both worker pools against `dispatcher`.
    pub fn spawn(dispatcher: Arc<Dispatcher>, config: &WorkerConfig) -> Self {
        let (client_tx, client_rx) = mpsc::channel::<ClientEvent>(config.queue_capacity);
        let (federator_tx, federator_rx) = mpsc::channel::<FederatorEvent>(config.queue_capacity);

        let client_rx = Arc::new(Mutex::new(client_rx));
        let federator_rx = Arc::new(Mutex::new(federator_rx));

        let mut handles = Vec::with_capacity(config.client_workers + config.federator_workers);

        for worker in 0..config.client_workers {
            let dispatcher = dispatcher.clone();
            let rx = client_rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let event = { rx.lock().await.recv().await };
                    let Some(event) = event else { break };
                    if let Err(e) = dispatcher.process_from_client(event).await {
                        metrics::ERRORS_TOTAL
                            .with_label_values(&[e.metric_label(), "client_worker"])
                            .inc();
                        error!(worker, error = %e, "client event failed");
                    }
                }
                info!(worker, "client worker stopped");
            }));
        }

        for worker in 0..config.federator_workers {
            let dispatcher = dispatcher.clone();
            let rx = federator_rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let event = { rx.lock().await.recv().await };
                    let Some(event) = event else { break };
                    if let Err(e) = dispatcher.process_from_federator(event).await {
                        metrics::ERRORS_TOTAL
                            .with_label_values(&[e.metric_label(), "federator_worker"])
                            .inc();
                        error!(worker, error = %e, "federator event failed");
                    }
                }
                info!(worker, "federator worker stopped");
            }));
        }

        Self {
            client_tx,
            federator_tx,
            handles,
        }
    }

    /// Enqueue a client event, waiting when the queue is full.
    pub async fn queue_from_client(&self, event: ClientEvent) -> Result<()> {
        self.client_tx
            .send(event)
            .await
            .map_err(|_| AppError::Validation("client queue is closed".to_string()))
    }

    /// Enqueue a federator event, waiting when the queue is full.
    pub async fn queue_from_federator(&self, event: FederatorEvent) -> Result<()> {
        self.federator_tx
            .send(event)
            .await
            .map_err(|_| AppError::Validation("federator queue is closed".to_string()))
    }

    /// Close both queues and wait for the workers to drain them.
    pub async fn shutdown(self) {
        drop(self.client_tx);
        drop(self.federator_tx);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
