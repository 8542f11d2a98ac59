//! Batching event sink.
//!
//! [`EventDispatcher::record`] only enqueues into a bounded channel and never waits. A background
//! task drains the queue on a fixed interval and delivers each batch to the ingestion endpoint.
//! Delivery failures are logged and the batch is dropped: analytics completeness never takes
//! priority over serving the widget.
use std::time::Duration;

use tokio::{
    sync::mpsc::{self, error::TryRecvError, error::TrySendError},
    task::JoinHandle,
    time::{interval_at, Instant},
};

use crate::events::{BarEvent, EmissionError, EventEmitter};

const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Where batches are POSTed as a JSON array. Events are only logged when unset.
    pub ingestion_url: Option<String>,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub delivery_interval: Duration,
    pub delivery_timeout: Duration,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        EventDispatcherConfig {
            ingestion_url: None,
            queue_capacity: 10_000,
            batch_size: 100,
            delivery_interval: Duration::from_millis(1_000),
            delivery_timeout: Duration::from_millis(2_000),
        }
    }
}

pub struct EventDispatcher {
    sender: mpsc::Sender<BarEvent>,
}

impl EventDispatcher {
    /// Start the delivery task on the current tokio runtime.
    ///
    /// The task exits once every `EventDispatcher` handle is dropped and the queue is drained.
    pub fn start(config: EventDispatcherConfig) -> (EventDispatcher, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(deliver_loop(config, receiver));
        (EventDispatcher { sender }, handle)
    }
}

impl EventEmitter for EventDispatcher {
    fn record(&self, event: BarEvent) -> Result<(), EmissionError> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => EmissionError::QueueFull,
            TrySendError::Closed(_) => EmissionError::Closed,
        })
    }
}

async fn deliver_loop(config: EventDispatcherConfig, mut receiver: mpsc::Receiver<BarEvent>) {
    let client = reqwest::Client::new();
    let batch_size = config.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
    let mut ticker = interval_at(
        Instant::now() + config.delivery_interval,
        config.delivery_interval,
    );

    loop {
        ticker.tick().await;

        let mut closed = false;
        loop {
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match receiver.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            if batch.is_empty() {
                break;
            }
            let full = batch.len() == batch_size;
            deliver(&client, &config, batch).await;
            if !full {
                break;
            }
        }

        if closed {
            log::debug!(target: "announcement_bar", "event dispatcher stopped");
            return;
        }
    }
}

async fn deliver(client: &reqwest::Client, config: &EventDispatcherConfig, events: Vec<BarEvent>) {
    let Some(url) = &config.ingestion_url else {
        for event in &events {
            log::info!(target: "announcement_bar", event:serde; "bar event");
        }
        return;
    };

    let result = client
        .post(url)
        .timeout(config.delivery_timeout)
        .json(&events)
        .send()
        .await
        .and_then(|response| response.error_for_status());

    match result {
        Ok(_) => {
            log::debug!(target: "announcement_bar", count = events.len(); "delivered events");
        }
        Err(err) => {
            log::warn!(target: "announcement_bar",
                       count = events.len();
                       "dropping events, delivery failed: {}", err.without_url());
        }
    }
}
