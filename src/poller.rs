use std::{
    sync::{mpsc::RecvTimeoutError, Arc, Condvar, Mutex},
    time::Duration,
};

use rand::{thread_rng, Rng};
use reqwest::{StatusCode, Url};

use crate::{
    configuration_store::{InMemoryConfigStore, Snapshot},
    Error, Result,
};

pub struct PollerThreadConfig {
    pub store: Arc<InMemoryConfigStore>,
    /// URL serving a [`Snapshot`].
    pub url: String,
    pub poll_interval: Duration,
}

/// A configuration poller thread.
///
/// Periodically fetches a snapshot of all bars and swaps it into the store.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::Sender<()>,

    /// Outcome of the first fetch attempt: `None` while it is in flight. Later successes overwrite
    /// a failure, later failures never overwrite anything.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

/// Each poll is delayed by a random extra of up to `poll_interval / POLL_JITTER_DIVISOR`.
const POLL_JITTER_DIVISOR: u32 = 10;

impl PollerThread {
    pub fn start(config: PollerThreadConfig) -> Result<PollerThread> {
        let (stop_sender, stop_receiver) = std::sync::mpsc::channel::<()>();

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let url = Url::parse(&config.url).map_err(Error::InvalidBaseUrl)?;

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            // Failures never overwrite an earlier result.
            let update_result = move |value: Result<()>| {
                if let Ok(mut slot) = result.0.lock() {
                    if value.is_ok() || slot.is_none() {
                        *slot = Some(value);
                    }
                }
                result.1.notify_all();
            };

            std::thread::Builder::new()
                .name("bar-config-poller".to_owned())
                .spawn(move || {
                    // The blocking client must not be created on an async runtime thread.
                    let client = reqwest::blocking::Client::new();
                    loop {
                        log::debug!(target: "announcement_bar", "fetching bar configuration");
                        match fetch(&client, &url) {
                            Ok(snapshot) => {
                                let count = config.store.set_snapshot(snapshot);
                                log::debug!(target: "announcement_bar", count; "fetched bar configuration");
                                update_result(Ok(()));
                            }
                            Err(Error::Unauthorized) => {
                                log::warn!(target: "announcement_bar", "not authorized to fetch bar configuration, stopping poller");
                                update_result(Err(Error::Unauthorized));
                                // Not recoverable, stop the poller thread.
                                return;
                            }
                            Err(err) => {
                                // Keep serving the previous snapshot, try again later.
                                log::warn!(target: "announcement_bar", "error while fetching bar configuration: {}", err);
                                update_result(Err(err));
                            }
                        }

                        let timeout = jitter(config.poll_interval);
                        match stop_receiver.recv_timeout(timeout) {
                            Err(RecvTimeoutError::Timeout) => {
                                // Timed out. Loop to fetch new configuration.
                            }
                            Ok(()) => {
                                log::debug!(target: "announcement_bar", "poller thread received stop command");
                                return;
                            }
                            Err(RecvTimeoutError::Disconnected) => {
                                // When the other end of channel disconnects, calls to
                                // .recv_timeout() return immediately. Use normal thread sleep in
                                // this case.
                                std::thread::sleep(timeout);
                            }
                        }
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Block until the first snapshot fetch finishes.
    ///
    /// Returns the fetch error if the first attempt failed. The poller keeps retrying in the
    /// background and the store stays unavailable until a snapshot arrives.
    pub fn wait_for_configuration(&self) -> Result<()> {
        let mut lock = self
            .result
            .0
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => return result.clone(),
                None => {
                    lock = self
                        .result
                        .1
                        .wait(lock)
                        .map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }

    /// Ask the poller to stop refreshing the store. Returns immediately. The last loaded snapshot
    /// stays in the store.
    pub fn stop(&self) {
        // The thread may already be gone (e.g., after a 401).
        let _ = self.stop_sender.send(());
    }

    /// Stop refreshing and join the poller thread.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

fn fetch(client: &reqwest::blocking::Client, url: &Url) -> Result<Snapshot> {
    let response = client.get(url.clone()).send()?;
    match response.status() {
        StatusCode::OK => Ok(response.json()?),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized),
        _ => Err(response
            .error_for_status()
            .err()
            .map_or(Error::StoreUnavailable, Error::from)),
    }
}

/// Apply a random jitter of up to a tenth of `interval`.
fn jitter(interval: Duration) -> Duration {
    let max_jitter = interval / POLL_JITTER_DIVISOR;
    if max_jitter.is_zero() {
        return interval;
    }
    interval + thread_rng().gen_range(Duration::ZERO..max_jitter)
}
