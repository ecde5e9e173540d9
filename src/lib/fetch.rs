//! Windowed, pipelined range fetching.
//!
//! A [`RangeReader`] streams a byte range of a stored object through a small
//! pool of fetch threads, each pulling one fixed-size window at a time, so a
//! multi-gigabyte object is never held fully in memory and decompression
//! overlaps with the next downloads. The consumer sees a plain [`Read`] over
//! the windows reassembled in order.

use crate::errors::{Result, VarsumError};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::store::ObjectStore;
use crossbeam_channel::{Receiver, bounded};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// Tuning for one [`RangeReader`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Bytes per fetch window.
    pub window_size: usize,
    /// Fetch threads, and the bound on windows in flight.
    pub max_in_flight: usize,
    /// Retry schedule for each window fetch.
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            window_size: 8 * 1024 * 1024,
            max_in_flight: 4,
            retry: RetryPolicy::bounded(4, std::time::Duration::from_millis(500)),
        }
    }
}

type WindowResult = (usize, Result<Vec<u8>>);

/// Streaming reader over a byte range of one stored object.
///
/// Windows are fetched concurrently and reassembled in order; a window
/// whose fetch fails permanently surfaces as an error when the consumer
/// reaches it. Fetch threads are joined on drop.
pub struct RangeReader {
    receiver: Receiver<WindowResult>,
    /// Windows that arrived ahead of the one the consumer needs.
    pending: BTreeMap<usize, Result<Vec<u8>>>,
    current: Vec<u8>,
    current_pos: usize,
    next_window: usize,
    total_windows: usize,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl RangeReader {
    /// Stream a whole object.
    pub fn new(store: Arc<dyn ObjectStore>, key: &str, config: FetchConfig) -> Result<Self> {
        Self::with_range(store, key, 0, None, config)
    }

    /// Stream the inclusive byte range `[start, end]`; `end = None` runs to
    /// the object end.
    pub fn with_range(
        store: Arc<dyn ObjectStore>,
        key: &str,
        start: u64,
        end: Option<u64>,
        config: FetchConfig,
    ) -> Result<Self> {
        let size = store.size(key)?;
        if size == 0 || start >= size {
            return Err(VarsumError::Store {
                key: key.to_string(),
                reason: format!("range start {start} is past object end ({size} bytes)"),
                retryable: false,
            });
        }
        let end = end.unwrap_or(size - 1).min(size - 1);

        let window_size = config.window_size.max(1) as u64;
        let span = end - start + 1;
        let total_windows = span.div_ceil(window_size) as usize;
        let windows: Arc<Vec<(u64, u64)>> = Arc::new(
            (0..total_windows as u64)
                .map(|i| (start + i * window_size, (start + (i + 1) * window_size - 1).min(end)))
                .collect(),
        );

        let worker_count = config.max_in_flight.max(1).min(total_windows);
        let (sender, receiver) = bounded::<WindowResult>(worker_count);
        let next_to_claim = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let store = Arc::clone(&store);
            let key = key.to_string();
            let windows = Arc::clone(&windows);
            let next_to_claim = Arc::clone(&next_to_claim);
            let shutdown = Arc::clone(&shutdown);
            let sender = sender.clone();
            let retry = config.retry.clone();
            let handle = std::thread::Builder::new()
                .name(format!("fetch-{worker}"))
                .spawn(move || {
                    loop {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }
                        let index = next_to_claim.fetch_add(1, Ordering::SeqCst);
                        let Some(&(window_start, window_end)) = windows.get(index) else {
                            break;
                        };
                        let result = retry_with_backoff(&retry, "range fetch", || {
                            store.get_range(&key, window_start, window_end)
                        });
                        if sender.send((index, result)).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            receiver,
            pending: BTreeMap::new(),
            current: Vec::new(),
            current_pos: 0,
            next_window: 0,
            total_windows,
            shutdown,
            workers,
        })
    }

    fn take_window(&mut self, index: usize) -> std::io::Result<Vec<u8>> {
        loop {
            if let Some(result) = self.pending.remove(&index) {
                return result.map_err(std::io::Error::other);
            }
            match self.receiver.recv() {
                Ok((arrived, result)) => {
                    self.pending.insert(arrived, result);
                }
                Err(_) => {
                    return Err(std::io::Error::other(
                        "fetch workers exited before delivering the next window",
                    ));
                }
            }
        }
    }
}

impl Read for RangeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.current_pos < self.current.len() {
                let n = (self.current.len() - self.current_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.current[self.current_pos..self.current_pos + n]);
                self.current_pos += n;
                return Ok(n);
            }
            if self.next_window >= self.total_windows {
                return Ok(0);
            }
            self.current = self.take_window(self.next_window)?;
            self.current_pos = 0;
            self.next_window += 1;
        }
    }
}

impl Drop for RangeReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Free channel slots so a worker blocked in send can finish. Each
        // worker sends at most one result after the flag is set, and the
        // channel has one slot per worker.
        while self.receiver.try_recv().is_ok() {}
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
