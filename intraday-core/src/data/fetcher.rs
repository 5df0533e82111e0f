//! Bounded-concurrency fetcher with a shared ban window.
//!
//! A fixed pool of worker threads pulls requests off a shared queue. Before each
//! transport call a worker waits out the [`BanWindow`]; after a failed call or a
//! payload that does not look like the expected CSV, it bans the provider, pauses,
//! and retries the same request. By default there is no retry ceiling: a request
//! that never succeeds stalls its worker until shutdown. Set
//! `FetchConfig::max_attempts` to bound it.
//!
//! Callers block on a one-shot channel per request. The payload they get back is
//! an owned `Vec<u8>`; nothing is borrowed from the transport.

use super::ban_window::BanWindow;
use super::provider::DataError;
use super::transport::Transport;
use crate::config::FetchConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Reply = Result<Vec<u8>, DataError>;

/// A queued request.
struct Job {
    url: String,
    reply: SyncSender<Reply>,
    /// Set once the caller dropped its [`PendingFetch`] without waiting.
    dropped: Arc<AtomicBool>,
}

impl Job {
    /// A job and the caller's handle to its reply.
    fn new(url: String) -> (Self, PendingFetch) {
        let (reply, rx) = mpsc::sync_channel(1);
        let dropped = Arc::new(AtomicBool::new(false));
        let job = Self {
            url,
            reply,
            dropped: Arc::clone(&dropped),
        };
        (job, PendingFetch { rx, dropped })
    }

    fn caller_gone(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Snapshot of fetcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Requests answered with a valid payload.
    pub completed: u64,
    /// Connection errors, timeouts and non-success HTTP statuses.
    pub transport_failures: u64,
    /// Payloads without the CSV header or below the size threshold.
    pub malformed_payloads: u64,
    /// Payloads carrying the provider's "Note" throttling message.
    pub throttle_notices: u64,
    /// Attempts repeated after a failure.
    pub retries: u64,
    /// Requests resolved with an error instead of a payload, including those
    /// skipped after shutdown or after their caller stopped waiting.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    transport_failures: AtomicU64,
    malformed_payloads: AtomicU64,
    throttle_notices: AtomicU64,
    retries: AtomicU64,
    abandoned: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FetchStats {
        FetchStats {
            completed: self.completed.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            throttle_notices: self.throttle_notices.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the handle and every worker.
struct Shared {
    transport: Arc<dyn Transport>,
    ban: BanWindow,
    cancel: AtomicBool,
    config: FetchConfig,
    counters: Counters,
}

impl Shared {
    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// A request that has been queued but not yet answered.
///
/// Dropping it without calling [`wait`](PendingFetch::wait) withdraws the
/// request: a worker that has not dispatched it yet skips it.
pub struct PendingFetch {
    rx: Receiver<Reply>,
    dropped: Arc<AtomicBool>,
}

impl PendingFetch {
    /// Block until the request completes.
    ///
    /// If the fetcher shuts down before a worker picks the request up, the reply
    /// channel is dropped and this returns [`DataError::Cancelled`].
    pub fn wait(self) -> Result<Vec<u8>, DataError> {
        self.rx.recv().unwrap_or(Err(DataError::Cancelled))
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Worker-pool fetcher. Dropping it shuts the pool down and joins the workers.
pub struct RateLimitedFetcher {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl RateLimitedFetcher {
    /// Spawn `config.concurrency` workers over the given transport.
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Result<Self, DataError> {
        config
            .validate()
            .map_err(|e| DataError::InvalidRequest(e.to_string()))?;

        let shared = Arc::new(Shared {
            transport,
            ban: BanWindow::new(config.ban_duration()),
            cancel: AtomicBool::new(false),
            config,
            counters: Counters::default(),
        });

        let (sender, receiver) = mpsc::channel::<Job>();
        let queue = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(shared.config.concurrency);
        for i in 0..shared.config.concurrency {
            let shared = Arc::clone(&shared);
            let queue = Arc::clone(&queue);
            let handle = thread::Builder::new()
                .name(format!("intraday-fetch-{i}"))
                .spawn(move || worker_loop(&shared, &queue))
                .map_err(|e| DataError::Other(format!("failed to spawn fetch worker: {e}")))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
            shared,
        })
    }

    /// Queue a request without waiting for it.
    pub fn submit(&self, url: impl Into<String>) -> Result<PendingFetch, DataError> {
        if self.shared.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        let sender = self.sender.as_ref().ok_or(DataError::Cancelled)?;
        let (job, pending) = Job::new(url.into());
        sender.send(job).map_err(|_| DataError::Cancelled)?;
        Ok(pending)
    }

    /// Queue a request and block until it completes.
    pub fn fetch(&self, url: impl Into<String>) -> Result<Vec<u8>, DataError> {
        self.submit(url)?.wait()
    }

    /// Stop dequeuing. Idle workers exit; queued requests resolve as cancelled.
    ///
    /// A worker inside a transport call finishes it, then resolves its request as
    /// cancelled instead of retrying. No new transport call starts after this.
    pub fn shutdown(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_cancelled()
    }

    pub fn stats(&self) -> FetchStats {
        self.shared.counters.snapshot()
    }

    pub fn ban_window(&self) -> &BanWindow {
        &self.shared.ban
    }

    pub fn concurrency(&self) -> usize {
        self.shared.config.concurrency
    }
}

impl Drop for RateLimitedFetcher {
    fn drop(&mut self) {
        self.shutdown();
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Shared, queue: &Mutex<Receiver<Job>>) {
    let poll = shared.config.idle_poll();
    loop {
        if shared.is_cancelled() {
            break;
        }
        let next = {
            let rx = queue.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv_timeout(poll)
        };
        match next {
            Ok(job) => process(shared, job),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Why a request must not be dispatched, if any.
fn withdrawn(shared: &Shared, job: &Job) -> Option<&'static str> {
    if shared.is_cancelled() {
        Some("fetcher shut down")
    } else if job.caller_gone() {
        Some("caller stopped waiting")
    } else {
        None
    }
}

/// Run one request to completion: wait out bans, call, classify, retry.
fn process(shared: &Shared, job: Job) {
    let config = &shared.config;
    let target = redact_api_key(&job.url);
    let mut attempts: u32 = 0;

    let reply = 'attempts: loop {
        // Wait out the ban, then re-check everything right before dispatch: a
        // ban set by another worker during the wait sends us back to waiting.
        loop {
            if let Some(reason) = withdrawn(shared, &job) {
                Counters::bump(&shared.counters.abandoned);
                debug!(url = %target, attempt = attempts, reason, "request withdrawn");
                break 'attempts Err(DataError::Cancelled);
            }
            if shared.ban.is_clear() {
                break;
            }
            let waited = shared.ban.wait_until_clear();
            debug!(url = %target, waited_ms = waited.as_millis() as u64, "waited out ban window");
        }

        attempts += 1;
        let outcome = shared.transport.get(&job.url).and_then(|body| {
            check_payload(&body, &config.header_token, config.min_payload_bytes)?;
            Ok(body)
        });

        let err = match outcome {
            Ok(body) => {
                Counters::bump(&shared.counters.completed);
                break Ok(body);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            Counters::bump(&shared.counters.abandoned);
            warn!(url = %target, attempt = attempts, error = %err, "request failed permanently");
            break Err(err);
        }

        match &err {
            DataError::Throttled(note) => {
                Counters::bump(&shared.counters.throttle_notices);
                warn!(url = %target, attempt = attempts, note = %note, "provider throttle notice");
            }
            DataError::MalformedPayload { .. } => {
                Counters::bump(&shared.counters.malformed_payloads);
                warn!(url = %target, attempt = attempts, error = %err, "malformed payload");
            }
            _ => {
                Counters::bump(&shared.counters.transport_failures);
                warn!(url = %target, attempt = attempts, error = %err, "transport failure");
            }
        }

        shared.ban.ban();

        if let Some(max) = config.max_attempts {
            if attempts >= max {
                Counters::bump(&shared.counters.abandoned);
                break Err(DataError::RetriesExhausted {
                    attempts,
                    last_error: err.to_string(),
                });
            }
        }

        Counters::bump(&shared.counters.retries);
        thread::sleep(config.retry_pause());
    };

    // The caller may have stopped waiting; nothing to do then.
    let _ = job.reply.send(reply);
}

/// Decide whether a response body is a usable CSV payload.
///
/// Valid means it starts with `header_token` and is at least `min_len` bytes.
/// Otherwise a body mentioning `Note` is the provider's throttling message and
/// anything else is malformed. Both are retried by the fetcher.
pub fn check_payload(body: &[u8], header_token: &str, min_len: usize) -> Result<(), DataError> {
    if body.starts_with(header_token.as_bytes()) && body.len() >= min_len {
        return Ok(());
    }

    let preview = String::from_utf8_lossy(&body[..body.len().min(160)])
        .trim()
        .to_string();

    if body.windows(4).any(|w| w == b"Note") {
        return Err(DataError::Throttled(preview));
    }

    let reason = if body.len() < min_len {
        format!("shorter than {min_len} bytes: {preview:?}")
    } else {
        format!("missing '{header_token}' header: {preview:?}")
    };
    Err(DataError::MalformedPayload {
        len: body.len(),
        reason,
    })
}

/// Replace the `apikey` query value so URLs can be logged.
pub fn redact_api_key(url: &str) -> String {
    let Some(start) = url.find("apikey=") else {
        return url.to_string();
    };
    let value_start = start + "apikey=".len();
    let value_end = url[value_start..]
        .find('&')
        .map(|i| value_start + i)
        .unwrap_or(url.len());
    format!("{}***{}", &url[..value_start], &url[value_end..])
}
