//! Fake backends for tests
//!
//! Compiled for this crate's tests and, with the `test-util` feature, for
//! downstream test suites.

use iosched_core::{BackendError, CancelToken, HostInfo, IoError, IoResult, ResolveBackend, ResolveQuery};

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Slice used when polling the cancellation token during a simulated delay
const POLL_SLICE: Duration = Duration::from_millis(1);

/// Programmable resolver.
///
/// Answers every forward lookup with the configured addresses and every
/// reverse lookup with the configured host and service. Records how often
/// and on which threads it was called.
pub struct FakeResolver {
    addrs: Vec<SocketAddr>,
    host: HostInfo,
    failure: Option<BackendError>,
    delay: Duration,
    gate: Mutex<bool>,
    gate_cond: Condvar,
    calls: AtomicUsize,
    threads: Mutex<Vec<ThreadId>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            addrs: vec![SocketAddr::from(([127, 0, 0, 1], 80))],
            host: HostInfo {
                host: "example".to_string(),
                service: "http".to_string(),
            },
            failure: None,
            delay: Duration::ZERO,
            gate: Mutex::new(true),
            gate_cond: Condvar::new(),
            calls: AtomicUsize::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_addrs(mut self, addrs: Vec<SocketAddr>) -> Self {
        self.addrs = addrs;
        self
    }

    pub fn with_host(mut self, host: &str, service: &str) -> Self {
        self.host = HostInfo {
            host: host.to_string(),
            service: service.to_string(),
        };
        self
    }

    /// Sleep this long per call, returning `Canceled` if the token is set
    /// meanwhile
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call with `error`
    pub fn failing(mut self, error: BackendError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Hold every call until [`open_gate`](Self::open_gate)
    pub fn gated(self) -> Self {
        *self.gate.lock() = false;
        self
    }

    pub fn open_gate(&self) {
        *self.gate.lock() = true;
        self.gate_cond.notify_all();
    }

    /// Number of backend calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Threads that made the backend calls, in call order
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().clone()
    }

    /// Wait until at least `n` calls have started
    pub fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.calls() < n {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_SLICE);
        }
        true
    }

    fn enter(&self, cancel: &CancelToken) -> IoResult<()> {
        self.threads.lock().push(thread::current().id());
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut open = self.gate.lock();
            while !*open {
                self.gate_cond.wait(&mut open);
            }
        }

        let start = Instant::now();
        while start.elapsed() < self.delay {
            cancel.check()?;
            thread::sleep(POLL_SLICE);
        }
        cancel.check()?;

        match self.failure {
            Some(e) => Err(IoError::BackendFailure(e)),
            None => Ok(()),
        }
    }
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveBackend for FakeResolver {
    fn resolve(&self, cancel: &CancelToken, _query: &ResolveQuery) -> IoResult<Vec<SocketAddr>> {
        self.enter(cancel)?;
        Ok(self.addrs.clone())
    }

    fn reverse(&self, cancel: &CancelToken, _endpoint: &SocketAddr) -> IoResult<HostInfo> {
        self.enter(cancel)?;
        Ok(self.host.clone())
    }
}

/// Switch that holds a gated `FakeStream`'s reads until opened
#[derive(Default)]
pub struct StreamGate {
    open: Mutex<bool>,
    cond: Condvar,
    waiting: AtomicUsize,
}

impl StreamGate {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    /// Wait until at least `n` reads have reached the gate
    pub fn wait_for_readers(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.waiting.load(Ordering::SeqCst) < n {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_SLICE);
        }
        true
    }

    fn pass(&self) {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

/// In-memory stream: reads from a fixed input, records everything written.
///
/// Any `Read + Write` type is a stream backend, so this plugs straight
/// into `StreamHandle`.
pub struct FakeStream {
    input: VecDeque<u8>,
    output: Arc<Mutex<Vec<u8>>>,
    max_chunk: usize,
    gate: Option<Arc<StreamGate>>,
}

impl FakeStream {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Arc::new(Mutex::new(Vec::new())),
            max_chunk: usize::MAX,
            gate: None,
        }
    }

    /// Hold every read until the returned gate is opened
    pub fn gated(mut self) -> (Self, Arc<StreamGate>) {
        let gate = Arc::new(StreamGate::default());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Transfer at most `n` bytes per read or write call
    pub fn with_max_chunk(mut self, n: usize) -> Self {
        self.max_chunk = n.max(1);
        self
    }

    /// Shared view of the bytes written so far
    pub fn output(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.output)
    }
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        let n = buf.len().min(self.input.len()).min(self.max_chunk);
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for FakeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.max_chunk);
        self.output.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iosched_core::{CancelSource, StreamBackend};

    #[test]
    fn test_fake_resolver_records_calls() {
        let fake = FakeResolver::new().with_host("host", "svc");
        let info = fake.reverse(&CancelToken::never(), &"127.0.0.1:1".parse().unwrap()).unwrap();
        assert_eq!(info.host, "host");
        assert_eq!(fake.calls(), 1);
        assert_eq!(fake.threads(), vec![thread::current().id()]);
    }

    #[test]
    fn test_fake_resolver_honors_cancel() {
        let fake = FakeResolver::new().with_delay(Duration::from_secs(10));
        let source = CancelSource::new();
        source.cancel();
        let result = fake.resolve(&source.token(), &ResolveQuery::new("a", "b"));
        assert_eq!(result, Err(IoError::Canceled));
    }

    #[test]
    fn test_fake_stream_chunks() {
        let mut stream = FakeStream::new(b"hello").with_max_chunk(2);
        let token = CancelToken::never();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_some(&token, &mut buf), Ok(2));
        assert_eq!(&buf[..2], b"he");
        assert_eq!(stream.write_some(&token, b"xyz"), Ok(2));
        assert_eq!(*stream.output().lock(), b"xy".to_vec());
    }
}
