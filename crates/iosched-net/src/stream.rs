//! Asynchronous reads and writes over a blocking stream backend
//!
//! Each `async_read_some` / `async_write_some` is a two-phase operation.
//! The blocking call runs on the handle's offload thread; the outcome is
//! handed back to the home scheduler as the completion call's status and
//! byte count, and the handler receives `(IoResult<usize>, buffer)`.
//!
//! The backend lives behind a mutex that the blocking phase holds for the
//! duration of the call, so `close()` waits for an in-flight call.
//! Cancel first to make it return sooner.

use iosched_core::{BackendError, CancelSource, CancelToken, IoError, IoResult, StreamBackend};
use iosched_runtime::{
    AnyExecutor, Executor, HandlerDispatcher, OffloadService, OpPhase, Operation, Scheduler,
};

use parking_lot::Mutex;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

type Shared<B> = Arc<Mutex<Option<B>>>;

struct StreamOp<B, H, E>
where
    E: Executor + Clone,
{
    backend: Shared<B>,
    direction: Direction,
    buffer: Vec<u8>,
    token: CancelToken,
    home: Scheduler,
    dispatcher: HandlerDispatcher<H, E>,
    phase: OpPhase,
}

impl<B, H, E> StreamOp<B, H, E>
where
    B: StreamBackend,
    H: FnOnce(IoResult<usize>, Vec<u8>) + Send + 'static,
    E: Executor + Clone,
{
    fn transfer(&mut self) -> IoResult<usize> {
        self.token.check()?;
        let mut guard = self.backend.lock();
        let Some(backend) = guard.as_mut() else {
            return Err(IoError::BackendFailure(BackendError::Io(ErrorKind::NotConnected)));
        };
        match self.direction {
            Direction::Read => backend.read_some(&self.token, &mut self.buffer),
            Direction::Write => backend.write_some(&self.token, &self.buffer),
        }
    }
}

impl<B, H, E> Operation for StreamOp<B, H, E>
where
    B: StreamBackend,
    H: FnOnce(IoResult<usize>, Vec<u8>) + Send + 'static,
    E: Executor + Clone,
{
    fn complete(mut self: Box<Self>, owner: Option<&Scheduler>, status: IoResult<()>, bytes: usize) {
        match owner {
            Some(owner) if *owner != self.home => {
                self.phase.advance(OpPhase::Blocking);
                let transferred = panic::catch_unwind(AssertUnwindSafe(|| self.transfer())).unwrap_or_else(|_| {
                    log::error!("stream backend panicked");
                    Err(IoError::BackendFailure(BackendError::Panicked))
                });
                let (status, bytes) = match transferred {
                    Ok(n) => (Ok(()), n),
                    Err(e) => (Err(e), 0),
                };
                if self.direction == Direction::Read {
                    self.buffer.truncate(bytes);
                }
                self.phase.advance(OpPhase::ReadyForCompletion);

                let home = self.home.clone();
                home.post_deferred_completion_with(self, status, bytes);
            }
            Some(_) => {
                let mut this = *self;
                this.phase.advance(OpPhase::Completed);
                let StreamOp { buffer, dispatcher, .. } = this;
                let result = status.map(|()| bytes);
                dispatcher.invoke_with(move |handler| handler(result, buffer));
            }
            None => {
                if matches!(self.phase, OpPhase::Created | OpPhase::Blocking) {
                    self.home.work_finished();
                }
            }
        }
    }
}

/// Stream with asynchronous operations completing on a scheduler
pub struct StreamHandle<B: StreamBackend> {
    backend: Shared<B>,
    offload: OffloadService,
    source: Mutex<CancelSource>,
    executor: AnyExecutor,
}

impl<B: StreamBackend> StreamHandle<B> {
    pub fn new(home: &Scheduler, backend: B) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Some(backend))),
            offload: OffloadService::new(home),
            source: Mutex::new(CancelSource::new()),
            executor: AnyExecutor::new(home.executor()),
        }
    }

    /// Deliver handlers through `executor` instead of the home scheduler
    pub fn with_executor<E: Executor>(mut self, executor: E) -> Self {
        self.executor = AnyExecutor::new(executor);
        self
    }

    pub fn is_open(&self) -> bool {
        self.backend.lock().is_some()
    }

    /// Read up to `len` bytes.
    ///
    /// The handler receives the byte count and a buffer of exactly that
    /// many bytes. A closed peer is `BackendError::Eof`.
    pub fn async_read_some<H>(&self, len: usize, handler: H) -> IoResult<()>
    where
        H: FnOnce(IoResult<usize>, Vec<u8>) + Send + 'static,
    {
        self.start(Direction::Read, vec![0; len], handler)
    }

    /// Write some prefix of `data`.
    ///
    /// The handler receives the number of bytes written and `data` back.
    pub fn async_write_some<H>(&self, data: Vec<u8>, handler: H) -> IoResult<()>
    where
        H: FnOnce(IoResult<usize>, Vec<u8>) + Send + 'static,
    {
        self.start(Direction::Write, data, handler)
    }

    fn start<H>(&self, direction: Direction, buffer: Vec<u8>, handler: H) -> IoResult<()>
    where
        H: FnOnce(IoResult<usize>, Vec<u8>) + Send + 'static,
    {
        let home = self.offload.home();
        let op = Box::new(StreamOp {
            backend: Arc::clone(&self.backend),
            direction,
            buffer,
            token: self.source.lock().token(),
            home: home.clone(),
            dispatcher: HandlerDispatcher::new(handler, self.executor.clone(), home),
            phase: OpPhase::Created,
        });
        self.offload.start_op(op)
    }

    /// Cancel every operation started so far
    pub fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.source.lock(), CancelSource::new());
        previous.cancel();
    }

    /// Cancel outstanding operations and drop the backend.
    ///
    /// Returns the backend if it was still open.
    pub fn close(&self) -> Option<B> {
        self.cancel();
        let backend = self.backend.lock().take();
        if backend.is_some() {
            log::debug!("stream closed");
        }
        backend
    }
}

impl<B: StreamBackend> Drop for StreamHandle<B> {
    fn drop(&mut self) {
        self.cancel();
        self.offload.shutdown();
    }
}
