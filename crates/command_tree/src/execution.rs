//! Execution coordinators, executors, and the command future.

use std::{
    fmt,
    future::Future,
    io,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures::{channel::oneshot, executor::ThreadPool};
use tracing::{debug, warn};

use crate::{
    context::{CommandContext, CommandResult},
    engine::{panic_message, CommandEngine},
    error::CommandError,
    tokens::TokenQueue,
};

/// Outcome of one command attempt.
pub type CommandOutcome<C> = Result<CommandResult<C>, CommandError>;

/// Unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Concurrent execution resource used by [`DeferredCoordinator`].
pub trait CommandExecutor: Send + Sync {
    /// Runs `task` eventually. Dropping it unrun resolves the attempt as cancelled.
    fn execute(&self, task: Task);
}

impl CommandExecutor for ThreadPool {
    fn execute(&self, task: Task) {
        self.spawn_ok(async move {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                warn!(cause = %panic_message("task", payload.as_ref()), "pooled task panicked");
            }
        });
    }
}

/// Runs tasks immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl CommandExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Shared cancellation switch of one attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

enum State<C> {
    Ready(Option<CommandOutcome<C>>),
    Pending(oneshot::Receiver<CommandOutcome<C>>),
}

/// Future of one command attempt; always resolves, never panics across the boundary.
///
/// Cancelling before the handler started resolves to [`CommandError::Cancelled`] without running
/// it. Once the handler runs, cancellation is advisory.
pub struct CommandFuture<C> {
    state: State<C>,
    cancel: CancelHandle,
}

impl<C> Unpin for CommandFuture<C> {}

impl<C> fmt::Debug for CommandFuture<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFuture")
            .field("ready", &self.is_ready())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl<C> CommandFuture<C> {
    /// Already resolved future.
    pub fn ready(outcome: CommandOutcome<C>, cancel: CancelHandle) -> Self {
        Self {
            state: State::Ready(Some(outcome)),
            cancel,
        }
    }

    /// Future completed through `receiver`.
    pub fn pending(receiver: oneshot::Receiver<CommandOutcome<C>>, cancel: CancelHandle) -> Self {
        Self {
            state: State::Pending(receiver),
            cancel,
        }
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the outcome was known when the future was created.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Handle cancelling this attempt from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl<C> Future for CommandFuture<C> {
    type Output = CommandOutcome<C>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(Err(CommandError::Cancelled)))
            }
            State::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(oneshot::Canceled)) => {
                    debug!("command task dropped before completing");
                    Poll::Ready(Err(CommandError::Cancelled))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Decides where parsing and execution of an attempt run.
pub trait ExecutionCoordinator<C>: Send + Sync {
    /// Starts the attempt and returns its future.
    fn coordinate(
        &self,
        engine: Arc<CommandEngine<C>>,
        context: CommandContext<C>,
        input: TokenQueue,
    ) -> CommandFuture<C>;
}

/// Parses and executes on the calling thread; the returned future is already resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateCoordinator;

impl<C: 'static> ExecutionCoordinator<C> for ImmediateCoordinator {
    fn coordinate(
        &self,
        engine: Arc<CommandEngine<C>>,
        context: CommandContext<C>,
        input: TokenQueue,
    ) -> CommandFuture<C> {
        let cancel = CancelHandle::default();
        let raw = raw_input(&input);
        let outcome = guarded(raw, || engine.run(context, input, cancel.flag()));
        CommandFuture::ready(outcome, cancel)
    }
}

/// Executes on a [`CommandExecutor`], optionally parsing on the calling thread first.
///
/// Synchronous parsing is for parsers that must not run off the caller's thread; parse failures
/// then resolve the future before it is returned.
pub struct DeferredCoordinator {
    executor: Arc<dyn CommandExecutor>,
    synchronous_parsing: bool,
}

impl fmt::Debug for DeferredCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCoordinator")
            .field("synchronous_parsing", &self.synchronous_parsing)
            .finish_non_exhaustive()
    }
}

impl DeferredCoordinator {
    /// Coordinator submitting to `executor`.
    pub fn new(executor: Arc<dyn CommandExecutor>, synchronous_parsing: bool) -> Self {
        Self {
            executor,
            synchronous_parsing,
        }
    }

    /// Coordinator backed by a new thread pool with `pool_size` workers, or one per CPU.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while spawning workers.
    pub fn thread_pool(pool_size: Option<usize>, synchronous_parsing: bool) -> io::Result<Self> {
        let mut builder = ThreadPool::builder();
        builder.name_prefix("command-");
        if let Some(size) = pool_size {
            builder.pool_size(size);
        }
        Ok(Self::new(Arc::new(builder.create()?), synchronous_parsing))
    }

    /// Whether parsing stays on the calling thread.
    pub fn synchronous_parsing(&self) -> bool {
        self.synchronous_parsing
    }
}

impl<C: Send + 'static> ExecutionCoordinator<C> for DeferredCoordinator {
    fn coordinate(
        &self,
        engine: Arc<CommandEngine<C>>,
        mut context: CommandContext<C>,
        input: TokenQueue,
    ) -> CommandFuture<C> {
        let cancel = CancelHandle::default();
        let (sender, receiver) = oneshot::channel();
        let worker_cancel = cancel.clone();
        let raw = raw_input(&input);
        let task: Task = if self.synchronous_parsing {
            let resolved = guarded(raw.clone(), || engine.resolve(&mut context, input));
            let command = match resolved {
                Ok(command) => command,
                Err(error) => return CommandFuture::ready(Err(error), cancel),
            };
            Box::new(move || {
                let flag = worker_cancel.flag();
                let outcome = guarded(raw, || engine.dispatch(context, command, flag));
                let _ = sender.send(outcome);
            })
        } else {
            Box::new(move || {
                let flag = worker_cancel.flag();
                let outcome = guarded(raw, || engine.run(context, input, flag));
                let _ = sender.send(outcome);
            })
        };
        self.executor.execute(task);
        CommandFuture::pending(receiver, cancel)
    }
}

fn raw_input(input: &TokenQueue) -> String {
    input.iter().collect::<Vec<_>>().join(" ")
}

/// Runs one step of an attempt, turning any panic that escaped the engine into a failure.
fn guarded<T>(
    raw: String,
    step: impl FnOnce() -> Result<T, CommandError>,
) -> Result<T, CommandError> {
    panic::catch_unwind(AssertUnwindSafe(step)).unwrap_or_else(|payload| {
        Err(CommandError::execution(
            raw,
            panic_message("command attempt", payload.as_ref()).into(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct QueuedExecutor {
        tasks: Mutex<Vec<Task>>,
    }

    impl CommandExecutor for QueuedExecutor {
        fn execute(&self, task: Task) {
            if let Ok(mut tasks) = self.tasks.lock() {
                tasks.push(task);
            }
        }
    }

    #[test]
    fn ready_future_resolves_once() {
        let future =
            CommandFuture::<()>::ready(Err(CommandError::Cancelled), CancelHandle::default());
        assert!(future.is_ready());
        assert!(matches!(block_on(future), Err(CommandError::Cancelled)));
    }

    #[test]
    fn dropped_task_resolves_as_cancelled() {
        let executor = Arc::new(QueuedExecutor::default());
        let (sender, receiver) = oneshot::channel::<CommandOutcome<()>>();
        executor.execute(Box::new(move || {
            let _ = sender.send(Err(CommandError::Cancelled));
        }));
        let future = CommandFuture::pending(receiver, CancelHandle::default());
        executor.tasks.lock().expect("tasks").clear();
        assert!(matches!(block_on(future), Err(CommandError::Cancelled)));
    }

    #[test]
    fn pool_worker_survives_a_panicking_task() {
        let mut builder = ThreadPool::builder();
        builder.pool_size(1);
        let pool = builder.create().expect("pool");
        CommandExecutor::execute(&pool, Box::new(|| panic!("task bug")));
        let (sender, receiver) = oneshot::channel();
        CommandExecutor::execute(
            &pool,
            Box::new(move || {
                let _ = sender.send(7);
            }),
        );
        assert_eq!(block_on(receiver), Ok(7));
    }

    #[test]
    fn cancel_handle_is_shared() {
        let future =
            CommandFuture::<()>::ready(Err(CommandError::Cancelled), CancelHandle::default());
        let handle = future.cancel_handle();
        handle.cancel();
        assert!(future.is_cancelled());
    }
}
