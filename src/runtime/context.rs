use crate::error::Result;
use futures::executor::LocalPool;
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// A single-threaded spawner able to drive effect tasks.
pub type Executor = Rc<dyn LocalSpawn>;

// Thread-local stack of executors installed with `Runtime::with_executor`
thread_local! {
    static EXECUTOR_STACK: RefCell<Vec<Executor>> = RefCell::new(vec![]);
}

/// Execution context for effects that do not finish synchronously.
///
/// A root [`Store`](crate::Store) captures [`Runtime::current`] when it is
/// created and hands every pending effect to that runtime's executor. All
/// tasks run on the thread that created the store.
///
/// The default executor spawns onto the current `tokio::task::LocalSet`
/// (feature `tokio`). Any other [`LocalSpawn`] can be installed for a block of
/// code with [`Runtime::with_executor`].
///
/// # Examples
///
/// Driving effects deterministically with a `LocalPool`:
///
/// ```
/// use rudder::runtime::Runtime;
///
/// Runtime::scope(|pool| {
///     let runtime = Runtime::current();
///     runtime.spawn(async {}).unwrap();
///     pool.run_until_stalled();
/// });
/// ```
#[derive(Clone)]
pub struct Runtime {
    executor: Executor,
}

impl Runtime {
    /// Create a runtime around an explicit executor.
    pub fn new<S>(spawner: S) -> Self
    where
        S: LocalSpawn + 'static,
    {
        Self {
            executor: Rc::new(spawner),
        }
    }

    /// Get the current runtime (innermost installed executor or the default).
    pub fn current() -> Self {
        EXECUTOR_STACK.with(|stack| {
            let executor = stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(default_executor);
            Self { executor }
        })
    }

    /// Run a function with `spawner` as the current executor.
    ///
    /// Stores created inside `f` keep using `spawner` after `f` returns.
    pub fn with_executor<S, F, R>(spawner: S, f: F) -> R
    where
        S: LocalSpawn + 'static,
        F: FnOnce() -> R,
    {
        EXECUTOR_STACK.with(|stack| {
            stack.borrow_mut().push(Rc::new(spawner));
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        EXECUTOR_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Run a function with a fresh `LocalPool` as the current executor.
    ///
    /// The closure receives the pool so it can drive spawned effects with
    /// `run_until_stalled`. Tasks still pending when the closure returns are
    /// dropped together with the pool.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce(&mut LocalPool) -> R,
    {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        Self::with_executor(spawner, || f(&mut pool))
    }

    /// Spawn a task on this runtime's executor.
    pub fn spawn<Fut>(&self, future: Fut) -> Result<()>
    where
        Fut: Future<Output = ()> + 'static,
    {
        self.executor.spawn_local(future)?;
        Ok(())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

#[cfg(feature = "tokio")]
fn default_executor() -> Executor {
    Rc::new(TokioLocal)
}

#[cfg(not(feature = "tokio"))]
fn default_executor() -> Executor {
    Rc::new(Unavailable)
}

/// Executor that spawns onto the current `tokio::task::LocalSet`.
///
/// Spawning outside a tokio runtime, or inside one but outside a `LocalSet`,
/// fails with [`SpawnError`] and drops the task. The second case relies on
/// catching the panic raised by `tokio::task::spawn_local`, so it still
/// aborts under `panic = "abort"`.
#[cfg(feature = "tokio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioLocal;

#[cfg(feature = "tokio")]
impl LocalSpawn for TokioLocal {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SpawnError::shutdown());
        }
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::task::spawn_local(future);
        }))
        .map_err(|_| SpawnError::shutdown())
    }
}

#[cfg(not(feature = "tokio"))]
struct Unavailable;

#[cfg(not(feature = "tokio"))]
impl LocalSpawn for Unavailable {
    fn spawn_local_obj(&self, _future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}
