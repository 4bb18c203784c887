use super::scope::{Scoped, Upstream};
use super::subscription::{StateStream, Subscribers, Subscription};
use crate::effect::{Effect, EffectContext};
use crate::reducer::Reducer;
use crate::runtime::Runtime;
use futures::stream::StreamExt;
use futures::task::noop_waker_ref;
use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::task::{Context, Poll};

/// The runtime that owns state, runs the reducer and drives effects.
///
/// A `Store` is a cheap handle; clones share the same state. Stores are
/// single-threaded: every `send` must happen on the thread that created the
/// store, and effects that finish later are driven by the
/// [`Runtime`] captured at construction.
///
/// Derived stores created with [`scope`](Self::scope) focus on part of the
/// state and forward their actions to the root.
///
/// # Examples
///
/// ```
/// use rudder::{Effect, Reducer, Store};
///
/// #[derive(Clone, Debug)]
/// enum Action { Increment, Incremented }
///
/// let reducer = Reducer::new(|count: &mut i32, action: Action, _env: &()| match action {
///     Action::Increment => Effect::value(Action::Incremented),
///     Action::Incremented => {
///         *count += 1;
///         Effect::none()
///     }
/// });
///
/// let store = Store::new(0, reducer, ());
/// store.send(Action::Increment);
/// assert_eq!(store.get(), 1);
/// ```
pub struct Store<S, A> {
    pub(super) inner: Rc<Inner<S, A>>,
}

pub(super) struct Inner<S, A> {
    state: RefCell<S>,
    subscribers: Subscribers<S>,
    publishing: Cell<bool>,
    republish: Cell<bool>,
    pub(super) dispatch: Dispatch<S, A>,
}

pub(super) enum Dispatch<S, A> {
    Root(Engine<S, A>),
    Scoped(Scoped<S, A>),
}

type Reduce<S, A> = Box<dyn Fn(&mut S, A) -> Effect<A>>;

pub(super) struct Engine<S, A> {
    reduce: Reduce<S, A>,
    queue: RefCell<VecDeque<A>>,
    is_sending: Cell<bool>,
    effects: EffectContext,
    runtime: Runtime,
}

#[cfg(test)]
impl<S: 'static, A> Inner<S, A> {
    pub(super) fn subscribers_len(&self) -> usize {
        self.subscribers.len()
    }
}

impl<S, A> Drop for Engine<S, A> {
    fn drop(&mut self) {
        let in_flight = self.effects.in_flight();
        if in_flight > 0 {
            tracing::debug!(in_flight, "store released; cancelling effects");
        }
        self.effects.cancel_all();
    }
}

// Clears a flag when dropped, so a panicking reducer or subscriber does not
// leave the store wedged.
struct Raised<'a>(&'a Cell<bool>);

impl<'a> Raised<'a> {
    fn raise(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for Raised<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<S: Clone + 'static, A: 'static> Store<S, A> {
    /// Create a root store.
    ///
    /// The store captures [`Runtime::current`] to drive effects that do not
    /// complete synchronously.
    pub fn new<E: 'static>(initial: S, reducer: Reducer<S, A, E>, environment: E) -> Self {
        let reduce: Reduce<S, A> =
            Box::new(move |state, action| reducer.run(state, action, &environment));
        let engine = Engine {
            reduce,
            queue: RefCell::new(VecDeque::new()),
            is_sending: Cell::new(false),
            effects: EffectContext::new(),
            runtime: Runtime::current(),
        };
        Self::from_parts(initial, Dispatch::Root(engine))
    }

    pub(super) fn from_parts(initial: S, dispatch: Dispatch<S, A>) -> Self {
        Self {
            inner: Rc::new(Self::inner_from_parts(initial, dispatch)),
        }
    }

    pub(super) fn inner_from_parts(initial: S, dispatch: Dispatch<S, A>) -> Inner<S, A> {
        Inner {
            state: RefCell::new(initial),
            subscribers: Subscribers::new(),
            publishing: Cell::new(false),
            republish: Cell::new(false),
            dispatch,
        }
    }

    /// Send an action.
    ///
    /// Sends issued while this store is already processing actions (from an
    /// effect or a subscriber) are queued and processed, in order, before the
    /// outermost `send` returns.
    pub fn send(&self, action: A) {
        match &self.inner.dispatch {
            Dispatch::Root(engine) => self.send_root(engine, action),
            Dispatch::Scoped(scoped) => scoped.send(self, action),
        }
    }

    fn send_root(&self, engine: &Engine<S, A>, action: A) {
        engine.queue.borrow_mut().push_back(action);

        {
            let Some(_draining) = Raised::raise(&engine.is_sending) else {
                // the active drain loop picks it up
                return;
            };

            let mut processed = 0_usize;
            loop {
                let next = engine.queue.borrow_mut().pop_front();
                let Some(action) = next else { break };

                tracing::trace!(action = type_name::<A>(), "processing action");
                let effect = {
                    let mut state = self.inner.state.borrow_mut();
                    (engine.reduce)(&mut *state, action)
                };
                self.start_effect(engine, effect);
                processed += 1;
            }
            tracing::trace!(processed, "drain complete");
        }

        self.publish();
    }

    // Polls the effect inline so ready actions join the current drain, then
    // hands whatever is left to the executor.
    fn start_effect(&self, engine: &Engine<S, A>, effect: Effect<A>) {
        let Some(mut stream) = effect.start(&engine.effects) else {
            return;
        };

        let mut cx = Context::from_waker(noop_waker_ref());
        loop {
            match stream.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(action)) => engine.queue.borrow_mut().push_back(action),
                Poll::Ready(None) => return,
                Poll::Pending => break,
            }
        }

        let (mut stream, tracked) = engine.effects.track(stream);
        let token = tracked.token();
        let store = Rc::downgrade(&self.inner);
        tracing::debug!(token, "effect suspended; handing off to executor");

        // `tracked` lives as long as the task, so an executor that discards
        // the task also releases its in-flight entry
        let task = async move {
            let _tracked = tracked;
            while let Some(action) = stream.next().await {
                match store.upgrade() {
                    Some(inner) => Store { inner }.send(action),
                    None => break,
                }
            }
        };

        if let Err(error) = engine.runtime.spawn(task) {
            tracing::error!(%error, token, "dropping effect");
        }
    }

    /// Publish the current state to subscribers.
    ///
    /// A publish requested while one is running is coalesced into one more
    /// round with the latest state, so subscribers never see states out of
    /// order.
    pub(super) fn publish(&self) {
        let Some(_publishing) = Raised::raise(&self.inner.publishing) else {
            self.inner.republish.set(true);
            return;
        };

        loop {
            let snapshot = self.inner.state.borrow().clone();
            tracing::trace!(subscribers = self.inner.subscribers.len(), "publishing state");
            self.inner.subscribers.notify(&snapshot);
            if !self.inner.republish.replace(false) {
                break;
            }
        }
    }

    pub(super) fn replace_state(&self, state: S) {
        *self.inner.state.borrow_mut() = state;
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> S {
        self.read(S::clone)
    }

    /// Read the state without cloning it.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this store's own reducer.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        match self.inner.state.try_borrow() {
            Ok(state) => f(&*state),
            Err(_) => panic!("store state read from inside its own reducer"),
        }
    }

    /// Subscribe to state publications.
    ///
    /// The callback runs once per processed `send` (not once per action),
    /// with the state as it stands after the drain.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&S) + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    /// Stream of published states, starting with the current one.
    ///
    /// States queue without limit until the stream is polled; drop the stream
    /// when it is no longer read.
    pub fn states(&self) -> StateStream<S> {
        StateStream::new(self.get(), |callback| self.subscribe(callback))
    }

    /// Number of effects of the root store still running on the executor.
    pub fn effects_in_flight(&self) -> usize {
        match &self.inner.dispatch {
            Dispatch::Root(engine) => engine.effects.in_flight(),
            Dispatch::Scoped(scoped) => scoped.effects_in_flight(),
        }
    }

    /// Derive a store focused on part of the state.
    ///
    /// Actions sent to the derived store are embedded with `from_local` and
    /// forwarded to the root. The derived state is recomputed with `to_local`
    /// every time the root publishes.
    pub fn scope<L, LA, F, G>(&self, to_local: F, from_local: G) -> Store<L, LA>
    where
        L: Clone + 'static,
        LA: 'static,
        F: Fn(&S) -> L + 'static,
        G: Fn(LA) -> A + 'static,
    {
        self.scope_filter(to_local, move |_, action| Some(from_local(action)))
    }

    /// Derive a store whose actions may be dropped before reaching the root.
    ///
    /// `embed` receives the derived store's current state along with the
    /// action; returning `None` drops the action.
    pub fn scope_filter<L, LA, F, G>(&self, to_local: F, embed: G) -> Store<L, LA>
    where
        L: Clone + 'static,
        LA: 'static,
        F: Fn(&S) -> L + 'static,
        G: Fn(&L, LA) -> Option<A> + 'static,
    {
        let upstream = match &self.inner.dispatch {
            Dispatch::Root(_) => Upstream::root(self.clone(), to_local, embed),
            Dispatch::Scoped(scoped) => scoped.narrow(to_local, embed),
        };
        Store::derived(upstream)
    }

    /// A view of this store that only sends actions.
    pub fn stateless(&self) -> Store<(), A> {
        self.scope(|_| (), |action| action)
    }

    /// A view of this store that only exposes state.
    pub fn actionless(&self) -> Store<S, Infallible> {
        self.scope_filter(S::clone, |_, never: Infallible| match never {})
    }
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Store");
        match self.inner.state.try_borrow() {
            Ok(state) => debug.field("state", &*state),
            Err(_) => debug.field("state", &"<borrowed>"),
        };
        debug
            .field(
                "scoped",
                &matches!(self.inner.dispatch, Dispatch::Scoped(_)),
            )
            .finish()
    }
}
