use super::cancel::{CancelId, EffectContext};
use super::merge::Merge;
use futures::channel::mpsc;
use futures::future;
use futures::stream::{self, LocalBoxStream, StreamExt};
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

type Start<A> = Box<dyn FnOnce(&EffectContext) -> LocalBoxStream<'static, A>>;

/// A lazily started, cancellable producer of follow-up actions.
///
/// Reducers never perform work themselves; they describe it by returning an
/// `Effect`. The store starts the effect right after the reducer returns and
/// feeds every action it produces back into `send`.
///
/// Actions that are ready immediately are processed within the same drain
/// loop, in order. Anything slower is handed to the store's executor (see
/// [`Runtime`](crate::runtime::Runtime)).
///
/// # Examples
///
/// ```
/// use rudder::Effect;
///
/// let effect: Effect<u32> = Effect::merge([
///     Effect::value(1),
///     Effect::future(async { 2 }),
///     Effect::none(),
/// ]);
/// assert!(!effect.is_none());
/// ```
pub struct Effect<A> {
    start: Option<Start<A>>,
}

impl<A: 'static> Effect<A> {
    /// An effect that completes immediately without emitting anything.
    pub fn none() -> Self {
        Self { start: None }
    }

    /// Whether this is the no-op effect.
    pub fn is_none(&self) -> bool {
        self.start.is_none()
    }

    pub(crate) fn from_start<F>(start: F) -> Self
    where
        F: FnOnce(&EffectContext) -> LocalBoxStream<'static, A> + 'static,
    {
        Self {
            start: Some(Box::new(start)),
        }
    }

    /// Emit a single action synchronously.
    pub fn value(action: A) -> Self {
        Self::iter([action])
    }

    /// Emit several actions synchronously, in order.
    pub fn iter<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        let actions: Vec<A> = actions.into_iter().collect();
        if actions.is_empty() {
            return Self::none();
        }
        Self::stream(stream::iter(actions))
    }

    /// Wrap a single-shot asynchronous computation.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = A> + 'static,
    {
        Self::stream(stream::once(future))
    }

    /// Wrap an arbitrary stream of actions.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = A> + 'static,
    {
        Self::from_start(move |_| stream.boxed_local())
    }

    /// Build an effect from a producer that emits manually.
    ///
    /// `producer` runs when the store starts the effect. The effect completes
    /// once every [`Emitter`] clone has been dropped. The returned callback is
    /// invoked if the effect is torn down before it completes (cancellation
    /// or store teardown).
    ///
    /// The emitter may be moved to another thread; actions are still
    /// delivered on the store's own thread.
    pub fn run<P, C>(producer: P) -> Self
    where
        P: FnOnce(Emitter<A>) -> C + 'static,
        C: FnOnce() + 'static,
    {
        Self::from_start(move |_| {
            let (tx, rx) = mpsc::unbounded();
            let on_cancel = producer(Emitter { tx });
            Produced {
                rx,
                on_cancel: Some(Box::new(on_cancel)),
            }
            .boxed_local()
        })
    }

    /// Perform `work` when the effect starts; emits nothing.
    pub fn fire_and_forget<F>(work: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::from_start(move |_| {
            work();
            stream::empty().boxed_local()
        })
    }

    /// Run an asynchronous side effect; emits nothing.
    pub fn fire_and_forget_async<F>(future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self::stream(stream::once(future).filter_map(|()| future::ready(None)))
    }

    /// Run all effects at once, interleaving their actions.
    ///
    /// Completes when every input completes. Inputs are started in order.
    pub fn merge<I>(effects: I) -> Self
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut effects: Vec<Effect<A>> =
            effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Self::none(),
            1 => effects.remove(0),
            _ => Self::from_start(move |ctx| {
                let streams = effects
                    .into_iter()
                    .filter_map(|effect| effect.start(ctx))
                    .collect();
                Merge::new(streams).boxed_local()
            }),
        }
    }

    /// Run effects one after another; each starts after the previous completes.
    pub fn concatenate<I>(effects: I) -> Self
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut effects: Vec<Effect<A>> =
            effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Self::none(),
            1 => effects.remove(0),
            _ => Self::from_start(move |ctx| {
                let ctx = ctx.clone();
                stream::iter(effects)
                    .filter_map(move |effect| future::ready(effect.start(&ctx)))
                    .flatten()
                    .boxed_local()
            }),
        }
    }

    /// Merge this effect with another.
    pub fn merge_with(self, other: Effect<A>) -> Self {
        Self::merge([self, other])
    }

    /// Run `other` after this effect completes.
    pub fn concat_with(self, other: Effect<A>) -> Self {
        Self::concatenate([self, other])
    }

    /// Transform every emitted action.
    pub fn map<B, F>(self, f: F) -> Effect<B>
    where
        B: 'static,
        F: FnMut(A) -> B + 'static,
    {
        match self.start {
            None => Effect::none(),
            Some(start) => Effect::from_start(move |ctx| start(ctx).map(f).boxed_local()),
        }
    }

    /// Register this effect under `id` so it can be cancelled later.
    ///
    /// With `cancel_in_flight`, every effect already registered under `id` is
    /// cancelled before this one starts.
    pub fn cancellable<K>(self, id: K, cancel_in_flight: bool) -> Self
    where
        K: Hash + Eq + fmt::Debug + 'static,
    {
        let id = CancelId::new(id);
        if self.is_none() && !cancel_in_flight {
            return self;
        }
        Self::from_start(move |ctx| {
            if cancel_in_flight {
                ctx.cancel(&id);
            }
            match self.start(ctx) {
                Some(stream) => ctx.register(id, stream),
                None => stream::empty().boxed_local(),
            }
        })
    }

    /// Cancel every in-flight effect registered under `id`.
    ///
    /// Idempotent; unknown ids are ignored.
    pub fn cancel<K>(id: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + 'static,
    {
        Self::cancel_all([id])
    }

    /// Cancel the effects registered under each of `ids`.
    pub fn cancel_all<I, K>(ids: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Hash + Eq + fmt::Debug + 'static,
    {
        let ids: Vec<CancelId> = ids.into_iter().map(CancelId::new).collect();
        Self::from_start(move |ctx| {
            for id in &ids {
                ctx.cancel(id);
            }
            stream::empty().boxed_local()
        })
    }

    /// Start the effect; `None` for the no-op effect.
    pub(crate) fn start(self, ctx: &EffectContext) -> Option<LocalBoxStream<'static, A>> {
        self.start.map(|start| start(ctx))
    }
}

impl<T: 'static, E: 'static> Effect<Result<T, E>> {
    /// Emit a single failure.
    pub fn error(error: E) -> Self {
        Self::value(Err(error))
    }

    /// Wrap a fallible single-shot computation; its result is the emission.
    pub fn result<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'static,
    {
        Self::future(future)
    }

    /// Wrap a fallible stream.
    ///
    /// The first `Err` is emitted and then terminates the effect.
    pub fn try_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + 'static,
    {
        let stream = stream.scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        });
        Self::stream(stream)
    }
}

impl<A: 'static> Default for Effect<A> {
    fn default() -> Self {
        Self::none()
    }
}

impl<A> fmt::Debug for Effect<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("none", &self.start.is_none())
            .finish()
    }
}

/// Sending half handed to an [`Effect::run`] producer.
pub struct Emitter<A> {
    tx: mpsc::UnboundedSender<A>,
}

impl<A> Emitter<A> {
    /// Emit an action. Ignored once the effect has been torn down.
    pub fn send(&self, action: A) {
        let _ = self.tx.unbounded_send(action);
    }

    /// Complete the effect from this emitter's side.
    pub fn finish(self) {
        self.tx.close_channel();
    }

    /// Whether the effect has been torn down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<A> Clone for Emitter<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

struct Produced<A> {
    rx: mpsc::UnboundedReceiver<A>,
    on_cancel: Option<Box<dyn FnOnce()>>,
}

impl<A> Stream for Produced<A> {
    type Item = A;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<A>> {
        let poll = self.rx.poll_next_unpin(cx);
        if let Poll::Ready(None) = poll {
            self.on_cancel = None;
        }
        poll
    }
}

impl<A> Drop for Produced<A> {
    fn drop(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            self.rx.close();
            on_cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on_stream;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn collect<A: 'static>(effect: Effect<A>) -> Vec<A> {
        let ctx = EffectContext::new();
        match effect.start(&ctx) {
            Some(stream) => block_on_stream(stream).collect(),
            None => Vec::new(),
        }
    }

    #[test]
    fn none_emits_nothing() {
        assert!(Effect::<u8>::none().is_none());
        assert!(Effect::<u8>::iter([]).is_none());
        assert!(collect(Effect::<u8>::none()).is_empty());
    }

    #[test]
    fn concatenate_preserves_order() {
        let effect = Effect::concatenate([
            Effect::future(async { 1 }),
            Effect::iter([2, 3]),
            Effect::value(4),
        ]);
        assert_eq!(collect(effect), vec![1, 2, 3, 4]);
    }

    #[test]
    fn concatenate_starts_lazily() {
        let started = Rc::new(Cell::new(false));
        let flag = started.clone();
        let ctx = EffectContext::new();

        let stream = Effect::concatenate([
            Effect::value(1),
            Effect::fire_and_forget(move || flag.set(true)),
        ])
        .start(&ctx)
        .unwrap();

        assert!(!started.get());
        let _: Vec<_> = block_on_stream(stream).collect();
        assert!(started.get());
    }

    #[test]
    fn map_transforms_values() {
        let effect = Effect::iter([1, 2]).map(|n| n * 10);
        assert_eq!(collect(effect), vec![10, 20]);
    }

    #[test]
    fn try_stream_stops_after_first_error() {
        let effect: Effect<Result<u8, &str>> =
            Effect::try_stream(stream::iter(vec![Ok(1), Err("boom"), Ok(2)]));
        assert_eq!(collect(effect), vec![Ok(1), Err("boom")]);
    }

    #[test]
    fn run_emits_until_emitters_drop() {
        let effect = Effect::run(|emitter| {
            emitter.send("a");
            emitter.send("b");
            || {}
        });
        assert_eq!(collect(effect), vec!["a", "b"]);
    }

    #[test]
    fn run_calls_cancel_callback_when_torn_down() {
        let cancelled = Rc::new(Cell::new(false));
        let kept = Rc::new(RefCell::new(None));
        let ctx = EffectContext::new();

        let effect = Effect::run({
            let cancelled = cancelled.clone();
            let kept = kept.clone();
            move |emitter: Emitter<u8>| {
                *kept.borrow_mut() = Some(emitter);
                move || cancelled.set(true)
            }
        });
        let stream = effect.start(&ctx).unwrap();
        drop(stream);

        assert!(cancelled.get());
        assert!(kept.borrow().as_ref().unwrap().is_closed());
    }

    #[test]
    fn cancel_in_flight_replaces_previous() {
        let ctx = EffectContext::new();
        let first = Effect::iter([1, 2])
            .cancellable("job", true)
            .start(&ctx)
            .unwrap();
        let second = Effect::iter([3])
            .cancellable("job", true)
            .start(&ctx)
            .unwrap();

        assert!(block_on_stream(first).next().is_none());
        assert_eq!(block_on_stream(second).collect::<Vec<_>>(), vec![3]);
    }
}
