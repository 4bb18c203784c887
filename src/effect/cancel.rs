use futures::stream::{self, AbortHandle, Abortable, LocalBoxStream, StreamExt};
use futures::Stream;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// Type-erased identity used to cancel in-flight effects.
///
/// Any `Hash + Eq + Debug + 'static` value can act as an id. Two ids are
/// equal when they wrap the same concrete type and compare equal as values,
/// so `"search"` and `String::from("search")` are different ids.
///
/// ```
/// use rudder::effect::CancelId;
///
/// assert_eq!(CancelId::new("search"), CancelId::new("search"));
/// assert_ne!(CancelId::new("search"), CancelId::new(String::from("search")));
/// ```
#[derive(Clone)]
pub struct CancelId(Rc<dyn Key>);

impl CancelId {
    /// Wrap a value as a cancellation id.
    ///
    /// Wrapping an existing `CancelId` returns a clone of it.
    pub fn new<K>(id: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + 'static,
    {
        if let Some(existing) = (&id as &dyn Any).downcast_ref::<CancelId>() {
            return existing.clone();
        }
        Self(Rc::new(id))
    }
}

trait Key {
    fn as_any(&self) -> &dyn Any;
    fn eq_key(&self, other: &dyn Key) -> bool;
    fn hash_key(&self, state: &mut dyn Hasher);
    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> Key for T
where
    T: Hash + Eq + fmt::Debug + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_key(&self, other: &dyn Key) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn hash_key(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn fmt_key(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PartialEq for CancelId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_key(&*other.0)
    }
}

impl Eq for CancelId {}

impl Hash for CancelId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_key(state);
    }
}

impl fmt::Debug for CancelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_key(f)
    }
}

/// Per-store registry of in-flight effect subscriptions.
#[derive(Default)]
pub(crate) struct Cancellations {
    next_token: u64,
    // Effects handed to the executor, keyed by an internal token
    in_flight: HashMap<u64, AbortHandle>,
    // Effects tagged with `Effect::cancellable`
    by_id: HashMap<CancelId, HashMap<u64, AbortHandle>>,
}

impl Cancellations {
    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn take(&mut self, id: &CancelId) -> Vec<AbortHandle> {
        self.by_id
            .remove(id)
            .map(|handles| handles.into_values().collect())
            .unwrap_or_default()
    }

    fn deregister(&mut self, id: &CancelId, token: u64) {
        if let Some(handles) = self.by_id.get_mut(id) {
            handles.remove(&token);
            if handles.is_empty() {
                self.by_id.remove(id);
            }
        }
    }

    fn take_all(&mut self) -> Vec<AbortHandle> {
        let mut handles: Vec<AbortHandle> = self.in_flight.drain().map(|(_, h)| h).collect();
        handles.extend(self.by_id.drain().flat_map(|(_, group)| group.into_values()));
        handles
    }
}

/// Handle given to an effect when a store starts it.
#[derive(Clone, Default)]
pub(crate) struct EffectContext {
    registry: Rc<RefCell<Cancellations>>,
}

impl EffectContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel every effect registered under `id`. Unknown ids are ignored.
    pub(crate) fn cancel(&self, id: &CancelId) {
        let handles = self.registry.borrow_mut().take(id);
        if !handles.is_empty() {
            tracing::debug!(id = ?id, count = handles.len(), "cancelling effects");
        }
        for handle in handles {
            handle.abort();
        }
    }

    /// Abort everything this registry knows about.
    pub(crate) fn cancel_all(&self) {
        let handles = match self.registry.try_borrow_mut() {
            Ok(mut registry) => registry.take_all(),
            Err(_) => return,
        };
        for handle in handles {
            handle.abort();
        }
    }

    /// Tag `stream` with `id` until it completes, is cancelled or dropped.
    pub(crate) fn register<A: 'static>(
        &self,
        id: CancelId,
        stream: LocalBoxStream<'static, A>,
    ) -> LocalBoxStream<'static, A> {
        let (stream, handle) = stream::abortable(stream);
        let token = {
            let mut registry = self.registry.borrow_mut();
            let token = registry.next_token();
            registry
                .by_id
                .entry(id.clone())
                .or_default()
                .insert(token, handle);
            token
        };
        tracing::debug!(id = ?id, token, "registered cancellable effect");

        Registered {
            inner: stream,
            _guard: Deregister {
                registry: Rc::downgrade(&self.registry),
                id,
                token,
            },
        }
        .boxed_local()
    }

    /// Track a stream that outlives the drain loop.
    ///
    /// The entry stays in the registry until the returned guard is dropped,
    /// whether the task holding it finishes or the executor discards it.
    pub(crate) fn track<A>(
        &self,
        stream: LocalBoxStream<'static, A>,
    ) -> (Abortable<LocalBoxStream<'static, A>>, Tracked) {
        let (stream, handle) = stream::abortable(stream);
        let mut registry = self.registry.borrow_mut();
        let token = registry.next_token();
        registry.in_flight.insert(token, handle);
        let tracked = Tracked {
            registry: Rc::downgrade(&self.registry),
            token,
        };
        (stream, tracked)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.registry.borrow().in_flight.len()
    }
}

/// In-flight registration of an effect handed to the executor.
pub(crate) struct Tracked {
    registry: Weak<RefCell<Cancellations>>,
    token: u64,
}

impl Tracked {
    pub(crate) fn token(&self) -> u64 {
        self.token
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.in_flight.remove(&self.token);
            }
        }
    }
}

struct Deregister {
    registry: Weak<RefCell<Cancellations>>,
    id: CancelId,
    token: u64,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.deregister(&self.id, self.token);
            }
        }
    }
}

struct Registered<S> {
    inner: S,
    _guard: Deregister,
}

impl<S> Stream for Registered<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on_stream;
    use std::collections::HashSet;

    #[test]
    fn ids_compare_by_type_and_value() {
        let mut ids = HashSet::new();
        ids.insert(CancelId::new("timer"));
        ids.insert(CancelId::new("timer"));
        ids.insert(CancelId::new(1_u32));
        ids.insert(CancelId::new(1_u64));

        assert_eq!(ids.len(), 3);
        assert_eq!(CancelId::new(CancelId::new(7)), CancelId::new(7));
    }

    #[test]
    fn cancel_stops_registered_stream() {
        let ctx = EffectContext::new();
        let stream = ctx.register(CancelId::new("a"), stream::iter(vec![1, 2, 3]).boxed_local());

        ctx.cancel(&CancelId::new("a"));
        // unknown ids are ignored
        ctx.cancel(&CancelId::new("b"));

        assert!(block_on_stream(stream).next().is_none());
    }

    #[test]
    fn dropping_tracked_guard_untracks() {
        let ctx = EffectContext::new();
        let (stream, tracked) = ctx.track(stream::pending::<u8>().boxed_local());
        assert_eq!(ctx.in_flight(), 1);

        // the stream may outlive the guard
        drop(tracked);
        assert_eq!(ctx.in_flight(), 0);
        drop(stream);
    }

    #[test]
    fn dropping_stream_deregisters() {
        let ctx = EffectContext::new();
        let stream = ctx.register(CancelId::new("a"), stream::empty::<u8>().boxed_local());
        assert_eq!(ctx.registry.borrow().by_id.len(), 1);

        drop(stream);
        assert!(ctx.registry.borrow().by_id.is_empty());
    }
}
