use super::store::Store;
use super::subscription::{StateStream, Subscribers, Subscription};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type IsDuplicate<S> = Rc<dyn Fn(&S, &S) -> bool>;

/// A store handle for rendering code.
///
/// A `ViewStore` forwards actions to its store and republishes state, but
/// skips publications that are duplicates of the last state it delivered.
///
/// # Examples
///
/// ```
/// use rudder::{Effect, Reducer, Store, ViewStore};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let reducer = Reducer::new(|count: &mut i32, delta: i32, _env: &()| {
///     *count += delta;
///     Effect::none()
/// });
/// let view = ViewStore::new(Store::new(0, reducer, ()));
///
/// let renders = Rc::new(Cell::new(0));
/// let _subscription = view.subscribe({
///     let renders = renders.clone();
///     move |_| renders.set(renders.get() + 1)
/// });
///
/// view.send(1);
/// view.send(0); // state unchanged, no render
/// assert_eq!(renders.get(), 1);
/// ```
pub struct ViewStore<S, A> {
    store: Store<S, A>,
    shared: Rc<Shared<S>>,
    _subscription: Subscription,
}

struct Shared<S> {
    last: RefCell<S>,
    subscribers: Subscribers<S>,
    is_duplicate: IsDuplicate<S>,
}

impl<S: Clone + PartialEq + 'static, A: 'static> ViewStore<S, A> {
    /// Wrap `store`, skipping publications equal to the previous one.
    pub fn new(store: Store<S, A>) -> Self {
        Self::with_dedup(store, |a, b| a == b)
    }

    /// Focus on part of the state, as a new deduplicated view.
    pub fn select<T, F>(&self, f: F) -> ViewStore<T, A>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
    {
        ViewStore::new(self.store.scope(f, |action| action))
    }
}

impl<S: Clone + 'static, A: 'static> ViewStore<S, A> {
    /// Wrap `store` with a custom duplicate check.
    pub fn with_dedup<F>(store: Store<S, A>, is_duplicate: F) -> Self
    where
        F: Fn(&S, &S) -> bool + 'static,
    {
        let shared = Rc::new(Shared {
            last: RefCell::new(store.get()),
            subscribers: Subscribers::new(),
            is_duplicate: Rc::new(is_duplicate),
        });

        let weak = Rc::downgrade(&shared);
        let subscription = store.subscribe(move |state: &S| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let duplicate = (shared.is_duplicate)(&*shared.last.borrow(), state);
            if duplicate {
                tracing::trace!("skipping duplicate view state");
                return;
            }
            *shared.last.borrow_mut() = state.clone();
            shared.subscribers.notify(state);
        });

        Self {
            store,
            shared,
            _subscription: subscription,
        }
    }

    /// Send an action to the underlying store.
    pub fn send(&self, action: A) {
        self.store.send(action);
    }

    /// The last state this view delivered.
    pub fn get(&self) -> S {
        self.shared.last.borrow().clone()
    }

    /// Read the last delivered state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        f(&*self.shared.last.borrow())
    }

    /// Subscribe to deduplicated state publications.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&S) + 'static,
    {
        self.shared.subscribers.subscribe(callback)
    }

    /// Stream of deduplicated states, starting with the current one.
    ///
    /// States queue without limit until the stream is polled; drop the stream
    /// when it is no longer read.
    pub fn states(&self) -> StateStream<S> {
        StateStream::new(self.get(), |callback| self.subscribe(callback))
    }

    /// The store this view reads from.
    pub fn store(&self) -> &Store<S, A> {
        &self.store
    }
}

impl<S, A> Clone for ViewStore<S, A>
where
    S: Clone + 'static,
    A: 'static,
{
    fn clone(&self) -> Self {
        let is_duplicate = Rc::clone(&self.shared.is_duplicate);
        Self::with_dedup(self.store.clone(), move |a, b| is_duplicate(a, b))
    }
}

impl<S: fmt::Debug, A> fmt::Debug for ViewStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ViewStore");
        match self.shared.last.try_borrow() {
            Ok(last) => debug.field("state", &*last),
            Err(_) => debug.field("state", &"<borrowed>"),
        };
        debug.finish_non_exhaustive()
    }
}
