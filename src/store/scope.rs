use super::store::{Dispatch, Inner, Store};
use super::subscription::Subscription;
use std::cell::Cell;
use std::rc::{Rc, Weak};

type Derive<L> = Rc<dyn Fn() -> L>;
type Forward<L, LA> = Rc<dyn Fn(&L, LA)>;
type Observe = Rc<dyn Fn(Box<dyn Fn()>) -> Subscription>;

/// Accessor/embedder pair composed all the way back to the root store.
///
/// Every derived store talks to the root directly, so a chain of scopes adds
/// one root subscription per store instead of one per level.
pub(crate) struct Upstream<L, LA> {
    // to_local(root state)
    derive: Derive<L>,
    // embed and send to the root
    forward: Forward<L, LA>,
    // subscribe to root publications
    observe: Observe,
    in_flight: Rc<dyn Fn() -> usize>,
}

impl<L: 'static, LA: 'static> Upstream<L, LA> {
    pub(crate) fn root<S, A, F, G>(root: Store<S, A>, to_local: F, embed: G) -> Self
    where
        S: Clone + 'static,
        A: 'static,
        F: Fn(&S) -> L + 'static,
        G: Fn(&L, LA) -> Option<A> + 'static,
    {
        let derive: Derive<L> = {
            let root = root.clone();
            Rc::new(move || root.read(&to_local))
        };
        let forward: Forward<L, LA> = {
            let root = root.clone();
            Rc::new(move |local: &L, action: LA| {
                if let Some(action) = embed(local, action) {
                    root.send(action);
                }
            })
        };
        let observe: Observe = {
            let root = root.clone();
            Rc::new(move |on_change: Box<dyn Fn()>| root.subscribe(move |_| on_change()))
        };
        let in_flight = Rc::new(move || root.effects_in_flight());

        Self {
            derive,
            forward,
            observe,
            in_flight,
        }
    }

    fn narrow<M, MA, F, G>(&self, to_local: F, embed: G) -> Upstream<M, MA>
    where
        M: 'static,
        MA: 'static,
        F: Fn(&L) -> M + 'static,
        G: Fn(&M, MA) -> Option<LA> + 'static,
    {
        let derive: Derive<M> = {
            let parent = Rc::clone(&self.derive);
            Rc::new(move || to_local(&parent()))
        };
        let forward: Forward<M, MA> = {
            let parent = Rc::clone(&self.derive);
            let forward = Rc::clone(&self.forward);
            Rc::new(move |local: &M, action: MA| {
                if let Some(action) = embed(local, action) {
                    forward(&parent(), action);
                }
            })
        };

        Upstream {
            derive,
            forward,
            observe: Rc::clone(&self.observe),
            in_flight: Rc::clone(&self.in_flight),
        }
    }
}

/// Dispatch half of a derived store.
pub(crate) struct Scoped<L, LA> {
    upstream: Upstream<L, LA>,
    // depth of this store's own in-flight sends
    sending: Cell<u32>,
    // a root publication arrived while sending
    missed: Cell<bool>,
    _subscription: Subscription,
}

impl<L: Clone + 'static, LA: 'static> Scoped<L, LA> {
    pub(crate) fn send(&self, store: &Store<L, LA>, action: LA) {
        let local = store.get();
        self.sending.set(self.sending.get() + 1);
        let guard = Decrement(&self.sending);
        (self.upstream.forward)(&local, action);
        drop(guard);

        if self.sending.get() == 0 && self.missed.replace(false) {
            refresh(store, &self.upstream);
        }
    }

    pub(crate) fn narrow<M, MA, F, G>(&self, to_local: F, embed: G) -> Upstream<M, MA>
    where
        M: 'static,
        MA: 'static,
        F: Fn(&L) -> M + 'static,
        G: Fn(&M, MA) -> Option<LA> + 'static,
    {
        self.upstream.narrow(to_local, embed)
    }

    pub(crate) fn effects_in_flight(&self) -> usize {
        (self.upstream.in_flight)()
    }

    fn on_root_change(&self, store: &Store<L, LA>) {
        if self.sending.get() > 0 {
            // republished once this store's own send returns
            self.missed.set(true);
            return;
        }
        refresh(store, &self.upstream);
    }
}

struct Decrement<'a>(&'a Cell<u32>);

impl Drop for Decrement<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

fn refresh<L: Clone + 'static, LA: 'static>(store: &Store<L, LA>, upstream: &Upstream<L, LA>) {
    let local = (upstream.derive)();
    store.replace_state(local);
    store.publish();
}

impl<L: Clone + 'static, LA: 'static> Store<L, LA> {
    pub(crate) fn derived(upstream: Upstream<L, LA>) -> Self {
        let initial = (upstream.derive)();
        let observe = Rc::clone(&upstream.observe);

        let inner = Rc::new_cyclic(|weak: &Weak<Inner<L, LA>>| {
            let weak = weak.clone();
            let subscription = observe(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let store = Store { inner };
                if let Dispatch::Scoped(scoped) = &store.inner.dispatch {
                    scoped.on_root_change(&store);
                }
            }));

            Store::inner_from_parts(
                initial,
                Dispatch::Scoped(Scoped {
                    upstream,
                    sending: Cell::new(0),
                    missed: Cell::new(false),
                    _subscription: subscription,
                }),
            )
        });

        Store { inner }
    }
}
