use futures::channel::mpsc;
use futures::stream::StreamExt;
use futures::Stream;
use std::cell::RefCell;
use std::fmt;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

type Callback<T> = Rc<dyn Fn(&T)>;

struct Slots<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// Subscriber list shared between a publisher and its subscriptions.
pub(crate) struct Subscribers<T> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut slots = self.slots.borrow_mut();
            slots.next_id += 1;
            let id = slots.next_id;
            slots.entries.push((id, Rc::new(callback)));
            id
        };

        let slots = Rc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every subscriber with `value`.
    ///
    /// Subscribers may subscribe, unsubscribe or publish again from inside
    /// their callback; ones removed mid-notification are skipped.
    pub(crate) fn notify(&self, value: &T) {
        let entries: Vec<(u64, Callback<T>)> = self.slots.borrow().entries.clone();
        for (id, callback) in entries {
            let alive = self
                .slots
                .borrow()
                .entries
                .iter()
                .any(|(entry, _)| *entry == id);
            if alive {
                callback(value);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().entries.len()
    }
}

/// RAII handle for a state subscription.
///
/// The callback stays registered until this handle is dropped or
/// [`cancel`](Self::cancel)led.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the callback registered for as long as the publisher lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Stream of published states, starting with the state at subscription time.
///
/// Returned by [`Store::states`](crate::Store::states). Every published state
/// is queued without limit until polled, so a stream that is kept but not read
/// grows with each publication. Drop it to unsubscribe.
pub struct StateStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> StateStream<T> {
    pub(crate) fn new<F>(current: T, subscribe: F) -> Self
    where
        F: FnOnce(Box<dyn Fn(&T)>) -> Subscription,
    {
        let (tx, rx) = mpsc::unbounded();
        let _ = tx.unbounded_send(current);
        let subscription = subscribe(Box::new(move |state: &T| {
            let _ = tx.unbounded_send(state.clone());
        }));
        Self {
            rx,
            _subscription: subscription,
        }
    }
}

impl<T> Stream for StateStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_next_unpin(cx)
    }
}
