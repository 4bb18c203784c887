//! Time-based effect constructors built on tokio timers.
//!
//! These are ordinary users of the [`Effect`] contract: a deferred start plus
//! a cancellation id. They need a tokio runtime with the time driver enabled.
//! Started outside any tokio runtime they log an error and emit nothing.

use super::cancel::EffectContext;
use super::Effect;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::{self as tokio_time, Instant, Interval};

// Timers panic without a runtime, so refuse to start instead.
fn runtime_available(effect: &'static str) -> bool {
    if tokio::runtime::Handle::try_current().is_ok() {
        return true;
    }
    tracing::error!(effect, "no tokio runtime on this thread; dropping timed effect");
    false
}

impl<A: 'static> Effect<A> {
    /// Start this effect after `duration` has elapsed.
    ///
    /// Needs a tokio runtime with the time driver when started.
    pub fn deferred(self, duration: Duration) -> Self {
        if self.is_none() {
            return self;
        }
        let mut inner = Some(self);
        Self::from_start(move |ctx| {
            if !runtime_available("deferred") {
                return stream::empty().boxed_local();
            }
            let ctx = ctx.clone();
            stream::once(async move { tokio_time::sleep(duration).await })
                .filter_map(move |()| {
                    let started = inner.take().and_then(|effect| effect.start(&ctx));
                    futures::future::ready(started)
                })
                .flatten()
                .boxed_local()
        })
    }

    /// Delay this effect by `duration`, restarting the delay whenever another
    /// effect is debounced under the same `id`.
    ///
    /// Only the effect debounced last before the quiet period ends runs.
    /// Needs a tokio runtime with the time driver when started.
    pub fn debounce<K>(self, id: K, duration: Duration) -> Self
    where
        K: Hash + Eq + fmt::Debug + 'static,
    {
        self.deferred(duration).cancellable(id, true)
    }

    /// Emit `make_action()` every `interval` until cancelled under `id`.
    ///
    /// Starting a timer under an id that is already running replaces it.
    /// Needs a tokio runtime with the time driver when started.
    pub fn timer<K, F>(id: K, interval: Duration, make_action: F) -> Self
    where
        K: Hash + Eq + fmt::Debug + 'static,
        F: FnMut() -> A + 'static,
    {
        let ticks = move |_: &EffectContext| {
            if !runtime_available("timer") {
                return stream::empty().boxed_local();
            }
            stream::unfold(
                (None::<Interval>, make_action),
                move |(interval_state, mut make_action)| async move {
                    let mut ticker = interval_state.unwrap_or_else(|| {
                        tokio_time::interval_at(Instant::now() + interval, interval)
                    });
                    ticker.tick().await;
                    let action = make_action();
                    Some((action, (Some(ticker), make_action)))
                },
            )
            .boxed_local()
        };
        Self::from_start(ticks).cancellable(id, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on_stream;

    #[tokio::test(start_paused = true)]
    async fn deferred_waits_before_emitting() {
        let ctx = EffectContext::new();
        let start = Instant::now();
        let stream = Effect::value(7)
            .deferred(Duration::from_millis(250))
            .start(&ctx)
            .unwrap();

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![7]);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_on_interval() {
        let ctx = EffectContext::new();
        let mut count = 0;
        let stream = Effect::timer("tick", Duration::from_secs(1), move || {
            count += 1;
            count
        })
        .start(&ctx)
        .unwrap();

        let items: Vec<_> = stream.take(3).collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn timed_effects_outside_a_runtime_emit_nothing() {
        let ctx = EffectContext::new();
        let deferred = Effect::value(7)
            .deferred(Duration::from_millis(250))
            .start(&ctx)
            .unwrap();
        assert_eq!(block_on_stream(deferred).count(), 0);

        let timer = Effect::timer("tick", Duration::from_secs(1), || 1)
            .start(&ctx)
            .unwrap();
        assert_eq!(block_on_stream(timer).count(), 0);
    }
}
