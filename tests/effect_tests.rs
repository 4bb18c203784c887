//! Effect lifecycle tests

use futures::channel::oneshot;
use rudder::runtime::Runtime;
use rudder::{Effect, Reducer, Store};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug, Default, PartialEq)]
struct Jobs {
    results: Vec<u32>,
}

#[derive(Debug)]
enum JobAction {
    // start a job that resolves when the receiver fires
    Start(u32, oneshot::Receiver<u32>, bool),
    Cancel,
    Finished(u32),
}

#[derive(Debug, Hash, PartialEq, Eq)]
struct JobId;

fn jobs() -> Reducer<Jobs, JobAction> {
    Reducer::new(|jobs: &mut Jobs, action: JobAction, _: &()| match action {
        JobAction::Start(fallback, rx, cancel_in_flight) => {
            Effect::future(async move { JobAction::Finished(rx.await.unwrap_or(fallback)) })
                .cancellable(JobId, cancel_in_flight)
        }
        JobAction::Cancel => Effect::cancel(JobId),
        JobAction::Finished(n) => {
            jobs.results.push(n);
            Effect::none()
        }
    })
}

#[test]
fn pending_effect_is_delivered_by_the_executor() {
    Runtime::scope(|pool| {
        let store = Store::new(Jobs::default(), jobs(), ());
        let (tx, rx) = oneshot::channel();

        store.send(JobAction::Start(0, rx, false));
        assert_eq!(store.effects_in_flight(), 1);

        tx.send(42).unwrap();
        pool.run_until_stalled();

        assert_eq!(store.get().results, vec![42]);
        assert_eq!(store.effects_in_flight(), 0);
    });
}

#[test]
fn cancelled_effect_never_reaches_the_store() {
    Runtime::scope(|pool| {
        let store = Store::new(Jobs::default(), jobs(), ());
        let (tx, rx) = oneshot::channel();

        store.send(JobAction::Start(0, rx, false));
        store.send(JobAction::Cancel);
        // cancelling again is harmless
        store.send(JobAction::Cancel);

        let _ = tx.send(7);
        pool.run_until_stalled();

        assert!(store.get().results.is_empty());
        assert_eq!(store.effects_in_flight(), 0);
    });
}

#[test]
fn cancel_in_flight_keeps_only_the_newest_effect() {
    Runtime::scope(|pool| {
        let store = Store::new(Jobs::default(), jobs(), ());
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();

        store.send(JobAction::Start(0, first_rx, true));
        store.send(JobAction::Start(0, second_rx, true));

        let _ = first_tx.send(1);
        second_tx.send(2).unwrap();
        pool.run_until_stalled();

        assert_eq!(store.get().results, vec![2]);
    });
}

#[test]
fn effect_from_derived_store_feeds_the_root() {
    Runtime::scope(|pool| {
        let store = Store::new(Jobs::default(), jobs(), ());
        let results = store.scope(|jobs: &Jobs| jobs.results.clone(), |action| action);
        let (tx, rx) = oneshot::channel();

        results.send(JobAction::Start(0, rx, false));
        tx.send(5).unwrap();
        pool.run_until_stalled();

        assert_eq!(results.get(), vec![5]);
        assert_eq!(results.effects_in_flight(), 0);
    });
}

#[test]
fn dropping_the_store_tears_down_effects() {
    #[derive(Clone, Debug)]
    enum Action {
        Listen,
        Heard(u8),
    }

    let torn_down = Rc::new(Cell::new(false));
    let emitter = Rc::new(RefCell::new(None));

    Runtime::scope(|pool| {
        let reducer = Reducer::new({
            let torn_down = torn_down.clone();
            let emitter = emitter.clone();
            move |heard: &mut Vec<u8>, action: Action, _: &()| match action {
                Action::Listen => {
                    let torn_down = torn_down.clone();
                    let emitter = emitter.clone();
                    Effect::run(move |tx| {
                        *emitter.borrow_mut() = Some(tx);
                        move || torn_down.set(true)
                    })
                    .map(Action::Heard)
                }
                Action::Heard(n) => {
                    heard.push(n);
                    Effect::none()
                }
            }
        });
        let store = Store::new(Vec::new(), reducer, ());
        store.send(Action::Listen);

        emitter.borrow().as_ref().unwrap().send(1);
        pool.run_until_stalled();
        assert_eq!(store.get(), vec![1]);
        assert!(!torn_down.get());

        drop(store);
        pool.run_until_stalled();
        assert!(torn_down.get());
        assert!(emitter.borrow().as_ref().unwrap().is_closed());
    });
}

#[test]
fn emissions_keep_their_order_across_inline_and_executor_delivery() {
    #[derive(Debug)]
    enum Action {
        Run(oneshot::Receiver<u32>),
        Push(u32),
    }

    let reducer = Reducer::new(|log: &mut Vec<u32>, action: Action, _: &()| match action {
        Action::Run(rx) => Effect::concatenate([
            Effect::value(1),
            Effect::future(async move { rx.await.unwrap_or(0) }),
            Effect::iter([3, 4]),
        ])
        .map(Action::Push),
        Action::Push(n) => {
            log.push(n);
            Effect::none()
        }
    });

    Runtime::scope(|pool| {
        let store = Store::new(Vec::new(), reducer, ());
        let (tx, rx) = oneshot::channel();

        store.send(Action::Run(rx));
        assert_eq!(store.get(), vec![1]);
        assert_eq!(store.effects_in_flight(), 1);

        tx.send(2).unwrap();
        pool.run_until_stalled();

        assert_eq!(store.get(), vec![1, 2, 3, 4]);
        assert_eq!(store.effects_in_flight(), 0);
    });
}

#[test]
fn effects_dropped_by_the_executor_are_no_longer_in_flight() {
    let (_tx, rx) = oneshot::channel();

    let store = Runtime::scope(|_pool| {
        let store = Store::new(Jobs::default(), jobs(), ());
        store.send(JobAction::Start(0, rx, false));
        assert_eq!(store.effects_in_flight(), 1);
        store
    });

    // the pool and its pending task are gone
    assert_eq!(store.effects_in_flight(), 0);
}

#[test]
fn failures_arrive_as_actions() {
    #[derive(Clone, Debug, PartialEq)]
    enum Action {
        Load,
        Loaded(Result<u32, String>),
    }

    let reducer = Reducer::new(|log: &mut Vec<Result<u32, String>>, action: Action, _: &()| {
        match action {
            Action::Load => Effect::concatenate([
                Effect::result(async { Ok(1) }),
                Effect::error("offline".to_string()),
            ])
            .map(Action::Loaded),
            Action::Loaded(result) => {
                log.push(result);
                Effect::none()
            }
        }
    });

    let store = Store::new(Vec::new(), reducer, ());
    store.send(Action::Load);

    assert_eq!(store.get(), vec![Ok(1), Err("offline".to_string())]);
}

#[cfg(feature = "tokio")]
mod timed {
    use super::*;
    use std::time::Duration;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Search {
        query: String,
        searched: Vec<String>,
        ticks: u32,
    }

    #[derive(Clone, Debug)]
    enum SearchAction {
        QueryChanged(String),
        Searched(String),
        StartTicking,
        Tick,
        StopTicking,
    }

    #[derive(Debug, Hash, PartialEq, Eq)]
    enum Id {
        Search,
        Ticker,
    }

    fn search() -> Reducer<Search, SearchAction> {
        Reducer::new(|state: &mut Search, action: SearchAction, _: &()| match action {
            SearchAction::QueryChanged(query) => {
                state.query = query.clone();
                Effect::future(async move { SearchAction::Searched(query) })
                    .debounce(Id::Search, Duration::from_millis(300))
            }
            SearchAction::Searched(query) => {
                state.searched.push(query);
                Effect::none()
            }
            SearchAction::StartTicking => {
                Effect::timer(Id::Ticker, Duration::from_secs(1), || SearchAction::Tick)
            }
            SearchAction::Tick => {
                state.ticks += 1;
                Effect::none()
            }
            SearchAction::StopTicking => Effect::cancel(Id::Ticker),
        })
    }

    #[tokio::test]
    async fn store_keeps_working_without_a_local_set() {
        let store = Store::new(Jobs::default(), jobs(), ());
        let (_tx, rx) = oneshot::channel();

        // no LocalSet to spawn onto, so the pending effect is dropped
        store.send(JobAction::Start(0, rx, false));
        assert_eq!(store.effects_in_flight(), 0);

        store.send(JobAction::Finished(3));
        assert_eq!(store.get().results, vec![3]);
    }

    #[test]
    fn timed_effects_without_tokio_are_dropped() {
        Runtime::scope(|pool| {
            let store = Store::new(Search::default(), search(), ());

            store.send(SearchAction::QueryChanged("rust".into()));
            store.send(SearchAction::StartTicking);
            pool.run_until_stalled();

            let state = store.get();
            assert_eq!(state.query, "rust");
            assert!(state.searched.is_empty());
            assert_eq!(state.ticks, 0);
            assert_eq!(store.effects_in_flight(), 0);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_delivers_only_the_last_effect() {
        LocalSet::new()
            .run_until(async {
                let store = Store::new(Search::default(), search(), ());

                store.send(SearchAction::QueryChanged("ru".into()));
                sleep(Duration::from_millis(100)).await;
                store.send(SearchAction::QueryChanged("rust".into()));
                sleep(Duration::from_millis(200)).await;
                assert!(store.get().searched.is_empty());

                sleep(Duration::from_millis(200)).await;
                assert_eq!(store.get().searched, vec!["rust".to_string()]);
                assert_eq!(store.effects_in_flight(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn timer_runs_until_cancelled() {
        LocalSet::new()
            .run_until(async {
                let store = Store::new(Search::default(), search(), ());

                store.send(SearchAction::StartTicking);
                sleep(Duration::from_millis(3500)).await;
                store.send(SearchAction::StopTicking);
                sleep(Duration::from_secs(5)).await;

                assert_eq!(store.get().ticks, 3);
                assert_eq!(store.effects_in_flight(), 0);
            })
            .await;
    }
}
