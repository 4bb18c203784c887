//! Counter application built from small reducers
//!
//! Run with `RUST_LOG=rudder=trace cargo run --example counter_app` to see the
//! store's own events.

use rudder::{case, Effect, Lens, Reducer, Store, ViewStore};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Default, PartialEq)]
struct CounterState {
    count: i32,
    step: i32,
}

#[derive(Clone, Debug)]
enum CounterAction {
    Increment,
    Decrement,
    SetStep(i32),
}

#[derive(Clone, Debug, Default, PartialEq)]
struct AppState {
    counter: CounterState,
    history: Vec<i32>,
}

#[derive(Clone, Debug)]
enum AppAction {
    Counter(CounterAction),
    Reset,
}

fn counter() -> Reducer<CounterState, CounterAction> {
    Reducer::new(|state: &mut CounterState, action: CounterAction, _: &()| {
        match action {
            CounterAction::Increment => state.count += state.step,
            CounterAction::Decrement => state.count -= state.step,
            CounterAction::SetStep(step) => state.step = step,
        }
        Effect::none()
    })
}

fn history() -> Reducer<AppState, AppAction> {
    Reducer::new(|state: &mut AppState, action: AppAction, _: &()| {
        match action {
            AppAction::Counter(CounterAction::SetStep(_)) => {}
            AppAction::Counter(_) => state.history.push(state.counter.count),
            AppAction::Reset => {
                state.counter.count = 0;
                state.history.push(0);
            }
        }
        Effect::none()
    })
}

fn app() -> Reducer<AppState, AppAction> {
    let counter = counter().pullback(
        Lens::new(|s: &AppState| &s.counter, |s: &mut AppState| &mut s.counter),
        case!(AppAction::Counter),
        |_: &()| (),
    );
    // the counter runs first so history sees the new count
    counter.combined_with(history())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Counter Application ===\n");

    let store = Store::new(
        AppState {
            counter: CounterState { count: 0, step: 1 },
            history: vec![0],
        },
        app(),
        (),
    );

    // The counter screen only sees its own state and actions
    let counter_store = store.scope(|s: &AppState| s.counter.clone(), AppAction::Counter);
    let view = ViewStore::new(counter_store);
    let _render = view.subscribe(|state| {
        println!("   [render] count: {}, step: {}", state.count, state.step);
    });

    let parity = view.select(|state: &CounterState| state.count % 2 == 0);
    let _parity = parity.subscribe(|even| println!("   [parity] even: {even}"));

    println!("1. Incrementing by 1");
    view.send(CounterAction::Increment);
    view.send(CounterAction::Increment);

    println!("\n2. Step of 5");
    view.send(CounterAction::SetStep(5));
    view.send(CounterAction::Increment);
    view.send(CounterAction::Decrement);

    println!("\n3. Reset from the root store");
    store.send(AppAction::Reset);

    println!("\n4. Reset again (no render, state unchanged)");
    store.send(AppAction::Reset);

    let state = store.get();
    println!("\nFinal count: {}", state.counter.count);
    println!("History: {:?}", state.history);
}
