//! Debounced search running on a tokio `LocalSet`
//!
//! Each keystroke replaces the pending search; only the query typed last
//! before a 300ms pause is looked up.

use rudder::{Effect, Reducer, Store};
use std::time::Duration;
use tokio::task::LocalSet;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const WORDS: &[&str] = &["rudder", "rust", "rustacean", "reducer", "runtime", "store"];

#[derive(Clone, Debug, Default)]
struct SearchState {
    query: String,
    results: Vec<String>,
    lookups: u32,
}

#[derive(Clone, Debug)]
enum SearchAction {
    QueryChanged(String),
    Response(Result<Vec<String>, String>),
}

#[derive(Debug, Hash, PartialEq, Eq)]
struct SearchId;

#[derive(Clone)]
struct Environment {
    latency: Duration,
}

async fn lookup(query: String, latency: Duration) -> Result<Vec<String>, String> {
    sleep(latency).await;
    if query.is_empty() {
        return Err("empty query".to_string());
    }
    Ok(WORDS
        .iter()
        .filter(|word| word.starts_with(&query))
        .map(|word| word.to_string())
        .collect())
}

fn search() -> Reducer<SearchState, SearchAction, Environment> {
    Reducer::new(|state: &mut SearchState, action: SearchAction, env: &Environment| {
        match action {
            SearchAction::QueryChanged(query) => {
                state.query = query.clone();
                let latency = env.latency;
                Effect::result(lookup(query, latency))
                    .map(SearchAction::Response)
                    .debounce(SearchId, Duration::from_millis(300))
            }
            SearchAction::Response(Ok(results)) => {
                state.lookups += 1;
                state.results = results;
                Effect::none()
            }
            SearchAction::Response(Err(error)) => {
                tracing::warn!(%error, "search failed");
                state.results.clear();
                Effect::none()
            }
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    LocalSet::new()
        .run_until(async {
            let environment = Environment {
                latency: Duration::from_millis(50),
            };
            let store = Store::new(SearchState::default(), search(), environment);
            let _printer = store.subscribe(|state| {
                if !state.results.is_empty() {
                    println!("{:>10} -> {:?}", state.query, state.results);
                }
            });

            for prefix in ["r", "ru", "rus"] {
                println!("typing {prefix:?}");
                store.send(SearchAction::QueryChanged(prefix.to_string()));
                sleep(Duration::from_millis(100)).await;
            }
            sleep(Duration::from_millis(500)).await;

            println!("typing \"st\"");
            store.send(SearchAction::QueryChanged("st".to_string()));
            sleep(Duration::from_millis(500)).await;

            println!("\nlookups performed: {}", store.get().lookups);
        })
        .await;
}
