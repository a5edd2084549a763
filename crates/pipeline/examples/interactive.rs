//! Type queries on stdin and watch the pipeline react.
//!
//! Every line is treated as the new contents of the search field.
//! `/select N` picks the N-th result of the last successful search,
//! `/ttl SECS` changes the cache lifetime and `/quit` exits.
//!
//! ```sh
//! RUST_LOG=dropsearch=debug cargo run -p dropsearch-pipeline --example interactive -- \
//!     "https://nominatim.openstreetmap.org/search?format=json"
//! ```

use dropsearch_pipeline::{ChannelEventBus, ResultSet, SearchConfig, SearchEvent, SearchPipeline};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_API_URL: &str = "https://nominatim.openstreetmap.org/search?format=json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let config = SearchConfig::new(api_url).with_request_timeout_ms(10_000);

    let (bus, mut events) = ChannelEventBus::new();
    let pipeline = SearchPipeline::builder(config)
        .bus(Arc::new(bus))
        .spawn()?;

    let last_results: Arc<Mutex<ResultSet>> = Arc::default();
    let printer = tokio::spawn({
        let last_results = Arc::clone(&last_results);
        async move {
            while let Some(event) = events.recv().await {
                match &event {
                    SearchEvent::LoadingStarted { query, .. } => println!("searching {query:?}..."),
                    SearchEvent::Succeeded {
                        results, cached, ..
                    } => {
                        println!("{} result(s){}", results.len(), if *cached { " (cached)" } else { "" });
                        for (i, record) in results.iter().enumerate() {
                            println!(
                                "  [{i}] {}",
                                dropsearch_records::display_text(record, "display_name")
                            );
                        }
                        if let Ok(mut last) = last_results.lock() {
                            *last = results.clone();
                        }
                    }
                    SearchEvent::Failed { error, .. } => println!("failed: {error}"),
                    SearchEvent::SelectionChanged { .. } => {}
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line == "/quit" {
            break;
        }
        if let Some(secs) = line.strip_prefix("/ttl ") {
            match secs.trim().parse() {
                Ok(secs) => pipeline.set_cache_ttl(secs),
                Err(e) => println!("bad ttl: {e}"),
            }
            continue;
        }
        if let Some(index) = line.strip_prefix("/select ") {
            let chosen = index.trim().parse::<usize>().ok().and_then(|i| {
                last_results
                    .lock()
                    .ok()
                    .and_then(|results| results.get(i).cloned())
            });
            match chosen {
                Some(record) => {
                    let text = pipeline.select(record);
                    println!("selected {text:?}");
                    // What a text field would do after a selection.
                    pipeline.text_changed(text);
                }
                None => println!("no such result"),
            }
            continue;
        }
        pipeline.text_changed(line);
    }

    pipeline.shutdown().await;
    printer.abort();
    Ok(())
}
