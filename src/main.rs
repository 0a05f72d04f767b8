use depthview::api::ApiServer;
use depthview::config::Config;
use depthview::depth::format_price;
use depthview::exchanges;
use depthview::orderbook::BookStore;
use depthview::scheduler::{RefreshScheduler, SchedulerConfig, consume_selections};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env()?;
    let store = BookStore::new();

    tracing::info!(
        "Depthview starting — {} on {} (bucket {}, depth {}) port {}",
        config.symbol,
        config.exchange,
        config.grouping.bucket_size(),
        config.grouping.depth(),
        config.api_port
    );

    // ── 1. Build the feed and the refresh scheduler ────────────────
    let feed = exchanges::from_config(&config)?;
    let scheduler = RefreshScheduler::new(feed, store, SchedulerConfig::from(&config)).spawn();
    scheduler.start()?;

    // ── 2. Order entry: consume level selections ───────────────────
    tokio::spawn(consume_selections(scheduler.subscribe_selections(), |selected| {
        tracing::info!(
            "Order entry prefill: {} @ {}",
            selected.side.as_str(),
            format_price(selected.price)
        )
    }));

    // ── 3. Log the touch whenever a new book is published ──────────
    let mut books = scheduler.subscribe();
    tokio::spawn(async move {
        while books.changed().await.is_ok() {
            let Some(book) = books.borrow_and_update().clone() else {
                continue;
            };
            let snapshot = &book.snapshot;
            match (snapshot.best_bid(), snapshot.best_ask()) {
                (Some(bid), Some(ask)) => tracing::info!(
                    "#{} {}: bid=${} ask=${} spread={:.6}%{}",
                    book.sequence,
                    snapshot.symbol,
                    format_price(bid),
                    format_price(ask),
                    snapshot.spread_percentage.unwrap_or_default(),
                    if book.stale { " (stale)" } else { "" }
                ),
                _ => tracing::info!("#{} {}: one side empty", book.sequence, snapshot.symbol),
            }
        }
    });

    // ── 4. Serve the API until Ctrl+C ──────────────────────────────
    ApiServer::new(scheduler.clone()).run(&config).await?;

    tracing::info!("Shutting down...");
    scheduler.shutdown();
    Ok(())
}
