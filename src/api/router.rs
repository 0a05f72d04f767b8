use super::handlers;
use crate::scheduler::SchedulerHandle;
use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds and returns the full Axum router with all routes and shared state.
pub fn build(scheduler: SchedulerHandle) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/book", get(handlers::get_book))
        .route("/buckets", get(handlers::get_buckets))
        .route("/grouping", post(handlers::set_grouping))
        .route("/refresh", post(handlers::refresh))
        .route("/auto-refresh", post(handlers::set_auto_refresh))
        .route("/levels/select", post(handlers::select_level))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExchangeError;
    use crate::exchanges::{DepthFeed, FeedDepth};
    use crate::models::{RawLevel, Side};
    use crate::orderbook::BookStore;
    use crate::scheduler::{RefreshScheduler, SchedulerConfig};
    use crate::models::Grouping;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedFeed;

    #[async_trait]
    impl DepthFeed for FixedFeed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_depth(&self, _symbol: &str, _limit: usize) -> Result<FeedDepth, ExchangeError> {
            Ok(FeedDepth {
                bids: vec![RawLevel::new(99.9, 2.0)],
                asks: vec![RawLevel::new(100.1, 3.0)],
                event_ms: 1,
            })
        }
    }

    fn scheduler() -> SchedulerHandle {
        RefreshScheduler::new(
            Arc::new(FixedFeed),
            BookStore::new(),
            SchedulerConfig {
                symbol: "BTCUSDT".to_string(),
                grouping: Grouping::new(1.0, 10).unwrap(),
                fetch_depth: 100,
                refresh_interval: Duration::from_secs(1),
                auto_refresh: false,
            },
        )
        .spawn()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn book_is_unavailable_before_first_cycle() {
        let app = build(scheduler());
        let response = app
            .oneshot(Request::get("/book").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn book_is_served_after_a_refresh() {
        let scheduler = scheduler();
        let mut books = scheduler.subscribe();
        scheduler.refresh().unwrap();
        books.wait_for(|b| b.is_some()).await.unwrap();

        let response = build(scheduler)
            .oneshot(Request::get("/book").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["asks"][0]["price"], 101.0);
        assert_eq!(body["bids"][0]["price"], 99.0);
        assert_eq!(body["spread"], 2.0);
        assert_eq!(body["stale"], false);
    }

    #[tokio::test]
    async fn invalid_grouping_is_unprocessable() {
        let response = build(scheduler())
            .oneshot(
                Request::post("/grouping")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"bucket_size": 0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("Invalid grouping"));
    }

    #[tokio::test]
    async fn level_selection_is_forwarded() {
        let scheduler = scheduler();
        let mut selections = scheduler.subscribe_selections();

        let response = build(scheduler)
            .oneshot(
                Request::post("/levels/select")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"side": "bid", "price": 99.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = selections.recv().await.unwrap();
        assert_eq!(event.side, Side::Bid);
        assert_eq!(event.price, 99.0);
    }
}
