use super::models::{
    AutoRefreshRequest, BookResponse, BucketsResponse, ErrorResponse, GroupingRequest,
    GroupingResponse,
};
use crate::depth::{bucket_sizes, display_precision};
use crate::errors::EngineError;
use crate::models::LevelSelected;
use crate::scheduler::SchedulerHandle;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// Maps engine errors onto HTTP statuses.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidGrouping(_) | EngineError::InvalidLevel(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::FeedUnavailable(_) => StatusCode::BAD_GATEWAY,
            EngineError::SchedulerStopped => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// GET /health — simple liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /book — latest published book, 503 until the first cycle completes
pub async fn get_book(
    State(scheduler): State<SchedulerHandle>,
) -> Result<Json<BookResponse>, StatusCode> {
    let book = scheduler
        .current()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let precision = book
        .snapshot
        .reference_price()
        .map(|price| display_precision(price, book.snapshot.bucket_size))
        .unwrap_or_else(|| display_precision(0.0, book.snapshot.bucket_size));

    Ok(Json(BookResponse::new(&book, scheduler.state(), precision)))
}

/// GET /buckets — grouping choices for the current price magnitude
pub async fn get_buckets(State(scheduler): State<SchedulerHandle>) -> Json<BucketsResponse> {
    let current = scheduler.grouping().bucket_size();
    let options = scheduler
        .current()
        .map(|book| {
            if book.bucket_options.is_empty() {
                book.snapshot
                    .reference_price()
                    .map(bucket_sizes)
                    .unwrap_or_default()
            } else {
                book.bucket_options.clone()
            }
        })
        .unwrap_or_default();

    Json(BucketsResponse { current, options })
}

/// POST /grouping — re-aggregate the current book with a new bucket size
pub async fn set_grouping(
    State(scheduler): State<SchedulerHandle>,
    Json(request): Json<GroupingRequest>,
) -> Result<Json<GroupingResponse>, ApiError> {
    let depth = request
        .depth
        .unwrap_or_else(|| scheduler.grouping().depth());
    let grouping = scheduler.set_grouping(request.bucket_size, depth)?;

    Ok(Json(GroupingResponse {
        bucket_size: grouping.bucket_size(),
        depth: grouping.depth(),
    }))
}

/// POST /refresh — fetch now
pub async fn refresh(State(scheduler): State<SchedulerHandle>) -> Result<StatusCode, ApiError> {
    scheduler.refresh()?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /auto-refresh
pub async fn set_auto_refresh(
    State(scheduler): State<SchedulerHandle>,
    Json(request): Json<AutoRefreshRequest>,
) -> Result<StatusCode, ApiError> {
    scheduler.set_auto_refresh(request.enabled)?;
    Ok(StatusCode::OK)
}

/// POST /levels/select — a level was clicked; forwarded to order entry
pub async fn select_level(
    State(scheduler): State<SchedulerHandle>,
    Json(selection): Json<LevelSelected>,
) -> Result<StatusCode, ApiError> {
    scheduler.select_level(selection.side, selection.price)?;
    Ok(StatusCode::ACCEPTED)
}
