use actix_web::{get, web, HttpResponse};

use crate::error::AppError;
use crate::models::history::{HistoryQuery, HistoryResponse};
use crate::services::history_store::HistoryStore;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

/// Most recent analyses, newest first. Empty when history is disabled.
#[get("/history")]
pub async fn get_history(
    query: web::Query<HistoryQuery>,
    history: Option<web::Data<HistoryStore>>,
) -> Result<HttpResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let entries = match history {
        Some(store) => store.recent(limit).await,
        None => Vec::new(),
    };

    Ok(HttpResponse::Ok().json(HistoryResponse {
        count: entries.len(),
        entries,
    }))
}
