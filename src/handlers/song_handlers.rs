use actix_web::{post, web, HttpResponse};
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::song::SongRequest;
use crate::services::song_service::SongService;

/// Turn a roast into a diss track
#[post("/song")]
pub async fn generate_song(
    request: web::Json<SongRequest>,
    song_service: Option<web::Data<SongService>>,
) -> Result<HttpResponse, AppError> {
    let song_service = song_service.ok_or_else(|| {
        AppError::ServiceUnavailable("Song generation is not configured".to_string())
    })?;

    // actix drops this future when the client disconnects; the guard then
    // cancels the token so polling stops right away
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    debug!("Song request with style {:?}", request.style);
    let song = song_service
        .generate(&request.roast, request.style.as_deref(), &cancel)
        .await?;

    Ok(HttpResponse::Ok().json(song))
}
