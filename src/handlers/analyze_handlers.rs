use actix_web::{post, web, HttpResponse};
use log::debug;

use crate::error::AppError;
use crate::models::analysis::AnalyzeRequest;
use crate::services::analysis_service::AnalysisService;

/// Estimate tokens and carbon for a prompt, roast it, and suggest a rewrite
#[post("/analyze")]
pub async fn analyze_prompt(
    request: web::Json<AnalyzeRequest>,
    analysis_service: web::Data<AnalysisService>,
) -> Result<HttpResponse, AppError> {
    debug!("Analyze request for a prompt of {} characters", request.prompt.chars().count());

    let result = analysis_service.analyze(&request.prompt).await?;

    Ok(HttpResponse::Ok().json(result))
}
