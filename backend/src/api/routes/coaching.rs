use actix_web::{post, web, HttpResponse};

use crate::domain::CoachingRequest;
use crate::infrastructure::error::AppResult;
use crate::AppState;

/// Coaching requête/réponse, utilisé quand le WebSocket ne peut pas être établi
#[post("/ai-coaching")]
pub async fn coach(
    request: web::Json<CoachingRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let response = state.coaching.coach(request.into_inner()).await?;

    Ok(HttpResponse::Ok().json(response))
}
