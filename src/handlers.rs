use std::sync::Arc;
use actix_web::{get, post, web, HttpResponse, Responder};
use log::{error, info};
use serde::Deserialize;
use crate::manager_discord::Discord;

const CONFIRMATION_DM: &str = "✅ 날씨 알림 연동이 확인되었습니다.";

pub struct AppState {
    pub discord: Arc<Discord>,
    pub webhook_secret: String,
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub secret: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Static liveness body for external uptime probing
#[get("/")]
pub async fn alive() -> impl Responder {
    HttpResponse::Ok().body("weathernotifier is alive")
}

/// Webhook for external integrations: a shared secret plus a user id,
/// answered with a fixed confirmation DM
#[post("/notify")]
pub async fn notify(body: web::Json<NotifyRequest>, data: web::Data<AppState>) -> impl Responder {
    if body.secret != data.webhook_secret {
        return HttpResponse::Forbidden().finish();
    }

    info!("webhook confirmation requested for user {}", body.user_id);

    match data.discord.send_dm(&body.user_id, CONFIRMATION_DM).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => {
            error!("confirmation DM to {} failed: {}", body.user_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
