mod derived;
mod errors;
mod extractor;
mod handlers;
mod initialization;
mod logging;
mod manager_discord;
mod manager_gemini;
mod manager_kma;
mod manager_notify;
mod manager_refresh;
mod manager_sheet;
mod schedule;

use std::sync::Arc;
use actix_web::{web, App, HttpServer};
use log::{error, info};
use crate::errors::UnrecoverableError;
use crate::handlers::{alive, notify, AppState};
use crate::initialization::config;
use crate::manager_discord::gateway::{run_gateway, BotContext};
use crate::manager_discord::Discord;
use crate::manager_gemini::Gemini;
use crate::manager_kma::Kma;
use crate::manager_notify::run_morning;
use crate::manager_refresh::run_refresh;
use crate::manager_sheet::SheetStore;

#[actix_web::main]
async fn main() -> Result<(), UnrecoverableError> {
    let config = config()?;

    let discord = Arc::new(Discord::new(
        &config.secrets.bot_token,
        &config.secrets.client_id,
    )?);
    let sheets = Arc::new(SheetStore::new(
        &config.secrets.spreadsheet_id,
        config.secrets.google_creds.clone(),
    )?);
    let gemini = Arc::new(Gemini::new(&config.secrets.gemini_api_key)?);
    let kma = Arc::new(Kma::new(
        &config.secrets.data_api_key,
        config.location.nx,
        config.location.ny,
    )?);

    match discord.register_commands().await {
        Ok(()) => info!("slash commands registered"),
        Err(e) => error!("slash command registration failed: {}", e),
    }

    let delay = config.schedule.publication_delay_minutes;

    tokio::spawn(run_refresh(
        kma,
        sheets.clone(),
        config.schedule.refresh_offset_minute,
        delay,
    ));

    tokio::spawn(run_morning(
        discord.clone(),
        sheets.clone(),
        gemini.clone(),
        config.schedule.morning_hour,
        config.schedule.morning_minute,
        delay,
    ));

    let ctx = Arc::new(BotContext {
        discord: discord.clone(),
        sheets: sheets.clone(),
        gemini: gemini.clone(),
        publication_delay: delay,
        default_location: config.location.name.clone(),
        welcome_channel: config.discord.welcome_channel.clone(),
    });
    tokio::spawn(run_gateway(ctx));

    let state = web::Data::new(AppState {
        discord: discord.clone(),
        webhook_secret: config.secrets.webhook_secret.clone(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(alive)
            .service(notify)
    })
        .bind((config.web_server.bind_address, config.web_server.bind_port))?
        .run()
        .await?;

    Ok(())
}
