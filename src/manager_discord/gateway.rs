use std::sync::Arc;
use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use crate::extractor::{extract, ExtractError, Target};
use crate::manager_discord::errors::DiscordError;
use crate::manager_discord::models::{GatewayPayload, GuildMemberAdd, Hello, Interaction, User};
use crate::manager_discord::Discord;
use crate::manager_gemini::Gemini;
use crate::manager_sheet::SheetStore;
use crate::schedule::{api_times, kst_now, Mode};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

// gateway opcodes
const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;

// GUILDS | GUILD_MEMBERS
const INTENTS: u64 = 1 | 2;

const REGISTRATION_DM: &str =
    "👋 환영합니다! 날씨 알림 구독자로 등록되었습니다.\n\
     관리자에게 위치(격자 좌표) 등록을 요청하면 /weather 명령을 쓸 수 있어요.";

/// Everything the inbound event handlers need, shared across dispatches
pub struct BotContext {
    pub discord: Arc<Discord>,
    pub sheets: Arc<SheetStore>,
    pub gemini: Arc<Gemini>,
    pub publication_delay: u32,
    pub default_location: String,
    pub welcome_channel: Option<String>,
}

/// Gateway loop: connects, listens, and reconnects after a fixed pause on
/// any error. Runs for the lifetime of the process.
pub async fn run_gateway(ctx: Arc<BotContext>) {
    loop {
        match connect_and_listen(&ctx).await {
            Ok(()) => warn!("gateway closed cleanly, reconnecting"),
            Err(e) => error!("gateway connection lost: {}", e),
        }
        tokio::time::sleep(RECONNECT_PAUSE).await;
    }
}

async fn connect_and_listen(ctx: &Arc<BotContext>) -> Result<(), DiscordError> {
    let (ws, _) = connect_async(GATEWAY_URL).await?;
    let (mut sink, mut stream) = ws.split();

    // the first frame must be hello, it carries the heartbeat cadence
    let hello = loop {
        match stream.next().await {
            Some(Ok(Message::Text(txt))) => {
                let payload: GatewayPayload = serde_json::from_str(txt.as_str())?;
                if payload.op != OP_HELLO {
                    return Err(DiscordError::Gateway(format!(
                        "expected hello, got opcode {}", payload.op
                    )));
                }
                let d = payload.d.ok_or_else(|| {
                    DiscordError::Gateway("hello frame without payload".to_string())
                })?;
                break serde_json::from_value::<Hello>(d)?;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(DiscordError::Gateway("closed before hello".to_string())),
        }
    };

    let identify = json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": ctx.discord.bot_token(),
            "intents": INTENTS,
            "properties": { "os": "linux", "browser": "weathernotifier", "device": "weathernotifier" },
        }
    });
    sink.send(Message::text(identify.to_string())).await?;

    let mut heartbeat = tokio::time::interval(Duration::from_millis(hello.heartbeat_interval));
    // the first tick fires immediately, skip it
    heartbeat.tick().await;
    let mut seq: Option<u64> = None;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let frame = json!({ "op": OP_HEARTBEAT, "d": seq });
                sink.send(Message::text(frame.to_string())).await?;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(txt))) => {
                    let payload: GatewayPayload = serde_json::from_str(txt.as_str())?;
                    if let Some(s) = payload.s {
                        seq = Some(s);
                    }
                    match payload.op {
                        OP_DISPATCH => dispatch(ctx, payload),
                        OP_RECONNECT | OP_INVALID_SESSION => {
                            return Err(DiscordError::Gateway(format!(
                                "server asked for reconnect (opcode {})", payload.op
                            )));
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    sink.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(DiscordError::Gateway(format!("closed by server: {:?}", frame)));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }
    }
}

/// Routes one dispatch frame to its handler on a fresh task, so a slow
/// collaborator call never stalls the heartbeat
fn dispatch(ctx: &Arc<BotContext>, payload: GatewayPayload) {
    let Some(d) = payload.d else { return };

    match payload.t.as_deref() {
        Some("READY") => info!("gateway session ready"),
        Some("INTERACTION_CREATE") => match serde_json::from_value::<Interaction>(d) {
            Ok(interaction) => {
                let ctx = ctx.clone();
                tokio::spawn(async move { handle_interaction(&ctx, interaction).await });
            }
            Err(e) => warn!("unreadable interaction: {}", e),
        },
        Some("GUILD_MEMBER_ADD") => match serde_json::from_value::<GuildMemberAdd>(d) {
            Ok(event) => {
                if let Some(user) = event.user {
                    let ctx = ctx.clone();
                    tokio::spawn(async move { handle_member_add(&ctx, user).await });
                }
            }
            Err(e) => warn!("unreadable member event: {}", e),
        },
        _ => {}
    }
}

/// The '/weather' flow: acknowledge within the interaction window, work,
/// then finalize with either a confirmation or a user-readable error.
/// Nothing here may unwind past the handler.
async fn handle_interaction(ctx: &BotContext, interaction: Interaction) {
    let is_weather = interaction.data.as_ref().map(|d| d.name == "weather").unwrap_or(false);
    if !is_weather {
        return;
    }
    let Some(user) = interaction.invoker().cloned() else {
        warn!("interaction without an invoking user");
        return;
    };

    if let Err(e) = ctx.discord.defer_reply(&interaction.id, &interaction.token).await {
        error!("could not acknowledge interaction: {}", e);
        return;
    }

    let reply = weather_reply(ctx, &user).await;
    if let Err(e) = ctx.discord.edit_reply(&interaction.token, &reply).await {
        error!("could not finalize interaction: {}", e);
    }
}

async fn weather_reply(ctx: &BotContext, user: &User) -> String {
    let subscriber = match ctx.sheets.find_private(&user.id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return "🚨 구독자 목록(`Subscribers` 시트)에 등록되지 않은 사용자입니다.".to_string();
        }
        Err(e) => {
            error!("subscriber lookup failed: {}", e);
            return "🚨 구독자 목록을 읽지 못했습니다. 잠시 후 다시 시도해 주세요.".to_string();
        }
    };

    let (grid_x, grid_y) = match (subscriber.grid_x, subscriber.grid_y) {
        (Some(x), Some(y)) => (x, y),
        _ => return "🚨 위치(격자 좌표)가 아직 등록되지 않았습니다.".to_string(),
    };

    let times = api_times(kst_now(), Mode::OnDemand, ctx.publication_delay);

    let rows = match ctx.sheets.read_forecast().await {
        Ok(rows) => rows,
        Err(e) => {
            error!("forecast read failed: {}", e);
            return "🚨 Google Sheet에 아직 데이터가 없거나 읽기에 실패했습니다.".to_string();
        }
    };

    let target = Target {
        date: times.forecast_date.clone(),
        time_slot: times.forecast_time.clone(),
        grid_x,
        grid_y,
    };
    let data = match extract(&rows, &target, &times.forecast_label) {
        Ok(data) => data,
        Err(e @ ExtractError::Unavailable { .. }) => {
            warn!("{}", e);
            return format!(
                "🚨 {} 예보 데이터를 아직 찾을 수 없습니다. (백그라운드 작업이 실행 중일 수 있습니다.)",
                times.forecast_label
            );
        }
    };

    let message = ctx.gemini.policy_message(&data, &subscriber.location_name).await;

    match ctx.discord.send_dm(&user.id, &message).await {
        Ok(()) => {
            let name = user.username.as_deref().unwrap_or("구독자");
            format!("✅ {}님의 DM으로 {} 날씨 정보를 보냈어요!", name, times.forecast_label)
        }
        Err(e) => {
            error!("DM delivery failed: {}", e);
            "🚨 DM 전송에 실패했습니다. DM 수신이 허용되어 있는지 확인해 주세요.".to_string()
        }
    }
}

/// New-member flow: idempotent pre-registration with an empty grid, an
/// instruction DM, and an optional public mention
async fn handle_member_add(ctx: &BotContext, user: User) {
    match ctx.sheets.register_private(&user.id, &ctx.default_location).await {
        Ok(true) => info!("pre-registered subscriber {}", user.id),
        Ok(false) => info!("subscriber {} already registered", user.id),
        Err(e) => {
            error!("pre-registration failed for {}: {}", user.id, e);
            return;
        }
    }

    if let Err(e) = ctx.discord.send_dm(&user.id, REGISTRATION_DM).await {
        warn!("instruction DM to {} failed: {}", user.id, e);
    }

    if let Some(channel) = &ctx.welcome_channel {
        let text = format!("<@{}> 님이 날씨 알림에 등록되었습니다. 🎉", user.id);
        if let Err(e) = ctx.discord.send_channel_message(channel, &text).await {
            warn!("welcome mention failed: {}", e);
        }
    }
}
