pub mod errors;
pub mod gateway;
pub mod models;

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use crate::manager_discord::errors::DiscordError;
use crate::manager_discord::models::DmChannel;
use crate::manager_notify::ChannelSender;

const API_BASE: &str = "https://discord.com/api/v10";

/// REST side of the chat platform: command registration and message delivery
pub struct Discord {
    client: Client,
    token: String,
    application_id: String,
}

impl Discord {
    /// # Arguments
    ///
    /// * 'token' - bot token
    /// * 'application_id' - application id the slash command registers under
    pub fn new(token: &str, application_id: &str) -> Result<Discord, DiscordError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            application_id: application_id.to_string(),
        })
    }

    pub fn bot_token(&self) -> &str {
        &self.token
    }

    /// Registers the single global '/weather' command. Safe to repeat, the
    /// platform upserts by name.
    pub async fn register_commands(&self) -> Result<(), DiscordError> {
        let url = format!("{}/applications/{}/commands", API_BASE, self.application_id);
        let body = json!([{
            "name": "weather",
            "type": 1,
            "description": "현재 위치의 최신 날씨와 행동 지침을 DM으로 받습니다.",
        }]);

        let resp = self.client
            .put(url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DiscordError::Api(format!("command registration failed: {}", status)));
        }

        Ok(())
    }

    /// Sends a direct message, opening the DM channel first
    pub async fn send_dm(&self, user_id: &str, text: &str) -> Result<(), DiscordError> {
        let url = format!("{}/users/@me/channels", API_BASE);
        let resp = self.client
            .post(url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "recipient_id": user_id }))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DiscordError::Api(format!("opening DM channel failed: {}", status)));
        }

        let channel: DmChannel = resp.json().await?;
        self.send_channel_message(&channel.id, text).await
    }

    /// Sends a message to a channel by id
    pub async fn send_channel_message(&self, channel_id: &str, text: &str) -> Result<(), DiscordError> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel_id);
        let resp = self.client
            .post(url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": text }))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DiscordError::Api(format!(
                "sending to channel {} failed: {}", channel_id, status
            )));
        }

        Ok(())
    }

    /// Acknowledges an interaction within the platform window with a deferred
    /// ephemeral reply; the real answer follows through edit_reply
    pub async fn defer_reply(&self, interaction_id: &str, token: &str) -> Result<(), DiscordError> {
        let url = format!("{}/interactions/{}/{}/callback", API_BASE, interaction_id, token);
        let resp = self.client
            .post(url)
            .json(&json!({ "type": 5, "data": { "flags": 64 } }))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DiscordError::Api(format!("deferring interaction failed: {}", status)));
        }

        Ok(())
    }

    /// Finalizes a deferred interaction with the actual reply text
    pub async fn edit_reply(&self, token: &str, text: &str) -> Result<(), DiscordError> {
        let url = format!(
            "{}/webhooks/{}/{}/messages/@original", API_BASE, self.application_id, token
        );
        let resp = self.client
            .patch(url)
            .json(&json!({ "content": text }))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DiscordError::Api(format!("editing reply failed: {}", status)));
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelSender for Discord {
    async fn send_channel(&self, channel_id: &str, text: &str) -> Result<(), String> {
        self.send_channel_message(channel_id, text).await.map_err(|e| e.to_string())
    }
}
