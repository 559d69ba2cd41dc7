pub mod errors;
pub mod models;

use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::warn;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use crate::extractor::{canonical, ForecastRecord};
use crate::manager_refresh::ForecastCache;
use crate::manager_sheet::errors::SheetError;
use crate::manager_sheet::models::{
    ServiceAccountCreds, SubscriberEntry, SubscriberKind, TokenClaims, TokenResponse, ValueRange,
};

const SHEETS_DOMAIN: &str = "https://sheets.googleapis.com";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const FORECAST_RANGE: &str = "ForecastData!A1:F";
const FORECAST_DATA_RANGE: &str = "ForecastData!A2:F";
const META_RANGE: &str = "Metadata!A1:B1";
const MARKER_RANGE: &str = "Metadata!B1";
const SUBSCRIBER_RANGE: &str = "Subscribers!A2:E";

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Spreadsheet-backed store holding the forecast cache, the subscriber
/// registry and the freshness marker
pub struct SheetStore {
    client: Client,
    spreadsheet_id: String,
    creds: ServiceAccountCreds,
    token: Mutex<Option<CachedToken>>,
}

impl SheetStore {
    /// Returns a SheetStore for one spreadsheet.
    ///
    /// # Arguments
    ///
    /// * 'spreadsheet_id' - id of the backing spreadsheet
    /// * 'creds' - service account credentials for the Sheets API
    pub fn new(spreadsheet_id: &str, creds: ServiceAccountCreds) -> Result<SheetStore, SheetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            creds,
            token: Mutex::new(None),
        })
    }

    /// Returns a bearer token, minting a fresh one via the signed-JWT grant
    /// when the cached token is within a minute of expiry
    async fn access_token(&self) -> Result<String, SheetError> {
        let mut guard = self.token.lock().await;
        let now = Utc::now().timestamp();

        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - 60 > now {
                return Ok(cached.access_token.clone());
            }
        }

        let claims = TokenClaims {
            iss: self.creds.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.creds.private_key.as_bytes())?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)?;

        let resp = self.client
            .post(TOKEN_URI)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Auth(format!("token exchange failed: {}", status)));
        }

        let token: TokenResponse = resp.json().await?;
        let access_token = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        });

        Ok(access_token)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>, SheetError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}", SHEETS_DOMAIN, self.spreadsheet_id, range
        );

        let resp = self.client
            .get(url)
            .bearer_auth(token)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Api(format!("reading {} failed: {}", range, status)));
        }

        let value_range: ValueRange = resp.json().await?;
        Ok(value_range.values.unwrap_or_default())
    }

    async fn put_values(&self, range: &str, values: Vec<Vec<Value>>) -> Result<(), SheetError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}", SHEETS_DOMAIN, self.spreadsheet_id, range
        );

        let body = ValueRange { range: Some(range.to_string()), values: Some(values) };
        let resp = self.client
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Api(format!("writing {} failed: {}", range, status)));
        }

        Ok(())
    }

    async fn clear_values(&self, range: &str) -> Result<(), SheetError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:clear", SHEETS_DOMAIN, self.spreadsheet_id, range
        );

        let resp = self.client
            .post(url)
            .bearer_auth(token)
            .json(&json!({}))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Api(format!("clearing {} failed: {}", range, status)));
        }

        Ok(())
    }

    /// Reads the whole cached forecast table.
    ///
    /// Cells come back untyped, so every field goes through canonicalization
    /// here and the matcher never sees mixed representations. Rows without a
    /// parseable grid coordinate are dropped with a warning.
    pub async fn read_forecast(&self) -> Result<Vec<ForecastRecord>, SheetError> {
        let rows = self.get_values(FORECAST_DATA_RANGE).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.len() < 6 {
                warn!("forecast row with {} cells skipped", row.len());
                continue;
            }
            let grid_x = cell_text(&row[4]).parse::<i32>();
            let grid_y = cell_text(&row[5]).parse::<i32>();
            match (grid_x, grid_y) {
                (Ok(grid_x), Ok(grid_y)) => records.push(ForecastRecord {
                    date: cell_text(&row[0]),
                    time_slot: cell_text(&row[1]),
                    category: cell_text(&row[2]),
                    value: cell_text(&row[3]),
                    grid_x,
                    grid_y,
                }),
                _ => warn!("forecast row with bad grid cell skipped"),
            }
        }

        Ok(records)
    }

    /// Replaces the cached forecast table wholesale: clear, then one bulk
    /// write of header plus rows
    pub async fn replace_forecast(&self, records: &[ForecastRecord]) -> Result<(), SheetError> {
        self.clear_values(FORECAST_RANGE).await?;

        let mut values: Vec<Vec<Value>> = Vec::with_capacity(records.len() + 1);
        values.push(vec![
            json!("fcstDate"), json!("fcstTime"), json!("category"),
            json!("fcstValue"), json!("nx"), json!("ny"),
        ]);
        for r in records {
            values.push(vec![
                json!(r.date), json!(r.time_slot), json!(r.category),
                json!(r.value), json!(r.grid_x.to_string()), json!(r.grid_y.to_string()),
            ]);
        }

        self.put_values(FORECAST_RANGE, values).await
    }

    /// Reads the freshness marker, None when it was never written
    pub async fn read_marker(&self) -> Result<Option<String>, SheetError> {
        let rows = self.get_values(MARKER_RANGE).await?;
        let marker = rows
            .first()
            .and_then(|r| r.first())
            .map(cell_text)
            .filter(|s| !s.is_empty());
        Ok(marker)
    }

    /// Advances the freshness marker to the given issuance time
    pub async fn write_marker(&self, base_time: &str) -> Result<(), SheetError> {
        self.put_values(
            META_RANGE,
            vec![vec![json!("LastUpdateBaseTime"), json!(base_time)]],
        ).await
    }

    /// Reads the full subscriber registry. Rows with an unknown type tag or
    /// no id are skipped.
    pub async fn read_subscribers(&self) -> Result<Vec<SubscriberEntry>, SheetError> {
        let rows = self.get_values(SUBSCRIBER_RANGE).await?;

        let mut subscribers = Vec::new();
        for row in &rows {
            let kind = match row.first().map(cell_text).as_deref() {
                Some("Private") => SubscriberKind::Private,
                Some("Public") => SubscriberKind::Public,
                _ => continue,
            };
            let id = row.get(1).map(cell_text).unwrap_or_default();
            if id.is_empty() {
                continue;
            }
            subscribers.push(SubscriberEntry {
                kind,
                id,
                location_name: row.get(2).map(cell_text).unwrap_or_default(),
                grid_x: row.get(3).map(cell_text).and_then(|s| s.parse().ok()),
                grid_y: row.get(4).map(cell_text).and_then(|s| s.parse().ok()),
            });
        }

        Ok(subscribers)
    }

    /// Looks one Private subscriber up by user id
    pub async fn find_private(&self, user_id: &str) -> Result<Option<SubscriberEntry>, SheetError> {
        let id = canonical(user_id);
        let subscribers = self.read_subscribers().await?;
        Ok(subscribers
            .into_iter()
            .find(|s| s.kind == SubscriberKind::Private && s.id == id))
    }

    /// Pre-registers a Private subscriber with no grid coordinates yet.
    /// Idempotent: an existing row for the same user is left alone.
    /// Returns whether a new row was appended.
    pub async fn register_private(
        &self,
        user_id: &str,
        location_name: &str,
    ) -> Result<bool, SheetError> {
        if self.find_private(user_id).await?.is_some() {
            return Ok(false);
        }

        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            SHEETS_DOMAIN, self.spreadsheet_id, SUBSCRIBER_RANGE
        );

        let body = ValueRange {
            range: None,
            values: Some(vec![vec![
                json!("Private"), json!(user_id), json!(location_name), json!(""), json!(""),
            ]]),
        };
        let resp = self.client
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Api(format!("appending subscriber failed: {}", status)));
        }

        Ok(true)
    }
}

/// Canonical text of one untyped cell
fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => canonical(s),
        Value::Null => String::new(),
        other => canonical(&other.to_string()),
    }
}

#[async_trait]
impl ForecastCache for SheetStore {
    async fn replace(&self, rows: &[ForecastRecord]) -> Result<(), String> {
        self.replace_forecast(rows).await.map_err(|e| e.to_string())
    }
    async fn marker(&self) -> Result<Option<String>, String> {
        self.read_marker().await.map_err(|e| e.to_string())
    }
    async fn set_marker(&self, base_time: &str) -> Result<(), String> {
        self.write_marker(base_time).await.map_err(|e| e.to_string())
    }
}
