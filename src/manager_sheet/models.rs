use serde::{Deserialize, Serialize};

/// Google service account credentials, the JSON blob as issued by the console
#[derive(Deserialize, Clone)]
pub struct ServiceAccountCreds {
    pub client_email: String,
    pub private_key: String,
}

/// Claims of the signed assertion exchanged for an access token
#[derive(Serialize)]
pub struct TokenClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Wire shape of a sheet range, both directions
#[derive(Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SubscriberKind {
    /// A single user, served on demand via DM
    Private,
    /// A channel, served by the scheduled morning broadcast
    Public,
}

/// One row of the subscriber registry
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberEntry {
    pub kind: SubscriberKind,
    pub id: String,
    pub location_name: String,
    pub grid_x: Option<i32>,
    pub grid_y: Option<i32>,
}
