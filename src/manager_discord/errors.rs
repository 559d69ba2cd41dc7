use std::fmt;

#[derive(Debug)]
pub enum DiscordError {
    Api(String),
    Gateway(String),
    Document(String),
}

impl fmt::Display for DiscordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiscordError::Api(e) => write!(f, "DiscordError::Api: {}", e),
            DiscordError::Gateway(e) => write!(f, "DiscordError::Gateway: {}", e),
            DiscordError::Document(e) => write!(f, "DiscordError::Document: {}", e),
        }
    }
}
impl From<reqwest::Error> for DiscordError {
    fn from(e: reqwest::Error) -> Self {
        DiscordError::Api(e.to_string())
    }
}
impl From<serde_json::Error> for DiscordError {
    fn from(e: serde_json::Error) -> Self {
        DiscordError::Document(e.to_string())
    }
}
impl From<tokio_tungstenite::tungstenite::Error> for DiscordError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        DiscordError::Gateway(e.to_string())
    }
}
