use std::fmt;

#[derive(Debug)]
pub enum GeminiError {
    Api(String),
    Document(String),
}

impl fmt::Display for GeminiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GeminiError::Api(e) => write!(f, "GeminiError::Api: {}", e),
            GeminiError::Document(e) => write!(f, "GeminiError::Document: {}", e),
        }
    }
}
impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        GeminiError::Api(e.to_string())
    }
}
impl From<serde_json::Error> for GeminiError {
    fn from(e: serde_json::Error) -> Self {
        GeminiError::Document(e.to_string())
    }
}
