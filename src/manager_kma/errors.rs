use std::fmt;

#[derive(Debug)]
pub enum KmaError {
    Api(String),
    Document(String),
}

impl fmt::Display for KmaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KmaError::Api(e) => write!(f, "KmaError::Api: {}", e),
            KmaError::Document(e) => write!(f, "KmaError::Document: {}", e),
        }
    }
}
impl From<reqwest::Error> for KmaError {
    fn from(e: reqwest::Error) -> Self {
        KmaError::Api(e.to_string())
    }
}
impl From<serde_json::Error> for KmaError {
    fn from(e: serde_json::Error) -> Self {
        KmaError::Document(e.to_string())
    }
}
