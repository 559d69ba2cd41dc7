use std::fmt;

#[derive(Debug)]
pub enum SheetError {
    Api(String),
    Auth(String),
    Document(String),
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SheetError::Api(e) => write!(f, "SheetError::Api: {}", e),
            SheetError::Auth(e) => write!(f, "SheetError::Auth: {}", e),
            SheetError::Document(e) => write!(f, "SheetError::Document: {}", e),
        }
    }
}
impl From<reqwest::Error> for SheetError {
    fn from(e: reqwest::Error) -> Self {
        SheetError::Api(e.to_string())
    }
}
impl From<serde_json::Error> for SheetError {
    fn from(e: serde_json::Error) -> Self {
        SheetError::Document(e.to_string())
    }
}
impl From<jsonwebtoken::errors::Error> for SheetError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        SheetError::Auth(e.to_string())
    }
}
