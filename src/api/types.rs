use crate::engine::{BlocklistError, Domain, Theme};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Format,
    Duplicate,
    Persistence,
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Format => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Duplicate => StatusCode::CONFLICT,
            ErrorKind::Persistence | ErrorKind::Load => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<&BlocklistError> for ApiError {
    fn from(e: &BlocklistError) -> Self {
        let kind = match e {
            BlocklistError::Format(_) => ErrorKind::Format,
            BlocklistError::Duplicate(_) => ErrorKind::Duplicate,
            BlocklistError::Persistence(_) => ErrorKind::Persistence,
            BlocklistError::Load(_) => ErrorKind::Load,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// `{domains, error?}` as returned by every blocklist route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainsResponse {
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl DomainsResponse {
    pub fn ok(domains: &[Domain]) -> Self {
        Self {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            error: None,
        }
    }

    pub fn failed(domains: &[Domain], error: &BlocklistError) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::ok(domains)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddDomainRequest {
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub host: String,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeBody {
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
