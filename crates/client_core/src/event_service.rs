use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    domain::{EventRecord, NewEvent},
    error::{ApiException, ErrorCode},
    protocol::{EventInsertRow, EventRow, RestErrorBody},
};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

const EVENTS_TABLE_PATH: &str = "rest/v1/events";

#[derive(Debug, Error)]
pub enum EventServiceError {
    #[error("event service is not configured")]
    NotConfigured,
    #[error("invalid event service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("event service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiException),
    #[error("event service returned no created row")]
    EmptyResponse,
}

impl EventServiceError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Remote store of events.
#[async_trait]
pub trait EventService: Send + Sync {
    async fn create_event(&self, event: &NewEvent) -> Result<EventRecord, EventServiceError>;
    async fn list_events(&self) -> Result<Vec<EventRecord>, EventServiceError>;
}

pub struct MissingEventService;

#[async_trait]
impl EventService for MissingEventService {
    async fn create_event(&self, _event: &NewEvent) -> Result<EventRecord, EventServiceError> {
        Err(EventServiceError::NotConfigured)
    }

    async fn list_events(&self) -> Result<Vec<EventRecord>, EventServiceError> {
        Err(EventServiceError::NotConfigured)
    }
}

/// `events` table behind a Supabase REST gateway.
pub struct SupabaseEventService {
    http: Client,
    table_url: Url,
    anon_key: String,
    access_token: Option<String>,
}

impl SupabaseEventService {
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Result<Self, EventServiceError> {
        let mut base = Url::parse(project_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: Client::new(),
            table_url: base.join(EVENTS_TABLE_PATH)?,
            anon_key: anon_key.into(),
            access_token: None,
        })
    }

    /// Sends requests as a signed-in user instead of the anonymous role.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }
}

#[async_trait]
impl EventService for SupabaseEventService {
    async fn create_event(&self, event: &NewEvent) -> Result<EventRecord, EventServiceError> {
        let rows = [EventInsertRow::from(event)];
        let res = self
            .authorize(self.http.post(self.table_url.clone()))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let res = check_status(res).await?;

        let created: Vec<EventRow> = res.json().await?;
        let record = created
            .into_iter()
            .next()
            .map(EventRecord::from)
            .ok_or(EventServiceError::EmptyResponse)?;
        info!(event_id = record.id.0, title = %record.title, "event created");
        Ok(record)
    }

    async fn list_events(&self) -> Result<Vec<EventRecord>, EventServiceError> {
        let res = self
            .authorize(self.http.get(self.table_url.clone()))
            .query(&[("select", "*")])
            .send()
            .await?;
        let res = check_status(res).await?;

        let rows: Vec<EventRow> = res.json().await?;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }
}

async fn check_status(res: Response) -> Result<Response, EventServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body: RestErrorBody = res.json().await.unwrap_or_default();
    let code = ErrorCode::from_status(status.as_u16());
    warn!(status = status.as_u16(), ?code, message = %body.summary(), "event service rejected request");
    Err(ApiException::new(code, body.summary()).into())
}

#[cfg(test)]
#[path = "tests/event_service_tests.rs"]
mod tests;
