use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    error::ClientError,
    models::{
        AdminSchedule, Appointment, AppointmentFilters, AppointmentStatus,
        CreateAdminScheduleRequest, CreateAppointmentRequest, Envelope, MessageResponse,
        ScheduleFilters, TimeSlot, UserProfile,
    },
    session::SessionContext,
};

pub mod appointment_api;
pub mod schedule_api;
pub mod user_api;

/* ============================================================
   Transport seams
   ============================================================ */

/// Typed calls against `/appointments`. Implementations own no state.
#[async_trait]
pub trait AppointmentTransport: Send + Sync + 'static {
    async fn list(&self, filters: &AppointmentFilters) -> Result<Vec<Appointment>, ClientError>;
    async fn get_by_id(&self, id: i64) -> Result<Appointment, ClientError>;
    async fn create(&self, req: &CreateAppointmentRequest) -> Result<Appointment, ClientError>;
    async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, ClientError>;
    async fn reschedule(
        &self,
        id: i64,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, ClientError>;
    async fn delete(&self, id: i64) -> Result<MessageResponse, ClientError>;
    /// Slots for `date`, or for today when `None`.
    async fn available_slots(&self, date: Option<NaiveDate>) -> Result<Vec<TimeSlot>, ClientError>;
}

/// Front-desk availability windows under `/admin/schedules`.
#[async_trait]
pub trait ScheduleTransport: Send + Sync + 'static {
    async fn list_admin_schedules(
        &self,
        filters: &ScheduleFilters,
    ) -> Result<Vec<AdminSchedule>, ClientError>;
    async fn create_admin_schedule(
        &self,
        req: &CreateAdminScheduleRequest,
    ) -> Result<AdminSchedule, ClientError>;
    async fn update_admin_schedule(
        &self,
        id: i64,
        req: &CreateAdminScheduleRequest,
    ) -> Result<AdminSchedule, ClientError>;
    async fn delete_schedule(&self, id: i64) -> Result<MessageResponse, ClientError>;
}

/// Student/user lookup used to put names next to appointments.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn get_user(&self, id: i64) -> Result<UserProfile, ClientError>;
}

/* ============================================================
   HTTP client
   ============================================================ */

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        session: SessionContext,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ClientError> {
        Self::new(cfg.api_base_url.clone(), cfg.session.clone(), cfg.request_timeout)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.url(path);
        debug!("{method} {url}");
        Ok(self
            .http
            .request(method, url)
            .headers(self.session.auth_headers()?))
    }

    /// Send and return the body of a 2xx response. Failures are logged and returned, never retried.
    async fn send(&self, rb: RequestBuilder, what: &str) -> Result<String, ClientError> {
        let resp = rb.send().await.map_err(|e| {
            error!("{what} failed: {e}");
            ClientError::from(e)
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            error!("{what}: reading body failed: {e}");
            ClientError::from(e)
        })?;

        if !status.is_success() {
            let err = ClientError::from_response(status, &body);
            error!(status = status.as_u16(), "{what} failed: {err}");
            return Err(err);
        }
        Ok(body)
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        what: &str,
    ) -> Result<T, ClientError> {
        let body = self.send(rb, what).await?;
        decode_one(&body).inspect_err(|e| error!("{what}: {e}"))
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        rb: RequestBuilder,
        what: &str,
    ) -> Result<Vec<T>, ClientError> {
        let body = self.send(rb, what).await?;
        decode_list(&body).inspect_err(|e| error!("{what}: {e}"))
    }

    async fn fetch_message(&self, rb: RequestBuilder, what: &str) -> Result<MessageResponse, ClientError> {
        let body = self.send(rb, what).await?;
        Ok(decode_message(&body, what))
    }
}

/* ============================================================
   Envelope normalization
   ============================================================ */

pub(crate) fn decode_one<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    Ok(serde_json::from_str::<Envelope<T>>(body)?.into_inner())
}

/// Empty bodies, `null`, `[]` and `{"data": null}` all decode to an empty list.
pub(crate) fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ClientError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str::<Envelope<Option<Vec<T>>>>(body)?
        .into_inner()
        .unwrap_or_default())
}

/// The call already succeeded, so a body that is not `{message}` is logged and
/// kept as plain text rather than failing it.
pub(crate) fn decode_message(body: &str, what: &str) -> MessageResponse {
    let body = body.trim();
    if body.is_empty() {
        return MessageResponse::default();
    }
    match serde_json::from_str::<MessageResponse>(body) {
        Ok(resp) => resp,
        Err(e) => {
            warn!("{what}: response is not a message object ({e}), keeping raw text");
            MessageResponse {
                message: Some(body.to_string()),
            }
        }
    }
}
