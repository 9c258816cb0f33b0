// src/api/appointment_api.rs

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Method;

use super::{ApiClient, AppointmentTransport};
use crate::{
    dates,
    error::ClientError,
    models::{
        Appointment, AppointmentFilters, AppointmentStatus, CreateAppointmentRequest,
        MessageResponse, TimeSlot, UpdateStatusRequest,
    },
};

/*
Endpoints (relative to the configured base, normally /api/v1):
GET    /appointments?status&start_date&end_date
GET    /appointments/{id}
POST   /appointments
PUT    /appointments/{id}          status-only or full reschedule payload
DELETE /appointments/{id}
GET    /appointments/slots?date=YYYY-MM-DD
*/

#[async_trait]
impl AppointmentTransport for ApiClient {
    async fn list(&self, filters: &AppointmentFilters) -> Result<Vec<Appointment>, ClientError> {
        let rb = self
            .request(Method::GET, "/appointments")?
            .query(&filters.query_pairs());
        self.fetch_list(rb, "list appointments").await
    }

    async fn get_by_id(&self, id: i64) -> Result<Appointment, ClientError> {
        let rb = self.request(Method::GET, &format!("/appointments/{id}"))?;
        self.fetch_one(rb, "get appointment").await
    }

    async fn create(&self, req: &CreateAppointmentRequest) -> Result<Appointment, ClientError> {
        let rb = self.request(Method::POST, "/appointments")?.json(req);
        self.fetch_one(rb, "create appointment").await
    }

    async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, ClientError> {
        let rb = self
            .request(Method::PUT, &format!("/appointments/{id}"))?
            .json(&UpdateStatusRequest { status });
        self.fetch_one(rb, "update appointment status").await
    }

    async fn reschedule(
        &self,
        id: i64,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, ClientError> {
        let rb = self
            .request(Method::PUT, &format!("/appointments/{id}"))?
            .json(req);
        self.fetch_one(rb, "reschedule appointment").await
    }

    async fn delete(&self, id: i64) -> Result<MessageResponse, ClientError> {
        let rb = self.request(Method::DELETE, &format!("/appointments/{id}"))?;
        self.fetch_message(rb, "delete appointment").await
    }

    async fn available_slots(&self, date: Option<NaiveDate>) -> Result<Vec<TimeSlot>, ClientError> {
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        let rb = self
            .request(Method::GET, "/appointments/slots")?
            .query(&[("date", dates::format_date(date))]);
        self.fetch_list(rb, "load available slots").await
    }
}
