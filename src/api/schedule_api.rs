// src/api/schedule_api.rs

use async_trait::async_trait;
use reqwest::Method;

use super::{ApiClient, ScheduleTransport};
use crate::{
    error::ClientError,
    models::{AdminSchedule, CreateAdminScheduleRequest, MessageResponse, ScheduleFilters},
};

#[async_trait]
impl ScheduleTransport for ApiClient {
    async fn list_admin_schedules(
        &self,
        filters: &ScheduleFilters,
    ) -> Result<Vec<AdminSchedule>, ClientError> {
        let rb = self
            .request(Method::GET, "/admin/schedules")?
            .query(&filters.query_pairs());
        self.fetch_list(rb, "list schedules").await
    }

    async fn create_admin_schedule(
        &self,
        req: &CreateAdminScheduleRequest,
    ) -> Result<AdminSchedule, ClientError> {
        let rb = self.request(Method::POST, "/admin/schedules")?.json(req);
        self.fetch_one(rb, "create schedule").await
    }

    async fn update_admin_schedule(
        &self,
        id: i64,
        req: &CreateAdminScheduleRequest,
    ) -> Result<AdminSchedule, ClientError> {
        let rb = self
            .request(Method::PUT, &format!("/admin/schedules/{id}"))?
            .json(req);
        self.fetch_one(rb, "update schedule").await
    }

    async fn delete_schedule(&self, id: i64) -> Result<MessageResponse, ClientError> {
        let rb = self.request(Method::DELETE, &format!("/admin/schedules/{id}"))?;
        self.fetch_message(rb, "delete schedule").await
    }
}
