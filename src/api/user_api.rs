// src/api/user_api.rs

use async_trait::async_trait;
use reqwest::Method;

use super::{ApiClient, UserDirectory};
use crate::{error::ClientError, models::UserProfile};

#[async_trait]
impl UserDirectory for ApiClient {
    async fn get_user(&self, id: i64) -> Result<UserProfile, ClientError> {
        let rb = self.request(Method::GET, &format!("/users/{id}"))?;
        self.fetch_one(rb, "look up user").await
    }
}
