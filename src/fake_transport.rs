use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::Mutex;

use crate::api::{AppointmentTransport, UserDirectory};
use crate::error::ClientError;
use crate::models::{
    Appointment, AppointmentFilters, AppointmentStatus, CreateAppointmentRequest,
    MessageResponse, TimeSlot, UserProfile,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Get(i64),
    Create(CreateAppointmentRequest),
    UpdateStatus(i64, AppointmentStatus),
    Reschedule(i64, CreateAppointmentRequest),
    Delete(i64),
    Slots(Option<NaiveDate>),
}

/// In-memory backend with the same slot rule the server enforces.
pub struct FakeTransport {
    appointments: Mutex<Vec<Appointment>>,
    slots: Mutex<HashMap<NaiveDate, Vec<TimeSlot>>>,
    calls: Mutex<Vec<Call>>,
    fail_next: Mutex<Option<ClientError>>,
    next_id: AtomicI64,
    acting_user: i64,
    delay: Option<Duration>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            appointments: Mutex::new(Vec::new()),
            slots: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            next_id: AtomicI64::new(1),
            acting_user: 42,
            delay: None,
        }
    }
}

impl FakeTransport {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn seed(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        status: AppointmentStatus,
        user_id: i64,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.appointments.lock().await.push(Appointment {
            id,
            user_id,
            reason: "Seeded".into(),
            scheduled_date: date,
            scheduled_time: time,
            concern_category: None,
            status,
            created_at: None,
            updated_at: None,
        });
        id
    }

    pub async fn add_slot(&self, date: NaiveDate, start: NaiveTime, free: bool) {
        let mut slots = self.slots.lock().await;
        let list = slots.entry(date).or_default();
        let slot_id = list.len() as i64 + 1;
        list.push(TimeSlot {
            slot_id,
            date,
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            is_not_taken: free,
        });
    }

    pub async fn remove(&self, id: i64) {
        self.appointments.lock().await.retain(|a| a.id != id);
    }

    pub async fn fail_next(&self, e: ClientError) {
        *self.fail_next.lock().await = Some(e);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    async fn enter(&self, call: Call) -> Result<(), ClientError> {
        self.calls.lock().await.push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.fail_next.lock().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn slot_taken(list: &[Appointment], req: &CreateAppointmentRequest, except: Option<i64>) -> bool {
        list.iter().any(|a| {
            Some(a.id) != except
                && a.is_live()
                && a.slot_key() == (req.scheduled_date, req.scheduled_time)
        })
    }
}

fn conflict() -> ClientError {
    ClientError::Conflict("That time slot is no longer available".into())
}

fn not_found() -> ClientError {
    ClientError::NotFound("Appointment not found".into())
}

#[async_trait]
impl AppointmentTransport for FakeTransport {
    async fn list(&self, _filters: &AppointmentFilters) -> Result<Vec<Appointment>, ClientError> {
        self.enter(Call::List).await?;
        Ok(self.appointments.lock().await.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Appointment, ClientError> {
        self.enter(Call::Get(id)).await?;
        self.appointments
            .lock()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create(&self, req: &CreateAppointmentRequest) -> Result<Appointment, ClientError> {
        self.enter(Call::Create(req.clone())).await?;
        let mut list = self.appointments.lock().await;
        if Self::slot_taken(&list, req, None) {
            return Err(conflict());
        }
        let created = Appointment {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id: self.acting_user,
            reason: req.reason.clone(),
            scheduled_date: req.scheduled_date,
            scheduled_time: req.scheduled_time,
            concern_category: Some(req.concern_category.clone()),
            status: req.status.unwrap_or(AppointmentStatus::Pending),
            created_at: None,
            updated_at: None,
        };
        list.push(created.clone());
        Ok(created)
    }

    async fn update_status(
        &self,
        id: i64,
        status: AppointmentStatus,
    ) -> Result<Appointment, ClientError> {
        self.enter(Call::UpdateStatus(id, status)).await?;
        let mut list = self.appointments.lock().await;
        let a = list.iter_mut().find(|a| a.id == id).ok_or_else(not_found)?;
        a.status = status;
        Ok(a.clone())
    }

    async fn reschedule(
        &self,
        id: i64,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, ClientError> {
        self.enter(Call::Reschedule(id, req.clone())).await?;
        let mut list = self.appointments.lock().await;
        if Self::slot_taken(&list, req, Some(id)) {
            return Err(conflict());
        }
        let a = list.iter_mut().find(|a| a.id == id).ok_or_else(not_found)?;
        a.reason = req.reason.clone();
        a.scheduled_date = req.scheduled_date;
        a.scheduled_time = req.scheduled_time;
        a.concern_category = Some(req.concern_category.clone());
        if let Some(status) = req.status {
            a.status = status;
        }
        Ok(a.clone())
    }

    async fn delete(&self, id: i64) -> Result<MessageResponse, ClientError> {
        self.enter(Call::Delete(id)).await?;
        let mut list = self.appointments.lock().await;
        let before = list.len();
        list.retain(|a| a.id != id);
        if list.len() == before {
            return Err(not_found());
        }
        Ok(MessageResponse {
            message: Some("Appointment deleted".into()),
        })
    }

    async fn available_slots(&self, date: Option<NaiveDate>) -> Result<Vec<TimeSlot>, ClientError> {
        self.enter(Call::Slots(date)).await?;
        let Some(date) = date else {
            return Ok(Vec::new());
        };
        Ok(self.slots.lock().await.get(&date).cloned().unwrap_or_default())
    }
}

/// Directory that knows a fixed set of users and fails for the rest.
#[derive(Default)]
pub struct FakeDirectory {
    pub users: HashMap<i64, UserProfile>,
}

impl FakeDirectory {
    pub fn with(users: &[(i64, &str, &str)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(id, first, last)| {
                    (
                        *id,
                        UserProfile {
                            id: *id,
                            first_name: first.to_string(),
                            last_name: last.to_string(),
                            student_number: None,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn get_user(&self, id: i64) -> Result<UserProfile, ClientError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("User not found".into()))
    }
}
