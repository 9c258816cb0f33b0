use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::dates;

/* -------------------------
   Status
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rescheduled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Approved => "Approved",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Rescheduled => "Rescheduled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Pending, Approved or Rescheduled: the appointment still holds its slot.
    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }

    /// Approved or Rescheduled: shown on the calendar and in "upcoming".
    pub fn is_booked(self) -> bool {
        matches!(self, AppointmentStatus::Approved | AppointmentStatus::Rescheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            "rescheduled" => Ok(AppointmentStatus::Rescheduled),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

impl TryFrom<String> for AppointmentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppointmentStatus> for String {
    fn from(value: AppointmentStatus) -> Self {
        value.as_str().to_string()
    }
}

/* -------------------------
   Appointment
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    #[serde(alias = "user_id")]
    pub user_id: i64,
    pub reason: String,
    #[serde(with = "dates::flexible_date", alias = "scheduled_date")]
    pub scheduled_date: NaiveDate,
    #[serde(with = "dates::flexible_time", alias = "scheduled_time")]
    pub scheduled_time: NaiveTime,
    #[serde(default, alias = "concern_category")]
    pub concern_category: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

impl Appointment {
    /// (date, time) pair that must be unique among live appointments.
    pub fn slot_key(&self) -> (NaiveDate, NaiveTime) {
        (self.scheduled_date, self.scheduled_time)
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(alias = "slot_id", alias = "id")]
    pub slot_id: i64,
    #[serde(with = "dates::flexible_date")]
    pub date: NaiveDate,
    #[serde(with = "dates::flexible_time", alias = "start_time")]
    pub start_time: NaiveTime,
    #[serde(with = "dates::flexible_time", alias = "end_time")]
    pub end_time: NaiveTime,
    #[serde(alias = "is_not_taken")]
    pub is_not_taken: bool,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub reason: String,
    #[serde(with = "dates::flexible_date")]
    pub scheduled_date: NaiveDate,
    #[serde(with = "dates::flexible_time")]
    pub scheduled_time: NaiveTime,
    #[serde(default)]
    pub concern_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilters {
    pub status: Option<AppointmentStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AppointmentFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.to_string()));
        }
        if let Some(d) = self.start_date {
            pairs.push(("start_date", dates::format_date(d)));
        }
        if let Some(d) = self.end_date {
            pairs.push(("end_date", dates::format_date(d)));
        }
        pairs
    }
}

/// The backend answers either `T` or `{message, data: T}` for the same endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        #[serde(default)]
        message: Option<String>,
        data: T,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data, .. } => data,
            Envelope::Bare(data) => data,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/* -------------------------
   Admin schedules
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSchedule {
    pub id: i64,
    #[serde(with = "dates::flexible_date")]
    pub date: NaiveDate,
    #[serde(with = "dates::flexible_time", alias = "start_time")]
    pub start_time: NaiveTime,
    #[serde(with = "dates::flexible_time", alias = "end_time")]
    pub end_time: NaiveTime,
    #[serde(default = "default_true", alias = "is_available")]
    pub is_available: bool,
    #[serde(default)]
    pub note: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminScheduleRequest {
    #[serde(with = "dates::flexible_date")]
    pub date: NaiveDate,
    #[serde(with = "dates::flexible_time")]
    pub start_time: NaiveTime,
    #[serde(with = "dates::flexible_time")]
    pub end_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ScheduleFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(d) = self.start_date {
            pairs.push(("start_date", dates::format_date(d)));
        }
        if let Some(d) = self.end_date {
            pairs.push(("end_date", dates::format_date(d)));
        }
        pairs
    }
}

/* -------------------------
   Users
--------------------------*/

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    #[serde(default, alias = "first_name")]
    pub first_name: String,
    #[serde(default, alias = "last_name")]
    pub last_name: String,
    #[serde(default, alias = "student_number")]
    pub student_number: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}
