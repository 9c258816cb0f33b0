//! In-memory guidance-office backend served over HTTP for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use guidance_scheduler::{
    api::ApiClient,
    models::{
        AdminSchedule, Appointment, AppointmentStatus, CreateAdminScheduleRequest,
        CreateAppointmentRequest, TimeSlot, UpdateStatusRequest, UserProfile,
    },
    session::{Role, SessionContext},
    store::AppointmentStore,
};

pub const STUDENT_TOKEN: &str = "student-token";
pub const OTHER_STUDENT_TOKEN: &str = "other-student-token";
pub const DESK_TOKEN: &str = "desk-token";
pub const ADMIN_TOKEN: &str = "admin-token";

pub const STUDENT_ID: i64 = 42;
pub const OTHER_STUDENT_ID: i64 = 43;
pub const DESK_ID: i64 = 7;
pub const ADMIN_ID: i64 = 1;

/// Start times offered every day; each slot lasts one hour.
const SLOT_HOURS: [u32; 5] = [9, 10, 11, 13, 14];

/* ============================================================
   Errors
   ============================================================ */

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorObject,
}

#[derive(Debug, Serialize)]
struct ErrorObject {
    code: String,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
}

impl ApiError {
    fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    fn appointment_not_found() -> Self {
        ApiError::NotFound("NOT_FOUND", "Appointment not found".into())
    }

    fn slot_taken() -> Self {
        ApiError::Conflict("SLOT_TAKEN", "That time slot is no longer available".into())
    }

    fn staff_only() -> Self {
        ApiError::Forbidden("FORBIDDEN", "Only staff can manage schedules".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(c, m) => (StatusCode::UNAUTHORIZED, c, m),
            ApiError::Forbidden(c, m) => (StatusCode::FORBIDDEN, c, m),
            ApiError::BadRequest(c, m) => (StatusCode::BAD_REQUEST, c, m),
            ApiError::NotFound(c, m) => (StatusCode::NOT_FOUND, c, m),
            ApiError::Conflict(c, m) => (StatusCode::CONFLICT, c, m),
        };
        let body = ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/* ============================================================
   State
   ============================================================ */

#[derive(Default)]
pub struct Backend {
    pub appointments: Vec<Appointment>,
    pub schedules: Vec<AdminSchedule>,
    pub users: HashMap<i64, UserProfile>,
    next_id: i64,
}

impl Backend {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn slot_taken(&self, date: NaiveDate, time: NaiveTime, except: Option<i64>) -> bool {
        self.appointments
            .iter()
            .any(|a| Some(a.id) != except && a.is_live() && a.slot_key() == (date, time))
    }
}

type Shared = Arc<Mutex<Backend>>;

#[derive(Debug, Clone, Copy)]
struct Caller {
    user_id: i64,
    role: Role,
}

fn caller_for(token: &str) -> Option<Caller> {
    let (user_id, role) = match token {
        STUDENT_TOKEN => (STUDENT_ID, Role::Student),
        OTHER_STUDENT_TOKEN => (OTHER_STUDENT_ID, Role::Student),
        DESK_TOKEN => (DESK_ID, Role::FrontDesk),
        ADMIN_TOKEN => (ADMIN_ID, Role::Admin),
        _ => return None,
    };
    Some(Caller { user_id, role })
}

impl FromRequestParts<Shared> for Caller {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &Shared,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;
            caller_for(authz.token()).ok_or_else(ApiError::session_expired)
        }
    }
}

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, Backend> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/* ============================================================
   Handlers
   ============================================================ */

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn list_appointments(
    State(state): State<Shared>,
    caller: Caller,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match q.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<AppointmentStatus>()
                .map_err(|e| ApiError::BadRequest("VALIDATION_ERROR", e))?,
        ),
        None => None,
    };
    let backend = lock(&state);
    let data: Vec<&Appointment> = backend
        .appointments
        .iter()
        .filter(|a| caller.role.is_staff() || a.user_id == caller.user_id)
        .filter(|a| status.is_none_or(|s| a.status == s))
        .filter(|a| q.start_date.is_none_or(|d| a.scheduled_date >= d))
        .filter(|a| q.end_date.is_none_or(|d| a.scheduled_date <= d))
        .collect();
    Ok(Json(json!({ "message": "Appointments retrieved", "data": data })))
}

async fn get_appointment(
    State(state): State<Shared>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Appointment>, ApiError> {
    let backend = lock(&state);
    backend
        .appointments
        .iter()
        .find(|a| a.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(ApiError::appointment_not_found)
}

async fn create_appointment(
    State(state): State<Shared>,
    caller: Caller,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "Reason is required".into()));
    }
    let mut backend = lock(&state);
    if backend.slot_taken(req.scheduled_date, req.scheduled_time, None) {
        return Err(ApiError::slot_taken());
    }
    let created = Appointment {
        id: backend.next_id(),
        user_id: caller.user_id,
        reason: req.reason,
        scheduled_date: req.scheduled_date,
        scheduled_time: req.scheduled_time,
        concern_category: Some(req.concern_category),
        status: req.status.unwrap_or(AppointmentStatus::Pending),
        created_at: Some("2031-03-01T08:00:00Z".into()),
        updated_at: None,
    };
    backend.appointments.push(created.clone());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Appointment created", "data": created })),
    ))
}

async fn update_appointment(
    State(state): State<Shared>,
    _caller: Caller,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Appointment>, ApiError> {
    let mut backend = lock(&state);
    if body.get("scheduledDate").is_some() {
        let req: CreateAppointmentRequest = serde_json::from_value(body)
            .map_err(|e| ApiError::BadRequest("VALIDATION_ERROR", e.to_string()))?;
        if backend.slot_taken(req.scheduled_date, req.scheduled_time, Some(id)) {
            return Err(ApiError::slot_taken());
        }
        let a = backend
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(ApiError::appointment_not_found)?;
        a.reason = req.reason;
        a.scheduled_date = req.scheduled_date;
        a.scheduled_time = req.scheduled_time;
        a.concern_category = Some(req.concern_category);
        if let Some(status) = req.status {
            a.status = status;
        }
        return Ok(Json(a.clone()));
    }

    let req: UpdateStatusRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest("VALIDATION_ERROR", e.to_string()))?;
    let a = backend
        .appointments
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(ApiError::appointment_not_found)?;
    a.status = req.status;
    Ok(Json(a.clone()))
}

async fn delete_appointment(
    State(state): State<Shared>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut backend = lock(&state);
    let before = backend.appointments.len();
    backend.appointments.retain(|a| a.id != id);
    if backend.appointments.len() == before {
        return Err(ApiError::appointment_not_found());
    }
    Ok(Json(json!({ "message": "Appointment deleted" })))
}

#[derive(Debug, Deserialize)]
struct SlotQuery {
    date: NaiveDate,
}

async fn available_slots(
    State(state): State<Shared>,
    _caller: Caller,
    Query(q): Query<SlotQuery>,
) -> Json<Vec<TimeSlot>> {
    let backend = lock(&state);
    let slots = SLOT_HOURS
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let start = NaiveTime::from_hms_opt(*h, 0, 0)?;
            Some(TimeSlot {
                slot_id: i as i64 + 1,
                date: q.date,
                start_time: start,
                end_time: start + chrono::Duration::hours(1),
                is_not_taken: !backend.slot_taken(q.date, start, None),
            })
        })
        .collect();
    Json(slots)
}

async fn get_user(
    State(state): State<Shared>,
    _caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let backend = lock(&state);
    let user = backend
        .users
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "User not found".into()))?;
    Ok(Json(json!({ "data": user })))
}

async fn list_schedules(
    State(state): State<Shared>,
    caller: Caller,
) -> Result<Json<Vec<AdminSchedule>>, ApiError> {
    if !caller.role.is_staff() {
        return Err(ApiError::staff_only());
    }
    Ok(Json(lock(&state).schedules.clone()))
}

async fn create_schedule(
    State(state): State<Shared>,
    caller: Caller,
    Json(req): Json<CreateAdminScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !caller.role.is_staff() {
        return Err(ApiError::staff_only());
    }
    let mut backend = lock(&state);
    let created = AdminSchedule {
        id: backend.next_id(),
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        is_available: req.is_available.unwrap_or(true),
        note: req.note,
    };
    backend.schedules.push(created.clone());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Schedule created", "data": created })),
    ))
}

async fn update_schedule(
    State(state): State<Shared>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(req): Json<CreateAdminScheduleRequest>,
) -> Result<Json<AdminSchedule>, ApiError> {
    if !caller.role.is_staff() {
        return Err(ApiError::staff_only());
    }
    let mut backend = lock(&state);
    let s = backend
        .schedules
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Schedule not found".into()))?;
    s.date = req.date;
    s.start_time = req.start_time;
    s.end_time = req.end_time;
    if let Some(available) = req.is_available {
        s.is_available = available;
    }
    s.note = req.note;
    Ok(Json(s.clone()))
}

async fn delete_schedule(
    State(state): State<Shared>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !caller.role.is_staff() {
        return Err(ApiError::staff_only());
    }
    let mut backend = lock(&state);
    let before = backend.schedules.len();
    backend.schedules.retain(|s| s.id != id);
    if backend.schedules.len() == before {
        return Err(ApiError::NotFound("NOT_FOUND", "Schedule not found".into()));
    }
    Ok(Json(json!({ "message": "Schedule deleted" })))
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/slots", get(available_slots))
        .route(
            "/appointments/{id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/users/{id}", get(get_user))
        .route("/admin/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/admin/schedules/{id}",
            axum::routing::put(update_schedule).delete(delete_schedule),
        );

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/* ============================================================
   Test app
   ============================================================ */

pub struct TestApp {
    pub base_url: String,
    pub backend: Shared,
}

pub async fn spawn_app() -> TestApp {
    let backend: Shared = Arc::new(Mutex::new(Backend::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let app = router(backend.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend crashed");
    });

    TestApp {
        base_url: format!("http://127.0.0.1:{port}/api/v1"),
        backend,
    }
}

pub fn student() -> SessionContext {
    SessionContext::new(STUDENT_TOKEN, STUDENT_ID, Role::Student)
}

pub fn other_student() -> SessionContext {
    SessionContext::new(OTHER_STUDENT_TOKEN, OTHER_STUDENT_ID, Role::Student)
}

pub fn front_desk() -> SessionContext {
    SessionContext::new(DESK_TOKEN, DESK_ID, Role::FrontDesk)
}

pub fn admin() -> SessionContext {
    SessionContext::new(ADMIN_TOKEN, ADMIN_ID, Role::Admin)
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

impl TestApp {
    pub fn client(&self, session: SessionContext) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(self.base_url.clone(), session, Duration::from_secs(5)).unwrap())
    }

    pub fn store(&self, session: SessionContext) -> AppointmentStore {
        AppointmentStore::new(self.client(session.clone()), session)
    }

    pub fn seed(&self, date: NaiveDate, time: NaiveTime, status: AppointmentStatus, user_id: i64) -> i64 {
        let mut backend = lock(&self.backend);
        let id = backend.next_id();
        backend.appointments.push(Appointment {
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

    pub fn add_user(&self, id: i64, first: &str, last: &str) {
        lock(&self.backend).users.insert(
            id,
            UserProfile {
                id,
                first_name: first.into(),
                last_name: last.into(),
                student_number: Some(format!("2031-{id:05}")),
            },
        );
    }

    pub fn stored(&self, id: i64) -> Option<Appointment> {
        lock(&self.backend).appointments.iter().find(|a| a.id == id).cloned()
    }

    pub fn all_stored(&self) -> Vec<Appointment> {
        lock(&self.backend).appointments.clone()
    }
}
