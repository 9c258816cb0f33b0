//! Appointment state for one view.
//!
//! All mutation goes through the async operations below. Operations never
//! return transport errors to the caller: failures land in a single error slot
//! (`error()`), and the return value only says whether the operation took
//! effect. The lock is never held across an `.await`.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::api::AppointmentTransport;
use crate::calendar;
use crate::error::ClientError;
use crate::lifecycle::{self, Action, Transition};
use crate::models::{
    Appointment, AppointmentFilters, AppointmentStatus, CreateAppointmentRequest, TimeSlot,
};
use crate::scope::ScopeToken;
use crate::session::{Role, SessionContext};

pub struct AppointmentStore {
    transport: Arc<dyn AppointmentTransport>,
    session: SessionContext,
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    appointments: Vec<Appointment>,
    loading: bool,
    list_generation: u64,
    last_filters: AppointmentFilters,

    slots: Vec<TimeSlot>,
    slots_date: Option<NaiveDate>,
    loading_slots: bool,

    creating: bool,
    in_flight: HashSet<i64>,
    error: Option<String>,
}

impl StoreState {
    fn upsert(&mut self, appointment: Appointment) {
        match self.appointments.iter_mut().find(|a| a.id == appointment.id) {
            Some(slot) => *slot = appointment,
            None => self.appointments.push(appointment),
        }
    }

    fn remove(&mut self, id: i64) {
        self.appointments.retain(|a| a.id != id);
    }
}

/// Marks an appointment id as busy until dropped, including when the owning
/// future is dropped mid-request.
struct InFlight<'a> {
    store: &'a AppointmentStore,
    id: i64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.state().in_flight.remove(&self.id);
    }
}

struct Creating<'a> {
    store: &'a AppointmentStore,
}

impl Drop for Creating<'_> {
    fn drop(&mut self) {
        self.store.state().creating = false;
    }
}

impl AppointmentStore {
    pub fn new(transport: Arc<dyn AppointmentTransport>, session: SessionContext) -> Self {
        Self {
            transport,
            session,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /* -------------------------
       Read side
    --------------------------*/

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.state().appointments.clone()
    }

    /// What the current user may see: students only their own appointments.
    pub fn visible_appointments(&self) -> Vec<Appointment> {
        let st = self.state();
        match self.session.role {
            Role::Student => st
                .appointments
                .iter()
                .filter(|a| a.user_id == self.session.user_id)
                .cloned()
                .collect(),
            Role::FrontDesk | Role::Admin => st.appointments.clone(),
        }
    }

    pub fn appointment(&self, id: i64) -> Option<Appointment> {
        self.state().appointments.iter().find(|a| a.id == id).cloned()
    }

    pub fn slots(&self) -> Vec<TimeSlot> {
        self.state().slots.clone()
    }

    pub fn slots_date(&self) -> Option<NaiveDate> {
        self.state().slots_date
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn is_loading_slots(&self) -> bool {
        self.state().loading_slots
    }

    pub fn is_creating(&self) -> bool {
        self.state().creating
    }

    /// True while a mutation for `id` is in flight; its controls must be disabled.
    pub fn is_submitting(&self, id: i64) -> bool {
        self.state().in_flight.contains(&id)
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Move the current error out, e.g. into the dialog that caused it.
    pub fn take_error(&self) -> Option<String> {
        self.state().error.take()
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    pub fn status_counts(&self) -> BTreeMap<AppointmentStatus, usize> {
        calendar::status_counts(&self.state().appointments)
    }

    /* -------------------------
       Fetching
    --------------------------*/

    /// Replace the list with the server's answer. On failure the previous list is kept.
    pub async fn fetch_appointments(&self, filters: AppointmentFilters, token: &ScopeToken) -> bool {
        let generation = {
            let mut st = self.state();
            st.error = None;
            st.loading = true;
            st.list_generation += 1;
            st.last_filters = filters.clone();
            st.list_generation
        };

        let result = token.run(self.transport.list(&filters)).await;

        let mut st = self.state();
        if st.list_generation != generation {
            debug!("appointment list superseded by a newer fetch");
            return false;
        }
        st.loading = false;
        if token.is_cancelled() {
            debug!("appointment list dropped: view closed");
            return false;
        }
        match result {
            Ok(list) => {
                debug!(count = list.len(), "appointments loaded");
                st.appointments = list;
                true
            }
            Err(ClientError::Cancelled) => false,
            Err(e) => {
                st.error = Some(e.user_message("load appointments"));
                false
            }
        }
    }

    /// Re-run the last list query.
    pub async fn refetch(&self, token: &ScopeToken) -> bool {
        let filters = self.state().last_filters.clone();
        self.fetch_appointments(filters, token).await
    }

    /// Load slots for `date`. Slots for any other date are cleared immediately,
    /// and an answer that arrives after the date changed again is dropped. A
    /// failed re-fetch of the same date keeps the slots already shown.
    pub async fn fetch_available_slots(&self, date: NaiveDate, token: &ScopeToken) -> bool {
        {
            let mut st = self.state();
            st.error = None;
            if st.slots_date != Some(date) {
                st.slots.clear();
                st.slots_date = Some(date);
            }
            st.loading_slots = true;
        }

        let result = token.run(self.transport.available_slots(Some(date))).await;

        let mut st = self.state();
        if st.slots_date != Some(date) {
            debug!(%date, "slot answer dropped: date changed");
            return false;
        }
        st.loading_slots = false;
        if token.is_cancelled() {
            return false;
        }
        match result {
            Ok(slots) => {
                st.slots = tidy_slots(date, slots);
                true
            }
            Err(ClientError::Cancelled) => false,
            Err(e) => {
                st.error = Some(e.user_message("load available slots"));
                false
            }
        }
    }

    /// Read one appointment by id and keep it, whether or not the last list
    /// fetch included it. A 404 drops any local copy.
    pub async fn fetch_appointment(&self, id: i64, token: &ScopeToken) -> Option<Appointment> {
        self.clear_error();
        match token.run(self.transport.get_by_id(id)).await {
            Ok(a) => {
                if token.is_cancelled() {
                    return None;
                }
                self.state().upsert(a.clone());
                Some(a)
            }
            Err(e) => {
                self.fail(Some(id), e, "load appointment", token);
                None
            }
        }
    }

    /* -------------------------
       Mutations
    --------------------------*/

    pub async fn create(
        &self,
        req: CreateAppointmentRequest,
        token: &ScopeToken,
    ) -> Option<Appointment> {
        let _creating = {
            let mut st = self.state();
            if st.creating {
                warn!("create ignored: a submission is already in flight");
                return None;
            }
            st.creating = true;
            st.error = None;
            Creating { store: self }
        };

        let created = match token.run(self.transport.create(&req)).await {
            Ok(a) => a,
            Err(e) => {
                self.fail(None, e, "schedule appointment", token);
                return None;
            }
        };
        info!(appointment_id = created.id, "appointment scheduled");
        self.refresh_one(created, token).await
    }

    pub async fn approve(&self, id: i64, token: &ScopeToken) -> Option<Appointment> {
        self.transition(id, Transition::Approve, token).await
    }

    pub async fn complete(&self, id: i64, token: &ScopeToken) -> Option<Appointment> {
        self.transition(id, Transition::Complete, token).await
    }

    pub async fn cancel(&self, id: i64, token: &ScopeToken) -> Option<Appointment> {
        self.transition(id, Transition::Cancel, token).await
    }

    pub async fn transition(
        &self,
        id: i64,
        transition: Transition,
        token: &ScopeToken,
    ) -> Option<Appointment> {
        let action_text = format!("{} appointment", transition.verb());
        let _busy = self.begin_mutation(id)?;
        let current = self.current(id, &action_text, token).await?;

        let checked = lifecycle::apply(current.status, transition).and_then(|next| {
            lifecycle::authorize(&current, &self.session, Action::from(transition))?;
            Ok(next)
        });
        let target = match checked {
            Ok(next) => next,
            Err(e) => {
                warn!(appointment_id = id, "rejected: {e}");
                self.state().error = Some(e.to_string());
                return None;
            }
        };

        let updated = match token.run(self.transport.update_status(id, target)).await {
            Ok(a) => a,
            Err(e) => {
                self.fail(Some(id), e, &action_text, token);
                return None;
            }
        };
        info!(appointment_id = id, status = %target, "appointment {}d", transition.verb());
        self.refresh_one(updated, token).await
    }

    /// Move an appointment to a new date/time. The status is always sent as `Rescheduled`.
    pub async fn reschedule(
        &self,
        id: i64,
        mut req: CreateAppointmentRequest,
        token: &ScopeToken,
    ) -> Option<Appointment> {
        req.status = Some(AppointmentStatus::Rescheduled);
        let _busy = self.begin_mutation(id)?;
        let current = self.current(id, "reschedule appointment", token).await?;

        if let Err(e) = lifecycle::authorize(&current, &self.session, Action::Reschedule) {
            warn!(appointment_id = id, "rejected: {e}");
            self.state().error = Some(e.to_string());
            return None;
        }

        let updated = match token.run(self.transport.reschedule(id, &req)).await {
            Ok(a) => a,
            Err(e) => {
                self.fail(Some(id), e, "reschedule appointment", token);
                return None;
            }
        };
        info!(
            appointment_id = id,
            date = %req.scheduled_date,
            time = %req.scheduled_time,
            "appointment rescheduled"
        );
        self.refresh_one(updated, token).await
    }

    pub async fn delete(&self, id: i64, token: &ScopeToken) -> bool {
        let Some(_busy) = self.begin_mutation(id) else {
            return false;
        };
        match token.run(self.transport.delete(id)).await {
            Ok(resp) => {
                if token.is_cancelled() {
                    return false;
                }
                info!(
                    appointment_id = id,
                    "appointment deleted: {}",
                    resp.message.as_deref().unwrap_or("ok")
                );
                self.state().remove(id);
                true
            }
            Err(e) => {
                self.fail(Some(id), e, "delete appointment", token);
                false
            }
        }
    }

    /* -------------------------
       Helpers
    --------------------------*/

    fn begin_mutation(&self, id: i64) -> Option<InFlight<'_>> {
        let mut st = self.state();
        if !st.in_flight.insert(id) {
            warn!(appointment_id = id, "ignored: a request for this appointment is already in flight");
            return None;
        }
        st.error = None;
        Some(InFlight { store: self, id })
    }

    /// The local copy, or a fresh read when this view has not loaded it.
    async fn current(&self, id: i64, action: &str, token: &ScopeToken) -> Option<Appointment> {
        if let Some(a) = self.appointment(id) {
            return Some(a);
        }
        match token.run(self.transport.get_by_id(id)).await {
            Ok(a) => Some(a),
            Err(e) => {
                self.fail(Some(id), e, action, token);
                None
            }
        }
    }

    /// Re-read the mutated appointment and replace it in place. If the re-read
    /// fails for any reason other than 404, the mutation response is used.
    async fn refresh_one(&self, mutated: Appointment, token: &ScopeToken) -> Option<Appointment> {
        let id = mutated.id;
        let fresh = match token.run(self.transport.get_by_id(id)).await {
            Ok(a) => a,
            Err(ClientError::Cancelled) => return None,
            Err(e) if e.is_not_found() => {
                self.fail(Some(id), e, "load appointment", token);
                return None;
            }
            Err(e) => {
                warn!(appointment_id = id, "re-read failed, keeping mutation response: {e}");
                mutated
            }
        };
        if token.is_cancelled() {
            return None;
        }
        self.state().upsert(fresh.clone());
        Some(fresh)
    }

    fn fail(&self, id: Option<i64>, e: ClientError, action: &str, token: &ScopeToken) {
        if matches!(e, ClientError::Cancelled) || token.is_cancelled() {
            debug!("{action} dropped: view closed");
            return;
        }
        let mut st = self.state();
        if let (Some(id), true) = (id, e.is_not_found()) {
            st.remove(id);
        }
        st.error = Some(e.user_message(action));
    }
}

/// Keep only slots for `date`, ordered by start time, one per start time.
fn tidy_slots(date: NaiveDate, mut slots: Vec<TimeSlot>) -> Vec<TimeSlot> {
    let before = slots.len();
    slots.retain(|s| s.date == date);
    slots.sort_by_key(|s| s.start_time);
    slots.dedup_by_key(|s| s.start_time);
    if slots.len() != before {
        warn!(%date, dropped = before - slots.len(), "backend returned foreign or duplicate slots");
    }
    slots
}
