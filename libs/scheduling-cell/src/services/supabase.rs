use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{decode_rows, return_representation, DatabaseError, SupabaseClient};

use crate::models::{
    hhmm, Appointment, AppointmentChange, AppointmentStatus, AvailabilityWindow, ClinicianScope,
};
use crate::services::readers::{AppointmentReader, AppointmentWriter, AvailabilityReader};

pub struct SupabaseAvailabilityStore {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AvailabilityReader for SupabaseAvailabilityStore {
    async fn windows_for_day(
        &self,
        clinician_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointment_availabilities?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            clinician_id, day_of_week
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        decode_rows(result)
    }
}

/// Appointments table. A partial unique index on
/// `(doctor_id, appointment_date, appointment_time) WHERE status <> 'CANCELLED'`
/// turns double bookings into 409 responses.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl AppointmentReader for SupabaseAppointmentStore {
    async fn active_appointments_on(
        &self,
        clinician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.{}&order=appointment_time.asc",
            clinician_id,
            date,
            AppointmentStatus::Cancelled
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        decode_rows(result)
    }

    async fn appointments_due(
        &self,
        scope: ClinicianScope,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut path = format!(
            "/rest/v1/appointments?appointment_date=eq.{}&status=in.({},{})&order=appointment_time.asc",
            date,
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed
        );

        if let ClinicianScope::Clinician(clinician_id) = scope {
            path.push_str(&format!("&doctor_id=eq.{}", clinician_id));
        }

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        decode_rows(result)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(decode_rows(result)?.into_iter().next())
    }
}

#[async_trait]
impl AppointmentWriter for SupabaseAppointmentStore {
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DatabaseError> {
        let appointment_data = json!({
            "id": appointment.id,
            "doctor_id": appointment.clinician_id,
            "patient_id": appointment.patient_id,
            "appointment_date": appointment.date,
            "appointment_time": hhmm::format(&appointment.time),
            "status": appointment.status,
            "reason": appointment.reason,
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(appointment_data),
                Some(return_representation()),
            )
            .await?;

        decode_rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::Decode("Insert returned no appointment".to_string()))
    }

    async fn update_appointment_if(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        change: &AppointmentChange,
    ) -> Result<Option<Appointment>, DatabaseError> {
        debug!("Updating appointment {} from {} to {}", id, expected, change.status);

        let mut update_data = Map::new();
        update_data.insert("status".to_string(), json!(change.status));
        if let Some(date) = change.date {
            update_data.insert("appointment_date".to_string(), json!(date));
        }
        if let Some(time) = change.time {
            update_data.insert("appointment_time".to_string(), json!(hhmm::format(&time)));
        }

        // The status filter makes the PATCH a compare-and-set.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update_data)),
                Some(return_representation()),
            )
            .await?;

        Ok(decode_rows(result)?.into_iter().next())
    }
}
