use std::sync::Arc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub request_timeout_secs: u64,
    pub clinic_utc_offset_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            request_timeout_secs: 2,
            clinic_utc_offset_minutes: 0,
        }
    }
}

impl TestConfig {
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            request_timeout_secs: self.request_timeout_secs,
            clinic_utc_offset_minutes: self.clinic_utc_offset_minutes,
            bind_address: "127.0.0.1:0".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// PostgREST row shapes as the clinic tables return them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn availability_window_row(
        clinician_id: &str,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": clinician_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_available": true
        })
    }

    pub fn appointment_row(
        id: &str,
        clinician_id: &str,
        patient_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": clinician_id,
            "patient_id": patient_id,
            "appointment_date": date,
            "appointment_time": time,
            "status": status,
            "reason": "Routine check-up"
        })
    }

    pub fn queue_entry_row(
        id: &str,
        patient_id: &str,
        appointment_id: Option<&str>,
        clinician_id: &str,
        status: &str,
        checked_in_at: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "appointment_id": appointment_id,
            "doctor_id": clinician_id,
            "status": status,
            "checked_in_at": checked_in_at,
            "priority": "NORMAL"
        })
    }

    pub fn patient_row(id: &str, user_id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": user_id
        })
    }

    pub fn unique_violation() -> serde_json::Value {
        json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"queue_entries_appointment_id_key\""
        })
    }
}
