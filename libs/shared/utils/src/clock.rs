use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use tracing::warn;

use shared_config::AppConfig;

/// Wall clock of the clinic. Handlers read "now" here and pass it down;
/// scheduling and queue logic never consult a clock themselves.
#[derive(Debug, Clone, Copy)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn new(offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
            warn!("Clinic UTC offset {} minutes out of range, using UTC", offset_minutes);
            Utc.fix()
        });

        Self { offset }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.clinic_utc_offset_minutes)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local_from_utc(Utc::now())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn local_from_utc(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }
}
