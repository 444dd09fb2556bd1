use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::AvailabilityWindow;
use crate::services::readers::AvailabilityReader;

pub struct AvailabilityCalendar {
    reader: Arc<dyn AvailabilityReader>,
}

impl AvailabilityCalendar {
    pub fn new(reader: Arc<dyn AvailabilityReader>) -> Self {
        Self { reader }
    }

    /// Open windows for a clinician on a weekday (0 = Sunday).
    pub async fn get_windows(
        &self,
        clinician_id: Uuid,
        day_of_week: i32,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError> {
        let windows = self.reader.windows_for_day(clinician_id, day_of_week).await?;

        let open: Vec<AvailabilityWindow> = windows
            .into_iter()
            .filter(|w| w.is_available && w.day_of_week == day_of_week && w.clinician_id == clinician_id)
            .collect();

        debug!("Clinician {} has {} open windows on day {}", clinician_id, open.len(), day_of_week);
        Ok(open)
    }

    pub fn day_of_week(date: NaiveDate) -> i32 {
        match date.weekday() {
            Weekday::Sun => 0,
            Weekday::Mon => 1,
            Weekday::Tue => 2,
            Weekday::Wed => 3,
            Weekday::Thu => 4,
            Weekday::Fri => 5,
            Weekday::Sat => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_starts_on_sunday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(AvailabilityCalendar::day_of_week(sunday), 0);
        assert_eq!(AvailabilityCalendar::day_of_week(monday), 1);
        assert_eq!(AvailabilityCalendar::day_of_week(saturday), 6);
    }
}
