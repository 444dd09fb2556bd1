pub mod readers;
pub mod calendar;
pub mod slots;
pub mod ledger;
pub mod supabase;
pub mod memory;

pub use readers::{AppointmentReader, AppointmentWriter, AvailabilityReader};
pub use calendar::AvailabilityCalendar;
pub use slots::{booked_times, SlotGenerator, SlotService, SLOT_MINUTES};
pub use ledger::BookingLedger;
pub use supabase::{SupabaseAppointmentStore, SupabaseAvailabilityStore};
pub use memory::{InMemoryAppointmentStore, InMemoryAvailabilityStore};
