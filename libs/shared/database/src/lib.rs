pub mod supabase;

pub use supabase::{DatabaseError, SupabaseClient, decode_rows, return_representation, with_timeout};
