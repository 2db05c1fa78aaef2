mod alt;

pub use alt::{AltCache, deserialize_lookup_table};
