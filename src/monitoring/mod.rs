pub mod events;
pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use self::metrics::{prometheus_enabled, try_init_prometheus};
