pub mod calendar;
pub mod clock;
pub mod error;
pub mod logger;
pub mod models;
pub mod scheduler;
pub mod solver;

pub use error::ScheduleError;
pub use models::{ScheduleRequest, ScheduleResponse};
pub use scheduler::generate_schedule;
