mod health;

pub use health::{health_check, metrics, readiness_check};
