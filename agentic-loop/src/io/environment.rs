//! Clock and identifier source for handlers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Non-deterministic inputs of an invocation.
///
/// Handlers read time and fresh run ids only through this trait so tests can
/// pin both.
pub trait Environment {
    fn now(&self) -> DateTime<Utc>;

    /// A new globally unique run id.
    fn new_run_id(&self) -> String;
}

/// Wall clock and random UUIDv4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn new_run_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_run_ids_are_unique_uuids() {
        let env = SystemEnvironment;
        let a = env.new_run_id();
        let b = env.new_run_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
