//! Logging initialization

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Logging profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, debug level
    Development,
    /// JSON lines, info level
    Production,
    /// In-memory capture layer, see [`super::test_capture`]
    Test,
}

impl Profile {
    fn default_filter(&self) -> &'static str {
        match self {
            Profile::Development => "ecorex=debug,ecorex_core=debug,ecorex_store=debug",
            Profile::Production | Profile::Test => "ecorex=info,ecorex_core=info,ecorex_store=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call has an effect. `RUST_LOG` overrides the profile's
/// default filter.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(profile.default_filter()))
        };
        // try_init: a host application may already own the global dispatcher
        match profile {
            Profile::Development => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_writer(std::io::stderr)
                    .try_init()
                    .ok();
            }
            Profile::Production => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter())
                    .with_writer(std::io::stderr)
                    .try_init()
                    .ok();
            }
            Profile::Test => {
                super::test_capture::init_test_capture();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(Profile::Test);
        init(Profile::Test);
        let capture = crate::logging_facility::init_test_capture();
        crate::log_op_start!("init_probe");
        capture.assert_event_exists("init_probe", "start");
    }

    #[test]
    fn test_profile_filters_differ() {
        assert_ne!(
            Profile::Development.default_filter(),
            Profile::Production.default_filter()
        );
    }
}
