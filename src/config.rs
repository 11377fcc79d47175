//! Configuration - CLI flags, environment and `.env`

use std::sync::Arc;

use clap::Args;

use crate::api::HttpApi;
use crate::models::Id;
use crate::session::SessionContext;
use crate::timer::DEFAULT_REST_SECS;
use crate::units::UnitSystem;

pub const DEFAULT_API_URL: &str = "http://localhost:8001";

/// Connection and display settings shared by every command.
///
/// Flags win over environment variables; `main` loads `.env` into the
/// environment before parsing.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Base URL of the workout API
    #[arg(long, global = true, env = "LIFTLOG_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// User the workouts belong to
    #[arg(long, global = true, env = "LIFTLOG_USER_ID", default_value_t = 1)]
    pub user_id: Id,

    /// Weight units: metric (kg) or imperial (lb)
    #[arg(long, global = true, env = "LIFTLOG_UNITS", default_value_t = UnitSystem::Imperial)]
    pub units: UnitSystem,

    /// Rest timer length in seconds
    #[arg(long, global = true, env = "LIFTLOG_REST_SECONDS", default_value_t = DEFAULT_REST_SECS)]
    pub rest_seconds: u32,
}

impl Config {
    /// Session context talking to the configured server
    pub fn session_context(&self) -> SessionContext {
        let api = HttpApi::new(self.api_url.as_str());
        SessionContext::new(Arc::new(api), self.user_id, self.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::parse_from([
            "liftlog",
            "--api-url",
            "http://gym.local:9000",
            "--user-id",
            "42",
            "--units",
            "kg",
            "--rest-seconds",
            "120",
        ]);
        assert_eq!(cli.config.api_url, "http://gym.local:9000");
        assert_eq!(cli.config.user_id, 42);
        assert_eq!(cli.config.units, UnitSystem::Metric);
        assert_eq!(cli.config.rest_seconds, 120);
    }

    #[test]
    fn test_invalid_units_rejected() {
        assert!(TestCli::try_parse_from(["liftlog", "--units", "stone"]).is_err());
    }

    #[test]
    fn test_session_context_uses_config() {
        let cli = TestCli::parse_from(["liftlog", "--user-id", "3", "--units", "metric"]);
        let ctx = cli.config.session_context();
        assert_eq!(ctx.user_id, 3);
        assert_eq!(ctx.units, UnitSystem::Metric);
        assert_eq!(ctx.auto_advance_delay, Duration::from_millis(500));
    }
}
