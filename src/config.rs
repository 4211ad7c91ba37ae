//! Server configuration.
//!
//! Command-line arguments (with env fallbacks) for the binary, plus the
//! env-sourced runtime config shared by the router and tests.

use clap::Parser;
use std::env;

/// Command-line arguments for the rollcall server.
#[derive(Debug, Parser)]
#[command(name = "rollcall", about = "QR attendance backend")]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Path to the SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "rollcall.db")]
    pub database: String,

    /// Seed demo accounts and a sample course on startup
    #[arg(long, default_value_t = false)]
    pub seed_demo: bool,
}

/// Runtime configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());

        let token_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(24);

        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        Self {
            jwt_secret,
            token_ttl_hours,
            admin_username,
            admin_password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = ServerArgs::parse_from(["rollcall"]);
        assert_eq!(args.port, 3000);
        assert_eq!(args.database, "rollcall.db");
        assert!(!args.seed_demo);
    }

    #[test]
    fn test_seed_demo_flag() {
        let args = ServerArgs::parse_from(["rollcall", "--seed-demo", "--port", "8080"]);
        assert!(args.seed_demo);
        assert_eq!(args.port, 8080);
    }
}
