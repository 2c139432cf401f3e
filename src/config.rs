use std::{env, path::PathBuf, time::Duration};

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// AppConfig
///
/// Holds the client's entire configuration. It is loaded once at startup and is
/// immutable afterwards; the API client and the session store are built from it.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the fundraising platform API.
    pub api_url: String,
    // Directory holding the persisted session (the client's "browser profile").
    pub profile_dir: PathBuf,
    // Runtime environment marker. Selects the log format and which settings are mandatory.
    pub env: Env,
    // Upper bound for a single API round-trip.
    pub request_timeout: Duration,
    // Origin the payment provider redirects donors back to (`{origin}/funds/{id}`).
    pub return_url: String,
}

/// Env
///
/// Runtime context: `Local` tolerates missing settings, `Production` does not.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// A non-panicking configuration for tests. Nothing here touches the user's real
    /// profile: the session directory points into the system temp dir.
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            profile_dir: env::temp_dir().join("dobro-portal-test"),
            env: Env::Local,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            return_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, following the fail-fast
    /// principle.
    ///
    /// # Panics
    /// Panics in production when `PORTAL_API_URL` is missing, and in any environment
    /// when `PORTAL_TIMEOUT_SECS` is set but not a positive integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_url = match env {
            Env::Production => {
                env::var("PORTAL_API_URL").expect("FATAL: PORTAL_API_URL must be set in production.")
            }
            Env::Local => env::var("PORTAL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
        };
        let api_url = api_url.trim_end_matches('/').to_string();

        // Payment return base falls back to the API origin.
        let return_url = env::var("PORTAL_RETURN_URL").unwrap_or_else(|_| api_url.clone());

        let request_timeout = match env::var("PORTAL_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .expect("FATAL: PORTAL_TIMEOUT_SECS must be a positive integer.");
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let profile_dir = env::var("PORTAL_PROFILE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_profile_dir());

        Self {
            api_url,
            profile_dir,
            env,
            request_timeout,
            return_url: return_url.trim_end_matches('/').to_string(),
        }
    }
}

/// `<data dir>/dobro-portal`, or a relative `.dobro-portal` when the platform has no
/// data directory.
pub fn default_profile_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dobro-portal"))
        .unwrap_or_else(|| PathBuf::from(".dobro-portal"))
}
