use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_SLOT_MINUTES: i64 = 30;
pub const DEFAULT_PORT: u16 = 3000;

/// Which persistence backend the API wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub slot_minutes: i64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend: env::var("STORE_BACKEND")
                .ok()
                .and_then(|raw| match raw.parse() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("{}, falling back to supabase", e);
                        None
                    }
                })
                .unwrap_or(StoreBackend::Supabase),
            slot_minutes: env::var("SLOT_MINUTES")
                .ok()
                .and_then(|raw| raw.parse::<i64>().ok())
                .filter(|minutes| *minutes > 0 && *minutes <= 24 * 60)
                .unwrap_or_else(|| {
                    warn!("SLOT_MINUTES not set or invalid, using {}", DEFAULT_SLOT_MINUTES);
                    DEFAULT_SLOT_MINUTES
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.store_backend {
            StoreBackend::Memory => !self.supabase_jwt_secret.is_empty(),
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty()
                    && !self.supabase_anon_key.is_empty()
                    && !self.supabase_service_role_key.is_empty()
                    && !self.supabase_jwt_secret.is_empty()
            }
        }
    }
}
