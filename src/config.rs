use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    pub supabase_jwt_secret: String,
    pub supabase_storage_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub app_base_url: String,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub token_buffer: i64,
    pub token_pack_validity_days: i64,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, AppError> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{} must be set", name)))
}

fn parsed<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: var_or("SERVER_HOST", "127.0.0.1"),
            server_port: parsed("SERVER_PORT", "8080")?,
            database_url: var_or("DATABASE_URL", "sqlite://dashboard.db?mode=rwc"),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parsed("DB_MIN_CONNECTIONS", "5")?,
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", "60")?,
            rate_limit_per_minute: parsed("RATE_LIMIT_PER_MINUTE", "100")?,
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET")?,
            supabase_storage_url: var_or("SUPABASE_STORAGE_URL", ""),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: var_or("STRIPE_API_BASE", "https://api.stripe.com/v1"),
            app_base_url: var_or("APP_BASE_URL", "http://localhost:3000"),
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_api_base: var_or(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com",
            ),
            token_buffer: parsed("TOKEN_BUFFER", "500")?,
            token_pack_validity_days: parsed("TOKEN_PACK_VALIDITY_DAYS", "365")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Public URL prefix of the `avatars` storage bucket.
    pub fn avatar_bucket_url(&self) -> String {
        format!(
            "{}/object/public/avatars/",
            self.supabase_storage_url.trim_end_matches('/')
        )
    }
}
