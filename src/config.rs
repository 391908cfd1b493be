use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,

    // Redis (optional — empty disables cross-instance fan-out)
    pub redis_url: String,

    // Identity verification
    pub identity_jwt_secret: String,

    /// Email of the one global admin identity. Compared case-insensitively;
    /// this user is treated as admin everywhere regardless of stored flags.
    pub admin_email: String,

    // CORS
    pub cors_origins: String,

    // Query caps
    pub message_page_size: usize,
}

impl AppConfig {
    /// Config with test-appropriate defaults (no env vars needed).
    pub fn test_default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            redis_url: String::new(),
            identity_jwt_secret: "test-identity-secret-that-is-long-enough-for-hmac".into(),
            admin_email: "root@agora.test".into(),
            cors_origins: "*".into(),
            message_page_size: 100,
        }
    }

    pub fn from_env() -> Self {
        Self {
            host: env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("AGORA_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("AGORA_PORT must be a valid u16"),

            redis_url: env::var("REDIS_URL").unwrap_or_default(),

            identity_jwt_secret: env::var("IDENTITY_JWT_SECRET")
                .expect("IDENTITY_JWT_SECRET must be set"),

            admin_email: env::var("ADMIN_EMAIL")
                .expect("ADMIN_EMAIL must be set"),

            cors_origins: env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),

            message_page_size: env::var("MESSAGE_PAGE_SIZE")
                .unwrap_or_else(|_| "100".into())
                .parse()
                .unwrap_or(100),
        }
    }
}
