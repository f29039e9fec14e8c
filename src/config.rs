use std::env;

/// Process-wide configuration, read from the environment exactly once at
/// startup.
///
/// The connection string goes into pool construction and the signing secret
/// into the token service; business logic never touches the environment
/// itself.
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// Secret key the session tokens are signed with.
    pub jwt_secret: String,
    /// Port the HTTP server listens on.
    pub server_port: u16,
    /// Interface the HTTP server binds.
    pub server_host: String,
}

impl Config {
    /// Reads the configuration. A missing `DATABASE_URL` or `JWT_SECRET`
    /// is fatal at startup.
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }

    /// The address the server announces on startup.
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
