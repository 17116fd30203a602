// API server configuration

use axum::http::HeaderValue;

/// Configuration for the API server, read from the environment
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// PostgreSQL connection string; absent means in-memory dev mode
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
    /// Run the due-work poller inside the API process
    pub run_poller: bool,
    /// Example: API_PREFIX="/api" results in routes like /api/v1/templates
    pub api_prefix: String,
    pub cors_origins: Vec<HeaderValue>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty());

        // Without a database nothing else would pick up delayed steps
        let run_poller = match std::env::var("RUN_POLLER") {
            Ok(v) => is_truthy(&v),
            Err(_) => database_url.is_none(),
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            run_poller,
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
            cors_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| parse_origins(&s))
                .unwrap_or_default(),
            database_url,
        }
    }

    pub fn storage_mode(&self) -> &'static str {
        if self.database_url.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins("https://app.example.com, https://admin.example.com,,");
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[1], "https://admin.example.com");
    }

    #[test]
    fn test_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("no"));
    }
}
