use clap::Parser;

/// Tokengate, an authenticated text-generation API gateway.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Config {
    /// Listen address (e.g. ":8000" or "0.0.0.0:8000")
    #[arg(long, default_value = ":8000", env = "ADDR")]
    pub addr: String,

    /// Log format: "text" or "json"
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Base URL of the OpenAI-compatible completion backend
    #[arg(
        long,
        default_value = "http://localhost:8080",
        env = "BACKEND_BASE_URL"
    )]
    pub backend_base_url: String,

    /// API key for the completion backend, if it requires one
    #[arg(long, env = "BACKEND_API_KEY")]
    pub backend_api_key: Option<String>,

    /// Model sent to the backend when a request names none
    #[arg(long, default_value = "default", env = "BACKEND_MODEL")]
    pub backend_model: String,

    /// Timeout in seconds for backend completion requests
    #[arg(long, default_value_t = 60, env = "BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: u64,

    /// Requests allowed per identity per window (0 to disable rate limiting)
    #[arg(long, default_value_t = 100, env = "RATE_LIMIT_REQUESTS")]
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds
    #[arg(long, default_value_t = 3600, env = "RATE_LIMIT_WINDOW")]
    pub rate_limit_window_secs: u64,

    /// Largest max_tokens value a generation request may ask for
    #[arg(long, default_value_t = 4096, env = "MAX_TOKENS_LIMIT")]
    pub max_tokens_limit: i64,

    /// Price charged per 1000 tokens (0 for free local setups)
    #[arg(long, default_value_t = 0.0, env = "PRICE_PER_1K_TOKENS")]
    pub price_per_1k_tokens: f64,

    /// Comma-separated list of allowed CORS origins ("*" for any)
    #[arg(long, default_value = "*", env = "ALLOWED_ORIGINS")]
    pub allowed_origins: String,
}

/// Parse a comma-separated origin list, trimming whitespace and filtering empties.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_list_trims_whitespace() {
        assert_eq!(
            parse_origin_list("http://a.example, http://b.example ,http://c.example"),
            vec!["http://a.example", "http://b.example", "http://c.example"]
        );
    }

    #[test]
    fn test_parse_origin_list_filters_empties() {
        assert_eq!(
            parse_origin_list("http://a.example,, ,http://b.example,"),
            vec!["http://a.example", "http://b.example"]
        );
    }

    #[test]
    fn test_parse_origin_list_all_empty() {
        let result = parse_origin_list(", ,");
        assert!(result.is_empty());
    }
}
