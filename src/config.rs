/// Default upstream results API base URL.
pub const DEFAULT_MOTOGP_API_URL: &str = "https://api.motogp.pulselive.com/motogp/v1/results";

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub motogp_api_url: String,
    /// Connection settings for the external snapshot store. `None` disables it.
    pub redis: Option<RedisConfig>,
    /// Expiration applied to the snapshot in the external store.
    pub cache_ttl_secs: u64,
    /// Local snapshot file. `None` disables the file backend.
    pub cache_file: Option<String>,
    /// Interval of the background refresher. `None` disables it.
    pub refresh_interval_secs: Option<u64>,
    /// Directory containing the static front end.
    pub static_dir: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RedisConfig {
    /// Connection URL in the `redis://[user][:password@]host:port` form.
    pub fn url(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{}:{}@", user, pass),
            (None, Some(pass)) => format!(":{}@", pass),
            (Some(user), None) => format!("{}@", user),
            (None, None) => String::new(),
        };
        format!("redis://{}{}:{}", auth, self.host, self.port)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let redis = non_empty_var("REDIS_HOST").map(|host| RedisConfig {
            host,
            port: std::env::var("REDIS_PORT")
                .unwrap_or_else(|_| "6379".to_string())
                .parse()
                .expect("REDIS_PORT must be a valid u16"),
            username: non_empty_var("REDIS_USERNAME"),
            password: non_empty_var("REDIS_PASSWORD"),
        });

        let cache_file = match std::env::var("CACHE_FILE") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => Some("standings_cache.json".to_string()),
        };

        let refresh_interval_secs = non_empty_var("REFRESH_INTERVAL_SECS")
            .map(|v| {
                v.parse::<u64>()
                    .expect("REFRESH_INTERVAL_SECS must be a non-negative integer")
            })
            .filter(|secs| *secs > 0);

        Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            motogp_api_url: non_empty_var("MOTOGP_API_URL")
                .unwrap_or_else(|| DEFAULT_MOTOGP_API_URL.to_string()),
            redis,
            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .expect("CACHE_TTL_SECS must be a non-negative integer"),
            cache_file,
            refresh_interval_secs,
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
