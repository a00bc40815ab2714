use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// When unset, configs are held in memory and lost on restart.
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub key: Option<String>,
    pub salt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub allowed_url_schemes: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            encryption: EncryptionConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key: None,
            salt: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_url_schemes: vec!["https".to_string()],
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file, and
    /// environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "RDE_"
        config = config.add_source(
            config::Environment::with_prefix("RDE")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Database URL from config or environment; `None` means run on the
    /// in-memory store.
    pub fn database_url(&self) -> Option<String> {
        if let Some(connection_string) = &self.database.connection_string {
            return Some(connection_string.clone());
        }

        std::env::var("DATABASE_URL").ok()
    }

    /// Encryption key material from config or environment. Both values are
    /// required to serve anything.
    pub fn encryption_material(&self) -> anyhow::Result<(String, String)> {
        let key = self
            .encryption
            .key
            .clone()
            .or_else(|| std::env::var("RDE_ENCRYPTION_KEY").ok())
            .ok_or_else(|| anyhow::anyhow!("RDE_ENCRYPTION_KEY is not set"))?;

        let salt = self
            .encryption
            .salt
            .clone()
            .or_else(|| std::env::var("RDE_ENCRYPTION_SALT").ok())
            .ok_or_else(|| anyhow::anyhow!("RDE_ENCRYPTION_SALT is not set"))?;

        Ok((key, salt))
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
