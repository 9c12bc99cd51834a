use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub notification: NotificationConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Structured store connection string; `None` selects the embedded store.
    pub url: Option<String>,
    /// Embedded store file, used when `url` is unset.
    pub sqlite_path: String,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

/// Outbound email API settings. Keys are deployment secrets and are redacted
/// from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub recipient: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub template_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 10000,
            },
            database: DatabaseConfig {
                url: None,
                sqlite_path: "email_tracking.db".to_string(),
                busy_timeout_ms: 5000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            notification: NotificationConfig {
                enabled: false,
                endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
                service_id: String::new(),
                template_id: String::new(),
                public_key: String::new(),
                private_key: None,
                recipient: None,
                timeout_secs: 10,
            },
            dashboard: DashboardConfig {
                template_path: "templates/dashboard.html".to_string(),
            },
        }
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("service_id", &self.service_id)
            .field("template_id", &self.template_id)
            .field("public_key", &redact(&self.public_key))
            .field("private_key", &self.private_key.as_deref().map(redact))
            .field("recipient", &self.recipient)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

impl AppConfig {
    /// Load configuration, layering an explicit file above the default ones.
    pub fn load_from(extra_file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .map_err(|e| anyhow::anyhow!("Failed to build default configuration: {}", e))?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
        }

        let config = builder
            // Add environment variables with prefix, e.g. OUTREACH_SERVER__PORT
            .add_source(
                Environment::with_prefix("OUTREACH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.apply_deployment_env(
            std::env::var("DATABASE_URL").ok(),
            std::env::var("PORT").ok(),
        )?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Apply the conventional hosting variables (`DATABASE_URL`, `PORT`),
    /// which take precedence over every other source.
    pub fn apply_deployment_env(
        &mut self,
        database_url: Option<String>,
        port: Option<String>,
    ) -> Result<()> {
        if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
            self.database.url = Some(url.trim().to_string());
        }

        if let Some(port) = port.filter(|port| !port.trim().is_empty()) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT value {:?}: {}", port, e))?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate server config
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("port must be greater than 0"));
        }

        // Validate database config
        if let Some(url) = &self.database.url {
            InputValidator::validate_database_url(url)?;
        } else if self.database.sqlite_path.trim().is_empty() {
            return Err(anyhow::anyhow!("sqlite_path cannot be empty"));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(anyhow::anyhow!("busy_timeout_ms must be greater than 0"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        // Validate notification config
        if self.notification.timeout_secs == 0 {
            return Err(anyhow::anyhow!("timeout_secs must be greater than 0"));
        }
        if self.notification.enabled {
            let required = [
                ("endpoint", &self.notification.endpoint),
                ("service_id", &self.notification.service_id),
                ("template_id", &self.notification.template_id),
            ];
            for (name, value) in required {
                if value.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "notification.{} is required when notifications are enabled",
                        name
                    ));
                }
            }
        }

        Ok(())
    }

    /// Socket address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

}
