//! The configuration structs used to build the AppConfig, and their impls.
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use lazy_regex::regex_captures;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::{
    postgres::{PgConnectOptions, PgSslMode},
    ConnectOptions,
};
use strum_macros::AsRefStr;

use crate::config::{ConfigError, ConfigResult};
use crate::web::types::ValidEmail;

/// Provider environment variables and the config keys they set.
const PROVIDER_ENV_VARS: [(&str, &str); 5] = [
    ("RESEND_API_KEY", "email_config.auth_token"),
    ("RESEND_FROM_EMAIL", "email_config.sender_addr"),
    ("RESEND_AUDIENCE_ID", "email_config.audience_id"),
    ("SUPABASE_URL", "store_config.url"),
    ("SUPABASE_ANON_KEY", "store_config.api_key"),
];

// ###################################
// ->   STRUCTS
// ###################################
#[derive(AsRefStr, Debug)]
pub enum Environment {
    Local,
    Production,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
    pub net_config: NetConfig,
    pub email_config: EmailConfig,
    pub store_config: StoreConfig,
    pub db_config: Option<DbConfig>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NetConfig {
    pub host: [u8; 4],
    pub app_port: u16,
    /// Used for links in emails when the request doesn't say where it was sent to.
    pub base_url: String,
    /// Only set behind a proxy that overwrites `X-Forwarded-Host` and `X-Forwarded-Proto`.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailConfig {
    pub url: String,
    pub sender_addr: String,
    pub auth_token: SecretString,
    /// Audience enrollment is skipped when unset or empty.
    pub audience_id: Option<String>,
    #[serde(default = "default_send_html")]
    pub send_html: bool,
    pub timeout_millis: u64,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Rest,
    Postgres,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub url: String,
    pub api_key: SecretString,
    #[serde(default = "default_table")]
    pub table: String,
    pub timeout_millis: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DbConfig {
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub db_name: String,
    pub require_ssl: SslRequire,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SslRequire {
    #[default]
    Prefer,
    Require,
    Disable,
}

fn default_send_html() -> bool {
    true
}

fn default_table() -> String {
    "subscribers".to_string()
}

// ###################################
// ->   IMPLs
// ###################################
impl AppConfig {
    /// Layers, from lowest to highest priority:
    /// `base.toml`, `{environment}.toml`, `APP_` prefixed env vars (`__` separates sections)
    /// and the provider env vars from `PROVIDER_ENV_VARS`.
    pub fn figment(config_dir: &Path, environment: &Environment) -> Figment {
        let environment_filename = format!("{}.toml", environment.as_ref().to_lowercase());

        Figment::new()
            .merge(Toml::file(config_dir.join("base.toml")))
            .merge(Toml::file(config_dir.join(environment_filename)))
            .merge(Env::prefixed("APP_").split("__"))
            .merge(provider_env())
    }

    pub fn load(config_dir: &Path, environment: &Environment) -> ConfigResult<Self> {
        let config = Self::figment(config_dir, environment)
            .extract()
            .map_err(Box::new)?;
        Ok(config)
    }

    /// The `DbConfig` the postgres contact store connects with.
    pub fn store_db_config(&self) -> ConfigResult<&DbConfig> {
        self.db_config.as_ref().ok_or(ConfigError::MissingDbConfig)
    }
}

impl EmailConfig {
    /// The sender is either a bare address or `Name <address>`, the address has to be valid.
    pub fn valid_sender(&self) -> ConfigResult<String> {
        let sender = self.sender_addr.trim();
        let addr = match sender.rsplit_once('<') {
            Some((_name, rest)) => rest
                .strip_suffix('>')
                .ok_or_else(|| ConfigError::InvalidEmail(sender.to_string()))?,
            None => sender,
        };

        ValidEmail::parse(addr)
            .map_err(|er| ConfigError::InvalidEmail(format!("{sender}: {er}")))?;

        Ok(sender.to_string())
    }

    pub fn audience_id(&self) -> Option<&str> {
        self.audience_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_millis)
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_millis)
    }
}

impl DbConfig {
    pub fn connection_options(&self) -> PgConnectOptions {
        self.connection_options_without_db().database(&self.db_name)
    }
    pub fn connection_options_without_db(&self) -> PgConnectOptions {
        // Create new PgConnectOptions struct but don't try to use the '$HOME/.pgpass' file.
        PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(self.require_ssl.into())
            .log_statements(tracing::log::LevelFilter::Trace)
    }
}

impl From<SslRequire> for PgSslMode {
    fn from(value: SslRequire) -> Self {
        match value {
            SslRequire::Require => PgSslMode::Require,
            SslRequire::Disable => PgSslMode::Disable,
            SslRequire::Prefer => PgSslMode::Prefer,
        }
    }
}

fn provider_env() -> Env {
    let config_key = |var: &str| {
        PROVIDER_ENV_VARS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(var))
            .map(|(_, key)| *key)
    };

    Env::raw()
        .filter(move |var| config_key(var.as_str()).is_some())
        .map(move |var| match config_key(var.as_str()) {
            Some(key) => key.into(),
            None => var.as_str().to_owned().into(),
        })
}

// ###################################
// ->   TRY FROMs
// ###################################

impl TryFrom<String> for Environment {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            _ => Err(Self::Error::StringToEnvironmentFail),
        }
    }
}

impl TryFrom<&str> for DbConfig {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // postgres://{username}:{password}@{hostname}:{port}/{database}?{options}
        let (_whole, username, password, host, port, db_name, options) = regex_captures!(
            r#"^postgres(?:ql)?:\/\/([^:]+):([^@]+)@([^:\/]+):(\d+)\/([^\s\/?]+)(\?[^\s]*)?$"#,
            value
        )
        .ok_or(Self::Error::StringToDbConfigFail)?;

        let port = port
            .parse()
            .map_err(|_| Self::Error::StringToDbConfigFail)?;

        let require_ssl = options
            .strip_prefix('?')
            .into_iter()
            .flat_map(|options| options.split(['&', ',']))
            .filter_map(|option| option.split_once('='))
            .filter(|(id, _)| *id == "sslmode")
            .fold(SslRequire::default(), |ssl, (_, val)| match val {
                "disable" => SslRequire::Disable,
                "require" => SslRequire::Require,
                _ => ssl,
            });

        Ok(DbConfig {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
            port,
            host: host.to_string(),
            db_name: db_name.to_string(),
            require_ssl,
        })
    }
}

// ###################################
// ->   TESTS
// ###################################
