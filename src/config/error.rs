pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to build the 'Environment' from the provided string.")]
    StringToEnvironmentFail,
    #[error("failed to parse 'DbConfig' from the provided string.")]
    StringToDbConfigFail,
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("the postgres contact store needs a 'db_config' section or DATABASE_URL")]
    MissingDbConfig,

    #[error("figment error: {0}")]
    Figment(#[from] Box<figment::Error>),
}
