use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid {field} in runway.toml: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    // ── Naming ──
    #[error("invalid environment name {name:?}: {reason}")]
    InvalidEnvironment { name: String, reason: &'static str },

    #[error("invalid project name {name:?} in runway.toml: {reason}")]
    InvalidProjectName { name: String, reason: &'static str },

    #[error(
        "resource name '{name}' is {len} characters; App Runner allows at most {max} — use a shorter environment or project name"
    )]
    NameTooLong { name: String, len: usize, max: usize },

    #[error("repository URI {0:?} is not of the form <registry>/<repository>")]
    InvalidRepositoryUri(String),
}
