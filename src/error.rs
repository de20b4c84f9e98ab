// Error types shared by the drive core and the runtime shell

/// Errors produced while configuring the drive or planning motion
#[derive(Debug, thiserror::Error)]
pub enum SwerveError {
    #[error("Infeasible path: {0}")]
    InfeasiblePath(String),

    #[error("Degenerate wheel geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SwerveError>;
