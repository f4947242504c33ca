use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid color {0:?}: expected #rrggbb")]
    InvalidColor(String),

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Camera error: {0}")]
    Camera(String),
}

pub type Result<T> = std::result::Result<T, Error>;
