#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] cortex_config::Error),

    #[error(transparent)]
    Flowdock(#[from] cortex_flowdock::Error),
}

impl Error {
    /// Whether the pipeline stopped for good.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Flowdock(e) => e.is_fatal(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
