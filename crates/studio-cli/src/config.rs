use std::path::{Path, PathBuf};

pub const DEFAULT_BOARD_PATH: &str = ".studio/board.json";

/// Loads `.env` from the crate directory, then from the working directory.
/// Variables already set in the process environment win.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/.env")));
    dotenvy::dotenv().ok();
}

/// Settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// `STUDIO_MODEL`; validated against the model catalog at use.
    pub model: Option<String>,
    /// `STUDIO_BOARD_PATH`.
    pub board_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            model: non_empty("STUDIO_MODEL"),
            board_path: non_empty("STUDIO_BOARD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOARD_PATH)),
        }
    }

    /// Command-line flag first, then `STUDIO_MODEL`.
    pub fn model_or<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.model.as_deref())
    }
}
