use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "facelens.toml";
pub const LOG_FILE_NAME: &str = "facelens.log";

pub fn local_config_file() -> PathBuf {
    PathBuf::from("configs").join(CONFIG_FILE_NAME)
}

pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("facelens").join(CONFIG_FILE_NAME))
}

/// Log directory used outside dev mode, where the terminal belongs to the
/// session screen.
pub fn user_log_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("facelens"))
}

/// Config locations in lookup order.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![local_config_file()];
    if let Some(user) = user_config_file() {
        candidates.push(user);
    }
    candidates
}
