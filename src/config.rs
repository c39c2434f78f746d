use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "AgroDossier";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when AGRODOSSIER_LOG / RUST_LOG is not set.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/AgroDossier/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("AgroDossier")
}

/// Get the dossiers directory (one SQLite database per consultancy)
pub fn dossiers_dir() -> PathBuf {
    app_data_dir().join("dossiers")
}

/// Get the staging directory for fetched document text
pub fn staging_dir() -> PathBuf {
    app_data_dir().join("staging")
}
