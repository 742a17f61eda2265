use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory with an initial `config.json` for `user_id` and an empty document
/// store.
///
/// # Arguments
/// - `pocketplan_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/pocketplan`
/// - `user_id` - The user whose documents this installation reads and writes.
///
/// # Errors
/// - Returns an error if the directory already holds a configuration or any file operation fails.
pub async fn init(pocketplan_home: &Path, user_id: &str) -> Result<Out<()>> {
    let config = Config::create(pocketplan_home, user_id)
        .await
        .map_err(|e| e.context_msg("Unable to create the data directory and configs"))?;
    Ok(format!(
        "Successfully created the pocketplan directory at {}",
        config.root().display()
    )
    .into())
}
