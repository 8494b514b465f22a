//! Load-or-generate persistence for the server's signing key.

use std::path::Path;

use warden_envelope::KeyAuthority;

/// File name of the server's Ed25519 seed inside the data directory.
const KEY_FILE: &str = "server.key";

/// Load the server's key from the data directory, generating and
/// persisting a fresh one on first run.
pub async fn load_or_generate_authority(data_dir: &Path) -> anyhow::Result<KeyAuthority> {
    let path = data_dir.join(KEY_FILE);

    if path.exists() {
        let seed = tokio::fs::read(&path).await?;
        return Ok(KeyAuthority::import(&seed)?);
    }

    tokio::fs::create_dir_all(data_dir).await?;
    let authority = KeyAuthority::generate()?;
    tokio::fs::write(&path, authority.export()).await?;

    Ok(authority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_generates_once_and_reloads_thereafter() -> anyhow::Result<()> {
        let tempdir = tempfile::tempdir()?;

        let first = load_or_generate_authority(tempdir.path()).await?;
        let second = load_or_generate_authority(tempdir.path()).await?;

        assert_eq!(first.identity(), second.identity());

        Ok(())
    }
}
