//! Server identity keypair handling.
//!
//! The keypair lives at `<data-dir>/identity.key`, hex-encoded. By
//! default a missing keypair refuses startup, because losing the key silently
//! would strand every game signed with it. Setting `EC4X_REGEN_IDENTITY=1`
//! permits generating (or regenerating) the keypair.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ec4x_net::ServerIdentity;

const IDENTITY_FILE: &str = "identity.key";
pub const REGEN_ENV: &str = "EC4X_REGEN_IDENTITY";

/// Load the server identity from the data directory, creating one only
/// when explicitly permitted via the environment.
pub fn load_identity(data_dir: &Path) -> Result<ServerIdentity> {
    let path = data_dir.join(IDENTITY_FILE);
    let regen_allowed = std::env::var(REGEN_ENV).map(|v| v == "1").unwrap_or(false);

    if path.exists() && !regen_allowed {
        let encoded = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let bytes = hex::decode(encoded.trim()).context("identity file is not valid hex")?;
        return ServerIdentity::from_bytes(&bytes)
            .map_err(|e| anyhow::anyhow!("identity file is corrupt: {e}"));
    }

    if !regen_allowed {
        bail!(
            "no server keypair at {} (set {REGEN_ENV}=1 to generate one)",
            path.display()
        );
    }

    let identity = ServerIdentity::generate();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    fs::write(&path, hex::encode(identity.to_bytes()))
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!(
        "generated server identity {} at {}",
        hex::encode(identity.verifying_key_bytes()),
        path.display()
    );
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The tests below set and clear the process environment; they run
    // serially within one test binary thread by taking this lock.
    use std::sync::Mutex;
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_keypair_refuses_without_flag() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(REGEN_ENV);
        let dir = tempfile::tempdir().unwrap();
        assert!(load_identity(dir.path()).is_err());
    }

    #[test]
    fn flag_permits_generation_then_plain_loads_work() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();

        std::env::set_var(REGEN_ENV, "1");
        let generated = load_identity(dir.path()).unwrap();
        std::env::remove_var(REGEN_ENV);

        let loaded = load_identity(dir.path()).unwrap();
        assert_eq!(
            generated.verifying_key_bytes(),
            loaded.verifying_key_bytes()
        );
    }
}
