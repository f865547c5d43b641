use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable that points at an alternate settings file.
pub const SETTINGS_ENV: &str = "STAGEHAND_SETTINGS";

/// Base stagehand config directory (universal ~/.config/stagehand/ on all platforms)
pub fn stagehand() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("stagehand"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("stagehand"))
    }
}

/// Default settings file path
pub fn settings_json() -> Result<PathBuf> {
    Ok(stagehand()?.join("settings.json"))
}

/// Settings file named by `STAGEHAND_SETTINGS`, if set and non-empty.
pub fn settings_from_env() -> Option<PathBuf> {
    env::var(SETTINGS_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| PathBuf::from(shellexpand::tilde(&v).to_string()))
}

/// Home directory of a remote account.
pub fn remote_home(account: &str) -> String {
    if account == "root" {
        "/root".to_string()
    } else {
        format!("/home/{}", account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_home_for_regular_and_root_accounts() {
        assert_eq!(remote_home("shop-master"), "/home/shop-master");
        assert_eq!(remote_home("root"), "/root");
    }
}
