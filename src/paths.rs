use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn resolve_home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        if let Some(userprofile) = env::var_os("USERPROFILE").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(userprofile));
        }

        if let (Some(mut homedrive), Some(homepath)) =
            (env::var_os("HOMEDRIVE"), env::var_os("HOMEPATH"))
        {
            if !homedrive.is_empty() && !homepath.is_empty() {
                homedrive.push(homepath);
                return Some(PathBuf::from(homedrive));
            }
        }

        env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    #[cfg(not(windows))]
    {
        env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}

pub fn home_dir() -> Result<PathBuf> {
    resolve_home_dir()
        .ok_or_else(|| anyhow!("failed to resolve home directory from environment variables"))
}

pub fn workstations_home() -> Result<PathBuf> {
    Ok(home_dir()?.join(".workstations"))
}

pub fn configs_dir() -> Result<PathBuf> {
    Ok(workstations_home()?.join("configs"))
}

pub fn gcloud_config_path() -> Result<PathBuf> {
    Ok(home_dir()?
        .join(".config")
        .join("gcloud")
        .join("configurations")
        .join("config_default"))
}

pub fn ensure_home_layout() -> Result<()> {
    let configs = configs_dir()?;
    fs::create_dir_all(&configs)
        .with_context(|| format!("failed to create {}", configs.display()))?;

    Ok(())
}

/// Expand a leading `~` or `~/` to the user's home directory. Other
/// `~user` forms are passed through untouched.
pub fn expand_user(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return home_dir();
    }

    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }

    Ok(Path::new(path).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::expand_user;
    use std::path::PathBuf;

    #[test]
    fn expands_tilde_prefix() {
        let home = super::home_dir().expect("home");
        assert_eq!(expand_user("~").expect("expand"), home);
        assert_eq!(
            expand_user("~/remote-machines/workstation/").expect("expand"),
            home.join("remote-machines/workstation/")
        );
    }

    #[test]
    fn passes_plain_paths_through() {
        assert_eq!(
            expand_user("/tmp/sync").expect("expand"),
            PathBuf::from("/tmp/sync")
        );
        assert_eq!(
            expand_user("relative/dir").expect("expand"),
            PathBuf::from("relative/dir")
        );
    }
}
