use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(database) = std::env::var("KEEPSWEEP_DATABASE")
            && !database.is_empty()
        {
            self.database_path = PathBuf::from(database);
        }

        if let Ok(keep) = std::env::var("KEEPSWEEP_KEEP")
            && !keep.trim().is_empty()
        {
            self.keep = keep
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Ok(backup) = std::env::var("KEEPSWEEP_BACKUP")
            && !backup.is_empty()
        {
            self.backup_path = Some(PathBuf::from(backup));
        }
    }
}

#[cfg(test)]
const OVERRIDE_VARS: [&str; 3] = ["KEEPSWEEP_DATABASE", "KEEPSWEEP_KEEP", "KEEPSWEEP_BACKUP"];

/// Process environment reserved for one test.
///
/// Holds a process-wide lock and clears every `KEEPSWEEP_*` override so
/// `Config::load` sees only what the test sets. The previous values are
/// restored on drop.
#[cfg(test)]
pub(super) struct ScopedEnv {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
impl ScopedEnv {
    pub(super) fn clean() -> Self {
        use std::sync::{Mutex, PoisonError};
        static LOCK: Mutex<()> = Mutex::new(());

        let lock = LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = OVERRIDE_VARS
            .iter()
            .map(|key| (*key, std::env::var(key).ok()))
            .collect();
        for key in OVERRIDE_VARS {
            // SAFETY: every test touching these variables holds LOCK.
            unsafe { std::env::remove_var(key) };
        }
        Self { saved, _lock: lock }
    }

    pub(super) fn set(&self, key: &'static str, value: &str) {
        assert!(OVERRIDE_VARS.contains(&key), "{key} is not a keepsweep override");
        // SAFETY: LOCK is held for the lifetime of self.
        unsafe { std::env::set_var(key, value) };
    }
}

#[cfg(test)]
impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in &self.saved {
            // SAFETY: LOCK is released only after this runs.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
