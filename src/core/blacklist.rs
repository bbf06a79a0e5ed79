use std::collections::HashSet;

/// Blacklist of process names the FPS monitor must never attach to.
///
/// Names are matched case-insensitively and without the `.exe` extension, so
/// `"Explorer.EXE"` and `"explorer"` refer to the same entry.
#[derive(Debug, Default, Clone)]
pub struct ProcessBlacklist {
    names: HashSet<String>,
}

impl ProcessBlacklist {
    /// Create a new empty blacklist
    pub fn new() -> Self {
        Self {
            names: HashSet::new(),
        }
    }

    /// Build a blacklist from configured process names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut blacklist = Self::new();
        for name in names {
            let normalized = Self::normalize(name.as_ref());
            if !normalized.is_empty() {
                blacklist.names.insert(normalized);
            }
        }
        blacklist
    }

    /// Check if a process name is blacklisted
    pub fn is_blocked(&self, process_name: &str) -> bool {
        self.names.contains(&Self::normalize(process_name))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn normalize(name: &str) -> String {
        let lowered = name.trim().to_lowercase();
        lowered
            .strip_suffix(".exe")
            .map(|s| s.to_string())
            .unwrap_or(lowered)
    }
}
