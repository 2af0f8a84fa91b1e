use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Point-in-time view of a [`crate::ResultCache`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    /// `total_entries` as a percentage of `max_size`
    pub usage_percent: f64,
    pub path: PathBuf,
    /// Size of the snapshot on disk, zero when it does not exist yet
    pub file_size_bytes: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache: {}", self.path.display())?;
        writeln!(
            f,
            "  entries:  {} valid / {} total (max {}, {:.1}% used)",
            self.valid_entries, self.total_entries, self.max_size, self.usage_percent
        )?;
        writeln!(f, "  expired:  {}", self.expired_entries)?;
        writeln!(f, "  ttl:      {}s", self.ttl_seconds)?;
        write!(f, "  on disk:  {} bytes", self.file_size_bytes)
    }
}
