//! Optimistic concurrency expectations.

/// Version a writer expects the stored record to be at.
///
/// Stores bump a record's version on every successful write; a writer that
/// read version `n` submits `Exact(n)` and loses the race if someone else
/// wrote in between.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
