use std::fmt;

/// File extensions accepted for image query uploads. Matching is on the
/// substring after the last dot, case-insensitive; a name without a dot has
/// no extension and is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
}

impl ImageExtension {
    pub fn parse(file_name: &str) -> Option<Self> {
        let (_, ext) = file_name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" => Some(ImageExtension::Jpg),
            "jpeg" => Some(ImageExtension::Jpeg),
            "png" => Some(ImageExtension::Png),
            _ => None,
        }
    }

    pub fn is_supported(file_name: &str) -> bool {
        Self::parse(file_name).is_some()
    }
}

/// One ranked search result: the object name and a public URL where the
/// relocated image can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMatch {
    pub name: String,
    pub locator: String,
}

/// Counters for one completed ingestion tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Objects embedded and inserted this tick.
    pub processed: usize,
    /// Row count the engine reported for the insert.
    pub inserted: u64,
    pub relocated: usize,
    /// Objects left in the landing bucket after a failed copy or delete;
    /// they are picked up again (and re-inserted) on a later tick.
    pub relocation_failures: usize,
}

/// Outcome of one tick request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous tick was still running; nothing was done.
    Skipped,
    Completed(TickSummary),
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} (engine reported {}), relocated {}, {} relocation failures",
            self.processed, self.inserted, self.relocated, self.relocation_failures
        )
    }
}
