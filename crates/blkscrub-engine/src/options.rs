use blkscrub_types::{DEFAULT_PROGRESS_INTERVAL, FillMethod, Seed};
use serde::{Deserialize, Serialize};

/// Caller-chosen parameters of one scrub session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubOptions {
    pub fill_method: FillMethod,
    /// Write the pattern but skip the verify pass.
    pub wipe_only: bool,
    /// Pattern seed. `None` means "wall clock at session start".
    pub seed: Option<Seed>,
    /// Report progress every this many blocks (and on the last block).
    pub progress_interval: u64,
}

impl Default for ScrubOptions {
    fn default() -> Self {
        Self {
            fill_method: FillMethod::Fixed,
            wipe_only: false,
            seed: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ScrubOptions {
    /// Progress cadence with zero treated as "every block".
    #[must_use]
    pub fn progress_interval(&self) -> u64 {
        self.progress_interval.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_means_every_block() {
        let options = ScrubOptions {
            progress_interval: 0,
            ..ScrubOptions::default()
        };
        assert_eq!(options.progress_interval(), 1);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let options: ScrubOptions =
            serde_json::from_str(r#"{"fill_method":"random"}"#).expect("parse");
        assert_eq!(options.fill_method, FillMethod::Random);
        assert!(!options.wipe_only);
        assert_eq!(options.seed, None);
        assert_eq!(options.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }
}
