use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Exercise a nimbus.io collection: archive keys, then read them back every way the client
/// supports, and report any mismatch.
#[derive(Parser, Debug, Clone)]
#[command(name = "nimbusio-test-client")]
pub struct Args {
    /// File containing the nimbus.io identity to test with
    #[arg(short, long, value_name = "FILE")]
    pub identity_file: Option<PathBuf>,

    /// Existing collection to archive test keys into
    #[arg(long, value_name = "NAME")]
    pub collection_name: Option<String>,

    #[arg(long, default_value_t = 3)]
    pub number_of_single_part_keys: usize,

    #[arg(long, default_value_t = 3)]
    pub number_of_conjoined_keys: usize,

    #[arg(long, default_value_t = MIB)]
    pub min_single_part_file_size: u64,

    #[arg(long, default_value_t = 10 * MIB)]
    pub max_single_part_file_size: u64,

    #[arg(long, default_value_t = 10 * MIB)]
    pub min_conjoined_file_size: u64,

    #[arg(long, default_value_t = 100 * MIB)]
    pub max_conjoined_file_size: u64,

    #[arg(long, default_value_t = 5 * MIB)]
    pub max_conjoined_part_size: u64,

    /// Shortest pause between feeding chunks of an archive, in seconds
    #[arg(long, default_value_t = 0.5)]
    pub min_feed_delay: f64,

    /// Longest pause between feeding chunks of an archive, in seconds
    #[arg(long, default_value_t = 3.0)]
    pub max_feed_delay: f64,

    /// Key prefix; test keys are spread at random over the prefixes given
    #[arg(long = "prefix", value_name = "PREFIX", default_values = ["aaa", "bbb", "ccc"])]
    pub prefixes: Vec<String>,

    /// Separator between a key's prefix and the rest of its name
    #[arg(long, default_value = "/")]
    pub separator: String,

    /// Namespace for this run's keys, so that earlier runs against the same collection are
    /// not seen; a new one is generated if not given
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,
}

impl Args {
    /// Check the arguments for consistency, before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        if self.min_single_part_file_size > self.max_single_part_file_size {
            bail!("--min-single-part-file-size exceeds --max-single-part-file-size");
        }
        if self.min_conjoined_file_size > self.max_conjoined_file_size {
            bail!("--min-conjoined-file-size exceeds --max-conjoined-file-size");
        }
        if self.max_conjoined_part_size == 0 {
            bail!("--max-conjoined-part-size must be positive");
        }
        if !(self.min_feed_delay >= 0.0 && self.min_feed_delay <= self.max_feed_delay)
            || !self.max_feed_delay.is_finite()
        {
            bail!("feed delays must satisfy 0 <= --min-feed-delay <= --max-feed-delay");
        }
        if self.prefixes.is_empty() {
            bail!("at least one --prefix is required");
        }
        if let Some(run_id) = &self.run_id {
            if run_id.is_empty() || run_id.contains(self.separator.as_str()) {
                bail!("--run-id must be non-empty and must not contain the separator");
            }
        }
        Ok(())
    }

    /// The range of delays between feeding chunks
    pub fn feed_delays(&self) -> (Duration, Duration) {
        (
            Duration::from_secs_f64(self.min_feed_delay),
            Duration::from_secs_f64(self.max_feed_delay),
        )
    }
}
