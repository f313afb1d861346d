use std::time::Duration;

use clap::builder::TypedValueParser;
use clap::Parser;

/// The `mining-pool` program runs a work coordinator on an in-memory regtest
/// chain, with a few toy CPU miners fetching work from it and submitting
/// solutions.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// How often the candidate block is rebuilt while the chain does not
    /// grow, e.g. "3s" or "500ms".
    #[clap(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub recommit_interval: Duration,

    /// Number of solutions that may wait for the work coordinator before
    /// submitters are held back.
    #[clap(long, default_value = "50", value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    pub submit_queue_capacity: usize,

    /// How long a submitter waits for room in a full queue. "0" waits forever.
    #[clap(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub submit_enqueue_timeout: Duration,

    /// How long a submitter waits for the verdict on its solution. "0" waits
    /// forever.
    #[clap(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub submit_reply_timeout: Duration,

    /// Maximum number of transactions, coinbase included, in a block template.
    #[clap(long, default_value = "1000", value_parser = clap::value_parser!(u32).range(1..).map(|n| n as usize))]
    pub max_block_transactions: usize,

    /// Number of toy miners to run against the coordinator.
    #[clap(long, default_value = "2")]
    pub num_miners: usize,

    /// Number of random transfers placed in the regtest mempool at startup.
    #[clap(long, default_value = "20")]
    pub mempool_transactions: usize,

    /// Shut down after this long, e.g. "1m". Runs until ctrl-c if absent.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub run_for: Option<Duration>,

    /// Enable tokio tracing for consumption by the tokio-console application
    /// note: this will attempt to connect to localhost:6669
    #[clap(long, name = "tokio-console", default_value = "false")]
    pub tokio_console: bool,
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

/// A zero duration on the command line means "no timeout".
pub(crate) fn optional_timeout(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
