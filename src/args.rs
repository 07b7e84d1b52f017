use clap::{Parser, Subcommand};

/// Labeling and pairwise-comparison campaigns for time series records.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the settings of the campaign. See the manual
    /// for the list of settings. Command line flags override the values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The JSON file holding the labels, the threshold and the votes.
    /// Created if it does not exist.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Shows records one at a time and stores the good/bad decisions.
    Label {
        /// (file path) The CSV file with the records.
        #[clap(short, long, value_parser)]
        data: Option<String>,
        /// The identity under which the labels are stored. Without it, nothing is stored.
        #[clap(short, long, value_parser)]
        user: Option<String>,
    },
    /// Shows two catalogue items and stores which one is preferred.
    Vote {
        /// (default 110) The number of items in the catalogue.
        #[clap(short, long, value_parser)]
        num_items: Option<u32>,
    },
    /// Prints the catalogue items with the most wins.
    Rank {
        #[clap(short, long, value_parser)]
        num_items: Option<u32>,
        /// (default 3) How many items to print.
        #[clap(short, long, value_parser)]
        top: Option<usize>,
        /// (file path) A JSON file with the expected ranking. If provided, the computed
        /// ranking must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Aggregates the labels of every record and extracts the good records.
    Consensus {
        #[clap(short, long, value_parser)]
        data: Option<String>,
        /// (file path) Where to write the good records, in CSV format.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// (number between 0 and 1) Overrides the threshold of the store for this run only.
        #[clap(short, long, value_parser)]
        threshold: Option<String>,
        /// (date) Attached to the labels whose day only holds a time of day.
        #[clap(long, value_parser)]
        launch_date: Option<String>,
        /// (file path) A JSON file with the expected summary. If provided, the computed
        /// summary must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Prints or replaces the consensus threshold.
    Threshold {
        /// (number between 0 and 1) The new threshold. Requires KLABEL_OPERATOR to be set.
        #[clap(long, value_parser)]
        set: Option<String>,
    },
}
