use clap::Parser;

/// This is a chart-data generator for recurring-survey snapshots.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) A JSON snapshot of already-filtered records: the poll's questions,
    /// its issues, and their responses and answers. For more information about the
    /// file format, read the documentation of the poll_analytics crate.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (file path) A reference file containing the expected summary in JSON format. If provided,
    /// pollstat will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary will be written in JSON format to
    /// the given location instead of the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (question id or empty) If specified, only this question of the poll is aggregated.
    #[clap(short, long, value_parser)]
    pub question: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
