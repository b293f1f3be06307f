use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::sampling::{DEFAULT_SEED, SamplingMethod};

#[derive(Parser, Debug)]
#[command(
    name = "codeval",
    version,
    about = "Manual validation of automatically coded text labels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Class distribution, suggested sampling method and sample sizes.
    Profile(ProfileArgs),
    /// Draw a review sample and start a new session.
    Sample(SampleArgs),
    /// Step through the active session and submit labels.
    Review(ReviewArgs),
    /// Running metrics and confusion matrix for the active session.
    Report(ReportArgs),
    /// Write reviewed records to CSV or JSON.
    Export(ExportArgs),
    /// List codebook categories.
    Codebook(CodebookArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/codeval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    #[arg(long, default_value = "data/preprocessed_data.csv")]
    pub dataset: PathBuf,

    #[arg(long)]
    pub text_column: Option<String>,

    #[arg(long)]
    pub label_column: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CodebookSourceArgs {
    /// Codebook JSON replacing the built-in category set.
    #[arg(long)]
    pub codebook: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MethodArg {
    Binary,
    MultiClass,
    Stratified,
}

impl From<MethodArg> for SamplingMethod {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Binary => Self::Binary,
            MethodArg::MultiClass => Self::MultiClass,
            MethodArg::Stratified => Self::Stratified,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub codebook: CodebookSourceArgs,

    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    #[arg(long, default_value_t = 0.05)]
    pub margin: f64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Overrides the suggested method.
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,

    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    #[arg(long, default_value_t = 0.05)]
    pub margin: f64,

    #[arg(long, default_value_t = 5)]
    pub min_per_class: usize,

    #[arg(long, default_value_t = 30)]
    pub max_per_class: usize,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    #[arg(long = "extra-column")]
    pub extra_columns: Vec<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub codebook: CodebookSourceArgs,

    #[command(subcommand)]
    pub action: ReviewAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReviewAction {
    /// Print the record under the cursor.
    Show,
    /// Record a corrected label for the current record.
    Submit {
        #[arg(long)]
        label: String,
    },
    /// Confirm the predicted label of the current record.
    Accept,
    Next,
    Previous,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub codebook: CodebookSourceArgs,

    /// Drop labels outside the session label set instead of failing.
    #[arg(long, default_value_t = false)]
    pub lenient: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub lenient: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CodebookArgs {
    #[command(flatten)]
    pub codebook: CodebookSourceArgs,

    #[arg(long)]
    pub domain: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sample_defaults_match_review_workflow() {
        let cli = Cli::try_parse_from(["codeval", "sample", "--dataset", "data.csv"])
            .expect("sample args should parse");
        let Commands::Sample(args) = cli.command else {
            panic!("expected sample command");
        };
        assert_eq!(args.confidence, 0.95);
        assert_eq!(args.margin, 0.05);
        assert_eq!(args.min_per_class, 5);
        assert_eq!(args.max_per_class, 30);
        assert_eq!(args.seed, 42);
        assert!(args.method.is_none());
        assert_eq!(args.store.cache_root, PathBuf::from(".cache/codeval"));
    }

    #[test]
    fn review_submit_requires_label() {
        assert!(Cli::try_parse_from(["codeval", "review", "submit"]).is_err());

        let cli = Cli::try_parse_from(["codeval", "review", "submit", "--label", "per501"])
            .expect("submit should parse");
        let Commands::Review(args) = cli.command else {
            panic!("expected review command");
        };
        assert!(matches!(args.action, ReviewAction::Submit { ref label } if label == "per501"));
    }

    #[test]
    fn method_names_follow_kebab_case() {
        let cli = Cli::try_parse_from(["codeval", "sample", "--method", "multi-class"])
            .expect("method should parse");
        let Commands::Sample(args) = cli.command else {
            panic!("expected sample command");
        };
        assert_eq!(
            args.method.map(SamplingMethod::from),
            Some(SamplingMethod::MultiClass)
        );
    }
}
