//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use imgshrink_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_FILE_SIZE};

/// Batch-compress images via a remote shrink service.
///
/// imgshrink scans a directory tree for jpg/jpeg/png files, submits each
/// not-yet-processed file to the shrink service, overwrites it with the
/// compressed result, and remembers what it has done so repeated runs skip
/// already-compressed files.
#[derive(Parser, Debug)]
#[command(name = "imgshrink")]
#[command(author, version, about)]
pub struct Args {
    /// Directory tree to scan for images
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent compressions (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum file size in bytes eligible for compression
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_size: u64,

    /// Cache file recording already-compressed fingerprints
    /// (default: <path>/.imgshrink-cache.json)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Override the shrink service endpoint (for testing)
    #[arg(long, hide = true)]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["imgshrink"]).unwrap();
        assert_eq!(args.path, PathBuf::from("."));
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.concurrency, 15); // DEFAULT_CONCURRENCY
        assert_eq!(args.max_size, 5_200_000); // DEFAULT_MAX_FILE_SIZE
        assert!(args.cache_file.is_none());
        assert!(args.endpoint.is_none());
    }

    #[test]
    fn test_cli_positional_path() {
        let args = Args::try_parse_from(["imgshrink", "photos/"]).unwrap();
        assert_eq!(args.path, PathBuf::from("photos/"));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["imgshrink", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["imgshrink", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["imgshrink", "-q"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["imgshrink", "-c", "1"]).unwrap();
        assert_eq!(args.concurrency, 1);

        let args = Args::try_parse_from(["imgshrink", "--concurrency", "100"]).unwrap();
        assert_eq!(args.concurrency, 100);

        let result = Args::try_parse_from(["imgshrink", "-c", "0"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );

        let result = Args::try_parse_from(["imgshrink", "-c", "101"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_max_size_flag() {
        let args = Args::try_parse_from(["imgshrink", "--max-size", "1024"]).unwrap();
        assert_eq!(args.max_size, 1024);
    }

    #[test]
    fn test_cli_cache_file_flag() {
        let args = Args::try_parse_from(["imgshrink", "--cache-file", "/tmp/cache.json"]).unwrap();
        assert_eq!(args.cache_file, Some(PathBuf::from("/tmp/cache.json")));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["imgshrink", "--help"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayHelp
        );
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let result = Args::try_parse_from(["imgshrink", "--invalid-flag"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::UnknownArgument
        );
    }
}
