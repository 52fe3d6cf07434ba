use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cairn",
    about = "Cairn: content-addressed backups you can verify",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Host name used for unqualified source paths
    #[arg(long, global = true)]
    pub hostname: Option<String>,

    /// User name used for unqualified source paths
    #[arg(long, global = true)]
    pub username: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new repository
    Init(InitArgs),
    /// Create and list snapshots
    Snapshot(SnapshotArgs),
    /// Inspect stored objects
    Object(ObjectArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Directory to create the repository in (defaults to --repo)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub action: SnapshotAction,
}

#[derive(Subcommand)]
pub enum SnapshotAction {
    /// Capture a local directory or file
    Create {
        dir: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    /// List snapshots
    List {
        /// List snapshots of every source
        #[arg(long)]
        all: bool,
        /// Sources to list (user@host:path, user@host or a path)
        sources: Vec<String>,
    },
}

#[derive(Args)]
pub struct ObjectArgs {
    #[command(subcommand)]
    pub action: ObjectAction,
}

#[derive(Subcommand)]
pub enum ObjectAction {
    /// Verify the integrity of stored objects
    Verify(VerifyArgs),
}

#[derive(Args, Default)]
pub struct VerifyArgs {
    /// Maximum number of errors before stopping (0 = unlimited)
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Directory object IDs to verify
    #[arg(long = "directory-id")]
    pub directory_ids: Vec<String>,

    /// File object IDs to verify
    #[arg(long = "file-id")]
    pub file_ids: Vec<String>,

    /// Verify all snapshots
    #[arg(long)]
    pub all_sources: bool,

    /// Verify the provided sources
    #[arg(long)]
    pub sources: Vec<String>,

    /// Number of parallel workers
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Randomly re-read this percentage of files in full
    #[arg(long = "verify-files-percent", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub files_percent: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["cairn", "init", "/tmp/repo"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.path, Some(PathBuf::from("/tmp/repo")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_repo_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["cairn", "snapshot", "list", "--repo", "/r"]).unwrap();
        assert_eq!(cli.repo, PathBuf::from("/r"));
        assert!(matches!(
            cli.command,
            Command::Snapshot(SnapshotArgs {
                action: SnapshotAction::List { all: false, .. }
            })
        ));
    }

    #[test]
    fn parse_snapshot_create() {
        let cli = Cli::try_parse_from([
            "cairn",
            "snapshot",
            "create",
            "/data",
            "--description",
            "nightly",
        ])
        .unwrap();
        if let Command::Snapshot(SnapshotArgs {
            action: SnapshotAction::Create { dir, description },
        }) = cli.command
        {
            assert_eq!(dir, PathBuf::from("/data"));
            assert_eq!(description.as_deref(), Some("nightly"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_object_verify_flags() {
        let cli = Cli::try_parse_from([
            "cairn",
            "object",
            "verify",
            "--max-errors",
            "5",
            "--directory-id",
            "aa",
            "--directory-id",
            "bb",
            "--file-id",
            "cc",
            "--sources",
            "me@host:/srv",
            "--parallel",
            "4",
            "--verify-files-percent",
            "10",
        ])
        .unwrap();
        let Command::Object(ObjectArgs {
            action: ObjectAction::Verify(args),
        }) = cli.command
        else {
            panic!("wrong command");
        };
        assert_eq!(args.max_errors, Some(5));
        assert_eq!(args.directory_ids, vec!["aa", "bb"]);
        assert_eq!(args.file_ids, vec!["cc"]);
        assert_eq!(args.sources, vec!["me@host:/srv"]);
        assert!(!args.all_sources);
        assert_eq!(args.parallel, Some(4));
        assert_eq!(args.files_percent, Some(10));
    }

    #[test]
    fn verify_files_percent_is_bounded() {
        assert!(Cli::try_parse_from([
            "cairn",
            "object",
            "verify",
            "--verify-files-percent",
            "101"
        ])
        .is_err());
    }

    #[test]
    fn parse_identity_and_format() {
        let cli = Cli::try_parse_from([
            "cairn",
            "--hostname",
            "h",
            "--username",
            "u",
            "--format",
            "json",
            "-v",
            "object",
            "verify",
            "--all-sources",
        ])
        .unwrap();
        assert_eq!(cli.hostname.as_deref(), Some("h"));
        assert_eq!(cli.username.as_deref(), Some("u"));
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
