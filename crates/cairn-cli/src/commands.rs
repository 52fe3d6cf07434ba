use std::path::Path;

use anyhow::Context;
use cairn_repo::{RepoConfig, Repository};
use cairn_snapshot::{Manifest, SnapshotStore, SourceInfo};
use cairn_verify::{format_duration, Identity, RootSelection, VerifySummary};
use chrono::Local;
use colored::Colorize;
use humansize::{format_size, BINARY};
use tracing::warn;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Session {
        repo: cli.repo,
        hostname: cli.hostname,
        username: cli.username,
        format: cli.format,
    };
    match cli.command {
        Command::Init(args) => cmd_init(&ctx, args),
        Command::Snapshot(SnapshotArgs { action }) => match action {
            SnapshotAction::Create { dir, description } => {
                cmd_snapshot_create(&ctx, &dir, description.unwrap_or_default())
            }
            SnapshotAction::List { all, sources } => cmd_snapshot_list(&ctx, all, &sources),
        },
        Command::Object(ObjectArgs {
            action: ObjectAction::Verify(args),
        }) => cmd_verify(&ctx, args),
    }
}

/// Global options shared by every command.
struct Session {
    repo: std::path::PathBuf,
    hostname: Option<String>,
    username: Option<String>,
    format: OutputFormat,
}

impl Session {
    fn open(&self) -> anyhow::Result<Repository> {
        Repository::open(&self.repo)
            .with_context(|| format!("cannot open repository at {}", self.repo.display()))
    }

    /// Command-line flags first, then `cairn.toml`, then the environment.
    fn identity(&self, repo: &Repository) -> Identity {
        let configured = &repo.config().identity;
        Identity::resolve(
            self.hostname.clone().or_else(|| configured.hostname.clone()),
            self.username.clone().or_else(|| configured.username.clone()),
        )
    }

    fn json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

fn cmd_init(ctx: &Session, args: InitArgs) -> anyhow::Result<()> {
    let path = args.path.unwrap_or_else(|| ctx.repo.clone());
    Repository::init(&path, RepoConfig::default())
        .with_context(|| format!("cannot initialize repository at {}", path.display()))?;
    println!(
        "{} Initialized cairn repository in {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

fn cmd_snapshot_create(ctx: &Session, dir: &Path, description: String) -> anyhow::Result<()> {
    let repo = ctx.open()?;
    let identity = ctx.identity(&repo);
    let absolute = std::path::absolute(dir)
        .with_context(|| format!("cannot resolve {}", dir.display()))?;
    let source = SourceInfo::new(
        identity.hostname,
        identity.username,
        absolute.to_string_lossy(),
    );
    let manifest = repo.create_snapshot(&absolute, source, description)?;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }
    println!(
        "{} Created snapshot {} of {}",
        "✓".green().bold(),
        manifest.id.short_id().yellow(),
        manifest.source.to_string().bold()
    );
    if let Some(root) = &manifest.root_entry {
        println!("  Root: {} ({})", root.object_id.to_string().cyan(), root.entry_type);
    }
    Ok(())
}

fn cmd_snapshot_list(ctx: &Session, all: bool, sources: &[String]) -> anyhow::Result<()> {
    let repo = ctx.open()?;
    let identity = ctx.identity(&repo);

    let selected = if all || sources.is_empty() {
        repo.snapshots().list_sources()?
    } else {
        sources
            .iter()
            .map(|input| SourceInfo::parse(input, &identity.hostname, &identity.username))
            .collect::<Result<Vec<_>, _>>()?
    };
    let mut manifests = Vec::new();
    for source in &selected {
        manifests.extend(repo.list_snapshots(Some(source))?);
    }

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&manifests)?);
        return Ok(());
    }
    if manifests.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }
    print_manifests(&manifests);
    Ok(())
}

fn print_manifests(manifests: &[Manifest]) {
    let mut current: Option<&SourceInfo> = None;
    for manifest in manifests {
        if current != Some(&manifest.source) {
            println!("{}", manifest.source.to_string().bold());
            current = Some(&manifest.source);
        }
        let root = manifest
            .root_object_id()
            .map(|id| id.short_hex())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {}  {}  {}  {}",
            manifest
                .start_time
                .with_timezone(&Local)
                .format(cairn_verify::progress::TIME_FORMAT),
            manifest.id.short_id().yellow(),
            root.cyan(),
            manifest.description.dimmed()
        );
    }
}

fn cmd_verify(ctx: &Session, args: VerifyArgs) -> anyhow::Result<()> {
    let repo = ctx.open()?;
    let identity = ctx.identity(&repo);

    let mut config = repo.config().verify.clone();
    if let Some(max_errors) = args.max_errors {
        config.max_errors = max_errors;
    }
    if let Some(parallel) = args.parallel {
        config.parallelism = parallel;
    }
    if let Some(percent) = args.files_percent {
        config.files_percent = percent;
    }

    let selection = RootSelection {
        all_sources: args.all_sources,
        sources: args.sources,
        directory_ids: args.directory_ids,
        file_ids: args.file_ids,
    };
    if selection.is_empty() {
        warn!("nothing to verify; pass --all-sources, --sources, --directory-id or --file-id");
        return Ok(());
    }

    let summary = repo.verify(&selection, &identity, config)?;
    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    summary.into_result()?;
    Ok(())
}

fn summary_line(summary: &VerifySummary) -> String {
    let mark = if summary.failures.is_empty() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    format!(
        "{} Verified {} objects in {} directories ({}, {} re-read) in {}",
        mark,
        summary.objects_verified.to_string().bold(),
        summary.directories_listed,
        format_size(summary.bytes_verified, BINARY),
        summary.objects_sampled,
        format_duration(summary.elapsed)
    )
}

fn print_summary(summary: &VerifySummary) {
    println!("{}", summary_line(summary));
    for failure in &summary.failures {
        println!("  {} {}: {}", "failed".red(), failure.path, failure.kind);
    }
}
