mod cli;

use retimer::{config, scanner, FileFailure, Pass, Session};
use retimer_avchd::{ClipId, ClipTimestamp, MplDirectoryIndex};
use retimer_common::time::{format_delta, parse_delta, parse_offset, parse_timestamp};
use retimer_tags::Exiftool;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "retimer=trace,retimer_avchd=trace,retimer_tags=debug,retimer_common=debug".to_string()
        } else {
            "retimer=info,retimer_avchd=info,retimer_tags=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { paths, json } => inspect(&paths, cli.config.as_deref(), json),
        Commands::Shift {
            paths,
            delta,
            anchor,
            timezone,
            dry_run,
        } => shift(
            &paths,
            cli.config.as_deref(),
            delta.as_deref(),
            &anchor,
            timezone.as_deref(),
            dry_run,
        ),
        Commands::Avchd { dir, set } => avchd(&dir, &set),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("retimer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Scan inputs and build a session backed by exiftool.
fn open_session(config: &config::Config, paths: &[PathBuf]) -> Result<Session> {
    let scan = scanner::scan(paths, &config.scan.options())?;
    let exiftool = Arc::new(Exiftool::locate(config.tools.exiftool.as_deref())?);
    tracing::debug!("Using exiftool at {:?}", exiftool.program());

    let mut session = Session::new(exiftool.clone(), exiftool);
    if let Some(local) = config.timezone.local_offset()? {
        session.set_local_offset(local);
        session.set_target_offset(local);
    }
    if let Some(target) = config.timezone.target_offset()? {
        session.set_target_offset(target);
    }
    session.populate(scan);
    Ok(session)
}

fn drive(mut pass: Pass<'_>) -> Vec<FileFailure> {
    let kind = pass.kind();
    for progress in pass.by_ref() {
        tracing::trace!(%kind, progress, "Progress");
    }
    pass.finish()
}

fn report_failures(failures: &[FileFailure]) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    for failure in failures {
        eprintln!("✗ {}", failure);
    }
    anyhow::bail!("{} failure(s)", failures.len())
}

fn inspect(paths: &[PathBuf], config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut session = open_session(&config, paths)?;
    let failures = drive(session.reload());
    let target = session.target_offset();

    if json {
        let summaries: Vec<_> = session.files().iter().map(|f| f.summary(target)).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for file in session.files() {
            println!("{}", file.display_path);
            match (file.timestamp, file.source) {
                (Some(ts), Some(source)) => {
                    println!("  Timestamp: {} ({})", ts.format(DISPLAY_FORMAT), source)
                }
                _ => println!("  Timestamp: none"),
            }
            println!("  Delta: {}", format_delta(file.delta));
            for candidate in file.candidates() {
                println!(
                    "  {} = {} [{:?}, {:?}]",
                    candidate.tag,
                    candidate.value,
                    candidate.precision,
                    candidate.awareness
                );
            }
            for issue in &file.issues {
                println!("  ! {}", issue);
            }
        }
    }

    report_failures(&failures)
}

/// Apply `FILE=TIMESTAMP` or `FILE=DELTA` and lock the file.
fn apply_anchor(session: &mut Session, entry: &str) -> Result<()> {
    let (file, value) = entry
        .split_once('=')
        .with_context(|| format!("Anchor must be FILE=TIMESTAMP or FILE=DELTA: {entry:?}"))?;
    let path = std::path::absolute(file)?;

    match parse_timestamp(value, session.target_offset()) {
        Ok(ts) => session.set_corrected_timestamp(&path, ts)?,
        Err(_) => {
            let delta = parse_delta(value)
                .with_context(|| format!("Not a timestamp or delta: {value:?}"))?;
            session.set_delta(&path, delta)?;
        }
    }
    session.lock(&path)?;
    Ok(())
}

fn shift(
    paths: &[PathBuf],
    config_path: Option<&Path>,
    delta: Option<&str>,
    anchors: &[String],
    timezone: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut session = open_session(&config, paths)?;
    let mut failures = drive(session.reload());

    if let Some(delta) = delta {
        session.set_default_delta(parse_delta(delta)?);
    }
    for entry in anchors {
        apply_anchor(&mut session, entry)?;
    }
    if let Some(timezone) = timezone {
        session.set_target_offset(parse_offset(timezone)?);
    }
    failures.extend(drive(session.recompute()));

    let target = session.target_offset();
    println!("Target timezone: {}", target);
    for file in session.files() {
        let Some(ts) = file.timestamp else {
            continue;
        };
        let corrected = file.corrected_timestamp(target).unwrap_or(ts);
        println!(
            "{}  {} -> {}  ({}){}",
            file.display_path,
            ts.format(DISPLAY_FORMAT),
            corrected.format(DISPLAY_FORMAT),
            format_delta(file.delta),
            if file.locked { " [locked]" } else { "" }
        );
    }

    let resolved: Vec<PathBuf> = session
        .files()
        .iter()
        .filter(|f| f.timestamp.is_some())
        .map(|f| f.path.clone())
        .collect();

    if dry_run {
        println!("\n[DRY RUN] Would write {} files", resolved.len());
    } else {
        failures.extend(drive(session.write_back_only(&resolved)));
        let written = session.files().iter().filter(|f| f.is_written()).count();
        println!("\nWrote {} of {} files", written, resolved.len());
    }

    report_failures(&failures)
}

fn parse_clip_id(text: &str) -> Result<ClipId> {
    ClipId::from_file_name(text)
        .or_else(|| text.parse().ok().map(ClipId))
        .with_context(|| format!("Invalid clip: {text:?}"))
}

/// Offsets are kept when given, otherwise the value stays naive.
fn parse_clip_timestamp(text: &str) -> Result<ClipTimestamp> {
    let text = text.trim();
    if let Ok(ts) = DateTime::<FixedOffset>::parse_from_rfc3339(text) {
        return Ok(ts.into());
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(ts.into());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y:%m:%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(ts.into());
        }
    }
    anyhow::bail!("Invalid timestamp: {text:?}")
}

fn avchd(dir: &Path, sets: &[String]) -> Result<()> {
    let (mut index, report) = MplDirectoryIndex::open(dir)?;

    for entry in sets {
        let (clip, value) = entry
            .split_once('=')
            .with_context(|| format!("Expected CLIP=TIMESTAMP: {entry:?}"))?;
        let clip = parse_clip_id(clip)?;
        let ts = parse_clip_timestamp(value)?;
        let record = index
            .get_mut(clip)
            .with_context(|| format!("Clip not found: {clip}"))?;
        record.set_timestamp(ts);
    }
    if !sets.is_empty() {
        let written = index.write()?;
        println!("Updated {} playlist(s)", written);
    }

    for record in index.clips() {
        println!("{}  {}  kind {}", record.id(), record.timestamp(), record.kind());
    }
    println!(
        "\n{} clips in {} playlists ({} skipped)",
        report.clips,
        report.loaded,
        report.skipped.len()
    );

    let failures: Vec<FileFailure> = report
        .failed
        .into_iter()
        .map(|f| FileFailure::new(f.path, f.error))
        .collect();
    report_failures(&failures)
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let configured = config::load_config_or_default(config_path)
        .ok()
        .and_then(|c| c.tools.exiftool);
    let tools = retimer_tags::check_tools(configured.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    let show = |offset: Option<FixedOffset>| {
        offset.map_or_else(|| "system".to_string(), |o| o.to_string())
    };
    println!("  Target timezone: {}", show(config.timezone.target_offset()?));
    println!("  Local timezone: {}", show(config.timezone.local_offset()?));
    println!(
        "  Exiftool: {}",
        config
            .tools
            .exiftool
            .as_ref()
            .map_or_else(|| "PATH".to_string(), |p| p.display().to_string())
    );
    println!("  AVCHD root: {}", config.scan.avchd_root);
    println!("  Follow links: {}", config.scan.follow_links);

    Ok(())
}
