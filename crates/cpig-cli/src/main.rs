mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use cpig_core::config::{self, AppConfig, DEFAULT_CONFIG_PATH};
use cpig_core::{CatalogService, Error};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let _guard = logging::init_logger(args.verbose);

    let config = match config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config, args.config.as_deref(), args.verbose) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(
    command: Commands,
    config: &AppConfig,
    config_path: Option<&Path>,
    verbose: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Create => {
            let service = CatalogService::create(config.clone())
                .with_context(|| format!("Failed to create catalog at {}", config.db_path))?;
            println!("Database created successfully at {}.", config.db_path);
            service.close()?;
        }
        Commands::Add {
            files,
            check_duplicates,
        } => run_add(config, &files, check_duplicates)?,
        Commands::Scan { check_duplicates } => {
            let service = open_catalog(config)?;
            let summary = service.ingest_directory(check_duplicates, &CliReporter::new())?;
            info!(
                "{} catalogued, {} already known, {} duplicate content, {} failed",
                format!("{}", summary.ingested).green(),
                summary.already_catalogued,
                format!("{}", summary.duplicate_content).yellow(),
                format!("{}", summary.failed).red(),
            );
            service.close()?;
        }
        Commands::Check { lost } => run_check(config, lost, verbose)?,
        Commands::Stats => run_stats(config)?,
        Commands::Duplicates { delete, yes } => run_duplicates(config, delete, yes, verbose)?,
        Commands::Rehash => {
            let service = open_catalog(config)?;
            let updated = service.rehash_missing(&CliReporter::new())?;
            info!("{} entries rehashed", format!("{}", updated).green());
            service.close()?;
        }
        Commands::PrintConfig => {
            println!("db_path: {}", config.db_path);
            println!("image_extensions: {:?}", config.image_extensions);
            println!("catalog_root: {}", config.catalog_root().display());
        }
        Commands::MakeDefaultConfig => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            AppConfig::default().save(&path)?;
            println!("Configuration saved to {}.", path.display());
        }
    }
    Ok(())
}

fn open_catalog(config: &AppConfig) -> anyhow::Result<CatalogService> {
    match CatalogService::open(config.clone()) {
        Ok(service) => Ok(service),
        Err(Error::MissingFile(path)) => bail!(
            "No catalog at {}. Run `cpig create` first.",
            path.display()
        ),
        Err(err) => Err(err.into()),
    }
}

fn run_add(config: &AppConfig, files: &[PathBuf], check_duplicates: bool) -> anyhow::Result<()> {
    let service = open_catalog(config)?;
    let mut failed = 0;
    for file in files {
        let absolute = match file.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot add {}: {}", file.display(), e);
                failed += 1;
                continue;
            }
        };
        let outcome = service.ingest_checked(&absolute, check_duplicates);
        if outcome.is_success() {
            info!("Added {}", file.display());
        } else {
            warn!("Error adding {}: {:?}", file.display(), outcome);
            failed += 1;
        }
    }
    service.close()?;
    if failed > 0 {
        bail!("{} of {} files were not added", failed, files.len());
    }
    Ok(())
}

fn run_check(config: &AppConfig, lost: bool, verbose: bool) -> anyhow::Result<()> {
    let service = open_catalog(config)?;
    let report = service.check_and_report()?;

    if report.consistent {
        println!("{}", "Database is consistent.".green());
    } else {
        println!(
            "{} unregistered files found.",
            format!("{}", report.unregistered_files.len()).red()
        );
        if verbose {
            for file in &report.unregistered_files {
                println!(" - {}", file);
            }
        }
    }

    if lost {
        if report.lost_files.is_empty() {
            println!("No lost files found.");
        } else {
            println!(
                "{} catalogued files are missing on disk.",
                format!("{}", report.lost_files.len()).yellow()
            );
            if verbose {
                for file in &report.lost_files {
                    println!(" - {}", file);
                }
            }
        }
    }

    service.close()?;
    Ok(())
}

fn run_stats(config: &AppConfig) -> anyhow::Result<()> {
    let service = open_catalog(config)?;
    let stats = service.statistics()?;
    let duplicate_groups = service.list_duplicates()?.len();

    println!("total_images: {}", stats.total_entries);
    println!("images_with_content_hash: {}", stats.entries_with_content_hash);
    println!("images_with_perceptual_hash: {}", stats.entries_with_perceptual_hash);
    println!("images_with_both_hashes: {}", stats.entries_with_both);
    println!("duplicate_groups: {}", duplicate_groups);

    service.close()?;
    Ok(())
}

fn run_duplicates(config: &AppConfig, delete: bool, yes: bool, verbose: bool) -> anyhow::Result<()> {
    let service = open_catalog(config)?;
    let preview = service.resolve_duplicates(false, &CliReporter::new())?;

    if preview.groups.is_empty() {
        println!("No double files found.");
        return Ok(service.close()?);
    }
    println!(
        "{} double files found.",
        format!("{}", preview.groups.len()).red()
    );
    if verbose {
        for group in &preview.groups {
            println!("{}: {}", group.content_hash, group.paths.join(", "));
        }
    }

    if !delete {
        return Ok(service.close()?);
    }

    for (index, planned) in preview.planned.iter().enumerate() {
        println!(
            "Delete file ({}/{}): {} with md5: {}",
            index + 1,
            preview.planned.len(),
            planned.path,
            planned.content_hash
        );
    }

    let confirmed = yes
        || prompt_confirm(
            &format!("Delete {} files from disk and catalog?", preview.planned.len()),
            Some(false),
        )?;
    if !confirmed {
        println!("Nothing deleted.");
        return Ok(service.close()?);
    }

    // regrouped inside resolve_duplicates; the catalog may have changed since the preview
    let resolution = service.resolve_duplicates(true, &CliReporter::new())?;
    info!(
        "{} duplicate files deleted",
        format!("{}", resolution.deleted).green()
    );
    service.close()?;
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
