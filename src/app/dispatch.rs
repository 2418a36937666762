use crate::app::report::{render_run_report, render_schema, render_verification};
use crate::cli::{Cli, Commands, TargetArgs};
use crate::config::Config;
use crate::error::SweepError;
use crate::retention::{Retention, Session, SqliteStore, introspect};
use anyhow::{Context, Result, bail};
use console::Term;
use dialoguer::Confirm;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;

pub fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            target,
            backup,
            yes,
            json,
        } => {
            let mut config = with_target(config, &target);
            if backup.is_some() {
                config.backup_path = backup;
            }
            run(&config, yes, json)
        }

        Commands::Plan { target, json } => plan(&with_target(config, &target), json),

        Commands::Inspect { database, json } => {
            let target = TargetArgs {
                database,
                ..TargetArgs::default()
            };
            inspect(&with_target(config, &target), json)
        }

        Commands::Verify { target, json } => verify(&with_target(config, &target), json),

        Commands::Init { force, keep } => init(config, force, keep),
    }
}

/// CLI flags override config file and environment.
fn with_target(mut config: Config, target: &TargetArgs) -> Config {
    if let Some(database) = &target.database {
        config.database_path.clone_from(database);
    }
    if !target.keep.is_empty() {
        config.keep.clone_from(&target.keep);
    }
    if let Some(fallback) = target.membership_fallback {
        config.membership_fallback = fallback;
    }
    config
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path, config.store_options())
        .map_err(|err| SweepError::Connectivity {
            last_completed: "nothing (store not opened)".into(),
            cause: err.to_string(),
        })
        .with_context(|| format!("opening {}", config.database_path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize report")?
    );
    Ok(())
}

fn run(config: &Config, yes: bool, json: bool) -> Result<()> {
    config.validate()?;
    let keep = config.keep_set()?;

    if !yes {
        confirm_destructive(config)?;
    }

    let mut store = open_store(config)?;
    if let Some(backup) = &config.backup_path {
        info!("writing backup to {}", backup.display());
        store
            .backup_to(backup)
            .map_err(|err| SweepError::before_plan(err, "backup"))
            .with_context(|| format!("backing up to {}", backup.display()))?;
    }

    let retention = Retention::new(&keep, &config.schema, config.membership_fallback)?;
    let report = match retention.run(&mut store) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{}", crate::ui::style::danger("✗ run failed, transaction rolled back"));
            return Err(err.into());
        }
    };

    if json {
        print_json(&report)
    } else {
        println!("{}", render_run_report(&report));
        Ok(())
    }
}

/// The confirmation reads stdin and is drawn on stderr; stdout may be piped.
fn can_prompt(stdin_is_term: bool, stderr_is_term: bool) -> bool {
    stdin_is_term && stderr_is_term
}

fn confirm_destructive(config: &Config) -> Result<()> {
    if !can_prompt(std::io::stdin().is_terminal(), Term::stderr().is_term()) {
        bail!("refusing to delete without confirmation; pass --yes to run non-interactively");
    }
    let prompt = format!(
        "Delete every row in {} not reachable from {} kept principal(s)?",
        config.database_path.display(),
        config.keep.len()
    );
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("reading confirmation")?;
    if !confirmed {
        bail!("aborted by operator");
    }
    Ok(())
}

fn plan(config: &Config, json: bool) -> Result<()> {
    config.validate()?;
    let keep = config.keep_set()?;
    let mut store = open_store(config)?;
    let retention = Retention::new(&keep, &config.schema, config.membership_fallback)?;
    let report = retention.dry_run(&mut store)?;

    if json {
        print_json(&report)
    } else {
        println!("{}", render_run_report(&report));
        Ok(())
    }
}

fn inspect(config: &Config, json: bool) -> Result<()> {
    config
        .schema
        .validate()
        .map_err(SweepError::from)
        .context("schema descriptor")?;
    let mut store = open_store(config)?;
    let session = store
        .begin_read()
        .map_err(|err| SweepError::before_plan(err, "inspect"))?;
    let schema = introspect(&session, &config.schema)?;
    session
        .rollback()
        .map_err(|err| SweepError::before_plan(err, "inspect"))?;

    if json {
        print_json(&schema)
    } else {
        println!("{}", render_schema(&schema));
        Ok(())
    }
}

fn verify(config: &Config, json: bool) -> Result<()> {
    config.validate()?;
    let keep = config.keep_set()?;
    let mut store = open_store(config)?;
    let retention = Retention::new(&keep, &config.schema, config.membership_fallback)?;
    let verification = retention.verify_only(&mut store)?;

    if json {
        print_json(&verification)
    } else {
        println!("{}", render_verification(&verification));
        Ok(())
    }
}

fn init(mut config: Config, force: bool, keep: Vec<String>) -> Result<()> {
    let path: PathBuf = config.config_path.clone();
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    if !keep.is_empty() {
        config.keep = keep;
    }
    config.save()?;
    println!("Wrote {}", path.display());
    if config.keep.is_empty() {
        println!("Add the principals to keep under `keep = [...]` before running.");
    }
    Ok(())
}
