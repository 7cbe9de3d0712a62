//! Prepare a development database: migrate, seed sample data and issue one
//! access token per seeded account.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::io::{self, Write};
use std::sync::Arc;

use bookshelf::domain::seed::{SeedReport, seed_dev_data};
use bookshelf::outbound::persistence::{
    DbPool, DieselAccessTokenRepository, DieselResourceRepository, PoolConfig,
    run_pending_migrations,
};
use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use tokio::runtime::Builder;

/// `dev-setup` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dev-setup",
    about = "Migrate the development database and seed sample bookshelf data",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `BOOKSHELF_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Only run migrations.
    #[arg(long = "skip-seed")]
    skip_seed: bool,
}

fn resolve_database_url(cli_value: Option<String>) -> Result<String> {
    cli_value
        .or_else(|| std::env::var("BOOKSHELF_DATABASE_URL").ok())
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| eyre!("pass --database-url or set BOOKSHELF_DATABASE_URL"))
}

fn write_report(out: &mut impl Write, report: &SeedReport) -> io::Result<()> {
    writeln!(
        out,
        "Seeded {} authors, {} books and {} comments.",
        report.authors, report.books, report.comments
    )?;
    for user in &report.users {
        writeln!(
            out,
            "{} <{}> ({}): {}",
            user.name,
            user.email,
            user.role,
            user.token.as_str()
        )?;
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = CliArgs::parse();
    let database_url = resolve_database_url(args.database_url)?;

    let applied = run_pending_migrations(&database_url)
        .await
        .wrap_err("run migrations")?;
    let mut out = io::stdout().lock();
    writeln!(out, "Applied {} migration(s).", applied.len())?;
    if args.skip_seed {
        return Ok(());
    }

    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .wrap_err("create database pool")?;
    let clock = Arc::new(DefaultClock);
    let resources = DieselResourceRepository::new(pool.clone(), clock.clone());
    let tokens = DieselAccessTokenRepository::new(pool, clock);
    let report = seed_dev_data(&resources, &tokens)
        .await
        .map_err(|err| eyre!("seed development data: {err}"))?;
    write_report(&mut out, &report)?;
    Ok(())
}
