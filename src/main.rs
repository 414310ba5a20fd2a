//! Sextant CLI entry point.
//!
//! Loads configuration (fatal when missing), connects the store backend
//! (fatal when unreachable, with installation hints), and dispatches one
//! subcommand. Query results print as JSON; indexing prints a summary and
//! a progress bar.

mod cli;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cli::{parse_args, print_usage, Cli, Command};
use sextant::{
    run_watch_loop, Config, DependentsOptions, FileSystemWatcher, GraphAnalytics, GraphStore,
    IndexOptions, IndexStats, Indexer, QueryService, RedisBackend, SearchFilter, SymbolFilter,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || matches!(args[1].as_str(), "--help" | "-h") {
        print_usage();
        return if args.len() < 2 {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        };
    }

    let cli = match parse_args(&args[1..]) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config_path)?;
    let backend = RedisBackend::connect(&config.redis.url).await?;
    let store = Arc::new(GraphStore::new(
        Arc::new(backend),
        config.redis.key_prefix.clone(),
    ));

    let root_str = cli.root.to_string_lossy().to_string();
    store.set_project_context(&root_str).await;

    match cli.command.clone() {
        Command::Index {
            force,
            incremental,
            watch,
        } => {
            let indexer = Indexer::new(Arc::clone(&store), config.clone());
            let stats = index_with_progress(&indexer, &cli, IndexOptions { force, incremental })
                .await?;
            print_index_stats(&stats);

            if watch && config.watcher.enabled {
                watch_forever(&indexer, &cli, &config).await?;
            }
        }

        Command::Watch => {
            let indexer = Indexer::new(Arc::clone(&store), config.clone());
            let stats = index_with_progress(
                &indexer,
                &cli,
                IndexOptions {
                    force: false,
                    incremental: true,
                },
            )
            .await?;
            print_index_stats(&stats);
            watch_forever(&indexer, &cli, &config).await?;
        }

        Command::Overview { top, with_git } => {
            let service = QueryService::new(store, &config);
            let overview = service.get_project_overview(top, with_git).await?;
            print_json(&overview)?;
        }

        Command::Symbol {
            name,
            filepath,
            kind,
            limit,
        } => {
            let service = QueryService::new(store, &config);
            let matches = service
                .get_symbol(
                    &name,
                    &SymbolFilter {
                        filepath,
                        kind,
                        limit,
                    },
                )
                .await?;
            print_json(&matches)?;
        }

        Command::Search {
            pattern,
            kind,
            exported_only,
            limit,
        } => {
            let service = QueryService::new(store, &config);
            let hits = service
                .search_symbols(
                    &pattern,
                    &SearchFilter {
                        kind,
                        exported_only,
                        limit,
                    },
                )
                .await?;
            print_json(&hits)?;
        }

        Command::Structure {
            file,
            include_private,
        } => {
            let service = QueryService::new(store, &config);
            let structure = service.get_file_structure(&file, include_private).await?;
            print_json(&structure)?;
        }

        Command::Deps {
            target,
            depth,
            kinds,
        } => {
            let service = QueryService::new(store, &config);
            let report = service
                .get_dependencies(&target, depth, kinds.as_deref())
                .await?;
            print_json(&report)?;
        }

        Command::Dependents {
            target,
            depth,
            unstable_only,
            threshold,
        } => {
            let service = QueryService::new(store, &config);
            let report = service
                .get_dependents(
                    &target,
                    depth,
                    &DependentsOptions {
                        unstable_only,
                        stability_threshold: threshold,
                        include_git: unstable_only,
                    },
                )
                .await?;
            print_json(&report)?;
        }

        Command::Impact { files } => {
            let service = QueryService::new(store, &config);
            let report = service
                .get_impact(&files, &DependentsOptions::default())
                .await?;
            print_json(&report)?;
        }

        Command::History { target, refresh } => {
            let service = QueryService::new(store, &config);
            match service.get_symbol_history(&target, refresh).await? {
                Some(metadata) => print_json(&metadata)?,
                None => println!("null"),
            }
        }

        Command::Similar {
            description,
            kind,
            limit,
        } => {
            let service = QueryService::new(store, &config);
            let hits = service.find_similar(&description, kind, limit).await?;
            print_json(&hits)?;
        }

        Command::Path { from, to, critical } => {
            let analytics = GraphAnalytics::new(&store);
            let path = if critical {
                analytics.find_critical_path(&from, &to).await?
            } else {
                analytics.find_path(&from, &to).await?
            };
            print_json(&path)?;
        }

        Command::Cycles => {
            let analytics = GraphAnalytics::new(&store);
            print_json(&analytics.find_cycles().await?)?;
        }

        Command::Bottlenecks => {
            let analytics = GraphAnalytics::new(&store);
            print_json(&analytics.find_bottlenecks().await?)?;
        }

        Command::DeadCode => {
            let analytics = GraphAnalytics::new(&store);
            print_json(&analytics.find_dead_code().await?)?;
        }
    }

    Ok(())
}

async fn index_with_progress(
    indexer: &Indexer,
    cli: &Cli,
    options: IndexOptions,
) -> Result<IndexStats> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{bar:30}] {pos}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let progress_bar = bar.clone();
    let stats = indexer
        .index_project(
            &cli.root,
            options,
            Some(&move |progress| {
                progress_bar.set_length(progress.total_files as u64);
                progress_bar.set_position(progress.files_processed as u64);
                progress_bar.set_message(format!(
                    "{} symbols, {} deps, {} errors",
                    progress.symbols_found, progress.dependencies_found, progress.errors
                ));
            }),
        )
        .await?;
    bar.finish_and_clear();
    Ok(stats)
}

fn print_index_stats(stats: &IndexStats) {
    println!(
        "Indexed {} files ({} deleted): {} symbols, {} dependencies, {} errors",
        stats.files_indexed,
        stats.files_deleted,
        stats.symbols_found,
        stats.dependencies_found,
        stats.errors.len()
    );
    for error in &stats.errors {
        eprintln!("  error: {}: {}", error.path, error.message);
    }
}

async fn watch_forever(indexer: &Indexer, cli: &Cli, config: &Config) -> Result<()> {
    eprintln!("Watching {} for changes…", cli.root.display());
    let watcher = FileSystemWatcher::new(cli.root.clone(), &config.watcher, &config.indexer)?;
    run_watch_loop(indexer, &watcher, None).await
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
