//! CLI argument parsing.
//!
//! Defines the `Command` enum and `parse_args()` for all subcommands. The
//! CLI is a thin adapter over the library's query surface; no engine logic
//! lives here.

use anyhow::{bail, Result};
use std::path::PathBuf;

use sextant::{EdgeKind, SymbolKind};

pub fn print_usage() {
    eprintln!("Sextant - persistent knowledge graph of a source tree");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  sextant <command> [arguments]");
    eprintln!("  sextant --help");
    eprintln!();
    eprintln!("  sextant index --root <DIR> [--force] [--incremental] [--watch]");
    eprintln!("  sextant watch --root <DIR>");
    eprintln!("  sextant overview [--root <DIR>] [--top <N>] [--with-git]");
    eprintln!("  sextant symbol --name <NAME> [--file <PATH>] [--kind <KIND>] [--limit <N>]");
    eprintln!("  sextant search --pattern <PATTERN> [--kind <KIND>] [--exported-only] [--limit <N>]");
    eprintln!("  sextant structure --file <PATH> [--include-private]");
    eprintln!("  sextant deps --target <SYMBOL> [--depth <N>] [--types <a,b,c>]");
    eprintln!("  sextant dependents --target <SYMBOL> [--depth <N>] [--unstable-only] [--threshold <F>]");
    eprintln!("  sextant impact --file <PATH> [--file <PATH>]...");
    eprintln!("  sextant history --target <SYMBOL> [--refresh]");
    eprintln!("  sextant similar --description <TEXT> [--kind <KIND>] [--limit <N>]");
    eprintln!("  sextant path --from <SYMBOL> --to <SYMBOL> [--critical]");
    eprintln!("  sextant cycles");
    eprintln!("  sextant bottlenecks");
    eprintln!("  sextant dead-code");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  index       Index a project (full, or incremental with --incremental)");
    eprintln!("  watch       Index incrementally, then watch for changes");
    eprintln!("  overview    Project stats and the top-ranked symbols");
    eprintln!("  symbol      Fuzzy symbol lookup by name");
    eprintln!("  search      Wildcard search over symbol names");
    eprintln!("  structure   Nested symbol tree of one file");
    eprintln!("  deps        What a symbol depends on");
    eprintln!("  dependents  What depends on a symbol");
    eprintln!("  impact      Blast radius of editing the given files");
    eprintln!("  history     Git metadata for a symbol's file");
    eprintln!("  similar     Symbols similar to a description");
    eprintln!("  path        Shortest (or PageRank-weighted) chain between two symbols");
    eprintln!("  cycles      Dependency cycles in the graph");
    eprintln!("  bottlenecks Symbols with heavy fan-in and fan-out");
    eprintln!("  dead-code   Unreferenced, unexported, low-rank symbols");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --config <FILE>   Configuration file (default: sextant.json; required)");
    eprintln!("  --root <DIR>      Project root (default: current directory)");
}

/// One parsed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub config_path: PathBuf,
    pub root: PathBuf,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Index {
        force: bool,
        incremental: bool,
        watch: bool,
    },
    Watch,
    Overview {
        top: usize,
        with_git: bool,
    },
    Symbol {
        name: String,
        filepath: Option<String>,
        kind: Option<SymbolKind>,
        limit: Option<usize>,
    },
    Search {
        pattern: String,
        kind: Option<SymbolKind>,
        exported_only: bool,
        limit: Option<usize>,
    },
    Structure {
        file: String,
        include_private: bool,
    },
    Deps {
        target: String,
        depth: usize,
        kinds: Option<Vec<EdgeKind>>,
    },
    Dependents {
        target: String,
        depth: usize,
        unstable_only: bool,
        threshold: f64,
    },
    Impact {
        files: Vec<String>,
    },
    History {
        target: String,
        refresh: bool,
    },
    Similar {
        description: String,
        kind: Option<SymbolKind>,
        limit: Option<usize>,
    },
    Path {
        from: String,
        to: String,
        critical: bool,
    },
    Cycles,
    Bottlenecks,
    DeadCode,
}

/// Parse everything after the binary name.
pub fn parse_args(args: &[String]) -> Result<Cli> {
    let Some(command_name) = args.first() else {
        bail!("missing command");
    };

    let mut config_path = PathBuf::from("sextant.json");
    let mut root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Command-specific accumulators.
    let mut force = false;
    let mut incremental = false;
    let mut watch = false;
    let mut top = 10usize;
    let mut with_git = false;
    let mut name: Option<String> = None;
    let mut filepath: Option<String> = None;
    let mut kind: Option<SymbolKind> = None;
    let mut limit: Option<usize> = None;
    let mut pattern: Option<String> = None;
    let mut exported_only = false;
    let mut files: Vec<String> = Vec::new();
    let mut include_private = false;
    let mut target: Option<String> = None;
    let mut depth = 2usize;
    let mut kinds: Option<Vec<EdgeKind>> = None;
    let mut unstable_only = false;
    let mut threshold = 0.5f64;
    let mut refresh = false;
    let mut description: Option<String> = None;
    let mut from: Option<String> = None;
    let mut to: Option<String> = None;
    let mut critical = false;

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| -> Result<String> {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--config" => config_path = PathBuf::from(value("--config")?),
            "--root" => root = PathBuf::from(value("--root")?),
            "--force" => force = true,
            "--incremental" => incremental = true,
            "--watch" => watch = true,
            "--top" => top = value("--top")?.parse()?,
            "--with-git" => with_git = true,
            "--name" => name = Some(value("--name")?),
            "--file" => {
                let v = value("--file")?;
                filepath = Some(v.clone());
                files.push(v);
            }
            "--kind" => {
                let v = value("--kind")?;
                kind = Some(
                    SymbolKind::parse(&v)
                        .ok_or_else(|| anyhow::anyhow!("unknown symbol kind '{}'", v))?,
                );
            }
            "--limit" => limit = Some(value("--limit")?.parse()?),
            "--pattern" => pattern = Some(value("--pattern")?),
            "--exported-only" => exported_only = true,
            "--include-private" => include_private = true,
            "--target" => target = Some(value("--target")?),
            "--depth" => depth = value("--depth")?.parse()?,
            "--types" => {
                let parsed: Result<Vec<EdgeKind>> = value("--types")?
                    .split(',')
                    .map(|t| {
                        EdgeKind::parse(t.trim())
                            .ok_or_else(|| anyhow::anyhow!("unknown edge type '{}'", t))
                    })
                    .collect();
                kinds = Some(parsed?);
            }
            "--unstable-only" => unstable_only = true,
            "--threshold" => threshold = value("--threshold")?.parse()?,
            "--refresh" => refresh = true,
            "--description" => description = Some(value("--description")?),
            "--from" => from = Some(value("--from")?),
            "--to" => to = Some(value("--to")?),
            "--critical" => critical = true,
            other => bail!("unknown argument '{}'", other),
        }
    }

    let command = match command_name.as_str() {
        "index" => Command::Index {
            force,
            incremental,
            watch,
        },
        "watch" => Command::Watch,
        "overview" => Command::Overview { top, with_git },
        "symbol" => Command::Symbol {
            name: name.ok_or_else(|| anyhow::anyhow!("symbol requires --name"))?,
            filepath,
            kind,
            limit,
        },
        "search" => Command::Search {
            pattern: pattern.ok_or_else(|| anyhow::anyhow!("search requires --pattern"))?,
            kind,
            exported_only,
            limit,
        },
        "structure" => Command::Structure {
            file: files
                .first()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("structure requires --file"))?,
            include_private,
        },
        "deps" => Command::Deps {
            target: target.ok_or_else(|| anyhow::anyhow!("deps requires --target"))?,
            depth,
            kinds,
        },
        "dependents" => Command::Dependents {
            target: target.ok_or_else(|| anyhow::anyhow!("dependents requires --target"))?,
            depth,
            unstable_only,
            threshold,
        },
        "impact" => {
            if files.is_empty() {
                bail!("impact requires at least one --file");
            }
            Command::Impact { files }
        }
        "history" => Command::History {
            target: target.ok_or_else(|| anyhow::anyhow!("history requires --target"))?,
            refresh,
        },
        "similar" => Command::Similar {
            description: description
                .ok_or_else(|| anyhow::anyhow!("similar requires --description"))?,
            kind,
            limit,
        },
        "path" => Command::Path {
            from: from.ok_or_else(|| anyhow::anyhow!("path requires --from"))?,
            to: to.ok_or_else(|| anyhow::anyhow!("path requires --to"))?,
            critical,
        },
        "cycles" => Command::Cycles,
        "bottlenecks" => Command::Bottlenecks,
        "dead-code" => Command::DeadCode,
        other => bail!("unknown command '{}'", other),
    };

    Ok(Cli {
        config_path,
        root,
        command,
    })
}
