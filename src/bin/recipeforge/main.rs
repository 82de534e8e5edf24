mod args;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;

use args::{Args, Command};
use recipeforge::diff;
use recipeforge::error::ConsistencyError;
use recipeforge::model::State;
use recipeforge::push::PushDriver;
use recipeforge::query::{self, QueryResult};
use recipeforge::tpath::TPath;

/// Default host a bare `repo:<name>` resolves against, absent a `/`
/// separator naming one explicitly (spec §4.2's "logical repository name
/// mapped to a URL").
const DEFAULT_REPO_HOST: &str = "packages.getsol.us";

async fn load_state(tpath: &TPath) -> Result<(State, Vec<ConsistencyError>)> {
    match tpath {
        TPath::Src(path) => recipeforge::loader::load(Path::new(path.as_str()))
            .await
            .with_context(|| format!("failed to load source tree at {path}")),
        TPath::Bin(path) => recipeforge::index::load_local(Path::new(path.as_str()))
            .with_context(|| format!("failed to load binary index at {path}")),
        TPath::Repo(name) => {
            let (host, name) = name.split_once('/').unwrap_or((DEFAULT_REPO_HOST, name.as_str()));
            recipeforge::index::load_remote(host, name)
                .with_context(|| format!("failed to fetch remote index repo:{host}/{name}"))
        }
    }
}

fn report_duplicates(duplicates: &[ConsistencyError]) {
    for dup in duplicates {
        tracing::warn!("{dup}");
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_query(
    tpath: String,
    names: Vec<String>,
    dot: Option<camino::Utf8PathBuf>,
    tiers: bool,
    forward: usize,
    reverse: usize,
    show_sub: bool,
) -> Result<()> {
    let parsed: TPath = tpath.parse()?;
    let (state, duplicates) = load_state(&parsed).await?;
    report_duplicates(&duplicates);

    if let Some(dot_path) = dot {
        let dot = query::render_dot(&state, &state.dep_graph, show_sub);
        std::fs::write(&dot_path, dot).with_context(|| format!("failed to write DOT output to {dot_path}"))?;
    }

    match query::query(&state, &names, forward, reverse) {
        Ok(QueryResult::Tiers(result_tiers)) => {
            if tiers {
                for (tier_idx, tier) in result_tiers.iter().enumerate() {
                    let mut labels: Vec<&str> = tier.iter().map(|&i| state.packages[i].primary_name()).collect();
                    labels.sort_unstable();
                    println!("{}: {}", format!("tier {tier_idx}").bold(), labels.join(" "));
                }
            } else {
                for i in result_tiers.into_iter().flatten() {
                    println!("{}", state.packages[i].primary_name());
                }
            }
            Ok(())
        }
        Err(recipeforge::error::Error::Graph(recipeforge::error::GraphError::CyclesDetected(cycles))) => {
            for (idx, cycle) in cycles.iter().enumerate() {
                println!(
                    "{} {}",
                    format!("cycle {}:", idx + 1).red().bold(),
                    cycle.witness_chain.join(" -> ")
                );
            }
            bail!("the lifted graph contains {} cycle(s)", cycles.len());
        }
        Err(other) => Err(other.into()),
    }
}

async fn run_diff(old: String, new: String, strict: bool) -> Result<()> {
    let old_parsed: TPath = old.parse()?;
    let new_parsed: TPath = new.parse()?;
    let (old_state, _) = load_state(&old_parsed).await?;
    let (new_state, duplicates) = load_state(&new_parsed).await?;
    report_duplicates(&duplicates);

    let mut had_error = false;
    for d in diff::diff(&old_state, &new_state) {
        if d.is_new() {
            println!("{} {}", "new".green(), d.source);
        } else if d.is_rebuild() {
            println!("{} {}", "rebuild".blue(), d.source);
        } else if d.is_downgrade() {
            let line = format!("downgrade {}", d.source);
            if strict {
                println!("{}", line.yellow());
            } else {
                println!("{}", line.red());
                had_error = true;
            }
        } else if d.is_conflict() {
            let line = format!("conflict {}", d.source);
            if strict {
                println!("{}", line.yellow());
            } else {
                println!("{}", line.red());
                had_error = true;
            }
        }
    }

    if had_error && !strict {
        bail!("diff reported downgrade(s)/conflict(s); pass --strict to treat them as warnings");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_push(
    old: String,
    new: String,
    names: Vec<String>,
    force: bool,
    dry_run: bool,
    push: bool,
    controller: String,
) -> Result<()> {
    let old_parsed: TPath = old.parse()?;
    let new_parsed: TPath = new.parse()?;
    let (old_state, _) = load_state(&old_parsed).await?;
    let (new_state, duplicates) = load_state(&new_parsed).await?;
    report_duplicates(&duplicates);

    let diffs = diff::diff(&old_state, &new_state);
    let changed: Vec<_> = if names.is_empty() {
        diffs.into_iter().filter(|d| !d.is_same()).collect()
    } else {
        diffs.into_iter().filter(|d| names.contains(&d.source)).collect()
    };

    if !force {
        for d in &changed {
            if d.is_downgrade() || d.is_conflict() {
                bail!("{} is a downgrade or version conflict; pass --force to override", d.source);
            }
        }
        for d in &changed {
            if !new_state.packages[d.new_idx].resolved {
                bail!("{} has unresolved build dependencies; pass --force to override", d.source);
            }
        }
    }

    let chosen: std::collections::HashSet<usize> = changed.iter().map(|d| d.new_idx).collect();
    let lifted = recipeforge::graph::lift(&new_state.dep_graph, |v| chosen.contains(&v));
    let tiers = recipeforge::graph::tiered_topological_sort(&lifted)
        .map_err(|()| anyhow::anyhow!("build order has cycles; run `recipeforge query` on the affected packages"))?;

    let order: Vec<_> = recipeforge::graph::flatten_tiers(&tiers)
        .into_iter()
        .map(|n| new_state.packages[lifted[n]].clone())
        .collect();

    for pkg in &order {
        println!("{}", pkg.primary_name());
    }

    if dry_run {
        return Ok(());
    }

    let (user, host) = controller
        .split_once('@')
        .ok_or_else(|| anyhow::anyhow!("--controller must be `<user>@<host>`"))?;
    let driver = PushDriver::new(user, host, dry_run, push);
    driver.push_all(&order).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    recipeforge::tracing::init(args.verbose, args.quiet);

    match args.command {
        Command::Query {
            tpath,
            names,
            dot,
            tiers,
            forward,
            reverse,
            show_sub,
        } => run_query(tpath, names, dot, tiers, forward, reverse, show_sub).await,
        Command::Diff { old, new, strict } => run_diff(old, new, strict).await,
        Command::Push {
            old,
            new,
            names,
            force,
            dry_run,
            push,
            controller,
        } => run_push(old, new, names, force, dry_run, push, controller).await,
    }
}
