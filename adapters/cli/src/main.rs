#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that levels a demo bid package in the terminal.

mod manifest;
mod snapshot_transfer;
mod table;

use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use bid_leveling_core::{BidderId, Command, Event, ScopeId, DEFAULT_DEMO_SEED};
use bid_leveling_rendering::{DisplayFilter, MatrixBackend, MatrixOptions, MatrixPresentation};
use bid_leveling_session::{self as session, query, Session};
use bid_leveling_system_bootstrap::DemoPackage;
use bid_leveling_system_scenario::{aggregate, award_lines};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{manifest::RuleManifest, table::TableBackend};

#[derive(Debug, Parser)]
#[command(name = "bid-leveling", version, about = "Level construction bids side by side")]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// TOML rule manifest applied on top of the default rules.
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    /// Session snapshot string previously printed by `scenario --export`.
    #[arg(long, global = true)]
    snapshot: Option<String>,
    #[command(flatten)]
    package: PackageArgs,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Args)]
struct PackageArgs {
    /// Generate a package from this seed instead of the leveling page fixture.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Number of bidders in a generated package.
    #[arg(long, global = true, default_value_t = 5)]
    bidders: usize,
    /// Number of scope items in a generated package.
    #[arg(long, global = true, default_value_t = 8)]
    scopes: usize,
    /// Generate a package from the default seed.
    #[arg(long, global = true, conflicts_with = "seed")]
    generated: bool,
}

impl PackageArgs {
    fn package(&self) -> DemoPackage {
        match (self.seed, self.generated) {
            (Some(seed), _) => DemoPackage::generated(seed, self.bidders, self.scopes),
            (None, true) => DemoPackage::generated(DEFAULT_DEMO_SEED, self.bidders, self.scopes),
            (None, false) => DemoPackage::leveling_page(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Print the leveled matrix with row medians and outlier markers.
    Matrix(MatrixArgs),
    /// Award scope items to bidders and print the scenario totals.
    Scenario(ScenarioArgs),
    /// List the effective normalization rules.
    Rules,
}

#[derive(Debug, Default, Args)]
struct MatrixArgs {
    /// Show only cells with exclusions, clarifications or alternates.
    #[arg(long)]
    gaps_only: bool,
    /// Show only fully included cells. Takes precedence over --gaps-only.
    #[arg(long)]
    included_only: bool,
    /// Disable the status background tint.
    #[arg(long)]
    no_heatmap: bool,
}

impl MatrixArgs {
    fn options(&self) -> MatrixOptions {
        MatrixOptions {
            filter: DisplayFilter::from_toggles(self.included_only, self.gaps_only),
            heatmap: !self.no_heatmap,
        }
    }
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Award a scope item to a bidder, written as SCOPE=BIDDER. Repeatable.
    #[arg(long = "select", value_parser = parse_selection)]
    selections: Vec<(ScopeId, BidderId)>,
    /// Fork the active scenario under this name before applying selections.
    #[arg(long)]
    new: Option<String>,
    /// Print the resulting session as a transferable snapshot string.
    #[arg(long)]
    export: bool,
}

fn parse_selection(value: &str) -> Result<(ScopeId, BidderId), String> {
    let (scope, bidder) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SCOPE=BIDDER, got '{value}'"))?;
    let (scope, bidder) = (scope.trim(), bidder.trim());
    if scope.is_empty() || bidder.is_empty() {
        return Err(format!("expected SCOPE=BIDDER, got '{value}'"));
    }
    Ok((ScopeId::new(scope), BidderId::new(bidder)))
}

/// Entry point for the bid leveling command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let package = cli.package.package();
    let mut session = load_session(cli.snapshot.as_deref(), cli.rules.as_deref())?;
    let mut backend = TableBackend::new(io::stdout().lock());

    match cli.command.unwrap_or(CliCommand::Matrix(MatrixArgs::default())) {
        CliCommand::Matrix(args) => {
            let active = query::active_scenario(&session);
            println!("{} ({})", active.name, active.id);
            let presentation = MatrixPresentation::build(
                package.bidders(),
                package.scope_items(),
                query::rules(&session),
                active.selections(),
                args.options(),
            );
            backend.present(&presentation)
        }
        CliCommand::Scenario(args) => run_scenario(&mut session, &package, args, &mut backend),
        CliCommand::Rules => backend.present_rules(query::rules(&session)),
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_session(snapshot: Option<&str>, rules: Option<&Path>) -> Result<Session> {
    let mut session = match snapshot {
        Some(encoded) => {
            let snapshot = snapshot_transfer::decode(encoded)
                .context("failed to decode session snapshot")?;
            Session::restore(snapshot).context("snapshot does not describe a valid session")?
        }
        None => Session::new(),
    };

    if let Some(path) = rules {
        RuleManifest::load(path)
            .and_then(|manifest| manifest.apply_to(&mut session))
            .with_context(|| format!("failed to apply rule manifest {}", path.display()))?;
    }
    Ok(session)
}

fn run_scenario<W: io::Write>(
    session: &mut Session,
    package: &DemoPackage,
    args: ScenarioArgs,
    backend: &mut TableBackend<W>,
) -> Result<()> {
    for (scope, bidder) in &args.selections {
        if !package.scope_items().iter().any(|item| &item.id == scope) {
            bail!("scope item '{scope}' is not part of the package");
        }
        if !package.bidders().iter().any(|candidate| &candidate.id == bidder) {
            bail!("bidder '{bidder}' did not bid on the package");
        }
    }

    let mut commands = Vec::with_capacity(args.selections.len() + 1);
    if let Some(name) = args.new {
        commands.push(Command::CreateScenario { name });
    }
    commands.extend(
        args.selections
            .into_iter()
            .map(|(scope, bidder)| Command::SelectBidder { scope, bidder }),
    );

    let mut events = Vec::new();
    for command in commands {
        events.clear();
        session::apply(session, command, &mut events);
        for event in &events {
            if let Event::ScenarioRejected { reason } = event {
                bail!("scenario command rejected: {reason}");
            }
            debug!(?event, "scenario change applied");
        }
    }

    for entry in query::audit_trail(session) {
        info!(sequence = entry.sequence, action = ?entry.action, "{}", entry.detail);
    }

    let active = query::active_scenario(session);
    let scope_ids = package.scope_ids();
    let rules = query::rules(session);
    backend.present_award(
        &format!("{} ({})", active.name, active.id),
        &award_lines(&scope_ids, active.selections(), rules),
        aggregate(&scope_ids, active.selections(), rules),
    )?;

    if args.export {
        let encoded = snapshot_transfer::encode(&query::snapshot(session))
            .context("failed to encode session snapshot")?;
        println!("{encoded}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_arguments_split_on_equals() {
        assert_eq!(
            parse_selection("CSI-23-0900 = VND-012"),
            Ok((ScopeId::new("CSI-23-0900"), BidderId::new("VND-012")))
        );
        assert!(parse_selection("CSI-23-0900").is_err());
        assert!(parse_selection("=VND-012").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn scenario_export_restores_into_matching_session() {
        let package = DemoPackage::leveling_page();
        let mut session = Session::new();
        let args = ScenarioArgs {
            selections: vec![
                (ScopeId::new("CSI-23-0900"), BidderId::new("VND-012")),
                (ScopeId::new("CSI-23-3400"), BidderId::new("VND-012")),
            ],
            new: Some("Value engineered".to_owned()),
            export: false,
        };
        let mut backend = TableBackend::new(Vec::new());
        run_scenario(&mut session, &package, args, &mut backend).expect("scenario runs");

        let encoded =
            snapshot_transfer::encode(&query::snapshot(&session)).expect("snapshot encodes");
        let restored = load_session(Some(&encoded), None).expect("session restores");
        assert_eq!(query::snapshot(&restored), query::snapshot(&session));
        assert_eq!(query::active_scenario(&restored).name, "Value engineered");
        assert_eq!(query::scenarios(&restored).len(), 2);
    }

    #[test]
    fn rejected_scenario_commands_surface_the_reason() {
        let package = DemoPackage::leveling_page();
        let args = ScenarioArgs {
            selections: Vec::new(),
            new: Some("   ".to_owned()),
            export: false,
        };
        let mut backend = TableBackend::new(Vec::new());
        let mut session = Session::new();
        let error = run_scenario(&mut session, &package, args, &mut backend)
            .expect_err("blank scenario name");
        assert!(error.to_string().contains("scenario name must not be blank"));
        assert_eq!(query::scenarios(&session).len(), 1);
    }

    #[test]
    fn unknown_bidders_are_refused() {
        let package = DemoPackage::leveling_page();
        let args = ScenarioArgs {
            selections: vec![(ScopeId::new("CSI-23-0900"), BidderId::new("VND-999"))],
            new: None,
            export: false,
        };
        let mut backend = TableBackend::new(Vec::new());
        let error = run_scenario(&mut Session::new(), &package, args, &mut backend)
            .expect_err("unknown bidder");
        assert!(error.to_string().contains("VND-999"));
    }
}
