use clap::{Parser, ValueEnum};
use switchyard::controller::WidgetRole;
use switchyard::prelude::*;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToggleCli {
    On,
    Off,
}

/// Loads a workflow, drives its bypass controllers, and reports every node's mode
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workflow JSON file
    workflow_path: String,

    /// Id of the controller node to drive. Defaults to the first one that fits the action.
    #[arg(short, long)]
    controller: Option<NodeId>,

    /// Rule to select on a rule controller
    #[arg(short, long)]
    rule: Option<String>,

    /// Replacement rule source (a JSON object) for a rule controller
    #[arg(long)]
    rules: Option<String>,

    /// Flip a toggle controller on or off
    #[arg(short, long, value_enum)]
    toggle: Option<ToggleCli>,

    /// Optional settings JSON file
    #[arg(short, long)]
    settings: Option<String>,

    /// Write the updated workflow to this path
    #[arg(short, long)]
    out: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    run(cli);
}

fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Session Setup ---
    let settings = match &cli.settings {
        Some(path) => Settings::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load settings: {}", e))),
        None => Settings::default(),
    };
    let mut session = Session::builder().with_settings(settings).build();

    // --- 2. Load and Settle ---
    let load_start = Instant::now();
    let summary = session
        .load_file(&cli.workflow_path)
        .unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load '{}': {}", cli.workflow_path, e))
        });
    let fired = session.settle();
    let load_duration = load_start.elapsed();

    println!(
        "Loaded {} node(s), {} controller(s), {} link(s); {} timer(s) fired while settling.",
        summary.nodes, summary.controllers, summary.links, fired
    );
    for link in &summary.skipped_links {
        println!("  -> Skipped link {}", link);
    }
    for (node, err) in &summary.rejected {
        println!("  -> Node {} kept its defaults: {}", node, err);
    }

    // --- 3. Drive the Controller ---
    let drive_start = Instant::now();
    if cli.rules.is_some() || cli.rule.is_some() {
        let target = pick_controller(&session, cli.controller, WidgetRole::RuleSelector);
        if let Some(source) = &cli.rules {
            session
                .set_rules_source(target, source)
                .and_then(|_| session.refresh_rules(target))
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to replace rules: {}", e)));
        }
        if let Some(rule) = &cli.rule {
            session
                .select_rule(target, rule)
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to select rule: {}", e)));
        }
    }
    if let Some(toggle) = cli.toggle {
        let target = pick_controller(&session, cli.controller, WidgetRole::Toggle);
        session
            .set_toggle(target, toggle == ToggleCli::On)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to set toggle: {}", e)));
    }
    session.settle();
    let drive_duration = drive_start.elapsed();

    for notice in session.take_notices() {
        println!("  -> Node {}: {}", notice.node, notice.message);
    }

    // --- 4. Report ---
    println!("\n--- Node Modes ---");
    print!("{}", ModeReport::format(session.graph()));

    if let Some(out) = &cli.out {
        session
            .to_document()
            .map_err(|e| e.to_string())
            .and_then(|doc| doc.write_file(out).map_err(|e| e.to_string()))
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", out, e)));
        println!("\nWrote updated workflow to {}", out);
    }

    println!("\n--- Performance Summary ---");
    println!("Load and Settle:      {:?}", load_duration);
    println!("Controller Actions:   {:?}", drive_duration);
    println!("-----------------------------");
    println!("Total Execution:      {:?}", total_start.elapsed());
}

/// The requested controller, or the first controller that has a widget for `role`.
fn pick_controller(session: &Session, requested: Option<NodeId>, role: WidgetRole) -> NodeId {
    if let Some(id) = requested {
        return id;
    }
    session
        .controller_ids()
        .into_iter()
        .find(|id| session.role_widget(*id, role).is_ok())
        .unwrap_or_else(|| {
            exit_with_error(&format!("No controller with a {:?} widget found.", role))
        })
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
