use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::StackConfig;
use crate::paths;
use crate::scenario::Scenario;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Validate { scenario } => validate(ctx, scenario),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Stack Configuration");

    let (config, source) = StackConfig::load(ctx.config.as_deref())?;
    match &source {
        Some(path) => ui::kv("Stack file", &path.display().to_string()),
        None => ui::kv("Stack file", "none (built-in defaults)"),
    }

    if source.is_none() || ctx.verbose > 0 {
        ui::section("Lookup order");
        for path in paths::stack_file_candidates(ctx.config.as_deref())? {
            let icon = if path.is_file() { "✓".green() } else { "✗".red() };
            println!("  {} {}", icon, path.display());
        }
    }

    ui::section("Effective settings");
    println!();
    print!("{}", config.to_toml()?);

    Ok(())
}

/// Problems with a config for a set of scenarios, one line each
pub fn problems(config: &StackConfig, scenarios: &[Scenario]) -> Vec<String> {
    let mut problems = Vec::new();
    if let Err(e) = config.validate() {
        problems.push(e.to_string());
    }
    for scenario in scenarios {
        for key in config.missing_for(*scenario) {
            problems.push(format!("{}: '{key}' is not set", scenario.name()));
        }
    }
    problems
}

fn validate(ctx: &Context, scenario: Option<Scenario>) -> Result<()> {
    let (config, source) = StackConfig::load(ctx.config.as_deref())?;
    let label = source
        .as_ref()
        .map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());

    let scenarios: Vec<Scenario> = scenario.map_or_else(|| Scenario::ALL.to_vec(), |s| vec![s]);
    let problems = problems(&config, &scenarios);

    if problems.is_empty() {
        ui::success(&format!("{label} is valid"));
        return Ok(());
    }

    ui::header(&format!("Problems in {label}"));
    for problem in &problems {
        println!("  {} {}", "✗".red(), problem);
    }
    println!();
    bail!("{} problem(s) found", problems.len());
}
