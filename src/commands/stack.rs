//! Stack commands
//!
//! - `preview` - Show what a scenario declares
//! - `up` - Converge a scenario against the preview engine
//! - `graph` - Show convergence waves and teardown order
//! - `scenarios` - List scenarios

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    ConvergeOptions, ConvergencePlan, DeclarationSummary, RealizeResult, converge, declarations,
    group_by_type,
};
use serde_json::json;

use crate::Context;
use crate::cli::{GraphArgs, PreviewArgs, UpArgs};
use crate::config::StackConfig;
use crate::engine::PreviewEngine;
use crate::progress::ConvergeProgress;
use crate::scenario::{self, Scenario, Stack};
use crate::ui;

fn load_stack(ctx: &Context, scenario: Scenario) -> Result<(Stack, StackConfig)> {
    let (config, source) = StackConfig::load(ctx.config.as_deref())?;
    match &source {
        Some(path) => log::info!("Using stack file {}", path.display()),
        None => log::info!("Using default stack settings"),
    }
    let stack = scenario::build(scenario, &config)
        .with_context(|| format!("Failed to build scenario '{}'", scenario.name()))?;
    Ok((stack, config))
}

// ============================================================================
// Preview Command
// ============================================================================

pub fn preview(ctx: &Context, args: PreviewArgs) -> Result<()> {
    let (stack, _) = load_stack(ctx, args.scenario)?;
    let comp = &stack.composition;
    let decls = declarations(comp);
    let summary = DeclarationSummary::from_composition(comp);

    if args.json {
        let out = json!({
            "scenario": args.scenario.name(),
            "project": comp.project(),
            "summary": summary,
            "declarations": decls,
            "outputs": stack.outputs.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    ui::header(&format!("Preview: {}", args.scenario.name()));
    ui::kv("Project", comp.project());

    if args.tree {
        ui::section("Declarations");
        for decl in &decls {
            println!("{}", ui::declaration_line(decl));
        }
    } else {
        for (kind, group) in group_by_type(&decls) {
            ui::section(&format!("{} ({})", ui::short_kind(&kind), group.len()));
            if !ctx.quiet {
                ui::dim(&kind);
            }
            for decl in group {
                let deferred = if decl.deferred_inputs.is_empty() {
                    String::new()
                } else {
                    format!("waits on {}", decl.deferred_inputs.join(", "))
                };
                println!("  {} {} {}", "+".green(), decl.identity, deferred.dimmed());
            }
        }
    }

    ui::section("Outputs");
    for (name, value) in &stack.outputs {
        let marker = if value.is_secret() { " (secret)" } else { "" };
        println!("  {}{}", name, marker.dimmed());
    }

    println!();
    ui::info(&format!(
        "{} resources, {} components, {} providers, {} deferred inputs",
        summary.resources, summary.components, summary.providers, summary.deferred_inputs
    ));

    Ok(())
}

// ============================================================================
// Up Command
// ============================================================================

pub fn up(ctx: &Context, args: UpArgs) -> Result<()> {
    let (stack, config) = load_stack(ctx, args.scenario)?;
    let comp = &stack.composition;

    let plan =
        ConvergencePlan::from_composition(comp).filter_by_target(comp, args.target.as_deref());
    if plan.is_empty() {
        match &args.target {
            Some(target) => bail!("Target '{target}' matches nothing in '{}'", args.scenario.name()),
            None => bail!("Scenario '{}' declares nothing", args.scenario.name()),
        }
    }

    let engine = PreviewEngine::new()
        .with_region(config.aws.region.clone())
        .failing(args.fail.iter().cloned());
    let opts = ConvergeOptions {
        jobs: usize::from(args.jobs.max(1)),
        verbose: ctx.verbose > 0,
    };

    let quiet_output = args.json || ctx.quiet;
    if !quiet_output {
        ui::header(&format!("Up: {}", args.scenario.name()));
        ui::kv("Nodes", &plan.total_nodes().to_string());
        ui::kv("Waves", &plan.waves.len().to_string());
        println!();
    }

    let mut progress = if quiet_output {
        ConvergeProgress::hidden(plan.total_nodes())
    } else {
        ConvergeProgress::new(plan.total_nodes(), plan.waves.len(), opts.verbose)
    };
    let run = converge(comp, &plan, &engine, &opts, &mut progress)?;
    progress.finish();

    let outputs = stack.resolve_outputs(&run.resolved, args.show_secrets);

    if args.json {
        let failures: Vec<_> = run
            .results
            .iter()
            .filter(|(_, r)| !r.is_created())
            .filter_map(|(id, r)| {
                comp.node(*id).map(|n| {
                    json!({
                        "identity": n.identity,
                        "kind": n.kind,
                        "result": result_label(r),
                        "detail": r,
                    })
                })
            })
            .collect();
        let out = json!({
            "scenario": args.scenario.name(),
            "summary": run.summary,
            "outputs": outputs,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        if !outputs.is_empty() {
            ui::section("Outputs");
            for (name, value) in &outputs {
                ui::kv(name, &ui::output_value(value));
            }
        }

        let unfinished: Vec<_> = run.results.iter().filter(|(_, r)| !r.is_created()).collect();
        if !unfinished.is_empty() {
            ui::section("Not converged");
            for (id, result) in unfinished {
                let Some(node) = comp.node(*id) else { continue };
                let detail = match result {
                    RealizeResult::Failed { error } => error.as_str(),
                    RealizeResult::Skipped { reason } => reason.as_str(),
                    RealizeResult::Created => "",
                };
                println!(
                    "  {} {} {} {}",
                    ui::result_icon(result),
                    node.identity,
                    result_label(result),
                    detail.dimmed()
                );
            }
        }

        println!();
        let summary = &run.summary;
        if summary.is_success() {
            ui::success(&format!("{} created", summary.created));
        } else {
            ui::warn(&format!(
                "{} created, {} failed, {} skipped",
                summary.created, summary.failed, summary.skipped
            ));
        }
    }

    if run.summary.failed > 0 {
        bail!("{} node(s) failed to converge", run.summary.failed);
    }
    Ok(())
}

// ============================================================================
// Graph Command
// ============================================================================

pub fn graph(ctx: &Context, args: GraphArgs) -> Result<()> {
    let (stack, _) = load_stack(ctx, args.scenario)?;
    let comp = &stack.composition;
    let plan =
        ConvergencePlan::from_composition(comp).filter_by_target(comp, args.target.as_deref());

    ui::header(&format!("Graph: {}", args.scenario.name()));

    for (index, wave) in plan.waves.iter().enumerate() {
        ui::section(&format!("Wave {} ({})", index + 1, wave.len()));
        for node in wave.iter().filter_map(|id| comp.node(*id)) {
            let deps: Vec<&str> = node
                .dependencies()
                .into_iter()
                .filter_map(|dep| comp.node(dep))
                .map(|dep| dep.identity.as_str())
                .collect();
            let after = if deps.is_empty() {
                String::new()
            } else {
                format!("after {}", deps.join(", "))
            };
            println!(
                "  {} {} {}",
                node.identity,
                ui::short_kind(&node.kind).dimmed(),
                after.dimmed()
            );
        }
    }

    if ctx.verbose > 0 || args.target.is_none() {
        ui::section("Teardown order");
        for (i, id) in comp.teardown_order().into_iter().enumerate() {
            if let Some(node) = comp.node(id) {
                println!("  {:>3}. {}", i + 1, node.identity);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Scenarios Command
// ============================================================================

pub fn scenarios() -> Result<()> {
    ui::header("Scenarios");
    for scenario in Scenario::ALL {
        println!(
            "  {:<12} {}",
            scenario.name().bold(),
            scenario.description().dimmed()
        );
    }
    println!();
    ui::dim("Run 'nimbus preview <scenario>' to see what a scenario declares.");
    Ok(())
}

/// Describe a node result in a word
pub fn result_label(result: &RealizeResult) -> &'static str {
    match result {
        RealizeResult::Created => "created",
        RealizeResult::Failed { .. } => "failed",
        RealizeResult::Skipped { .. } => "skipped",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_labels() {
        assert_eq!(result_label(&RealizeResult::Created), "created");
        assert_eq!(
            result_label(&RealizeResult::Skipped {
                reason: "x".into()
            }),
            "skipped"
        );
    }
}
