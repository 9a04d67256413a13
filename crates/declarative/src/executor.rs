//! Convergence - feeds a declared graph to an engine, wave by wave

use crate::composition::Composition;
use crate::context::{Engine, NoProgress, ProgressCallback};
use crate::deferred::Resolved;
use crate::error::{Error, Result};
use crate::planner::ConvergencePlan;
use crate::resource::{Input, ResourceNode};
use crate::types::{Attributes, ConvergeOptions, ConvergeSummary, NodeId, RealizeResult};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of a convergence run
#[derive(Debug)]
pub struct Convergence {
    /// Attributes of every realized node
    pub resolved: Resolved,
    /// Per-node results for every planned node
    pub results: BTreeMap<NodeId, RealizeResult>,
    pub summary: ConvergeSummary,
}

impl Convergence {
    /// Result for a single node
    pub fn result(&self, id: NodeId) -> Option<&RealizeResult> {
        self.results.get(&id)
    }

    /// Failed nodes with their error messages
    pub fn failures(&self) -> Vec<(NodeId, &str)> {
        self.results
            .iter()
            .filter_map(|(id, r)| match r {
                RealizeResult::Failed { error } => Some((*id, error.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Check if every planned node was realized
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// Converge a composition through an engine
///
/// Nodes are realized wave by wave. Inputs are resolved from the outputs of
/// earlier waves just before each node is handed to the engine. A node whose
/// input transform fails, or whose engine call fails, is marked failed; every
/// node that depends on it is skipped. Unrelated nodes still converge.
///
/// # Arguments
/// * `comp` - The composition the plan was built from
/// * `plan` - Waves to realize
/// * `engine` - Realizes individual nodes
/// * `opts` - Execution options (jobs, verbose)
/// * `progress` - Progress callback
pub fn converge<E, P>(
    comp: &Composition,
    plan: &ConvergencePlan,
    engine: &E,
    opts: &ConvergeOptions,
    progress: &mut P,
) -> Result<Convergence>
where
    E: Engine,
    P: ProgressCallback,
{
    let pool = if opts.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(opts.jobs)
                .build()
                .map_err(|e| Error::Configuration(format!("failed to create thread pool: {e}")))?,
        )
    } else {
        None
    };

    let mut resolved = Resolved::new();
    let mut results = BTreeMap::new();
    let mut blocked: BTreeSet<NodeId> = BTreeSet::new();
    let mut summary = ConvergeSummary::default();

    for (index, wave) in plan.waves.iter().enumerate() {
        if wave.is_empty() {
            continue;
        }
        log::info!("wave {}: {} node(s)", index, wave.len());
        progress.on_wave_start(index, wave.len());

        let mut ready: Vec<(&ResourceNode, Attributes)> = Vec::with_capacity(wave.len());
        let mut outcomes: Vec<(NodeId, RealizeResult, Option<Attributes>)> = Vec::new();

        for id in wave {
            let node = comp.node(*id).ok_or(Error::UnknownNode(*id))?;
            match prepare_inputs(comp, node, &resolved, &blocked) {
                Ok(inputs) => ready.push((node, inputs)),
                Err(result) => {
                    progress.on_node_complete(&node.identity, &result);
                    outcomes.push((node.id, result, None));
                }
            }
        }

        match &pool {
            Some(pool) if ready.len() > 1 => {
                // The progress callback is not thread-safe; report around the batch.
                for (node, _) in &ready {
                    progress.on_node_start(&node.identity, &node.kind);
                }
                let realized: Vec<(NodeId, RealizeResult, Option<Attributes>)> = pool.install(|| {
                    ready
                        .par_iter()
                        .map(|(node, inputs)| realize(engine, node, inputs, opts.verbose))
                        .collect()
                });
                for (id, result, attrs) in realized {
                    if let Some(node) = comp.node(id) {
                        progress.on_node_complete(&node.identity, &result);
                    }
                    outcomes.push((id, result, attrs));
                }
            }
            _ => {
                for (node, inputs) in &ready {
                    progress.on_node_start(&node.identity, &node.kind);
                    let (id, result, attrs) = realize(engine, node, inputs, opts.verbose);
                    progress.on_node_complete(&node.identity, &result);
                    outcomes.push((id, result, attrs));
                }
            }
        }

        for (id, result, attrs) in outcomes {
            match attrs {
                Some(attrs) => resolved.insert(id, attrs),
                None => {
                    blocked.insert(id);
                }
            }
            summary.add_result(&result);
            results.insert(id, result);
        }
        progress.on_wave_complete(index);
    }

    log::info!(
        "converged {} node(s): {} created, {} failed, {} skipped",
        summary.total(),
        summary.created,
        summary.failed,
        summary.skipped
    );

    Ok(Convergence {
        resolved,
        results,
        summary,
    })
}

/// Resolve a node's inputs, or explain why it cannot be realized
fn prepare_inputs(
    comp: &Composition,
    node: &ResourceNode,
    resolved: &Resolved,
    blocked: &BTreeSet<NodeId>,
) -> std::result::Result<Attributes, RealizeResult> {
    if let Some(dep) = node.dependencies().into_iter().find(|d| blocked.contains(d)) {
        let identity = comp.node(dep).map_or("?", |n| n.identity.as_str());
        return Err(RealizeResult::Skipped {
            reason: format!("dependency '{identity}' did not resolve"),
        });
    }

    let mut attrs = Attributes::new();
    for (name, input) in node.inputs.iter() {
        let value = match input {
            Input::Literal(value) => value.clone(),
            Input::Deferred(deferred) => {
                deferred
                    .resolve(resolved)
                    .map_err(|e| RealizeResult::Failed {
                        error: format!("input '{name}': {e}"),
                    })?
            }
        };
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

/// Realize a single node
fn realize<E: Engine>(
    engine: &E,
    node: &ResourceNode,
    inputs: &Attributes,
    verbose: bool,
) -> (NodeId, RealizeResult, Option<Attributes>) {
    if verbose {
        log::info!("realizing {} '{}'", node.kind, node.identity);
    }
    match engine.realize(node, inputs) {
        Ok(attrs) => (node.id, RealizeResult::Created, Some(attrs)),
        Err(e) => {
            let error = Error::Engine {
                identity: node.identity.clone(),
                message: format!("{e:#}"),
            };
            log::warn!("{error}");
            (
                node.id,
                RealizeResult::Failed {
                    error: error.to_string(),
                },
                None,
            )
        }
    }
}

/// Converge every node without progress reporting
pub fn converge_all<E: Engine>(
    comp: &Composition,
    engine: &E,
    opts: &ConvergeOptions,
) -> Result<Convergence> {
    let plan = ConvergencePlan::from_composition(comp);
    converge(comp, &plan, engine, opts, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DeclareOptions, Inputs};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes inputs back and adds an `id`; fails for identities starting with "bad"
    struct EchoEngine;

    impl Engine for EchoEngine {
        fn realize(&self, node: &ResourceNode, inputs: &Attributes) -> anyhow::Result<Attributes> {
            if node.identity.starts_with("bad") {
                anyhow::bail!("quota exceeded");
            }
            let mut attrs = inputs.clone();
            attrs.insert("id".into(), Value::String(format!("{}-id", node.identity)));
            Ok(attrs)
        }
    }

    /// Records callback order
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_wave_start(&mut self, index: usize, _len: usize) {
            self.events.push(format!("wave {index}"));
        }

        fn on_node_start(&mut self, identity: &str, _kind: &str) {
            self.events.push(format!("start {identity}"));
        }

        fn on_node_complete(&mut self, identity: &str, _result: &RealizeResult) {
            self.events.push(format!("done {identity}"));
        }

        fn on_wave_complete(&mut self, _index: usize) {}
    }

    fn chain(comp: &mut Composition, first: &str) -> (NodeId, NodeId) {
        let a = comp
            .declare("k", first, DeclareOptions::new(), Inputs::new().set("size", 3u32))
            .unwrap();
        let b = comp
            .declare(
                "k",
                &format!("{first}-consumer"),
                DeclareOptions::new(),
                Inputs::new().set("upstream", a.output_string("id").map(|s| s.to_uppercase())),
            )
            .unwrap();
        (a.id(), b.id())
    }

    #[test]
    fn test_converge_threads_outputs_into_inputs() {
        let mut comp = Composition::new("demo");
        let (a, b) = chain(&mut comp, "bucket");

        let result = converge_all(&comp, &EchoEngine, &ConvergeOptions::default()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.summary.created, 2);
        assert_eq!(
            result.resolved.attributes(b).unwrap()["upstream"],
            json!("BUCKET-ID")
        );
        assert_eq!(result.resolved.attributes(a).unwrap()["size"], json!(3));
    }

    #[test]
    fn test_failure_skips_only_dependent_subgraph() {
        let mut comp = Composition::new("demo");
        let (bad, bad_consumer) = chain(&mut comp, "bad-vpc");
        let (good, good_consumer) = chain(&mut comp, "subnet");

        for jobs in [1, 4] {
            let opts = ConvergeOptions { jobs, verbose: false };
            let result = converge_all(&comp, &EchoEngine, &opts).unwrap();

            assert!(matches!(result.result(bad), Some(RealizeResult::Failed { error }) if error.contains("quota exceeded")));
            assert!(matches!(
                result.result(bad_consumer),
                Some(RealizeResult::Skipped { .. })
            ));
            assert_eq!(result.result(good), Some(&RealizeResult::Created));
            assert_eq!(result.result(good_consumer), Some(&RealizeResult::Created));
            assert_eq!(result.summary.failed, 1);
            assert_eq!(result.summary.skipped, 1);
            assert_eq!(result.failures().len(), 1);
        }
    }

    #[test]
    fn test_transform_failure_marks_consumer_failed() {
        let mut comp = Composition::new("demo");
        let key = comp
            .declare("k", "key", DeclareOptions::new(), Inputs::new())
            .unwrap();
        let secret = comp
            .declare(
                "k",
                "secret",
                DeclareOptions::new(),
                Inputs::new().set(
                    "data",
                    key.output("id")
                        .try_map(|v| v.as_u64().ok_or("id is not numeric"))
                        .to_value(),
                ),
            )
            .unwrap();

        let result = converge_all(&comp, &EchoEngine, &ConvergeOptions::default()).unwrap();
        assert!(matches!(
            result.result(secret.id()),
            Some(RealizeResult::Failed { error }) if error.contains("id is not numeric")
        ));
        assert!(!result.resolved.contains(secret.id()));
    }

    #[test]
    fn test_shared_transform_runs_once_across_waves() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut comp = Composition::new("demo");
        let bucket = comp
            .declare("k", "bucket", DeclareOptions::new(), Inputs::new())
            .unwrap();
        let name = bucket.output_string("id").map(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.to_uppercase()
        });
        let policy = comp
            .declare("k", "policy", DeclareOptions::new(), Inputs::new().set("bucket", name.clone()))
            .unwrap();
        let deployment = comp
            .declare(
                "k",
                "deployment",
                DeclareOptions::new(),
                Inputs::new()
                    .set("bucket", name)
                    .set("policy", policy.output("id")),
            )
            .unwrap();

        let opts = ConvergeOptions { jobs: 1, verbose: false };
        let result = converge_all(&comp, &EchoEngine, &opts).unwrap();
        assert!(result.is_success());
        assert_eq!(
            result.resolved.attributes(deployment.id()).unwrap()["bucket"],
            json!("BUCKET-ID")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_wave_reports_every_start() {
        let mut comp = Composition::new("demo");
        for name in ["vpc", "registry"] {
            comp.declare("k", name, DeclareOptions::new(), Inputs::new())
                .unwrap();
        }

        let plan = ConvergencePlan::from_composition(&comp);
        let opts = ConvergeOptions { jobs: 4, verbose: false };
        let mut recorder = Recorder::default();
        converge(&comp, &plan, &EchoEngine, &opts, &mut recorder).unwrap();

        assert_eq!(recorder.events.len(), 5);
        assert_eq!(recorder.events[0], "wave 0");
        assert_eq!(&recorder.events[1..3], ["start vpc", "start registry"]);
        let mut done = recorder.events[3..].to_vec();
        done.sort();
        assert_eq!(done, ["done registry", "done vpc"]);
    }
}
