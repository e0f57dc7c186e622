//! Batch commit of root models together with a module model

use super::ordering::DependencyGraph;
use crate::error::{Error, Result};
use crate::module::{ModifiableModuleModel, Module, ModuleManager, RootsChangeEvent};
use crate::root_model::RootModel;
use log::{debug, error, warn};

/// Commit `models` and `module_model` as one roots change.
///
/// Unchanged models are disposed without committing, as are models of modules
/// the module model disposes. The rest are committed dependencies first.
///
/// Each model's references are first stored under the current names its
/// accessor resolves them to. A stored reference then means the module with
/// that current name, or failing that the module about to take that name,
/// which is also where renames point it after the commit.
/// A failure is logged and returned; commits applied before it stay.
pub fn multi_commit(
    manager: &mut ModuleManager,
    models: Vec<RootModel>,
    module_model: ModifiableModuleModel,
) -> Result<RootsChangeEvent> {
    let mut changed = Vec::new();
    for mut model in models {
        let name = model.module_name().to_string();
        if module_model.is_disposing(&name) {
            warn!("Module '{}' is being disposed; its root model is dropped", name);
            dispose_quietly(&mut model);
            continue;
        }
        model.resolve_module_references();
        let baseline = match baseline_module(manager, &module_model, &name) {
            Some(module) => module,
            None => {
                let e = Error::ModuleNotFound { name };
                error!("{}", e);
                dispose_quietly(&mut model);
                for mut model in changed {
                    dispose_quietly(&mut model);
                }
                module_model.dispose();
                return Err(e);
            }
        };
        if model.is_changed(baseline.root_model()) {
            changed.push(model);
        } else {
            debug!("Module '{}': nothing to commit", name);
            dispose_quietly(&mut model);
        }
    }

    let graph = dependency_graph(manager, &module_model, &changed);
    let order = graph.topological_order();
    for cycle in order.cycles() {
        debug!("Modules depend on each other: {}", cycle.join(", "));
    }
    changed.sort_by_key(|model| order.rank(model.module_name()));

    manager.commit_module_model(module_model, move |manager| {
        let mut committed = Vec::with_capacity(changed.len());
        let mut remaining = changed.into_iter();
        while let Some(mut model) = remaining.next() {
            let name = model.module_name().to_string();
            let result = match manager.module_mut(&name) {
                Some(module) => module.root_manager_mut().commit(&mut model),
                None => Err(Error::ModuleNotFound { name: name.clone() }),
            };
            if let Err(e) = result {
                dispose_quietly(&mut model);
                for mut model in remaining {
                    dispose_quietly(&mut model);
                }
                return Err(e);
            }
            committed.push(name);
        }
        Ok(committed)
    })
}

/// Commit one root model through the same path as [`multi_commit`].
pub fn commit_root_model(manager: &mut ModuleManager, model: RootModel) -> Result<RootsChangeEvent> {
    let module_model = manager.modifiable_model();
    multi_commit(manager, vec![model], module_model)
}

/// Graph over every module the module model knows, using batch models for
/// batch members and committed baselines otherwise.
fn dependency_graph(
    manager: &ModuleManager,
    module_model: &ModifiableModuleModel,
    batch: &[RootModel],
) -> DependencyGraph {
    let mut graph = DependencyGraph::new(module_model.modules().iter().cloned());
    for name in module_model.modules() {
        let dependencies = match batch.iter().find(|model| model.module_name() == name) {
            Some(model) => model.dependency_module_names(),
            None => match baseline_module(manager, module_model, name) {
                Some(module) => module.root_manager().dependency_module_names(),
                None => continue,
            },
        };
        for dependency in dependencies {
            if let Some(target) = module_model.resolve_reference(&dependency) {
                graph.add_edge(name, target);
            }
        }
    }
    graph
}

fn baseline_module<'a>(
    manager: &'a ModuleManager,
    module_model: &'a ModifiableModuleModel,
    name: &str,
) -> Option<&'a Module> {
    module_model
        .pending_module(name)
        .or_else(|| manager.module(name))
}

fn dispose_quietly(model: &mut RootModel) {
    if model.is_disposed() {
        return;
    }
    if let Err(e) = model.dispose() {
        debug!("Module '{}': {}", model.module_name(), e);
    }
}
