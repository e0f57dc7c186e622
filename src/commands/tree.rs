//! # Tree Command Implementation
//!
//! Displays module dependencies as a tree.
//!
//! ## Functionality
//!
//! - **Dependency Tree**: modules nothing depends on are the roots; each node
//!   lists the modules it depends on
//! - **Single Module**: `--module` shows the tree below one module
//! - **Depth Control**: `--depth` limits how far the tree expands
//! - **Cycles**: a module already on the current path is marked and not
//!   expanded again

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::collections::BTreeSet;
use std::path::PathBuf;

use module_roots::defaults::{DEFAULT_PROJECT_FILE, PROJECT_FILE_ENV};
use module_roots::project::Project;

/// Display module dependencies as a tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the project file.
    #[arg(short, long, value_name = "FILE", env = PROJECT_FILE_ENV, default_value = DEFAULT_PROJECT_FILE)]
    pub project: PathBuf,

    /// Show the tree below this module only.
    #[arg(short, long, value_name = "NAME")]
    pub module: Option<String>,

    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the root level, 1 to show direct dependencies, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

pub fn execute(args: TreeArgs) -> Result<()> {
    let project = super::load_project(&args.project)?;
    let tree = build_tree(&project, args.module.as_deref(), args.depth.unwrap_or(usize::MAX))?;
    print_tree(&tree).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}

fn build_tree(project: &Project, module: Option<&str>, max_depth: usize) -> Result<TreeNode> {
    let roots: Vec<String> = match module {
        Some(name) => {
            if project.module(name).is_none() {
                anyhow::bail!("Module '{}' not found in project '{}'", name, project.name());
            }
            vec![name.to_string()]
        }
        None => {
            let depended_on: BTreeSet<String> = project
                .module_manager()
                .modules()
                .flat_map(|m| m.root_model().dependency_module_names())
                .collect();
            let roots: Vec<String> = project
                .module_manager()
                .module_names()
                .into_iter()
                .filter(|name| !depended_on.contains(name))
                .collect();
            // Every module sits on a cycle: show them all.
            if roots.is_empty() {
                project.module_manager().module_names()
            } else {
                roots
            }
        }
    };

    let mut path = Vec::new();
    let children = roots
        .iter()
        .map(|name| build_node(project, name, max_depth, &mut path))
        .collect();
    Ok(TreeNode {
        label: project.name().to_string(),
        children,
    })
}

fn build_node(project: &Project, name: &str, max_depth: usize, path: &mut Vec<String>) -> TreeNode {
    let module = match project.module(name) {
        Some(module) => module,
        None => {
            return TreeNode {
                label: format!("{} (missing)", name),
                children: vec![],
            }
        }
    };
    if path.iter().any(|p| p == name) {
        return TreeNode {
            label: format!("{} (cycle)", name),
            children: vec![],
        };
    }
    if path.len() >= max_depth {
        return TreeNode {
            label: name.to_string(),
            children: vec![],
        };
    }

    path.push(name.to_string());
    let children = module
        .root_model()
        .dependency_module_names()
        .iter()
        .map(|dependency| build_node(project, dependency, max_depth, path))
        .collect();
    path.pop();
    TreeNode {
        label: name.to_string(),
        children,
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
