//! Series/parallel task composition and the named build targets.
//!
//! A [`Composition`] is lowered into a [`TaskDAG`]: parallel children are
//! independent, and in a series every sink of one stage becomes a
//! dependency of every source of the next.

use serde::{Deserialize, Serialize};

use crate::core::dag::TaskDAG;
use crate::core::task::{Task, TaskId, TaskKind};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    Task(TaskKind),
    Series(Vec<Composition>),
    Parallel(Vec<Composition>),
}

/// Entry and exit nodes of a lowered composition.
#[derive(Debug, Default)]
struct Fragment {
    sources: Vec<TaskId>,
    sinks: Vec<TaskId>,
}

impl Fragment {
    fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Composition {
    pub fn task(kind: TaskKind) -> Self {
        Composition::Task(kind)
    }

    pub fn series(steps: impl IntoIterator<Item = Composition>) -> Self {
        Composition::Series(steps.into_iter().collect())
    }

    pub fn parallel(steps: impl IntoIterator<Item = Composition>) -> Self {
        Composition::Parallel(steps.into_iter().collect())
    }

    /// Every task occurrence, in declaration order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        match self {
            Composition::Task(kind) => vec![*kind],
            Composition::Series(steps) | Composition::Parallel(steps) => {
                steps.iter().flat_map(Composition::kinds).collect()
            }
        }
    }

    /// Build a fresh DAG for one run of this composition.
    pub fn to_dag(&self) -> Result<TaskDAG> {
        let mut dag = TaskDAG::new();
        self.lower(&mut dag)?;
        Ok(dag)
    }

    fn lower(&self, dag: &mut TaskDAG) -> Result<Fragment> {
        match self {
            Composition::Task(kind) => {
                let task = Task::new(*kind);
                let id = task.id;
                dag.add_task(task);
                Ok(Fragment {
                    sources: vec![id],
                    sinks: vec![id],
                })
            }
            Composition::Parallel(steps) => {
                let mut fragment = Fragment::default();
                for step in steps {
                    let child = step.lower(dag)?;
                    fragment.sources.extend(child.sources);
                    fragment.sinks.extend(child.sinks);
                }
                Ok(fragment)
            }
            Composition::Series(steps) => {
                let mut fragment = Fragment::default();
                for step in steps {
                    let child = step.lower(dag)?;
                    if child.is_empty() {
                        continue;
                    }
                    if fragment.is_empty() {
                        fragment = child;
                        continue;
                    }
                    for from in &fragment.sinks {
                        for to in &child.sources {
                            dag.add_dependency(from, to)?;
                        }
                    }
                    fragment.sinks = child.sinks;
                }
                Ok(fragment)
            }
        }
    }
}

/// The named entry points of the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    #[default]
    Build,
    BuildStyles,
    BuildScripts,
    BuildViews,
    BuildImages,
    BuildIcons,
    Lint,
    LintStyles,
    LintViews,
    Watch,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Build => "build",
            Target::BuildStyles => "build-styles",
            Target::BuildScripts => "build-scripts",
            Target::BuildViews => "build-views",
            Target::BuildImages => "build-images",
            Target::BuildIcons => "build-icons",
            Target::Lint => "lint",
            Target::LintStyles => "lint-styles",
            Target::LintViews => "lint-views",
            Target::Watch => "watch",
        }
    }

    /// Tasks this target runs. `Watch` runs the full build before it starts
    /// serving and watching.
    pub fn composition(&self) -> Composition {
        use Composition as C;
        use TaskKind as K;

        match self {
            Target::Build | Target::Watch => C::series([
                C::parallel([C::task(K::EmptyDist), C::task(K::LintStyles)]),
                C::task(K::Views),
                C::parallel([C::task(K::Styles), C::task(K::Scripts)]),
                C::parallel([
                    C::task(K::Styles),
                    C::task(K::Scripts),
                    C::task(K::Images),
                    C::task(K::Icons),
                ]),
                C::task(K::LintViews),
            ]),
            Target::BuildStyles => C::task(K::Styles),
            Target::BuildScripts => C::task(K::Scripts),
            Target::BuildViews => C::task(K::Views),
            Target::BuildImages => C::task(K::Images),
            Target::BuildIcons => C::task(K::Icons),
            Target::Lint => C::parallel([C::task(K::LintStyles), C::task(K::LintViews)]),
            Target::LintStyles => C::task(K::LintStyles),
            Target::LintViews => C::task(K::LintViews),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
