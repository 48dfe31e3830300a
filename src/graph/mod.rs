//! Caller graph: maps "symbol referenced at file:line" facts onto the
//! functions enclosing each reference.

use anyhow::Result;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Arc,
};

use crate::{
    config::{has_extension, HEADER_EXTENSIONS},
    errors::StagePolicy,
    tools::{Reference, XrefTool},
};

/// A function that references the queried symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallerEntry {
    pub caller_name: String,
    pub file: String,
    /// Line of the enclosing function's definition.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enclosing {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub reference: Reference,
    pub enclosing: Option<Enclosing>,
}

/// All reference sites attributed to one enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerGroup {
    pub caller: CallerEntry,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub callers: Vec<CallerNode>,
}

/// `file -> functions defined in it`, sorted by line.
#[derive(Debug, Default)]
pub struct FunctionCache {
    by_file: HashMap<String, Vec<Reference>>,
}

impl FunctionCache {
    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_file.clear();
    }
}

pub struct CallerGraphResolver {
    tool: Arc<dyn XrefTool>,
    cache: FunctionCache,
}

impl CallerGraphResolver {
    pub fn new(tool: Arc<dyn XrefTool>) -> Self {
        Self {
            tool,
            cache: FunctionCache::default(),
        }
    }

    /// Invalidates cached function lists. Must be called after a rebuild.
    pub fn clear_cache(&mut self) {
        tracing::debug!(files = self.cache.len(), "Clearing function cache");
        self.cache.clear();
    }

    pub fn cache(&self) -> &FunctionCache {
        &self.cache
    }

    /// Functions that reference `symbol`, one entry per reference.
    ///
    /// References in headers or outside any function are dropped. A caller
    /// name that more than one reference resolves to is ambiguous and every
    /// entry carrying it is dropped, as is the symbol itself.
    pub async fn build_graph(&mut self, symbol: &str, cwd: &Path) -> Result<Vec<CallerEntry>> {
        let resolved = self.resolve_references(symbol, cwd).await?;

        let entries: Vec<CallerEntry> = resolved
            .into_iter()
            .filter(|r| !has_extension(&r.reference.file, HEADER_EXTENSIONS))
            .filter_map(|r| {
                let enclosing = r.enclosing?;
                Some(CallerEntry {
                    caller_name: enclosing.name,
                    file: r.reference.file,
                    line: enclosing.line,
                })
            })
            .collect();

        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for e in &entries {
            *name_counts.entry(e.caller_name.as_str()).or_default() += 1;
        }
        let ambiguous: HashSet<String> = name_counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let callers: Vec<CallerEntry> = entries
            .into_iter()
            .filter(|e| !ambiguous.contains(&e.caller_name) && e.caller_name != symbol)
            .collect();
        tracing::debug!(
            symbol,
            callers = callers.len(),
            ambiguous = ambiguous.len(),
            "Built caller graph"
        );
        Ok(callers)
    }

    /// Every reference to `symbol` paired with the function enclosing it.
    pub async fn resolve_references(
        &mut self,
        symbol: &str,
        cwd: &Path,
    ) -> Result<Vec<ResolvedReference>> {
        let references = StagePolicy::CALLER_GRAPH
            .apply("caller-references", self.tool.references(symbol, cwd).await)?
            .unwrap_or_default();

        let mut resolved = Vec::with_capacity(references.len());
        for reference in references {
            let enclosing = self
                .enclosing_function(&reference.file, reference.line, cwd)
                .await?;
            resolved.push(ResolvedReference {
                reference,
                enclosing,
            });
        }
        Ok(resolved)
    }

    /// References grouped by `(enclosing name, file, enclosing line)`, in
    /// first-seen order. References outside any function are dropped.
    pub async fn group_by_enclosing(
        &mut self,
        symbol: &str,
        cwd: &Path,
    ) -> Result<Vec<CallerGroup>> {
        let resolved = self.resolve_references(symbol, cwd).await?;
        let mut groups: Vec<CallerGroup> = Vec::new();
        let mut index: HashMap<CallerEntry, usize> = HashMap::new();
        for r in resolved {
            let Some(enclosing) = r.enclosing else {
                continue;
            };
            let key = CallerEntry {
                caller_name: enclosing.name,
                file: r.reference.file.clone(),
                line: enclosing.line,
            };
            match index.get(&key) {
                Some(&i) => groups[i].references.push(r.reference),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(CallerGroup {
                        caller: key,
                        references: vec![r.reference],
                    });
                }
            }
        }
        Ok(groups)
    }

    /// Caller tree rooted at `symbol`, `depth` levels deep.
    ///
    /// Each function's callers are looked up at most once. A function that
    /// already appears on the path from the root is a leaf.
    pub async fn expand_tree(
        &mut self,
        symbol: &str,
        cwd: &Path,
        depth: usize,
    ) -> Result<CallerNode> {
        let mut children: HashMap<String, Vec<CallerEntry>> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([symbol.to_string()]);
        let mut frontier = vec![symbol.to_string()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for name in frontier {
                let callers = self.build_graph(&name, cwd).await?;
                for c in &callers {
                    if visited.insert(c.caller_name.clone()) {
                        next.push(c.caller_name.clone());
                    }
                }
                children.insert(name, callers);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        let mut path = vec![symbol.to_string()];
        Ok(CallerNode {
            name: symbol.to_string(),
            file: None,
            line: None,
            callers: assemble(symbol, &children, &mut path),
        })
    }

    async fn enclosing_function(
        &mut self,
        file: &str,
        line: u32,
        cwd: &Path,
    ) -> Result<Option<Enclosing>> {
        if !self.cache.by_file.contains_key(file) {
            let mut functions = StagePolicy::CALLER_GRAPH
                .apply(
                    "caller-functions",
                    self.tool.functions_in_file(file, cwd).await,
                )?
                .unwrap_or_default();
            functions.sort_by_key(|f| f.line);
            self.cache.by_file.insert(file.to_string(), functions);
        }
        let functions = self
            .cache
            .by_file
            .get(file)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(last_at_or_before(functions, line).map(|f| Enclosing {
            name: f.symbol.clone(),
            line: f.line,
        }))
    }
}

/// Last function (by line) starting at or before `line`.
fn last_at_or_before(functions: &[Reference], line: u32) -> Option<&Reference> {
    let idx = functions.partition_point(|f| f.line <= line);
    idx.checked_sub(1).map(|i| &functions[i])
}

fn assemble(
    name: &str,
    children: &HashMap<String, Vec<CallerEntry>>,
    path: &mut Vec<String>,
) -> Vec<CallerNode> {
    let Some(callers) = children.get(name) else {
        return Vec::new();
    };
    callers
        .iter()
        .map(|c| {
            let nested = if path.contains(&c.caller_name) {
                Vec::new()
            } else {
                path.push(c.caller_name.clone());
                let nested = assemble(&c.caller_name, children, path);
                path.pop();
                nested
            };
            CallerNode {
                name: c.caller_name.clone(),
                file: Some(c.file.clone()),
                line: Some(c.line),
                callers: nested,
            }
        })
        .collect()
}
