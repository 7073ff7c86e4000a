use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::uri::{self, ParsedUri};

use crate::async_enricher::AsyncEnricher;
use crate::metadata::EnricherMetadata;
use crate::sync_enricher::SyncEnricher;

/// Either shape an enricher implementation can take (§4.4's synchronous vs
/// asynchronous execution models).
#[derive(Clone)]
pub enum EnricherKind {
    Sync(Arc<dyn SyncEnricher>),
    Async(Arc<dyn AsyncEnricher>),
}

#[derive(Clone)]
pub struct Registration {
    pub metadata: EnricherMetadata,
    pub kind: EnricherKind,
}

/// Produces an enricher instance (metadata + implementation) from a parsed
/// URI. Query parameters are passed as named arguments; unknown parameters
/// are forwarded and the factory decides whether to accept them (§4.4).
pub trait EnricherFactory: Send + Sync {
    fn create(&self, uri: &ParsedUri) -> Result<Registration, FapilogError>;
}

/// Named, metadata-rich store of enrichers (C4). Owned by the facade, not a
/// process-wide static (§9's "registries are explicit" guidance).
#[derive(Default)]
pub struct EnricherRegistry {
    registrations: DashMap<String, Registration>,
    factories: DashMap<String, Arc<dyn EnricherFactory>>,
}

impl EnricherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on name: re-registering the identical implementation
    /// (the same `Arc` allocation) is a no-op; re-registering a different
    /// implementation under the same name is a configuration error.
    pub fn register(
        &self,
        metadata: EnricherMetadata,
        kind: EnricherKind,
    ) -> Result<(), FapilogError> {
        for dep in &metadata.dependencies {
            if dep == &metadata.name {
                return Err(FapilogError::Configuration {
                    context: ErrorContext::new("enricher_registry", "register")
                        .with_offending_value(metadata.name.clone()),
                    constraint: "an enricher must not depend on itself".to_string(),
                });
            }
        }

        if let Some(existing) = self.registrations.get(&metadata.name) {
            if same_implementation(&existing.kind, &kind) {
                return Ok(());
            }
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("enricher_registry", "register")
                    .with_offending_value(metadata.name.clone()),
                constraint: "re-registration under an existing name must use an identical implementation".to_string(),
            });
        }

        self.registrations
            .insert(metadata.name.clone(), Registration { metadata, kind });
        Ok(())
    }

    pub fn register_factory(
        &self,
        scheme: &str,
        factory: Arc<dyn EnricherFactory>,
    ) -> Result<(), FapilogError> {
        uri::validate_scheme(scheme)?;
        if self.factories.contains_key(scheme) {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("enricher_registry", "register_factory")
                    .with_offending_value(scheme),
                constraint: "scheme is already registered".to_string(),
            });
        }
        self.factories.insert(scheme.to_string(), factory);
        Ok(())
    }

    /// Scheme selects the registered factory; the remaining URI components
    /// become constructor parameters. On success, the produced enricher is
    /// registered under its own metadata's name.
    pub fn create_from_uri(&self, raw_uri: &str) -> Result<(), FapilogError> {
        let parsed = uri::parse(raw_uri)?;
        let factory = self.factories.get(&parsed.scheme).ok_or_else(|| {
            FapilogError::Configuration {
                context: ErrorContext::new("enricher_registry", "create_from_uri")
                    .with_offending_value(parsed.scheme.clone()),
                constraint: "a registered enricher scheme".to_string(),
            }
        })?;
        let registration = factory.create(&parsed)?;
        self.register(registration.metadata, registration.kind)
    }

    pub fn get(&self, name: &str) -> Option<Registration> {
        self.registrations.get(name).map(|r| r.clone())
    }

    pub fn get_metadata(&self, name: &str) -> Option<EnricherMetadata> {
        self.registrations.get(name).map(|r| r.metadata.clone())
    }

    pub fn list_enrichers(&self) -> Vec<EnricherMetadata> {
        self.registrations.iter().map(|r| r.metadata.clone()).collect()
    }

    /// Topological sort of `names`, grouped into levels: within a level, no
    /// member depends on another member of the same level, so concurrent
    /// execution is legal; levels run in sequence. Ties within a level are
    /// broken by priority ascending, then by name lexicographically (§4.4).
    ///
    /// Grounded on `r2e-core::beans::BeanRegistry::topological_sort`'s
    /// Kahn's-algorithm shape (in-degree over only in-set dependencies,
    /// reverse adjacency of dependents), with the teacher's LIFO `.pop()`
    /// frontier replaced by a sorted frontier per round to produce the
    /// required deterministic tie-break, and with actual cycle-path
    /// extraction (DFS over the residual subgraph) in place of the
    /// teacher's "every unsorted node" cycle report.
    pub fn resolve_order(&self, names: &[String]) -> Result<Vec<Vec<String>>, FapilogError> {
        let mut infos: Vec<(String, i32, Vec<String>)> = Vec::with_capacity(names.len());
        for name in names {
            let metadata = self.get_metadata(name).ok_or_else(|| FapilogError::Configuration {
                context: ErrorContext::new("enricher_registry", "resolve_order")
                    .with_offending_value(name.clone()),
                constraint: "a name registered in this registry".to_string(),
            })?;
            infos.push((metadata.name, metadata.priority, metadata.dependencies));
        }

        let idx_of: HashMap<&str, usize> = infos
            .iter()
            .enumerate()
            .map(|(i, (name, _, _))| (name.as_str(), i))
            .collect();
        let n = infos.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut remaining = vec![0usize; n];
        for (i, (_, _, deps)) in infos.iter().enumerate() {
            for dep in deps {
                if let Some(&dep_idx) = idx_of.get(dep.as_str()) {
                    remaining[i] += 1;
                    dependents[dep_idx].push(i);
                }
            }
        }

        let mut processed = vec![false; n];
        let mut levels = Vec::new();
        let mut processed_count = 0;

        loop {
            let mut frontier: Vec<usize> = (0..n)
                .filter(|&i| !processed[i] && remaining[i] == 0)
                .collect();
            if frontier.is_empty() {
                break;
            }
            frontier.sort_by(|&a, &b| {
                infos[a].1.cmp(&infos[b].1).then_with(|| infos[a].0.cmp(&infos[b].0))
            });
            for &i in &frontier {
                processed[i] = true;
                processed_count += 1;
            }
            levels.push(frontier.iter().map(|&i| infos[i].0.clone()).collect());
            for &i in &frontier {
                for &dependent in &dependents[i] {
                    remaining[dependent] -= 1;
                }
            }
        }

        if processed_count != n {
            let cycle = find_cycle(&infos, &idx_of, &processed);
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("enricher_registry", "resolve_order"),
                constraint: format!("dependency cycle: {}", cycle.join(" -> ")),
            });
        }

        Ok(levels)
    }
}

fn same_implementation(a: &EnricherKind, b: &EnricherKind) -> bool {
    match (a, b) {
        (EnricherKind::Sync(a), EnricherKind::Sync(b)) => Arc::ptr_eq(a, b),
        (EnricherKind::Async(a), EnricherKind::Async(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn find_cycle(
    infos: &[(String, i32, Vec<String>)],
    idx_of: &HashMap<&str, usize>,
    processed: &[bool],
) -> Vec<String> {
    let n = infos.len();
    let mut color = vec![0u8; n]; // 0 = white, 1 = gray, 2 = black
    for start in 0..n {
        if processed[start] || color[start] != 0 {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = visit(start, infos, idx_of, processed, &mut color, &mut path) {
            return cycle.into_iter().map(|i| infos[i].0.clone()).collect();
        }
    }
    Vec::new()
}

fn visit(
    u: usize,
    infos: &[(String, i32, Vec<String>)],
    idx_of: &HashMap<&str, usize>,
    processed: &[bool],
    color: &mut [u8],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    color[u] = 1;
    path.push(u);
    for dep in &infos[u].2 {
        if let Some(&v) = idx_of.get(dep.as_str()) {
            if processed[v] {
                continue;
            }
            if color[v] == 1 {
                let start = path.iter().position(|&x| x == v).unwrap();
                return Some(path[start..].to_vec());
            }
            if color[v] == 0 {
                if let Some(cycle) = visit(v, infos, idx_of, processed, color, path) {
                    return Some(cycle);
                }
            }
        }
    }
    path.pop();
    color[u] = 2;
    None
}
