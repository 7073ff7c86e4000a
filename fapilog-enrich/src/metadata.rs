use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fapilog_core::Level;

/// The context a condition predicate is evaluated against: environment tag,
/// the current event's level (if known). Evaluation is side-effect-free
/// (§4.4).
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    pub environment_tag: Option<String>,
    pub level: Option<Level>,
}

/// Conditions gating whether an enricher runs for a given event: a required
/// environment tag, a minimum level, and an arbitrary side-effect-free
/// predicate.
#[derive(Clone, Default)]
pub struct EnricherConditions {
    pub required_environment: Option<String>,
    pub min_level: Option<Level>,
    pub predicate: Option<Arc<dyn Fn(&ConditionContext) -> bool + Send + Sync>>,
}

impl EnricherConditions {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_satisfied(&self, ctx: &ConditionContext) -> bool {
        if let Some(required) = &self.required_environment {
            if ctx.environment_tag.as_deref() != Some(required.as_str()) {
                return false;
            }
        }
        if let Some(min_level) = self.min_level {
            match ctx.level {
                Some(level) if level >= min_level => {}
                _ => return false,
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(ctx) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for EnricherConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnricherConditions")
            .field("required_environment", &self.required_environment)
            .field("min_level", &self.min_level)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Metadata for a registered enricher (§3). Names are unique within a
/// registry; dependencies must resolve within the registered set.
#[derive(Debug, Clone)]
pub struct EnricherMetadata {
    pub name: String,
    pub description: String,
    pub priority: i32,
    pub dependencies: Vec<String>,
    pub conditions: EnricherConditions,
    pub async_capable: bool,
    /// Per-enricher override of the async processor's default group
    /// timeout; `None` falls back to the processor's configured default.
    pub async_timeout: Option<Duration>,
}

impl EnricherMetadata {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        EnricherMetadata {
            name: name.into(),
            description: String::new(),
            priority,
            dependencies: Vec::new(),
            conditions: EnricherConditions::always(),
            async_capable: false,
            async_timeout: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_conditions(mut self, conditions: EnricherConditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn async_capable(mut self) -> Self {
        self.async_capable = true;
        self
    }

    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }
}
