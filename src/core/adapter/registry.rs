use std::collections::HashMap;
use std::fmt;

use super::{AdapterConfig, EcommerceAdapter, GenericAdapter, LightweightAdapter, ProjectAdapter};
use crate::hooks::HookRegistry;

pub const GENERIC_TYPE: &str = "generic";
pub const ZEND_TYPE: &str = "zend";
pub const MAGENTO_TYPE: &str = "magento";

pub type AdapterConstructor = fn(AdapterConfig, HookRegistry) -> Box<dyn ProjectAdapter>;

/// Maps manifest type tags (and optionally project names) to adapter constructors.
#[derive(Clone)]
pub struct AdapterRegistry {
    by_type: HashMap<String, AdapterConstructor>,
    by_project: HashMap<String, AdapterConstructor>,
}

fn generic(config: AdapterConfig, hooks: HookRegistry) -> Box<dyn ProjectAdapter> {
    Box::new(GenericAdapter::new(config, hooks))
}

fn zend(config: AdapterConfig, hooks: HookRegistry) -> Box<dyn ProjectAdapter> {
    Box::new(LightweightAdapter::new(config, hooks))
}

fn magento(config: AdapterConfig, hooks: HookRegistry) -> Box<dyn ProjectAdapter> {
    Box::new(EcommerceAdapter::new(config, hooks))
}

impl AdapterRegistry {
    /// Registry with no types; everything resolves to the generic adapter.
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
            by_project: HashMap::new(),
        }
    }

    /// Registry with the built-in `zend` and `magento` types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_type(ZEND_TYPE, zend);
        registry.register_type(MAGENTO_TYPE, magento);
        registry
    }

    pub fn register_type(&mut self, tag: impl Into<String>, constructor: AdapterConstructor) -> &mut Self {
        self.by_type.insert(tag.into().to_lowercase(), constructor);
        self
    }

    /// Constructor for one project; takes precedence over its type tag.
    pub fn register_project(
        &mut self,
        project: impl Into<String>,
        constructor: AdapterConstructor,
    ) -> &mut Self {
        self.by_project.insert(project.into(), constructor);
        self
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.by_type.contains_key(&tag.to_lowercase())
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build the adapter for `project`. Unknown or absent types fall back to generic.
    pub fn create(
        &self,
        project: &str,
        tag: Option<&str>,
        config: AdapterConfig,
        hooks: HookRegistry,
    ) -> Box<dyn ProjectAdapter> {
        let constructor = self
            .by_project
            .get(project)
            .or_else(|| tag.and_then(|t| self.by_type.get(&t.to_lowercase())))
            .copied()
            .unwrap_or(generic as AdapterConstructor);
        constructor(config, hooks)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut projects: Vec<&str> = self.by_project.keys().map(String::as_str).collect();
        projects.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("types", &self.types())
            .field("projects", &projects)
            .finish()
    }
}
