use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::traits::ProviderRegistration;

/// What a binding is looked up by: a concrete type, or a string key for
/// bindings that cannot be identified by type alone (two pool instances,
/// configuration values, test doubles).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyId {
    Type(TypeId, &'static str),
    Key(String),
}

impl DependencyId {
    pub fn of<T: 'static>() -> Self {
        DependencyId::Type(TypeId::of::<T>(), type_name::<T>())
    }

    pub fn key(key: impl Into<String>) -> Self {
        DependencyId::Key(key.into())
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyId::Type(_, name) => {
                write!(f, "{}", name.rsplit("::").next().unwrap_or(name))
            }
            DependencyId::Key(key) => write!(f, "\"{key}\""),
        }
    }
}

/// One declared dependency of a provider or controller: which constructor
/// slot it fills and what it is looked up by.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub slot: &'static str,
    pub id: DependencyId,
}

impl Dependency {
    pub fn of<T: 'static>(slot: &'static str) -> Self {
        Self {
            slot,
            id: DependencyId::of::<T>(),
        }
    }

    pub fn keyed(slot: &'static str, key: impl Into<String>) -> Self {
        Self {
            slot,
            id: DependencyId::key(key),
        }
    }
}

/// How `install` treats dependencies that are still unbound after every
/// provider has been registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Log a warning and leave the slot empty. Construction proceeds and
    /// the owner sees `None` at use time.
    #[default]
    Lenient,
    /// Fail startup with a `DependencyInjection` error.
    Strict,
}

/// Thread-safe singleton container.
///
/// Bindings are type-erased and shared; `Clone` is shallow, so every clone
/// sees the same bindings. Values are stored once and handed out as `Arc`s.
#[derive(Clone, Default)]
pub struct Container {
    bindings: Arc<RwLock<HashMap<DependencyId, Arc<dyn Any + Send + Sync>>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `instance` as the singleton for `T`, replacing any previous
    /// binding.
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        self.bindings
            .write()
            .unwrap()
            .insert(DependencyId::of::<T>(), Arc::new(instance));
    }

    /// Binds only when `T` is not already bound. Returns whether the
    /// binding was inserted, so repeated registration is idempotent.
    pub fn register_if_missing<T: Send + Sync + 'static>(&self, instance: T) -> bool {
        let mut bindings = self.bindings.write().unwrap();
        let id = DependencyId::of::<T>();
        if bindings.contains_key(&id) {
            return false;
        }
        bindings.insert(id, Arc::new(instance));
        true
    }

    /// Binds `instance` under a string key instead of its type.
    pub fn register_named<T: Send + Sync + 'static>(&self, key: impl Into<String>, instance: T) {
        self.bindings
            .write()
            .unwrap()
            .insert(DependencyId::key(key), Arc::new(instance));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.bindings
            .read()
            .unwrap()
            .get(&DependencyId::of::<T>())
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.bindings
            .read()
            .unwrap()
            .get(&DependencyId::Key(key.to_string()))
            .and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// Like `get`, but a miss is an error. For callers that cannot operate
    /// without the binding.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.get::<T>()
            .ok_or_else(|| Error::ProviderNotFound(type_name::<T>().to_string()))
    }

    pub fn has<T: Send + Sync + 'static>(&self) -> bool {
        self.has_id(&DependencyId::of::<T>())
    }

    pub fn has_id(&self, id: &DependencyId) -> bool {
        self.bindings.read().unwrap().contains_key(id)
    }

    /// Constructor-injection lookup: a miss is tolerated but logged, and
    /// the slot stays empty. This is what generated constructors call for
    /// each declared dependency.
    pub fn slot<T: Send + Sync + 'static>(&self, requirer: &str) -> Option<Arc<T>> {
        let found = self.get::<T>();
        if found.is_none() {
            tracing::warn!(
                dependency = %DependencyId::of::<T>(),
                requirer,
                "dependency not bound; slot left empty"
            );
        }
        found
    }

    pub fn slot_named<T: Send + Sync + 'static>(&self, key: &str, requirer: &str) -> Option<Arc<T>> {
        let found = self.get_named::<T>(key);
        if found.is_none() {
            tracing::warn!(dependency = %DependencyId::key(key), requirer, "dependency not bound; slot left empty");
        }
        found
    }

    /// Returns the binding for `id`, running `factory` to create it when
    /// absent. The factory runs outside the lock because it may itself
    /// resolve from this container; if two callers race, both factories may
    /// run but only one result is bound and both callers receive it.
    pub fn get_or_bind_with(
        &self,
        id: DependencyId,
        factory: impl FnOnce() -> Arc<dyn Any + Send + Sync>,
    ) -> Arc<dyn Any + Send + Sync> {
        if let Some(existing) = self.bindings.read().unwrap().get(&id) {
            return existing.clone();
        }
        let candidate = factory();
        let mut bindings = self.bindings.write().unwrap();
        if let Some(raced) = bindings.get(&id) {
            return raced.clone();
        }
        bindings.insert(id, candidate.clone());
        candidate
    }

    /// Registers a set of providers.
    ///
    /// Providers are ordered so that declared dependencies are constructed
    /// before their dependents. Dependencies outside the set do not affect
    /// ordering, and a cycle falls back to the supplied order with a
    /// warning. After registration every declared dependency is checked:
    /// under `ResolvePolicy::Strict` any unbound dependency aborts with an
    /// error, under `Lenient` it is reported and the slot stays empty.
    pub fn install(
        &self,
        providers: &[ProviderRegistration],
        policy: ResolvePolicy,
    ) -> Result<(), Error> {
        for index in self.construction_order(providers) {
            let provider = &providers[index];
            tracing::info!(provider = provider.target.short_name(), "registering provider");
            (provider.register_fn)(self);
        }

        let mut missing = Vec::new();
        for provider in providers {
            for dependency in &provider.dependencies {
                if !self.has_id(&dependency.id) {
                    missing.push(format!(
                        "{} (slot `{}` of {})",
                        dependency.id,
                        dependency.slot,
                        provider.target.short_name()
                    ));
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        match policy {
            ResolvePolicy::Lenient => {
                tracing::warn!(
                    unresolved = missing.join(", "),
                    "some dependencies are unbound; their slots were left empty"
                );
                Ok(())
            }
            ResolvePolicy::Strict => Err(Error::DependencyInjection(format!(
                "unresolved dependencies: {}",
                missing.join(", ")
            ))),
        }
    }

    fn construction_order(&self, providers: &[ProviderRegistration]) -> Vec<usize> {
        let index_of: HashMap<TypeId, usize> = providers
            .iter()
            .enumerate()
            .map(|(index, provider)| (provider.target.type_id(), index))
            .collect();

        let mut indegree = vec![0usize; providers.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); providers.len()];
        for (index, provider) in providers.iter().enumerate() {
            for dependency in &provider.dependencies {
                if let DependencyId::Type(type_id, _) = &dependency.id {
                    if let Some(&dep_index) = index_of.get(type_id) {
                        if dep_index != index {
                            dependents[dep_index].push(index);
                            indegree[index] += 1;
                        }
                    }
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..providers.len())
            .filter(|&index| indegree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(providers.len());
        let mut placed = vec![false; providers.len()];
        while let Some(index) = queue.pop_front() {
            order.push(index);
            placed[index] = true;
            for &dependent in &dependents[index] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < providers.len() {
            tracing::warn!(
                "provider dependency cycle detected; falling back to registration order"
            );
            for index in 0..providers.len() {
                if !placed[index] {
                    order.push(index);
                }
            }
        }
        order
    }

    /// Number of bindings currently held.
    pub fn len(&self) -> usize {
        self.bindings.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().unwrap().is_empty()
    }

    /// Drops every binding. Test helper.
    pub fn clear(&self) {
        self.bindings.write().unwrap().clear();
    }
}
