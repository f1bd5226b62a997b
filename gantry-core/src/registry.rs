use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

/// Identifies a registration target (a controller or provider type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId {
    type_id: TypeId,
    name: &'static str,
}

impl TargetId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

/// Well-known metadata keys. Descriptors written by blueprints and read by
/// the registrar and binder all live under these.
pub mod keys {
    pub const ROUTES: &str = "routes:metadata";
    pub const CONTROLLER: &str = "controller:metadata";
    pub const INJECTABLE: &str = "injectable:metadata";
    pub const BODY: &str = "body:metadata";
    pub const PARAM: &str = "param:metadata";
    pub const QUERY: &str = "query:metadata";
    pub const HEADERS: &str = "headers:metadata";
    pub const REQUEST: &str = "request:metadata";
    pub const RESPONSE: &str = "response:metadata";
    pub const MIDDLEWARE: &str = "middleware:metadata";
    pub const INJECT: &str = "inject:metadata";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetaKey {
    key: &'static str,
    target: TargetId,
    member: Option<String>,
}

/// The single owner of registration metadata.
///
/// Entries are keyed by `(key, target, member)`: class-level metadata uses
/// `member: None`, method-level metadata names the handler. Values are
/// type-erased; `get` returns `None` when the stored value is of a
/// different type than requested.
///
/// The registry is populated while the application is assembled and is
/// immutable afterwards, so request-time reads go through a plain shared
/// reference with no locking.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    entries: HashMap<MetaKey, Box<dyn Any + Send + Sync>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any previous entry under the same key.
    pub fn define<V: Any + Send + Sync>(
        &mut self,
        key: &'static str,
        target: TargetId,
        member: Option<&str>,
        value: V,
    ) {
        self.entries.insert(
            MetaKey {
                key,
                target,
                member: member.map(str::to_string),
            },
            Box::new(value),
        );
    }

    pub fn get<V: Any + Send + Sync>(
        &self,
        key: &'static str,
        target: TargetId,
        member: Option<&str>,
    ) -> Option<&V> {
        self.entries
            .get(&MetaKey {
                key,
                target,
                member: member.map(str::to_string),
            })
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn has(&self, key: &'static str, target: TargetId, member: Option<&str>) -> bool {
        self.entries.contains_key(&MetaKey {
            key,
            target,
            member: member.map(str::to_string),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Users;
    struct Orders;

    #[test]
    fn test_define_and_get() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Users>();
        registry.define(keys::CONTROLLER, target, None, true);

        assert_eq!(registry.get::<bool>(keys::CONTROLLER, target, None), Some(&true));
        assert!(registry.has(keys::CONTROLLER, target, None));
        assert!(!registry.has(keys::CONTROLLER, TargetId::of::<Orders>(), None));
    }

    #[test]
    fn test_member_scoping() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Users>();
        registry.define(keys::PARAM, target, Some("list"), vec![0usize]);
        registry.define(keys::PARAM, target, Some("find"), vec![1usize]);

        assert_eq!(
            registry.get::<Vec<usize>>(keys::PARAM, target, Some("list")),
            Some(&vec![0])
        );
        assert_eq!(
            registry.get::<Vec<usize>>(keys::PARAM, target, Some("find")),
            Some(&vec![1])
        );
        assert_eq!(registry.get::<Vec<usize>>(keys::PARAM, target, None), None);
    }

    #[test]
    fn test_redefine_replaces() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Users>();
        registry.define(keys::INJECTABLE, target, None, false);
        registry.define(keys::INJECTABLE, target, None, true);

        assert_eq!(registry.get::<bool>(keys::INJECTABLE, target, None), Some(&true));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_mismatch_returns_none() {
        let mut registry = MetadataRegistry::new();
        let target = TargetId::of::<Users>();
        registry.define(keys::CONTROLLER, target, None, true);

        assert_eq!(registry.get::<String>(keys::CONTROLLER, target, None), None);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TargetId::of::<Users>().short_name(), "Users");
    }
}
