//! The shared application context.
//!
//! Handlers, jobs and repositories all see the same [`AppContext`]. It is
//! built once, together with the repositories it contains: every repository
//! is constructed inside [`Arc::new_cyclic`] and keeps a `Weak` back to the
//! context, so no repository exists without one.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::config::Environment;
use crate::db::Database;
use crate::registry::RepoRegistration;
use crate::repo::RepoBinding;

/// A type-erased shared object: a repository or a plugin context.
pub type SharedAny = Arc<dyn Any + Send + Sync>;

pub struct AppContext {
    environment: Environment,
    repos: RwLock<HashMap<String, SharedAny>>,
    plugins: HashMap<String, SharedAny>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("environment", &self.environment)
            .field("repos", &self.repo_names())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AppContext {
    /// Builds the context and its repositories in one step.
    pub(crate) fn build(
        environment: Environment,
        repos: &[RepoRegistration],
        plugins: HashMap<String, SharedAny>,
        db: Option<Database>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let instances = repos
                .iter()
                .map(|repo| (repo.repo_instance_name.clone(), repo.instantiate(weak, db.clone())))
                .collect();
            AppContext {
                environment,
                repos: RwLock::new(instances),
                plugins,
            }
        })
    }

    /// A context with no repositories or plugins.
    pub fn empty(environment: Environment) -> Arc<Self> {
        Self::build(environment, &[], HashMap::new(), None)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The repository registered under `instance_name`, if it has type `R`.
    pub fn repo<R: Any + Send + Sync>(&self, instance_name: &str) -> Option<Arc<R>> {
        let repos = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        repos.get(instance_name).cloned().and_then(|repo| repo.downcast::<R>().ok())
    }

    pub fn repo_names(&self) -> Vec<String> {
        let repos = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = repos.keys().cloned().collect();
        names.sort();
        names
    }

    /// The context a plugin exposed under its id, if it has type `P`.
    pub fn plugin<P: Any + Send + Sync>(&self, id: &str) -> Option<Arc<P>> {
        self.plugins.get(id).cloned().and_then(|ctx| ctx.downcast::<P>().ok())
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    /// Adds a repository to a live context.
    pub(crate) fn insert_repo(self: &Arc<Self>, repo: &RepoRegistration, db: Option<Database>) {
        let instance = repo.instantiate(&Arc::downgrade(self), db);
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        repos.insert(repo.repo_instance_name.clone(), instance);
    }
}

impl RepoRegistration {
    fn instantiate(&self, ctx: &Weak<AppContext>, db: Option<Database>) -> SharedAny {
        (self.factory)(RepoBinding {
            collection: self.collection_name.clone(),
            ctx: ctx.clone(),
            db,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repository;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Car {
        model: String,
    }

    #[test]
    fn test_repos_see_their_context() {
        let ctx = AppContext::build(
            Environment::Test,
            &[RepoRegistration::new::<Car>("CarRepo")],
            HashMap::new(),
            None,
        );
        let repo = ctx.repo::<Repository<Car>>("carRepo").unwrap();
        assert_eq!(repo.collection(), "car");
        assert!(Arc::ptr_eq(&repo.ctx().unwrap(), &ctx));
    }

    #[test]
    fn test_typed_lookups() {
        let mut plugins: HashMap<String, SharedAny> = HashMap::new();
        plugins.insert("counter".to_string(), Arc::new(7_u32));
        let ctx = AppContext::build(Environment::Test, &[], plugins, None);

        assert_eq!(ctx.plugin::<u32>("counter").as_deref(), Some(&7));
        assert!(ctx.plugin::<String>("counter").is_none());
        assert!(ctx.repo::<Repository<Car>>("carRepo").is_none());
    }
}
