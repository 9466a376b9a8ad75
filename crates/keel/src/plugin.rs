//! Plugin contract.
//!
//! A plugin is identified by a unique id. At startup it may contribute a
//! context object (reachable through [`AppContext::plugin`]), claim a
//! database and run an `init` hook. The hook receives the app while routing
//! is still open, so it can add handlers and repositories; once routing
//! closes those calls fail.
//!
//! [`AppContext::plugin`]: crate::AppContext::plugin

use async_trait::async_trait;

use crate::app::App;
use crate::context::SharedAny;
use crate::db::Database;

/// Database a plugin wants handed to its `init` hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PluginDb {
    #[default]
    None,
    /// The application's own connection.
    Host,
    /// A private connection opened from this URI.
    Uri(String),
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique id, also the key of the plugin context.
    fn id(&self) -> &str;

    fn ctx(&self) -> Option<SharedAny> {
        None
    }

    fn db(&self) -> PluginDb {
        PluginDb::None
    }

    /// Called once at startup, in plugin registration order.
    async fn init(&self, _app: &mut App, _db: Option<Database>) -> anyhow::Result<()> {
        Ok(())
    }
}
