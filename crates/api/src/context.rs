//! Per-request context
//!
//! A [`CrudContext`] is created for every request (or kernel tool call) and
//! carries everything the data sources, behaviors and methods of that request
//! share: the user, their time zone, the database session, the registered
//! services and restrictions, and a cancellation token.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{ClaimsPrincipal, ReflectionRepository};

use crate::db::DbContext;
use crate::restrictions::RestrictionRegistry;
use crate::values::utc;

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoalesceOptions {
    /// Put exception text in 500 responses instead of a generic message
    pub detailed_exception_messages: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for CoalesceOptions {
    fn default() -> Self {
        Self {
            detailed_exception_messages: false,
            default_page_size: 25,
            max_page_size: 10_000,
        }
    }
}

impl CoalesceOptions {
    pub fn with_detailed_exception_messages(mut self, detailed: bool) -> Self {
        self.detailed_exception_messages = detailed;
        self
    }

    /// Clamp a requested page and size to the configured bounds
    pub fn paging(&self, page: Option<usize>, page_size: Option<usize>) -> (usize, usize) {
        let page = page.unwrap_or(1).max(1);
        let page_size = match page_size {
            None | Some(0) => self.default_page_size,
            Some(size) => size.min(self.max_page_size),
        };
        (page, page_size)
    }
}

// ============================================================================
// Services
// ============================================================================

/// Application services injected into `[Inject]` method parameters
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the service type's full name
    pub fn register<T: Any + Send + Sync>(mut self, type_name: &str, service: Arc<T>) -> Self {
        self.services.insert(type_name.to_string(), service);
        self
    }

    fn lookup(&self, type_name: &str) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.services.get(type_name).or_else(|| {
            let short = type_name.rsplit('.').next().unwrap_or(type_name);
            self.services
                .iter()
                .find(|(name, _)| name.rsplit('.').next() == Some(short))
                .map(|(_, service)| service)
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.lookup(type_name).is_some()
    }

    pub fn get<T: Any + Send + Sync>(&self, type_name: &str) -> Option<Arc<T>> {
        self.lookup(type_name)
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// CrudContext
// ============================================================================

type UserResolver = Box<dyn Fn() -> ClaimsPrincipal + Send + Sync>;

pub struct CrudContext {
    user: OnceLock<ClaimsPrincipal>,
    user_resolver: Option<UserResolver>,
    time_zone: FixedOffset,
    cancellation: CancellationToken,
    options: CoalesceOptions,
    repository: Arc<ReflectionRepository>,
    db: Arc<dyn DbContext>,
    services: Arc<ServiceRegistry>,
    restrictions: Arc<RestrictionRegistry>,
}

impl CrudContext {
    pub fn new(repository: Arc<ReflectionRepository>, db: Arc<dyn DbContext>) -> Self {
        Self {
            user: OnceLock::new(),
            user_resolver: None,
            time_zone: utc(),
            cancellation: CancellationToken::new(),
            options: CoalesceOptions::default(),
            repository,
            db,
            services: Arc::new(ServiceRegistry::default()),
            restrictions: Arc::new(RestrictionRegistry::default()),
        }
    }

    pub fn with_user(self, user: ClaimsPrincipal) -> Self {
        let _ = self.user.set(user);
        self
    }

    /// Resolve the user on first access
    pub fn with_user_resolver(
        mut self,
        resolver: impl Fn() -> ClaimsPrincipal + Send + Sync + 'static,
    ) -> Self {
        self.user_resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_options(mut self, options: CoalesceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_services(mut self, services: Arc<ServiceRegistry>) -> Self {
        self.services = services;
        self
    }

    pub fn with_restrictions(mut self, restrictions: Arc<RestrictionRegistry>) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn user(&self) -> &ClaimsPrincipal {
        self.user.get_or_init(|| {
            self.user_resolver
                .as_ref()
                .map(|resolve| resolve())
                .unwrap_or_else(ClaimsPrincipal::anonymous)
        })
    }

    pub fn time_zone(&self) -> FixedOffset {
        self.time_zone
    }

    /// The current instant in the user's time zone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.time_zone)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn check_cancelled(&self) -> CoalesceResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(CoalesceError::Cancelled);
        }
        Ok(())
    }

    pub fn options(&self) -> &CoalesceOptions {
        &self.options
    }

    pub fn repository(&self) -> &Arc<ReflectionRepository> {
        &self.repository
    }

    pub fn db(&self) -> &Arc<dyn DbContext> {
        &self.db
    }

    /// The session as its concrete type
    pub fn db_as<T: 'static>(&self) -> Option<&T> {
        self.db.as_any().downcast_ref::<T>()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn restrictions(&self) -> &RestrictionRegistry {
        &self.restrictions
    }
}

impl fmt::Debug for CrudContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudContext")
            .field("user", &self.user.get())
            .field("time_zone", &self.time_zone)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context() -> CrudContext {
        let repo = testing::both()[0].repo.clone();
        let db = InMemoryDatabase::new(repo.clone());
        CrudContext::new(repo, Arc::new(db.session()))
    }

    #[test]
    fn test_user_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let ctx = context().with_user_resolver(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ClaimsPrincipal::authenticated("alice").with_role("Admin")
        });
        assert!(ctx.user().is_in_role("Admin"));
        assert!(ctx.user().is_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_user_is_anonymous() {
        assert!(!context().user().is_authenticated());
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = context().with_cancellation(token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(CoalesceError::Cancelled)));
    }

    #[test]
    fn test_paging_is_clamped() {
        let options = CoalesceOptions::default();
        assert_eq!(options.paging(None, None), (1, 25));
        assert_eq!(options.paging(Some(0), Some(0)), (1, 25));
        assert_eq!(options.paging(Some(3), Some(50_000)), (3, 10_000));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CoalesceOptions =
            serde_json::from_str(r#"{"detailedExceptionMessages": true}"#).unwrap();
        assert!(options.detailed_exception_messages);
        assert_eq!(options.default_page_size, 25);
    }

    #[test]
    fn test_service_registry_lookup() {
        struct Weather(&'static str);
        let services = ServiceRegistry::new()
            .register("MyProject.Services.IWeatherService", Arc::new(Weather("sunny")));
        assert!(services.contains("IWeatherService"));
        assert_eq!(services.get::<Weather>("MyProject.Services.IWeatherService").unwrap().0, "sunny");
        assert!(services.get::<String>("MyProject.Services.IWeatherService").is_none());
        assert!(!services.contains("MyProject.Services.IOther"));
    }

    #[test]
    fn test_db_downcast() {
        let ctx = context();
        assert!(ctx.db_as::<crate::db::InMemoryDbContext>().is_some());
        assert!(ctx.db_as::<String>().is_none());
    }
}
