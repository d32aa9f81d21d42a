//! Connection routing policy: which alias serves reads, writes and migrations of an entity.

use crate::config::{ResolvedEntity, DEFAULT_ALIAS};
use crate::db::SchemaCatalog;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ConnectionRouter {
    catalog: Arc<SchemaCatalog>,
    multi_join: bool,
}

impl ConnectionRouter {
    pub fn new(catalog: Arc<SchemaCatalog>, multi_join: bool) -> Self {
        ConnectionRouter { catalog, multi_join }
    }

    /// Router before the scan has run; every table is unscanned.
    pub fn unscanned(multi_join: bool) -> Self {
        Self::new(Arc::new(SchemaCatalog::default()), multi_join)
    }

    pub fn with_catalog(&self, catalog: Arc<SchemaCatalog>) -> Self {
        Self::new(catalog, self.multi_join)
    }

    pub fn multi_join(&self) -> bool {
        self.multi_join
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    fn owner(&self, entity: &ResolvedEntity) -> &str {
        match self.catalog.owner(&entity.table_name) {
            Some(alias) => alias,
            None => {
                tracing::debug!(table = %entity.table_name, "unscanned table routed to default");
                DEFAULT_ALIAS
            }
        }
    }

    /// Join mode funnels every read through `default`.
    pub fn read_alias(&self, entity: &ResolvedEntity) -> &str {
        if self.multi_join {
            return DEFAULT_ALIAS;
        }
        self.owner(entity)
    }

    /// Writes always go to the owning alias.
    pub fn write_alias(&self, entity: &ResolvedEntity) -> &str {
        self.owner(entity)
    }

    pub fn allow_relation(&self, _a: &ResolvedEntity, _b: &ResolvedEntity) -> bool {
        true
    }

    /// Without an entity only `default` migrates (bookkeeping lives there).
    pub fn allow_migrate(&self, target_alias: &str, _app: &str, entity: Option<&ResolvedEntity>) -> bool {
        match entity {
            None => target_alias == DEFAULT_ALIAS,
            Some(e) if !e.managed => false,
            Some(e) => target_alias == e.declared_alias(),
        }
    }

    /// Whether a read of `base` may SQL-join `related` on one connection.
    pub fn can_join(&self, base: &ResolvedEntity, related: &ResolvedEntity) -> bool {
        self.allow_relation(base, related) && (self.multi_join || self.read_alias(base) == self.read_alias(related))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::entity_fixture;

    fn catalog() -> Arc<SchemaCatalog> {
        let mut c = SchemaCatalog::default();
        c.insert("SYSTEM_USER", "default", "\"SYSTEM_USER\"".into(), "\"default\".\"SYSTEM_USER\"".into());
        c.insert("SYSTEM_MENU", "system", "\"SYSTEM_MENU\"".into(), "\"system\".\"SYSTEM_MENU\"".into());
        Arc::new(c)
    }

    #[test]
    fn join_mode_reads_default_writes_owner() {
        let router = ConnectionRouter::new(catalog(), true);
        let menu = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let user = entity_fixture("User", "SYSTEM_USER", None, true);
        assert_eq!(router.read_alias(&menu), "default");
        assert_eq!(router.read_alias(&user), "default");
        assert_eq!(router.write_alias(&menu), "system");
        assert_eq!(router.write_alias(&user), "default");
        assert!(router.can_join(&user, &menu));
    }

    #[test]
    fn without_join_mode_read_and_write_agree() {
        let router = ConnectionRouter::new(catalog(), false);
        for table in ["SYSTEM_USER", "SYSTEM_MENU", "UNSCANNED"] {
            let e = entity_fixture("E", table, None, true);
            assert_eq!(router.read_alias(&e), router.write_alias(&e));
        }
        let menu = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let user = entity_fixture("User", "SYSTEM_USER", None, true);
        assert!(!router.can_join(&user, &menu));
    }

    #[test]
    fn unscanned_falls_back_to_default() {
        let router = ConnectionRouter::unscanned(false);
        let e = entity_fixture("E", "SYSTEM_MENU", Some("system"), true);
        assert_eq!(router.write_alias(&e), "default");
        assert_eq!(router.read_alias(&e), "default");
    }

    #[test]
    fn migration_gating() {
        let router = ConnectionRouter::unscanned(true);
        assert!(router.allow_migrate("default", "system", None));
        assert!(!router.allow_migrate("system", "system", None));

        let unmanaged = entity_fixture("Legacy", "LEGACY", Some("default"), false);
        assert!(!router.allow_migrate("default", "system", Some(&unmanaged)));
        assert!(!router.allow_migrate("system", "system", Some(&unmanaged)));

        let menu = entity_fixture("Menu", "SYSTEM_MENU", Some("system"), true);
        assert!(router.allow_migrate("system", "system", Some(&menu)));
        assert!(!router.allow_migrate("default", "system", Some(&menu)));

        let user = entity_fixture("User", "SYSTEM_USER", None, true);
        assert!(router.allow_migrate("default", "account", Some(&user)));
    }

    #[test]
    fn relations_always_allowed() {
        let router = ConnectionRouter::unscanned(false);
        let a = entity_fixture("A", "A", Some("default"), true);
        let b = entity_fixture("B", "B", Some("system"), true);
        assert!(router.allow_relation(&a, &b));
    }
}
