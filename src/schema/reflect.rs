//! Schema reflector: cached entity-to-column-types resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::SchemaCache;
use super::introspect::Introspector;
use super::{normalize_type, ColumnTypeMap, SemanticType};
use crate::model::EntityDescriptor;

/// Resolves the semantic column types of an entity's table, caching the
/// result so repeated requests skip catalog queries entirely.
///
/// Reflection never fails the request: if introspection errors out, every
/// declared column degrades to [`SemanticType::String`], which yields the
/// most permissive (LIKE) filter behavior.
pub struct SchemaReflector {
    introspector: Arc<dyn Introspector>,
    cache: SchemaCache,
}

impl SchemaReflector {
    pub fn new(introspector: Arc<dyn Introspector>, cache: SchemaCache) -> Self {
        Self {
            introspector,
            cache,
        }
    }

    /// The semantic column type map for `entity`.
    pub fn column_types(&self, entity: &EntityDescriptor) -> ColumnTypeMap {
        let key = SchemaCache::key(&entity.name, &entity.table);

        if let Some(cached) = self.cache.get(&key) {
            debug!(entity = %entity.name, "column types served from cache");
            return cached;
        }

        let map = self.reflect_live(entity);
        self.cache.put(&key, &map);
        map
    }

    /// Drop the cached map for `entity`, forcing the next request to hit
    /// the catalog. Call after migrations alter the table.
    pub fn invalidate(&self, entity: &EntityDescriptor) {
        let key = SchemaCache::key(&entity.name, &entity.table);
        self.cache.forget(&key);
    }

    fn reflect_live(&self, entity: &EntityDescriptor) -> ColumnTypeMap {
        match self.introspector.columns(&entity.table) {
            Ok(raw) => {
                let mut map = ColumnTypeMap::new();
                for column in raw {
                    map.insert(column.name.clone(), normalize_type(&column.vendor_type));
                }
                debug!(
                    entity = %entity.name,
                    table = %entity.table,
                    columns = map.len(),
                    "reflected column types"
                );
                map
            }
            Err(err) => {
                warn!(
                    entity = %entity.name,
                    table = %entity.table,
                    %err,
                    "schema reflection failed, degrading all columns to string"
                );
                entity
                    .columns
                    .iter()
                    .map(|name| (name.clone(), SemanticType::String))
                    .collect()
            }
        }
    }
}
