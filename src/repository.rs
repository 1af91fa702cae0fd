//! Registry repository: persistent directory of registered entity types.
//!
//! Reads are served from memory so they never block on the registration lock and
//! always see the latest committed entry. Durable implementations load their rows
//! into a `MemoryTypeRepository` on open and write through on `create`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: i64,
    pub name: String,
    pub handler_id: String,
    pub fields_table_name: String,
    pub entity_table_name: String,
}

/// A definition about to be persisted; the repository assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTypeDefinition {
    pub name: String,
    pub handler_id: String,
    pub fields_table_name: String,
    pub entity_table_name: String,
}

impl NewTypeDefinition {
    pub fn with_id(self, id: i64) -> TypeDefinition {
        TypeDefinition {
            id,
            name: self.name,
            handler_id: self.handler_id,
            fields_table_name: self.fields_table_name,
            entity_table_name: self.entity_table_name,
        }
    }
}

pub trait TypeRepository: Send + Sync {
    fn create(&self, def: NewTypeDefinition) -> anyhow::Result<TypeDefinition>;
    fn get(&self, id: i64) -> Option<TypeDefinition>;
    fn find_by_name(&self, name: &str) -> Option<TypeDefinition>;
    fn find_by_handler(&self, handler_id: &str) -> Option<TypeDefinition>;
    /// All definitions in id order.
    fn list(&self) -> Vec<TypeDefinition>;
}

#[derive(Default)]
pub struct MemoryTypeRepository {
    rows: RwLock<Vec<TypeDefinition>>,
}

impl MemoryTypeRepository {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn from_rows(mut rows: Vec<TypeDefinition>) -> Self {
        rows.sort_by_key(|d| d.id);
        Self { rows: RwLock::new(rows) }
    }

    pub(crate) fn next_id(&self) -> i64 { self.rows.read().iter().map(|d| d.id).max().unwrap_or(0) + 1 }

    pub(crate) fn push(&self, def: TypeDefinition) { self.rows.write().push(def); }

    pub fn len(&self) -> usize { self.rows.read().len() }

    pub fn is_empty(&self) -> bool { self.rows.read().is_empty() }
}

impl TypeRepository for MemoryTypeRepository {
    fn create(&self, def: NewTypeDefinition) -> anyhow::Result<TypeDefinition> {
        let mut rows = self.rows.write();
        let id = rows.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let def = def.with_id(id);
        rows.push(def.clone());
        Ok(def)
    }

    fn get(&self, id: i64) -> Option<TypeDefinition> { self.rows.read().iter().find(|d| d.id == id).cloned() }

    fn find_by_name(&self, name: &str) -> Option<TypeDefinition> {
        self.rows.read().iter().find(|d| d.name == name).cloned()
    }

    fn find_by_handler(&self, handler_id: &str) -> Option<TypeDefinition> {
        self.rows.read().iter().find(|d| d.handler_id == handler_id).cloned()
    }

    fn list(&self) -> Vec<TypeDefinition> { self.rows.read().clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_def(name: &str, handler: &str) -> NewTypeDefinition {
        NewTypeDefinition {
            name: name.into(),
            handler_id: handler.into(),
            fields_table_name: format!("{}_fields", name.to_lowercase()),
            entity_table_name: name.to_lowercase(),
        }
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let repo = MemoryTypeRepository::new();
        let a = repo.create(new_def("Invoice", "h.invoice")).unwrap();
        let b = repo.create(new_def("Customer", "h.customer")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(repo.next_id(), 3);
        assert_eq!(repo.get(2).unwrap().name, "Customer");
        assert!(repo.get(3).is_none());
    }

    #[test]
    fn lookups_by_name_and_handler() {
        let repo = MemoryTypeRepository::new();
        repo.create(new_def("Invoice", "h.invoice")).unwrap();
        assert_eq!(repo.find_by_name("Invoice").unwrap().id, 1);
        assert!(repo.find_by_name("invoice").is_none());
        assert_eq!(repo.find_by_handler("h.invoice").unwrap().name, "Invoice");
        assert!(repo.find_by_handler("h.other").is_none());
    }

    #[test]
    fn loaded_rows_are_sorted() {
        let repo = MemoryTypeRepository::from_rows(vec![new_def("B", "hb").with_id(5), new_def("A", "ha").with_id(2)]);
        let ids: Vec<i64> = repo.list().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(repo.next_id(), 6);
    }
}
