//! Identifier derivation and path resolution utilities
//! ----------------------------------------------------
//! Single source of truth for turning entity type names into table names and
//! table names into local filesystem paths. User supplied identifiers are
//! validated and quoted for DDL here as well.

use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

pub const DEFAULT_DB: &str = "entities";
pub const DEFAULT_SCHEMA: &str = "public";
pub const FIELDS_TABLE_SUFFIX: &str = "Fields";

/// Name of the identifier column every entity table starts with.
pub const ID_COLUMN: &str = "id";

/// Convert a camelCase/PascalCase name to snake_case: an underscore is inserted
/// before every uppercase letter that is not the first character, then the whole
/// string is lowercased. Existing underscores and digits are left untouched, so
/// `HTTPServer` becomes `h_t_t_p_server`.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i > 0 && ch.is_uppercase() { out.push('_'); }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Table holding the field metadata rows of an entity type.
pub fn fields_table_name(type_name: &str, suffix: &str) -> String {
    camel_to_snake(&format!("{}{}", type_name, suffix))
}

/// Table holding the entity rows of an entity type.
pub fn entity_table_name(type_name: &str) -> String { camel_to_snake(type_name) }

/// Entity type names start with an ASCII letter, followed by ASCII letters, digits or `_`.
pub fn validate_type_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    };
    if ok { Ok(()) } else { Err(RegistryError::InvalidIdentifier { kind: "entity type name", value: name.to_string() }) }
}

/// Handler ids are opaque to the registry; only reject empty or whitespace-bearing values.
pub fn validate_handler_id(handler_id: &str) -> Result<()> {
    if handler_id.is_empty() || handler_id.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidIdentifier { kind: "handler id", value: handler_id.to_string() });
    }
    Ok(())
}

/// Field names become column names: `[A-Za-z_][A-Za-z0-9_]*`, and never the identifier column.
pub fn validate_field_name(field_name: &str) -> Result<()> {
    let mut chars = field_name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    };
    if !ok {
        return Err(RegistryError::invalid_field(field_name, "field names must match [A-Za-z_][A-Za-z0-9_]*"));
    }
    if field_name.eq_ignore_ascii_case(ID_COLUMN) {
        return Err(RegistryError::invalid_field(field_name, "\"id\" is reserved for the identifier column"));
    }
    Ok(())
}

/// Quote an identifier for DDL text, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

#[derive(Debug, Clone)]
pub struct QueryDefaults {
    pub current_database: String,
    pub current_schema: String,
}

impl QueryDefaults {
    pub fn new(db: impl Into<String>, schema: impl Into<String>) -> Self {
        Self { current_database: db.into(), current_schema: schema.into() }
    }
}

/// Qualify a bare table name with the defaults into canonical form `<db>/<schema>/<table>`.
pub fn qualify_table_ident(table: &str, d: &QueryDefaults) -> String {
    format!("{}/{}/{}", d.current_database, d.current_schema, table)
}

/// Convert a canonical qualified identifier (with '/' separators) into a local filesystem path under `root`.
pub fn to_local_path(root: &Path, qualified_or_raw: &str) -> PathBuf {
    let s = qualified_or_raw.replace('\\', "/");
    let mut out = root.to_path_buf();
    for part in s.split('/') {
        let p = part.trim();
        if p.is_empty() || p == "." || p == ".." { continue; }
        out = out.join(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_derivation() {
        assert_eq!(camel_to_snake("Invoice"), "invoice");
        assert_eq!(camel_to_snake("InvoiceLine"), "invoice_line");
        assert_eq!(camel_to_snake("invoiceLine"), "invoice_line");
        assert_eq!(camel_to_snake("HTTPServer"), "h_t_t_p_server");
        assert_eq!(camel_to_snake("Order2Item"), "order2_item");
        assert_eq!(fields_table_name("InvoiceLine", FIELDS_TABLE_SUFFIX), "invoice_line_fields");
        assert_eq!(entity_table_name("InvoiceLine"), "invoice_line");
        // Existing underscores are kept, then one is added before the capital
        assert_eq!(entity_table_name("Invoice_Line"), "invoice__line");
        assert_eq!(entity_table_name("invoice_line"), "invoice_line");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn type_name_rules() {
        assert!(validate_type_name("Invoice").is_ok());
        assert!(validate_type_name("Invoice2").is_ok());
        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("2Invoice").is_err());
        assert!(validate_type_name("Invoice Line").is_err());
        assert!(validate_type_name("invoice_line").is_ok());
        assert!(validate_type_name("Invoice_Line").is_ok());
        assert!(validate_type_name("_Invoice").is_err());
    }

    #[test]
    fn handler_and_field_rules() {
        assert!(validate_handler_id("invoice.handler.v1").is_ok());
        assert!(validate_handler_id("").is_err());
        assert!(validate_handler_id("a b").is_err());
        assert!(validate_field_name("total").is_ok());
        assert!(validate_field_name("_hidden_2").is_ok());
        assert!(validate_field_name("ID").is_err());
        assert!(validate_field_name("1st").is_err());
        assert!(validate_field_name("drop table").is_err());
    }

    #[test]
    fn qualification_and_paths() {
        let d = QueryDefaults::new(DEFAULT_DB, DEFAULT_SCHEMA);
        assert_eq!(qualify_table_ident("invoice", &d), "entities/public/invoice");
        let d = QueryDefaults::new("crm", "sales");
        assert_eq!(qualify_table_ident("lead", &d), "crm/sales/lead");
        let p = to_local_path(Path::new("/tmp/root"), "db/../sales/./invoice");
        assert_eq!(p, PathBuf::from("/tmp/root/db/sales/invoice"));
    }
}
