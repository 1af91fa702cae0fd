//! DataFrame conversions for field metadata rows, and the store-backed
//! `FieldMetadataStore`.

use anyhow::Context;
use polars::prelude::*;

use super::Store;
use crate::error::ExecFailure;
use crate::field_spec::FieldSpec;
use crate::ident::ID_COLUMN;
use crate::metadata::{FieldMetadataRecord, FieldMetadataStore, FIELD_NAME_COLUMN, FIELD_TYPE_COLUMN};

pub(crate) fn records_to_df(records: &[FieldMetadataRecord]) -> PolarsResult<DataFrame> {
    let ids = Series::new(ID_COLUMN.into(), records.iter().map(|r| r.id).collect::<Vec<i64>>());
    let names = Series::new(FIELD_NAME_COLUMN.into(), records.iter().map(|r| r.field_name.clone()).collect::<Vec<String>>());
    let types = Series::new(FIELD_TYPE_COLUMN.into(), records.iter().map(|r| r.field_type.clone()).collect::<Vec<String>>());
    DataFrame::new(vec![ids.into(), names.into(), types.into()])
}

pub(crate) fn df_to_records(df: &DataFrame) -> anyhow::Result<Vec<FieldMetadataRecord>> {
    let ids = df.column(ID_COLUMN)?.i64()?;
    let names = df.column(FIELD_NAME_COLUMN)?.str()?;
    let types = df.column(FIELD_TYPE_COLUMN)?.str()?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let id = ids.get(i).with_context(|| format!("null id at row {}", i))?;
        let field_name = names.get(i).with_context(|| format!("null field_name at row {}", i))?;
        let field_type = types.get(i).with_context(|| format!("null field_type at row {}", i))?;
        out.push(FieldMetadataRecord { id, field_name: field_name.to_string(), field_type: field_type.to_string() });
    }
    // Ids are assigned in insertion order.
    out.sort_by_key(|r| r.id);
    Ok(out)
}

impl FieldMetadataStore for Store {
    fn insert_field(&self, table: &str, field_name: &str, spec: &FieldSpec) -> std::result::Result<FieldMetadataRecord, ExecFailure> {
        if !self.has_table(table) { return Err(ExecFailure::table_missing(table)); }
        let existing = self.list_records(table).map_err(ExecFailure::io)?;
        let next_id = existing.last().map(|r| r.id).unwrap_or(0) + 1;
        let rec = FieldMetadataRecord { id: next_id, field_name: field_name.to_string(), field_type: spec.encode() };
        let df = records_to_df(std::slice::from_ref(&rec)).map_err(|e| ExecFailure::io(e.into()))?;
        self.append_df(table, df).map_err(ExecFailure::io)?;
        Ok(rec)
    }

    fn list_records(&self, table: &str) -> anyhow::Result<Vec<FieldMetadataRecord>> {
        match self.read_df(table).with_context(|| format!("field metadata table '{}'", table))? {
            Some(df) => df_to_records(&df),
            None => Ok(Vec::new()),
        }
    }
}
