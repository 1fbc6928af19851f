//! The directory of tables: name, heap file, schema and primary key per table id.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    heap_file::HeapFile,
    page::TableId,
    types::{FieldDesc, FieldType, Schema},
};

#[derive(Debug)]
struct TableEntry {
    name: String,
    file: Arc<HeapFile>,
    primary_key: String,
}

/// Tables keyed by id, in the order they were added.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<IndexMap<TableId, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`. A table already registered under the same name or the same
    /// id is replaced.
    ///
    /// Pages of a registered table may be cached with its schema, so re-registering the same
    /// file under a different schema fails with [`DbError::SchemaMismatch`].
    pub fn add_table(
        &self,
        file: HeapFile,
        name: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> DbResult<TableId> {
        let name = name.into();
        let table_id = file.id();
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(&table_id) {
            if existing.file.schema() != file.schema() {
                return Err(DbError::schema_mismatch(format!(
                    "table {table_id} is registered as ({}), cannot re-register it as ({})",
                    existing.file.schema(),
                    file.schema()
                )));
            }
        }
        tables.retain(|_, entry| entry.name != name);
        tables.insert(
            table_id,
            TableEntry {
                name,
                file: Arc::new(file),
                primary_key: primary_key.into(),
            },
        );
        Ok(table_id)
    }

    pub fn table_id(&self, name: &str) -> DbResult<TableId> {
        self.tables
            .read()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| DbError::not_found(format!("table {name}")))
    }

    pub fn database_file(&self, table_id: TableId) -> DbResult<Arc<HeapFile>> {
        self.with_entry(table_id, |entry| Arc::clone(&entry.file))
    }

    pub fn schema(&self, table_id: TableId) -> DbResult<Arc<Schema>> {
        self.with_entry(table_id, |entry| Arc::clone(entry.file.schema()))
    }

    pub fn primary_key(&self, table_id: TableId) -> DbResult<String> {
        self.with_entry(table_id, |entry| entry.primary_key.clone())
    }

    pub fn table_name(&self, table_id: TableId) -> DbResult<String> {
        self.with_entry(table_id, |entry| entry.name.clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().keys().copied().collect()
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }

    fn with_entry<T>(
        &self,
        table_id: TableId,
        f: impl FnOnce(&TableEntry) -> T,
    ) -> DbResult<T> {
        self.tables
            .read()
            .get(&table_id)
            .map(f)
            .ok_or_else(|| DbError::not_found(format!("table {table_id}")))
    }

    /// Load table definitions from a schema file and register a heap file for each.
    ///
    /// Every non-blank line reads `name (field type [pk], field type, ...)` with `type` one of
    /// `int` or `string`. Table `name` is stored in `name.dat` next to the schema file.
    pub fn load_schema<P: AsRef<Path>>(
        &self,
        path: P,
        page_size: usize,
    ) -> DbResult<Vec<TableId>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base_dir = fs::canonicalize(path)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut loaded = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let invalid = |reason: String| DbError::InvalidSchemaFile {
                path: path.to_path_buf(),
                line: index + 1,
                reason,
            };
            let table = parse_table_line(line).map_err(invalid)?;
            let file = HeapFile::open(
                base_dir.join(format!("{}.dat", table.name)),
                table.schema,
                page_size,
            )?;
            info!(table = %table.name, schema = %file.schema(), "added table");
            loaded.push(self.add_table(file, table.name, table.primary_key)?);
        }
        Ok(loaded)
    }
}

struct TableDef {
    name: String,
    schema: Schema,
    primary_key: String,
}

fn parse_table_line(line: &str) -> Result<TableDef, String> {
    let open = line
        .find('(')
        .ok_or_else(|| "expected `name (field type, ...)`".to_string())?;
    let close = line
        .rfind(')')
        .filter(|&close| close > open)
        .ok_or_else(|| "missing closing parenthesis".to_string())?;

    let name = line[..open].trim();
    if name.is_empty() {
        return Err("missing table name".to_string());
    }

    let mut fields = Vec::new();
    let mut primary_key = String::new();
    for column in line[open + 1..close].split(',') {
        let parts: Vec<&str> = column.split_whitespace().collect();
        match parts.as_slice() {
            [field, field_type] | [field, field_type, _] => {
                let field_type = field_type
                    .parse::<FieldType>()
                    .map_err(|_| format!("unknown type {field_type}"))?;
                if let Some(annotation) = parts.get(2) {
                    if *annotation != "pk" {
                        return Err(format!("unknown annotation {annotation}"));
                    }
                    primary_key = field.to_string();
                }
                fields.push(FieldDesc::new(*field, field_type));
            }
            _ => return Err(format!("invalid column `{}`", column.trim())),
        }
    }

    let schema = Schema::new(fields).map_err(|e| e.to_string())?;
    Ok(TableDef {
        name: name.to_string(),
        schema,
        primary_key,
    })
}
