//! heapdb command line
//!
//! Runs one query against the tables listed in a schema file and prints the resulting rows
//! tab separated.
//!
//! # Usage
//!
//! ```bash
//! # List tables from ./heapdb-data/catalog.txt
//! heapdb tables
//!
//! # Filtered scan
//! heapdb --schema data/catalog.txt scan people --where age ">=" 30
//!
//! # Grouped aggregate
//! heapdb aggregate people avg age --group-by city
//! ```

use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use heapdb::{
    config::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES},
    Aggregate, AggregateOp, CompareOp, Database, DbConfig, Delete, Field, Filter, Insert,
    OpIterator, Predicate, Row, RowIterator, Schema, TableId, TransactionId,
};

/// Query heap files from the command line
#[derive(Parser, Debug)]
#[command(name = "heapdb", version, about = "Heap file storage engine")]
struct Args {
    /// Directory holding the database files
    #[arg(short = 'd', long, default_value = "./heapdb-data", env = "HEAPDB_DATA_DIR")]
    data_dir: PathBuf,

    /// Schema file listing the tables (defaults to DATA_DIR/catalog.txt)
    #[arg(short = 's', long, value_name = "FILE", env = "HEAPDB_SCHEMA")]
    schema: Option<PathBuf>,

    /// Page size in bytes
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, env = "HEAPDB_PAGE_SIZE")]
    page_size: usize,

    /// Buffer pool capacity in pages
    #[arg(long, default_value_t = DEFAULT_POOL_PAGES, env = "HEAPDB_POOL_PAGES")]
    pool_pages: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables and their schemas
    Tables,
    /// Print the rows of a table
    Scan {
        table: String,
        /// Only rows where FIELD OP VALUE holds
        #[arg(long = "where", num_args = 3, value_names = ["FIELD", "OP", "VALUE"])]
        condition: Option<Vec<String>>,
    },
    /// Insert one row
    Insert {
        table: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Reduce a column, optionally per group
    Aggregate {
        table: String,
        op: AggregateOp,
        field: String,
        #[arg(long)]
        group_by: Option<String>,
    },
    /// Delete the rows matching a condition
    Delete {
        table: String,
        #[arg(long = "where", num_args = 3, value_names = ["FIELD", "OP", "VALUE"], required = true)]
        condition: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging();

    let config = DbConfig::default()
        .with_page_size(args.page_size)
        .with_pool_pages(args.pool_pages);
    let db = Database::new(&args.data_dir, config)?;
    let schema_file = args
        .schema
        .clone()
        .unwrap_or_else(|| args.data_dir.join("catalog.txt"));
    let loaded = db.load_schema(&schema_file)?;
    info!(tables = loaded.len(), schema = %schema_file.display(), "catalog loaded");

    let tid = TransactionId::new();
    match args.command {
        Command::Tables => {
            for table_id in db.catalog().table_ids() {
                println!(
                    "{}\t{}",
                    db.catalog().table_name(table_id)?,
                    db.catalog().schema(table_id)?
                );
            }
        }
        Command::Scan { table, condition } => {
            let table_id = db.catalog().table_id(&table)?;
            let mut root: Box<dyn OpIterator> = Box::new(db.scan(tid, table_id)?);
            if let Some(condition) = condition {
                let predicate = parse_condition(&db, table_id, &condition)?;
                root = Box::new(Filter::new(predicate, root)?);
            }
            print_rows(root.as_mut())?;
        }
        Command::Insert { table, values } => {
            let table_id = db.catalog().table_id(&table)?;
            let schema = db.catalog().schema(table_id)?;
            let row = parse_row(&schema, &values)?;
            let source = RowIterator::new(Arc::clone(&schema), vec![row]);
            let mut insert = Insert::new(
                tid,
                Arc::clone(db.buffer_pool()),
                Box::new(source),
                table_id,
            )?;
            print_rows(&mut insert)?;
        }
        Command::Aggregate {
            table,
            op,
            field,
            group_by,
        } => {
            let table_id = db.catalog().table_id(&table)?;
            let schema = db.catalog().schema(table_id)?;
            let agg_field = schema.index_of(&field)?;
            let group_field = group_by
                .as_deref()
                .map(|name| schema.index_of(name))
                .transpose()?;
            let scan = db.scan(tid, table_id)?;
            let mut aggregate = Aggregate::new(Box::new(scan), agg_field, group_field, op)?;
            print_rows(&mut aggregate)?;
        }
        Command::Delete { table, condition } => {
            let table_id = db.catalog().table_id(&table)?;
            let predicate = parse_condition(&db, table_id, &condition)?;
            let filter = Filter::new(predicate, Box::new(db.scan(tid, table_id)?))?;
            let mut delete = Delete::new(tid, Arc::clone(db.buffer_pool()), Box::new(filter))?;
            print_rows(&mut delete)?;
        }
    }

    db.buffer_pool().flush_all()?;
    let (hits, misses) = db.buffer_pool().stats().get();
    info!(hits, misses, "done");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_condition(
    db: &Database,
    table_id: TableId,
    condition: &[String],
) -> Result<Predicate, Box<dyn Error>> {
    let [field, op, value] = condition else {
        return Err("expected FIELD OP VALUE".into());
    };
    let schema = db.catalog().schema(table_id)?;
    let index = schema.index_of(field)?;
    let op: CompareOp = op.parse()?;
    let operand = Field::parse(schema.field_type(index)?, value)?;
    Ok(Predicate::new(index, op, operand))
}

fn parse_row(schema: &Arc<Schema>, values: &[String]) -> Result<Row, Box<dyn Error>> {
    if values.len() != schema.num_fields() {
        return Err(format!(
            "table has {} columns ({schema}), got {} values",
            schema.num_fields(),
            values.len()
        )
        .into());
    }
    let fields = values
        .iter()
        .enumerate()
        .map(|(i, value)| Field::parse(schema.field_type(i)?, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Row::new(Arc::clone(schema), fields)?)
}

fn print_rows(op: &mut dyn OpIterator) -> Result<(), Box<dyn Error>> {
    let names: Vec<&str> = op.schema().fields().iter().map(|f| f.name.as_str()).collect();
    println!("{}", names.join("\t"));
    op.open()?;
    while op.has_next()? {
        println!("{}", op.next()?);
    }
    op.close();
    Ok(())
}
