//! SQL-based persistence backend (MySQL/PostgreSQL via SeaORM)
//!
//! Relation names are supplied per region at runtime, so statements are built
//! with sea-query against aliased identifiers instead of static entities.

mod connection;

pub use connection::{PoolSettings, connect};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use prospect_common::{NaturalKey, SyncError, SyncResult};
use sea_orm::sea_query::{
    Alias, DeleteStatement, Expr, InsertStatement, Order, Query, SelectStatement, SimpleExpr,
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, FromQueryResult, QueryResult, Statement,
};
use tracing::debug;

use crate::model::{ChangeLogEntry, DocumentRecord, OperationKind};
use crate::traits::{ChangeLogStore, DocumentStore};

// Column names shared by the change-log and metadata relations
pub const COL_OWNER_UNIT: &str = "DW";
pub const COL_WELL_ID: &str = "JH";
pub const COL_DOCUMENT_NAME: &str = "WDMC";
pub const COL_SEQUENCE: &str = "SEQUENCE$$";
pub const COL_DML_TYPE: &str = "DMLTYPE$$";
pub const COL_STORED_LOCATION: &str = "CFLJ";
pub const COL_DOCUMENT_TYPE: &str = "WDLX";
pub const COL_DOCUMENT_SUBTYPE: &str = "WDZY";
pub const COL_DATA_CATEGORY: &str = "SJLB";
pub const COL_FILING_UNIT: &str = "BXDW";
pub const COL_FILING_DATE: &str = "BXRQ";
pub const COL_NOTE: &str = "BZ";

const DOCUMENT_COLUMNS: [&str; 10] = [
    COL_OWNER_UNIT,
    COL_WELL_ID,
    COL_DOCUMENT_NAME,
    COL_STORED_LOCATION,
    COL_DOCUMENT_TYPE,
    COL_DOCUMENT_SUBTYPE,
    COL_DATA_CATEGORY,
    COL_FILING_UNIT,
    COL_FILING_DATE,
    COL_NOTE,
];

fn ident(name: &str) -> Alias {
    Alias::new(name)
}

fn db_error(err: DbErr) -> SyncError {
    match err {
        DbErr::RecordNotFound(msg) => SyncError::NotFound(msg),
        other => SyncError::connectivity(other),
    }
}

fn relation(name: &str, what: &str) -> SyncResult<Alias> {
    if name.trim().is_empty() {
        return Err(SyncError::configuration(format!(
            "{} relation name is not set",
            what
        )));
    }
    Ok(ident(name))
}

fn key_filter(key: &NaturalKey) -> [SimpleExpr; 3] {
    [
        Expr::col(ident(COL_OWNER_UNIT)).eq(key.owner_unit.clone()),
        Expr::col(ident(COL_WELL_ID)).eq(key.well_id.clone()),
        Expr::col(ident(COL_DOCUMENT_NAME)).eq(key.document_name.clone()),
    ]
}

/// Await `op`, failing with a connectivity error once `limit` elapses
async fn bounded<T, F>(limit: Duration, what: &str, op: F) -> SyncResult<T>
where
    F: Future<Output = Result<T, DbErr>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(db_error),
        Err(_) => Err(SyncError::connectivity(format!(
            "{} did not complete within {:?}",
            what, limit
        ))),
    }
}

fn build<S>(db: &DatabaseConnection, statement: &S) -> Statement
where
    S: sea_orm::StatementBuilder,
{
    db.get_database_backend().build(statement)
}

// ============================================================================
// Row mapping
// ============================================================================

struct ChangeLogRow {
    owner_unit: String,
    well_id: String,
    document_name: String,
    sequence: i64,
    dml_type: String,
}

impl FromQueryResult for ChangeLogRow {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        Ok(Self {
            owner_unit: res.try_get(pre, COL_OWNER_UNIT)?,
            well_id: res.try_get(pre, COL_WELL_ID)?,
            document_name: res.try_get(pre, COL_DOCUMENT_NAME)?,
            sequence: res.try_get(pre, COL_SEQUENCE)?,
            dml_type: res.try_get(pre, COL_DML_TYPE)?,
        })
    }
}

impl From<ChangeLogRow> for ChangeLogEntry {
    fn from(row: ChangeLogRow) -> Self {
        ChangeLogEntry {
            key: NaturalKey::new(row.owner_unit, row.well_id, row.document_name),
            sequence: row.sequence,
            operation: OperationKind::from_code(&row.dml_type),
        }
    }
}

struct DocumentRow(DocumentRecord);

impl FromQueryResult for DocumentRow {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        Ok(DocumentRow(DocumentRecord {
            key: NaturalKey::new(
                res.try_get::<String>(pre, COL_OWNER_UNIT)?,
                res.try_get::<String>(pre, COL_WELL_ID)?,
                res.try_get::<String>(pre, COL_DOCUMENT_NAME)?,
            ),
            stored_location: res
                .try_get::<Option<String>>(pre, COL_STORED_LOCATION)?
                .unwrap_or_default(),
            document_type: res.try_get(pre, COL_DOCUMENT_TYPE)?,
            document_subtype: res.try_get(pre, COL_DOCUMENT_SUBTYPE)?,
            data_category: res.try_get(pre, COL_DATA_CATEGORY)?,
            filing_unit: res.try_get(pre, COL_FILING_UNIT)?,
            filing_date: res.try_get(pre, COL_FILING_DATE)?,
            note: res.try_get(pre, COL_NOTE)?,
        }))
    }
}

// ============================================================================
// Statements
// ============================================================================

fn pending_entries_statement(table: &str) -> SyncResult<SelectStatement> {
    Ok(Query::select()
        .columns([
            ident(COL_OWNER_UNIT),
            ident(COL_WELL_ID),
            ident(COL_DOCUMENT_NAME),
            ident(COL_SEQUENCE),
            ident(COL_DML_TYPE),
        ])
        .from(relation(table, "change-log")?)
        .order_by(ident(COL_SEQUENCE), Order::Asc)
        .to_owned())
}

fn remove_entry_statement(table: &str, sequence: i64) -> SyncResult<DeleteStatement> {
    Ok(Query::delete()
        .from_table(relation(table, "change-log")?)
        .and_where(Expr::col(ident(COL_SEQUENCE)).eq(sequence))
        .to_owned())
}

fn select_by_key_statement(
    table: &str,
    key: &NaturalKey,
    columns: &[&str],
) -> SyncResult<SelectStatement> {
    let mut stmt = Query::select();
    stmt.columns(columns.iter().map(|c| ident(c)))
        .from(relation(table, "document")?);
    for cond in key_filter(key) {
        stmt.and_where(cond);
    }
    stmt.limit(1);
    Ok(stmt)
}

fn insert_document_statement(table: &str, record: &DocumentRecord) -> SyncResult<InsertStatement> {
    let values: Vec<SimpleExpr> = vec![
        record.key.owner_unit.clone().into(),
        record.key.well_id.clone().into(),
        record.key.document_name.clone().into(),
        record.stored_location.clone().into(),
        record.document_type.clone().into(),
        record.document_subtype.clone().into(),
        record.data_category.clone().into(),
        record.filing_unit.clone().into(),
        record.filing_date.into(),
        record.note.clone().into(),
    ];

    Ok(Query::insert()
        .into_table(relation(table, "document")?)
        .columns(DOCUMENT_COLUMNS.iter().map(|c| ident(c)))
        .values(values)
        .map_err(|e| SyncError::transform(format!("build insert: {}", e)))?
        .to_owned())
}

fn delete_document_statement(table: &str, key: &NaturalKey) -> SyncResult<DeleteStatement> {
    let mut stmt = Query::delete();
    stmt.from_table(relation(table, "document")?);
    for cond in key_filter(key) {
        stmt.and_where(cond);
    }
    Ok(stmt)
}

// ============================================================================
// Change log
// ============================================================================

/// Change-log relation of one source database
pub struct SqlChangeLog {
    db: DatabaseConnection,
    table: String,
    statement_timeout: Duration,
}

impl SqlChangeLog {
    pub fn new(db: DatabaseConnection, table: impl Into<String>, statement_timeout: Duration) -> Self {
        Self {
            db,
            table: table.into(),
            statement_timeout,
        }
    }
}

#[async_trait]
impl ChangeLogStore for SqlChangeLog {
    async fn pending_entries(&self) -> SyncResult<Vec<ChangeLogEntry>> {
        let stmt = pending_entries_statement(&self.table)?;

        let rows = bounded(
            self.statement_timeout,
            "change-log poll",
            ChangeLogRow::find_by_statement(build(&self.db, &stmt)).all(&self.db),
        )
        .await?;

        debug!(table = %self.table, count = rows.len(), "Loaded pending change-log entries");

        Ok(rows.into_iter().map(ChangeLogEntry::from).collect())
    }

    async fn remove_entry(&self, sequence: i64) -> SyncResult<()> {
        let stmt = remove_entry_statement(&self.table, sequence)?;

        let result = bounded(
            self.statement_timeout,
            "change-log removal",
            self.db.execute(build(&self.db, &stmt)),
        )
        .await?;

        debug!(
            table = %self.table,
            sequence,
            rows_affected = result.rows_affected(),
            "Removed change-log entry"
        );
        Ok(())
    }
}

// ============================================================================
// Document metadata
// ============================================================================

/// Document metadata relation in a source or target database
pub struct SqlDocumentStore {
    db: DatabaseConnection,
    table: String,
    statement_timeout: Duration,
}

impl SqlDocumentStore {
    pub fn new(db: DatabaseConnection, table: impl Into<String>, statement_timeout: Duration) -> Self {
        Self {
            db,
            table: table.into(),
            statement_timeout,
        }
    }
}

#[async_trait]
impl DocumentStore for SqlDocumentStore {
    async fn find_document(&self, key: &NaturalKey) -> SyncResult<Option<DocumentRecord>> {
        let stmt = select_by_key_statement(&self.table, key, &DOCUMENT_COLUMNS)?;

        let row = bounded(
            self.statement_timeout,
            "document lookup",
            DocumentRow::find_by_statement(build(&self.db, &stmt)).one(&self.db),
        )
        .await?;

        Ok(row.map(|DocumentRow(record)| record))
    }

    async fn document_exists(&self, key: &NaturalKey) -> SyncResult<bool> {
        let stmt = select_by_key_statement(&self.table, key, &[COL_OWNER_UNIT])?;

        let row = bounded(
            self.statement_timeout,
            "document existence check",
            self.db.query_one(build(&self.db, &stmt)),
        )
        .await?;

        Ok(row.is_some())
    }

    async fn insert_document(&self, record: &DocumentRecord) -> SyncResult<()> {
        let stmt = insert_document_statement(&self.table, record)?;

        bounded(
            self.statement_timeout,
            "document insert",
            self.db.execute(build(&self.db, &stmt)),
        )
        .await?;

        debug!(table = %self.table, key = %record.key, "Inserted document record");
        Ok(())
    }

    async fn delete_document(&self, key: &NaturalKey) -> SyncResult<u64> {
        let stmt = delete_document_statement(&self.table, key)?;

        let result = bounded(
            self.statement_timeout,
            "document delete",
            self.db.execute(build(&self.db, &stmt)),
        )
        .await?;

        debug!(
            table = %self.table,
            key = %key,
            rows_affected = result.rows_affected(),
            "Deleted document record"
        );
        Ok(result.rows_affected())
    }
}
