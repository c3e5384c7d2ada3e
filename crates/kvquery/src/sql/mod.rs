//! Module: sql
//! Responsibility: render validated snapshots into statement text plus positional binds.
//! Does not own: statement execution, connection state, or continuation bookkeeping.
//! Boundary: every entry point runs the structural check first, then emits fragments.

mod body;
mod field;
mod fragment;


use crate::{
    MAX_KEY_SIZE,
    error::QueryError,
    query::{QuerySnapshot, SortMode, check::check},
    schema::{FieldPath, SchemaInfo, TableDescriptor},
    value::{Category, Literal},
};
use body::{BodyOptions, BodyRenderer, KeywordPolicy};
use derive_more::Display;
use fragment::SqlBuffer;
use serde::Deserialize;
use std::fmt::Write as _;
use tracing::{debug, warn};

///
/// CONSTANTS
///

const FILTER_NATIVE_DATA: &str = "WHERE (flag&0x01=0) ";
const FILTER_REMOTE_QUERY: &str = "WHERE (flag&0x03=0x02)";
const FILTER_RELATIONAL_REMOTE: &str = "WHERE (b.flag&0x03=0x02)";
const FILTER_RELATIONAL_MISS: &str = "WHERE (b.flag&0x23=0x22)";

const TIMESTAMP_ALIAS: &str = "naturalbase_rdb_timestamp";
const RELATIONAL_LOG_PREFIX: &str = "naturalbase_rdb_aux_";

const DEFAULT_KEY_ORDER: &str = "ORDER BY key ASC";

///
/// CompileLimits
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CompileLimits {
    /// Maximum number of values in one `In`/`NotIn` list.
    pub max_in_values: usize,
    /// Maximum size of a single bound value, in bytes.
    pub max_bind_bytes: usize,
    /// Maximum length of the rendered statement text, in bytes.
    pub max_sql_len: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_in_values: 256,
            max_bind_bytes: 50_000,
            max_sql_len: 1024 * 1024,
        }
    }
}

///
/// Bind
///
/// One positional parameter, in placeholder order.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Bind {
    Literal(Literal),
    Blob(Vec<u8>),
    Timestamp(u64),
}

impl Bind {
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        match self {
            Self::Literal(value) => value.bind_len(),
            Self::Blob(bytes) => bytes.len(),
            Self::Timestamp(_) => 0,
        }
    }
}

impl From<Literal> for Bind {
    fn from(value: Literal) -> Self {
        Self::Literal(value)
    }
}

///
/// Statement
///

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

///
/// RowProjection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RowProjection {
    #[default]
    KeyValue,
    RowId,
}

impl RowProjection {
    const fn select(self) -> &'static str {
        match self {
            Self::KeyValue => "SELECT key, value FROM ",
            Self::RowId => "SELECT rowid FROM ",
        }
    }
}

///
/// SyncWindow
///
/// Half-open write-time window `[begin, end)` supplied by the sync engine.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncWindow {
    pub begin: u64,
    pub end: u64,
}

impl SyncWindow {
    #[must_use]
    pub const fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }
}

///
/// TriggerMode
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TriggerMode {
    Insert,
    Update,
    Delete,
}

///
/// Compiler
///
/// Stateless renderer bound to one schema and one table.
///

#[derive(Clone, Copy)]
pub struct Compiler<'a> {
    schema: &'a dyn SchemaInfo,
    table: &'a TableDescriptor,
    limits: CompileLimits,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(schema: &'a dyn SchemaInfo, table: &'a TableDescriptor) -> Self {
        Self {
            schema,
            table,
            limits: CompileLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: CompileLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn limits(&self) -> &CompileLimits {
        &self.limits
    }

    // ------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------

    /// Local rows matching the predicate.
    pub fn row_scan(
        &self,
        snapshot: &QuerySnapshot,
        projection: RowProjection,
    ) -> Result<Statement, QueryError> {
        self.compile("row_scan", snapshot, |out| {
            self.require_document("row scans")?;
            out.push(projection.select())?;
            self.push_table_source(out, snapshot)?;
            out.push(FILTER_NATIVE_DATA)?;
            self.push_key_clauses(out, snapshot)?;

            let mut opts = BodyOptions::prepared(true);
            opts.write_time_order = snapshot.sort_mode().clause();
            self.body().render(out, snapshot, opts)?;
            self.push_default_key_order(out, snapshot)?;
            out.push(";")
        })
    }

    /// Number of local rows matching the predicate. Ordering and paging are ignored.
    pub fn count(&self, snapshot: &QuerySnapshot) -> Result<Statement, QueryError> {
        self.compile("count", snapshot, |out| {
            self.require_document("counts")?;
            out.push("SELECT count(*) FROM ")?;
            self.push_table_source(out, snapshot)?;
            out.push(FILTER_NATIVE_DATA)?;
            self.push_key_clauses(out, snapshot)?;

            let mut opts = BodyOptions::prepared(true);
            opts.keywords = KeywordPolicy::Skip;
            self.body().render(out, snapshot, opts)?;
            self.push_default_key_order(out, snapshot)?;
            out.push(";")
        })
    }

    /// Rows written by remote peers inside `window`, ordered by write time.
    ///
    /// A `Limit` (or any ordering on relational tables) pages inside a
    /// subquery so the outer statement can still order by time.
    pub fn sync_scan(
        &self,
        snapshot: &QuerySnapshot,
        window: SyncWindow,
    ) -> Result<Statement, QueryError> {
        self.compile("sync_scan", snapshot, |out| {
            if self.table.is_relational() {
                self.relational_sync(out, snapshot, window)
            } else {
                self.document_sync(out, snapshot, window)
            }
        })
    }

    /// Probe whether the row with `hash_key` still matches the predicate.
    pub fn sync_data_check(
        &self,
        snapshot: &QuerySnapshot,
        hash_key: &[u8],
    ) -> Result<Statement, QueryError> {
        self.compile("sync_data_check", snapshot, |out| {
            self.require_document("sync data checks")?;
            out.push(format!("SELECT * FROM {} WHERE hash_key=", self.table.name))?;
            out.bind(Bind::Blob(hash_key.to_vec()))?;
            out.push(" AND (flag&0x01=0) ")?;
            self.push_key_clauses(out, snapshot)?;

            self.body().render(out, snapshot, BodyOptions::prepared(true))?;
            self.push_default_key_order(out, snapshot)?;
            out.push(";")
        })
    }

    /// Relational log rows inside `window` that were filtered out of a previous sync.
    pub fn relational_miss_query(
        &self,
        snapshot: &QuerySnapshot,
        window: SyncWindow,
    ) -> Result<Statement, QueryError> {
        self.compile("relational_miss_query", snapshot, |out| {
            if !self.table.is_relational() {
                return Err(QueryError::invalid_format(
                    "miss queries require a relational table",
                ));
            }
            out.push(self.relational_select())?;
            out.push(FILTER_RELATIONAL_MISS)?;
            push_time_clause(out, TIMESTAMP_ALIAS, window)?;
            out.push(format!("ORDER BY {TIMESTAMP_ALIAS} ASC;"))
        })
    }

    /// Boolean condition for a trigger of the given kind, with inline literals.
    pub fn subscribe_condition(
        &self,
        snapshot: &QuerySnapshot,
        mode: TriggerMode,
    ) -> Result<String, QueryError> {
        let statement = self.compile("subscribe_condition", snapshot, |out| {
            self.require_document("subscriptions")?;
            if snapshot
                .nodes()
                .iter()
                .any(|n| n.category() == Category::Keyword)
            {
                return Err(QueryError::invalid_format(
                    "subscriptions cannot order or limit",
                ));
            }

            match mode {
                TriggerMode::Insert => self.push_condition(out, snapshot, "NEW."),
                TriggerMode::Delete => self.push_condition(out, snapshot, "OLD."),
                TriggerMode::Update => {
                    self.push_condition(out, snapshot, "OLD.")?;
                    out.push(" OR ")?;
                    self.push_condition(out, snapshot, "NEW.")
                }
            }
        })?;

        Ok(statement.sql)
    }

    // ------------------------------------------------------------------
    // Shape internals
    // ------------------------------------------------------------------

    fn compile(
        &self,
        shape: &'static str,
        snapshot: &QuerySnapshot,
        render: impl FnOnce(&mut SqlBuffer) -> Result<(), QueryError>,
    ) -> Result<Statement, QueryError> {
        let result = check(snapshot, self.schema, self.table).and_then(|()| {
            let mut out = SqlBuffer::new(self.limits);
            render(&mut out)?;
            Ok(out.finish())
        });

        match &result {
            Ok(statement) => debug!(
                shape,
                table = %self.table.name,
                sql_len = statement.sql.len(),
                binds = statement.binds.len(),
                "compiled query"
            ),
            Err(err) => warn!(shape, table = %self.table.name, error = %err, "query rejected"),
        }

        result
    }

    const fn body(&self) -> BodyRenderer<'a> {
        BodyRenderer {
            schema: self.schema,
            table: self.table,
        }
    }

    fn require_document(&self, what: &'static str) -> Result<(), QueryError> {
        if self.table.is_relational() {
            warn!(table = %self.table.name, what, "shape is not supported on relational tables");
            return Err(QueryError::invalid_format(
                "shape is not supported on relational tables",
            ));
        }
        Ok(())
    }

    fn document_sync(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
        window: SyncWindow,
    ) -> Result<(), QueryError> {
        let wrap = snapshot.has_limit();

        let mut inner = SqlBuffer::new(self.limits);
        inner.push("SELECT * FROM ")?;
        self.push_table_source(&mut inner, snapshot)?;
        inner.push(FILTER_REMOTE_QUERY)?;
        self.push_key_clauses(&mut inner, snapshot)?;
        if !wrap {
            push_time_clause(&mut inner, "timestamp", window)?;
        }
        self.body()
            .render(&mut inner, snapshot, BodyOptions::prepared(true))?;
        if !snapshot.has_order_by() && !snapshot.has_limit() {
            inner.push("ORDER BY timestamp ASC")?;
        }

        if wrap {
            out.push("SELECT * FROM ( ")?;
            out.append(inner)?;
            out.push(" ) WHERE (timestamp >= ")?;
            out.bind(Bind::Timestamp(window.begin))?;
            out.push(" AND timestamp < ")?;
            out.bind(Bind::Timestamp(window.end))?;
            out.push(") ORDER BY timestamp;")
        } else {
            out.append(inner)?;
            out.push(";")
        }
    }

    fn relational_sync(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
        window: SyncWindow,
    ) -> Result<(), QueryError> {
        let wrap = snapshot.has_limit() || snapshot.has_order_by();

        let mut inner = SqlBuffer::new(self.limits);
        inner.push(self.relational_select())?;
        if let Some(index) = self.index_clause(snapshot) {
            inner.push(index)?;
        }
        inner.push(FILTER_RELATIONAL_REMOTE)?;
        if !wrap {
            push_time_clause(&mut inner, TIMESTAMP_ALIAS, window)?;
        }
        self.body()
            .render(&mut inner, snapshot, BodyOptions::prepared(true))?;
        if !wrap {
            inner.push(format!("ORDER BY {TIMESTAMP_ALIAS} ASC"))?;
        }

        if wrap {
            out.push("SELECT * FROM ( ")?;
            out.append(inner)?;
            out.push(" ) WHERE (")?;
            out.push(format!("{TIMESTAMP_ALIAS}>="))?;
            out.bind(Bind::Timestamp(window.begin))?;
            out.push(format!(" AND {TIMESTAMP_ALIAS}<"))?;
            out.bind(Bind::Timestamp(window.end))?;
            out.push(format!(") ORDER BY {TIMESTAMP_ALIAS};"))
        } else {
            out.append(inner)?;
            out.push(";")
        }
    }

    fn relational_select(&self) -> String {
        let name = &self.table.name;
        let columns = if self.table.fields.is_empty() {
            "a.*".to_string()
        } else {
            self.table
                .fields
                .iter()
                .map(|f| format!("a.{f}"))
                .collect::<Vec<_>>()
                .join(",")
        };

        format!(
            "SELECT b.data_key,b.device,b.ori_device,b.timestamp as {TIMESTAMP_ALIAS},\
             b.wtimestamp,b.flag,b.hash_key,{columns} \
             FROM {name} AS a INNER JOIN {RELATIONAL_LOG_PREFIX}{name}_log AS b \
             ON a.rowid=b.data_key "
        )
    }

    fn push_condition(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
        access: &'static str,
    ) -> Result<(), QueryError> {
        let has_values = snapshot.has_value_nodes();
        let prefix = snapshot.prefix_key();
        let keys = snapshot.keys();

        if !has_values && prefix.is_none() && keys.is_empty() {
            return out.push(" (1 = 1) ");
        }

        if has_values {
            out.push(format!(
                "((length({access}value) != 0 AND {access}value IS NOT NULL) AND "
            ))?;
        } else {
            out.push("(")?;
        }

        if let Some(prefix) = prefix {
            out.push(format!("(hex({access}key) LIKE '{}%')", to_hex(prefix)))?;
        }
        if !keys.is_empty() {
            if prefix.is_some() {
                out.push(" AND ")?;
            }
            let list = keys
                .iter()
                .map(|k| format!("'{}' ", to_hex(k)))
                .collect::<Vec<_>>()
                .join(", ");
            out.push(format!("(hex({access}key) IN ({list}))"))?;
        }

        let linked = prefix.is_some() || !keys.is_empty();
        self.body()
            .render(out, snapshot, BodyOptions::inline(access, linked))?;
        out.push(")")
    }

    // ------------------------------------------------------------------
    // Clause helpers
    // ------------------------------------------------------------------

    fn push_table_source(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
    ) -> Result<(), QueryError> {
        out.push(format!("{} ", self.table.name))?;
        if let Some(index) = self.index_clause(snapshot) {
            out.push(index)?;
        }
        Ok(())
    }

    /// `INDEXED BY` clause for the suggested index, when the schema has it.
    fn index_clause(&self, snapshot: &QuerySnapshot) -> Option<String> {
        let raw = snapshot.suggest_index()?;
        let Ok(path) = FieldPath::parse(raw) else {
            warn!(index = raw, "suggested index is not a valid path, ignoring");
            return None;
        };

        let name = path.to_string();
        if !self.schema.index_exists(&name) {
            warn!(index = %name, "suggested index does not exist, ignoring");
            return None;
        }

        Some(format!("INDEXED BY '{name}' "))
    }

    fn push_key_clauses(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
    ) -> Result<(), QueryError> {
        if let Some(prefix) = snapshot.prefix_key() {
            out.push(" AND (key>=")?;
            out.bind(Bind::Blob(prefix.to_vec()))?;
            out.push(" AND key<=")?;
            out.bind(Bind::Blob(prefix_upper_bound(prefix)))?;
            out.push(") ")?;
        }

        let keys = snapshot.keys();
        if !keys.is_empty() {
            out.push(" AND key IN (")?;
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(", ")?;
                }
                out.bind(Bind::Blob(key.clone()))?;
            }
            out.push(") ")?;
        }

        Ok(())
    }

    fn push_default_key_order(
        &self,
        out: &mut SqlBuffer,
        snapshot: &QuerySnapshot,
    ) -> Result<(), QueryError> {
        if snapshot.has_prefix_key()
            && !snapshot.has_order_by()
            && !snapshot.has_limit()
            && snapshot.sort_mode() == SortMode::None
        {
            debug!(table = %self.table.name, "prefix scan without ordering, ordering by key");
            out.push(DEFAULT_KEY_ORDER)?;
        }
        Ok(())
    }
}

fn push_time_clause(out: &mut SqlBuffer, column: &str, window: SyncWindow) -> Result<(), QueryError> {
    out.push(format!(" AND ({column}>="))?;
    out.bind(Bind::Timestamp(window.begin))?;
    out.push(format!(" AND {column}<"))?;
    out.bind(Bind::Timestamp(window.end))?;
    out.push(") ")
}

/// Largest key sharing `prefix`: the prefix padded with `0xFF` to the key size limit.
#[must_use]
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut upper = prefix.to_vec();
    if upper.len() < MAX_KEY_SIZE {
        upper.resize(MAX_KEY_SIZE, 0xFF);
    }
    upper
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}
