#![allow(dead_code)]

use kvquery::{
    prelude::*,
    schema::{LeafType, MapSchema},
};
use proptest::prelude::*;
use rusqlite::{
    Connection, params, params_from_iter,
    functions::{Context, FunctionFlags},
    types::{Value, ValueRef},
};
use serde_json::{Value as Json, json};

pub const TABLE: &str = "sync_data";
pub const NAMES: [&str; 5] = ["ann", "bob", "cat", "dan", "eve"];

///
/// Row
///
/// Fixture row mirrored in memory so tests can evaluate predicates directly.
///

#[derive(Clone, Debug)]
pub struct Row {
    pub key: Vec<u8>,
    pub age: i32,
    pub name: String,
    pub weight: f64,
    pub active: bool,
    pub timestamp: i64,
    pub flag: i64,
}

impl Row {
    pub fn is_local(&self) -> bool {
        self.flag & 0x01 == 0
    }

    pub fn is_remote(&self) -> bool {
        self.flag & 0x03 == 0x02
    }

    fn document(&self) -> Vec<u8> {
        json!({
            "age": self.age,
            "name": self.name,
            "weight": self.weight,
            "active": self.active,
        })
        .to_string()
        .into_bytes()
    }
}

pub fn schema() -> MapSchema {
    MapSchema::new()
        .with_field("age", LeafType::Integer)
        .with_field("name", LeafType::String)
        .with_field("weight", LeafType::Double)
        .with_field("active", LeafType::Bool)
}

pub fn table() -> TableDescriptor {
    TableDescriptor::document(TABLE)
}

pub fn fixture() -> Vec<Row> {
    (0..40u8)
        .map(|i| Row {
            key: format!("{}{i:02}", if i % 2 == 0 { "u" } else { "v" }).into_bytes(),
            age: i32::from(i % 7) * 10,
            name: NAMES[usize::from(i) % NAMES.len()].to_string(),
            weight: f64::from(i) * 1.25,
            active: i % 3 == 0,
            timestamp: 100 + i64::from(i),
            flag: match i % 5 {
                0 => 0x01,
                1 | 2 => 0x02,
                _ => 0x00,
            },
        })
        .collect()
}

// ----------------------------------------------------------------------
// Store
// ----------------------------------------------------------------------

/// Open an in-memory store with the extraction function and fixture rows.
pub fn open(rows: &[Row]) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.create_scalar_function(
        "json_extract_by_path",
        3,
        FunctionFlags::SQLITE_UTF8
            | FunctionFlags::SQLITE_DETERMINISTIC
            | FunctionFlags::SQLITE_INNOCUOUS,
        extract_by_path,
    )
    .unwrap();
    conn.execute_batch(
        "CREATE TABLE sync_data(
            key BLOB NOT NULL PRIMARY KEY,
            value BLOB,
            timestamp INT NOT NULL,
            flag INT NOT NULL,
            hash_key BLOB NOT NULL
        );",
    )
    .unwrap();

    for row in rows {
        insert(&conn, row);
    }
    conn
}

pub fn insert(conn: &Connection, row: &Row) {
    conn.execute(
        "INSERT INTO sync_data(key, value, timestamp, flag, hash_key) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![row.key, row.document(), row.timestamp, row.flag, hash_key(&row.key)],
    )
    .unwrap();
}

pub fn hash_key(key: &[u8]) -> Vec<u8> {
    let mut hash = b"h:".to_vec();
    hash.extend_from_slice(key);
    hash
}

fn extract_by_path(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let bytes = match ctx.get_raw(0) {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes,
        _ => return Ok(Value::Null),
    };
    let path: String = ctx.get(1)?;
    let skip = usize::try_from(ctx.get::<i64>(2)?).unwrap_or(0);

    let Some(doc) = bytes.get(skip..) else {
        return Ok(Value::Null);
    };
    let Ok(doc) = serde_json::from_slice::<Json>(doc) else {
        return Ok(Value::Null);
    };

    let mut cursor = &doc;
    for segment in path.trim_start_matches("$.").split('.') {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None => return Ok(Value::Null),
        }
    }

    Ok(match cursor {
        Json::Bool(b) => Value::Integer(i64::from(*b)),
        Json::Number(n) => n
            .as_i64()
            .map_or_else(|| Value::Real(n.as_f64().unwrap_or_default()), Value::Integer),
        Json::String(s) => Value::Text(s.clone()),
        _ => Value::Null,
    })
}

// ----------------------------------------------------------------------
// Execution
// ----------------------------------------------------------------------

pub fn to_value(bind: &Bind) -> Value {
    match bind {
        Bind::Literal(Literal::Null) => Value::Null,
        Bind::Literal(Literal::Bool(b)) => Value::Integer(i64::from(*b)),
        Bind::Literal(Literal::Int32(v)) => Value::Integer(i64::from(*v)),
        Bind::Literal(Literal::Int64(v)) => Value::Integer(*v),
        Bind::Literal(Literal::Double(v)) => Value::Real(*v),
        Bind::Literal(Literal::String(s)) => Value::Text(s.clone()),
        Bind::Blob(bytes) => Value::Blob(bytes.clone()),
        Bind::Timestamp(t) => Value::Integer(i64::try_from(*t).unwrap_or(i64::MAX)),
    }
}

/// Run `stmt` and collect the key and timestamp columns of every row.
pub fn fetch(conn: &Connection, stmt: &Statement) -> Vec<(Vec<u8>, i64)> {
    let values: Vec<Value> = stmt.binds.iter().map(to_value).collect();
    let mut prepared = conn.prepare(&stmt.sql).unwrap();
    let has_timestamp = prepared.column_names().contains(&"timestamp");

    prepared
        .query_map(params_from_iter(values.iter()), |row| {
            let timestamp = if has_timestamp {
                row.get::<_, i64>("timestamp")?
            } else {
                0
            };
            Ok((row.get::<_, Vec<u8>>("key")?, timestamp))
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

pub fn fetch_keys(conn: &Connection, stmt: &Statement) -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = fetch(conn, stmt).into_iter().map(|(k, _)| k).collect();
    keys.sort();
    keys
}

pub fn fetch_count(conn: &Connection, stmt: &Statement) -> usize {
    let values: Vec<Value> = stmt.binds.iter().map(to_value).collect();
    let count: i64 = conn
        .query_row(&stmt.sql, params_from_iter(values.iter()), |row| row.get(0))
        .unwrap();
    usize::try_from(count).unwrap()
}

// ----------------------------------------------------------------------
// Predicate model
// ----------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub enum Cmp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Cmp {
    fn holds<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
        }
    }
}

///
/// Expr
///
/// Predicate tree over the fixture fields. Every leaf field is always
/// present, so two-valued evaluation matches SQL.
///

#[derive(Clone, Debug)]
pub enum Expr {
    Age(Cmp, i32),
    Weight(Cmp, f64),
    Name(Cmp, String),
    Active(bool, bool),
    Like(bool, String),
    IsNull(bool),
    AgeIn(bool, Vec<i32>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Self::Age(cmp, v) => cmp.holds(&row.age, v),
            Self::Weight(cmp, v) => cmp.holds(&row.weight, v),
            Self::Name(cmp, v) => cmp.holds(&row.name.as_str(), &v.as_str()),
            Self::Active(eq, v) => (row.active == *v) == *eq,
            Self::Like(negated, pattern) => like(pattern, &row.name) != *negated,
            Self::IsNull(negated) => *negated,
            Self::AgeIn(negated, values) => values.contains(&row.age) != *negated,
            Self::And(a, b) => a.eval(row) && b.eval(row),
            Self::Or(a, b) => a.eval(row) || b.eval(row),
        }
    }

    /// Append this tree to `query`. Compound operands are grouped so SQL
    /// precedence follows the tree.
    pub fn emit(&self, query: &mut Query) {
        match self {
            Self::Age(cmp, v) => compare(query, *cmp, "age", Literal::Int32(*v)),
            Self::Weight(cmp, v) => compare(query, *cmp, "weight", Literal::Double(*v)),
            Self::Name(cmp, v) => compare(query, *cmp, "name", Literal::String(v.clone())),
            Self::Active(true, v) => {
                query.equal_to("active", *v);
            }
            Self::Active(false, v) => {
                query.not_equal_to("active", *v);
            }
            Self::Like(false, pattern) => {
                query.like("name", pattern);
            }
            Self::Like(true, pattern) => {
                query.not_like("name", pattern);
            }
            Self::IsNull(false) => {
                query.is_null("age");
            }
            Self::IsNull(true) => {
                query.is_not_null("age");
            }
            Self::AgeIn(false, values) => {
                query.in_list("age", values.iter().copied());
            }
            Self::AgeIn(true, values) => {
                query.not_in_list("age", values.iter().copied());
            }
            Self::And(a, b) => {
                a.emit_operand(query);
                query.and();
                b.emit_operand(query);
            }
            Self::Or(a, b) => {
                a.emit_operand(query);
                query.or();
                b.emit_operand(query);
            }
        }
    }

    fn emit_operand(&self, query: &mut Query) {
        if matches!(self, Self::And(..) | Self::Or(..)) {
            query.begin_group();
            self.emit(query);
            query.end_group();
        } else {
            self.emit(query);
        }
    }
}

fn compare(query: &mut Query, cmp: Cmp, field: &str, value: Literal) {
    match cmp {
        Cmp::Eq => query.equal_to(field, value),
        Cmp::Ne => query.not_equal_to(field, value),
        Cmp::Gt => query.greater_than(field, value),
        Cmp::Lt => query.less_than(field, value),
        Cmp::Ge => query.greater_than_or_equal_to(field, value),
        Cmp::Le => query.less_than_or_equal_to(field, value),
    };
}

/// `LIKE` without an escape character, ASCII case-insensitive.
pub fn like(pattern: &str, text: &str) -> bool {
    fn go(p: &[u8], t: &[u8]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some((b'%', rest)) => (0..=t.len()).any(|i| go(rest, &t[i..])),
            Some((b'_', rest)) => !t.is_empty() && go(rest, &t[1..]),
            Some((c, rest)) => t
                .split_first()
                .is_some_and(|(h, tail)| h.eq_ignore_ascii_case(c) && go(rest, tail)),
        }
    }
    go(pattern.as_bytes(), text.as_bytes())
}

// ----------------------------------------------------------------------
// Strategies
// ----------------------------------------------------------------------

fn arb_cmp() -> impl Strategy<Value = Cmp> {
    prop_oneof![
        Just(Cmp::Eq),
        Just(Cmp::Ne),
        Just(Cmp::Gt),
        Just(Cmp::Lt),
        Just(Cmp::Ge),
        Just(Cmp::Le),
    ]
}

fn arb_name() -> impl Strategy<Value = String> {
    prop_oneof![prop::sample::select(NAMES.to_vec()).prop_map(str::to_string), "[a-f]{0,3}"]
}

pub fn arb_leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (arb_cmp(), 0..70i32).prop_map(|(c, v)| Expr::Age(c, v)),
        (arb_cmp(), -5.0..60.0f64).prop_map(|(c, v)| Expr::Weight(c, v)),
        (arb_cmp(), arb_name()).prop_map(|(c, v)| Expr::Name(c, v)),
        (any::<bool>(), any::<bool>()).prop_map(|(eq, v)| Expr::Active(eq, v)),
        (any::<bool>(), "[a-e%_]{0,3}").prop_map(|(n, p)| Expr::Like(n, p)),
        any::<bool>().prop_map(Expr::IsNull),
        (any::<bool>(), prop::collection::vec(0..7i32, 0..4))
            .prop_map(|(n, vs)| Expr::AgeIn(n, vs.into_iter().map(|v| v * 10).collect())),
    ]
}

pub fn arb_expr() -> impl Strategy<Value = Expr> {
    arb_leaf().prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::And(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Expr::Or(Box::new(a), Box::new(b))),
        ]
    })
}

///
/// KeyFilter
///

#[derive(Clone, Debug)]
pub enum KeyFilter {
    None,
    Prefix(Vec<u8>),
    Keys(Vec<Vec<u8>>),
}

impl KeyFilter {
    pub fn admits(&self, key: &[u8]) -> bool {
        match self {
            Self::None => true,
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }

    pub fn apply(&self, query: &mut Query) {
        match self {
            Self::None => {}
            Self::Prefix(prefix) => {
                query.prefix_key(prefix.clone());
            }
            Self::Keys(keys) => {
                query.in_keys(keys.clone());
            }
        }
    }
}

pub fn arb_key_filter() -> impl Strategy<Value = KeyFilter> {
    let key = (prop::sample::select(vec!["u", "v", "w"]), 0..40u8)
        .prop_map(|(p, i)| format!("{p}{i:02}").into_bytes());
    prop_oneof![
        Just(KeyFilter::None),
        prop::sample::select(vec!["", "u", "v", "u1", "v3", "x"])
            .prop_map(|p| KeyFilter::Prefix(p.as_bytes().to_vec())),
        prop::collection::vec(key, 1..6).prop_map(KeyFilter::Keys),
    ]
}

/// Build a query from an optional expression and key filter.
pub fn build(expr: Option<&Expr>, keys: &KeyFilter) -> Query {
    let mut query = Query::new();
    keys.apply(&mut query);
    if let Some(expr) = expr {
        expr.emit(&mut query);
    }
    query
}

/// Keys of `rows` admitted by `visible`, the expression and the key filter.
pub fn expected_keys(
    rows: &[Row],
    expr: Option<&Expr>,
    keys: &KeyFilter,
    visible: impl Fn(&Row) -> bool,
) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = rows
        .iter()
        .filter(|r| visible(r) && keys.admits(&r.key) && expr.is_none_or(|e| e.eval(r)))
        .map(|r| r.key.clone())
        .collect();
    out.sort();
    out
}
