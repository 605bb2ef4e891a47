use crate::cql_persistence::Table;
use std::cmp::Ordering;
use std::fmt;

/// A single cell value, covering the CQL types our tables use.
#[derive(Debug, Clone)]
pub enum ColumnValue {
    Int(i32),
    Double(f64),
    Text(String),
}

impl ColumnValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(value) => Some(value),
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            ColumnValue::Int(_) => 0,
            ColumnValue::Double(_) => 1,
            ColumnValue::Text(_) => 2,
        }
    }
}

// Doubles compare by total order so values can be used as map keys.
impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ColumnValue {}

impl PartialOrd for ColumnValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ColumnValue::Int(a), ColumnValue::Int(b)) => a.cmp(b),
            (ColumnValue::Double(a), ColumnValue::Double(b)) => a.total_cmp(b),
            (ColumnValue::Text(a), ColumnValue::Text(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int(value) => write!(f, "{}", value),
            ColumnValue::Double(value) => write!(f, "{}", value),
            ColumnValue::Text(value) => write!(f, "{}", value),
        }
    }
}

pub type Row = Vec<ColumnValue>;

/// One row destined for one table, with values in the table's column order.
#[derive(Debug, Clone)]
pub struct Insert {
    pub table: &'static Table,
    pub values: Row,
}

/// An unordered set of inserts submitted to the store together.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    inserts: Vec<Insert>,
}

impl WriteBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inserts: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, insert: Insert) {
        self.inserts.push(insert);
    }

    pub fn len(&self) -> usize {
        self.inserts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Insert> {
        self.inserts.iter()
    }
}

/// An equality lookup against a single table.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub table: &'static Table,
    pub columns: Vec<&'static str>,
    pub filters: Vec<(&'static str, ColumnValue)>,
    pub order_by: Option<&'static str>,
}

impl SelectQuery {
    pub fn new(table: &'static Table, columns: &[&'static str]) -> Self {
        Self {
            table,
            columns: columns.to_vec(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, column: &'static str, value: ColumnValue) -> Self {
        self.filters.push((column, value));
        self
    }

    pub fn order_by(mut self, column: &'static str) -> Self {
        self.order_by = Some(column);
        self
    }

    pub fn to_cql(&self, keyspace: &str) -> String {
        let mut cql = format!(
            "SELECT {} FROM {}",
            self.columns.join(", "),
            self.table.qualified_name(keyspace)
        );
        for (index, (column, _)) in self.filters.iter().enumerate() {
            cql.push_str(if index == 0 { " WHERE " } else { " AND " });
            cql.push_str(&format!("{} = ?", column));
        }
        if let Some(column) = self.order_by {
            cql.push_str(&format!(" ORDER BY {} ASC", column));
        }
        cql
    }
}
