mod table;

pub use table::{Column, CqlType, KeyKind, Keyspace, Table};
