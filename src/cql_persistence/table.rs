#[macro_export]
macro_rules! cql_column {
    ($name:expr, $cql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Allow unused_mut because the variable is only mutated when optional
            // field assignments are passed to the macro (e.g., `key = KeyKind::Partition`)
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                cql_type: $cql_type,
                key: KeyKind::Regular,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqlType {
    Int,
    Double,
    Text,
}

impl CqlType {
    pub fn as_cql(&self) -> &'static str {
        match self {
            CqlType::Int => "int",
            CqlType::Double => "double",
            CqlType::Text => "text",
        }
    }
}

/// The role a column plays in the table's primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Regular,
    Partition,
    Clustering,
}

#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub cql_type: CqlType,
    pub key: KeyKind,
}

/// A wide-column table definition.
///
/// Partition and clustering key columns are taken in declaration order, so
/// `(user_id, session_id)` as a composite partition key is expressed by
/// declaring `user_id` before `session_id`.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn partition_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.key == KeyKind::Partition)
    }

    pub fn clustering_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.key == KeyKind::Clustering)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Indices of the primary key columns, partition key first.
    pub fn primary_key_indices(&self) -> Vec<usize> {
        let partition = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key == KeyKind::Partition);
        let clustering = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key == KeyKind::Clustering);
        partition.chain(clustering).map(|(i, _)| i).collect()
    }

    pub fn qualified_name(&self, keyspace: &str) -> String {
        format!("{}.{}", keyspace, self.name)
    }

    pub fn create_statement(&self, keyspace: &str) -> String {
        let mut create_cql = format!(
            "CREATE TABLE IF NOT EXISTS {} (",
            self.qualified_name(keyspace)
        );
        for (column_index, column) in self.columns.iter().enumerate() {
            if column_index > 0 {
                create_cql.push_str(", ");
            }
            create_cql.push_str(&format!("{} {}", column.name, column.cql_type.as_cql()));
        }

        let partition: Vec<&str> = self.partition_key().map(|c| c.name).collect();
        create_cql.push_str(&format!(", PRIMARY KEY (({})", partition.join(", ")));
        for column in self.clustering_key() {
            create_cql.push_str(&format!(", {}", column.name));
        }
        create_cql.push_str("))");
        create_cql
    }

    pub fn insert_statement(&self, keyspace: &str) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let markers = vec!["?"; names.len()];
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(keyspace),
            names.join(", "),
            markers.join(", ")
        )
    }

    /// Plain `DROP TABLE`, so dropping a table that was never created is
    /// reported by the store instead of silently succeeding.
    pub fn drop_statement(&self, keyspace: &str) -> String {
        format!("DROP TABLE {}", self.qualified_name(keyspace))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    pub name: String,
    pub replication_factor: u32,
}

impl Keyspace {
    pub fn new(name: impl Into<String>, replication_factor: u32) -> Self {
        Self {
            name: name.into(),
            replication_factor,
        }
    }

    pub fn create_statement(&self) -> String {
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = {{ 'class' : 'SimpleStrategy', 'replication_factor' : {} }}",
            self.name, self.replication_factor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYS: Table = Table {
        name: "plays",
        columns: &[
            cql_column!("title", CqlType::Text),
            cql_column!("user_id", CqlType::Int, key = KeyKind::Partition),
            cql_column!("session_id", CqlType::Int, key = KeyKind::Partition),
            cql_column!("position", CqlType::Int, key = KeyKind::Clustering),
            cql_column!("length", CqlType::Double),
        ],
    };

    const BY_TITLE: Table = Table {
        name: "by_title",
        columns: &[
            cql_column!("title", CqlType::Text, key = KeyKind::Partition),
            cql_column!("listener", CqlType::Text),
        ],
    };

    #[test]
    fn creates_composite_partition_key() {
        assert_eq!(
            PLAYS.create_statement("ks"),
            "CREATE TABLE IF NOT EXISTS ks.plays (title text, user_id int, session_id int, position int, length double, PRIMARY KEY ((user_id, session_id), position))"
        );
    }

    #[test]
    fn creates_table_without_clustering_key() {
        assert_eq!(
            BY_TITLE.create_statement("ks"),
            "CREATE TABLE IF NOT EXISTS ks.by_title (title text, listener text, PRIMARY KEY ((title)))"
        );
    }

    #[test]
    fn insert_binds_every_column() {
        assert_eq!(
            PLAYS.insert_statement("ks"),
            "INSERT INTO ks.plays (title, user_id, session_id, position, length) VALUES (?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn primary_key_puts_partition_first() {
        assert_eq!(PLAYS.primary_key_indices(), vec![1, 2, 3]);
        assert_eq!(BY_TITLE.primary_key_indices(), vec![0]);
    }

    #[test]
    fn drop_does_not_use_if_exists() {
        assert_eq!(PLAYS.drop_statement("ks"), "DROP TABLE ks.plays");
    }

    #[test]
    fn keyspace_uses_simple_strategy() {
        let keyspace = Keyspace::new("sparkify", 3);
        assert_eq!(
            keyspace.create_statement(),
            "CREATE KEYSPACE IF NOT EXISTS sparkify WITH REPLICATION = { 'class' : 'SimpleStrategy', 'replication_factor' : 3 }"
        );
    }
}
