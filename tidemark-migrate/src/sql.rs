//! SQL-backed schema editor.
//!
//! [`SqlSchemaEditor`] renders DDL for one [`Dialect`] and hands each statement
//! to a [`SqlExecutor`], which owns the actual database connection.

use tidemark_schema::{Column, ColumnType, DefaultValue, Index, IndexType, Table};
use tracing::debug;

use crate::editor::SchemaEditor;
use crate::error::{MigrateResult, MigrationError};

/// Default name of the applied-migrations ledger table.
pub const DEFAULT_LEDGER_TABLE: &str = "_tidemark_migrations";

/// SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

/// Executes SQL on behalf of [`SqlSchemaEditor`].
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: &[&str]) -> MigrateResult<u64>;

    /// Run a query and report whether it returned any row.
    async fn query_exists(&self, sql: &str, params: &[&str]) -> MigrateResult<bool>;
}

impl Dialect {
    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Bind parameter placeholder, 1-based.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// SQL type of a column.
    pub fn column_type(&self, column: &Column) -> String {
        let length = column.max_length.unwrap_or(255);
        let decimal = |name: &str| match (column.precision, column.scale) {
            (Some(p), Some(s)) => format!("{name}({p}, {s})"),
            (Some(p), None) => format!("{name}({p})"),
            _ => name.to_string(),
        };

        match self {
            Self::Postgres => match column.db_type {
                ColumnType::SmallInt => "SMALLINT".to_string(),
                ColumnType::Int if column.auto_increment => "SERIAL".to_string(),
                ColumnType::Int => "INTEGER".to_string(),
                ColumnType::BigInt if column.auto_increment => "BIGSERIAL".to_string(),
                ColumnType::BigInt => "BIGINT".to_string(),
                ColumnType::Float => "REAL".to_string(),
                ColumnType::Double => "DOUBLE PRECISION".to_string(),
                ColumnType::Decimal => decimal("NUMERIC"),
                ColumnType::VarChar => format!("VARCHAR({length})"),
                ColumnType::Text => "TEXT".to_string(),
                ColumnType::Boolean => "BOOLEAN".to_string(),
                ColumnType::DateTime => "TIMESTAMP WITH TIME ZONE".to_string(),
                ColumnType::Date => "DATE".to_string(),
                ColumnType::Time => "TIME".to_string(),
                ColumnType::Json => "JSONB".to_string(),
                ColumnType::Bytes => "BYTEA".to_string(),
                ColumnType::Uuid => "UUID".to_string(),
            },
            Self::MySql => {
                let ty = match column.db_type {
                    ColumnType::SmallInt => "SMALLINT".to_string(),
                    ColumnType::Int => "INT".to_string(),
                    ColumnType::BigInt => "BIGINT".to_string(),
                    ColumnType::Float => "FLOAT".to_string(),
                    ColumnType::Double => "DOUBLE".to_string(),
                    ColumnType::Decimal => decimal("DECIMAL"),
                    ColumnType::VarChar => format!("VARCHAR({length})"),
                    ColumnType::Text => "TEXT".to_string(),
                    ColumnType::Boolean => "TINYINT(1)".to_string(),
                    ColumnType::DateTime => "DATETIME".to_string(),
                    ColumnType::Date => "DATE".to_string(),
                    ColumnType::Time => "TIME".to_string(),
                    ColumnType::Json => "JSON".to_string(),
                    ColumnType::Bytes => "BLOB".to_string(),
                    ColumnType::Uuid => "CHAR(36)".to_string(),
                };
                if column.auto_increment && column.db_type.is_integer() {
                    format!("{ty} AUTO_INCREMENT")
                } else {
                    ty
                }
            }
            // SQLite type affinities.
            Self::Sqlite => match column.db_type {
                ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt | ColumnType::Boolean => {
                    "INTEGER".to_string()
                }
                ColumnType::Float | ColumnType::Double => "REAL".to_string(),
                ColumnType::Decimal => "NUMERIC".to_string(),
                ColumnType::Bytes => "BLOB".to_string(),
                _ => "TEXT".to_string(),
            },
        }
    }

    /// Render a default value as a SQL literal.
    pub fn default_literal(&self, value: &DefaultValue) -> String {
        let quoted = |s: &str| format!("'{}'", s.replace('\'', "''"));
        match value {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Bool(b) => match self {
                Self::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
                Self::MySql | Self::Sqlite => if *b { "1" } else { "0" }.to_string(),
            },
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(f) => f.to_string(),
            DefaultValue::Text(s) => quoted(s),
            DefaultValue::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                match self {
                    Self::Postgres => format!("'\\x{hex}'"),
                    Self::MySql | Self::Sqlite => format!("X'{hex}'"),
                }
            }
            DefaultValue::Timestamp(ts) => quoted(&ts.to_rfc3339()),
            DefaultValue::Date(d) => quoted(&d.to_string()),
            DefaultValue::Json(v) => quoted(&v.to_string()),
            DefaultValue::Expression(expr) => expr.clone(),
        }
    }

    fn is_inline_sqlite_key(&self, table: &Table, column: &Column) -> bool {
        *self == Self::Sqlite
            && column.primary
            && column.auto_increment
            && column.db_type.is_integer()
            && table.primary_key().len() == 1
    }

    /// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    pub fn column_definition(&self, table: &Table, column: &Column) -> String {
        let mut parts = vec![self.quote(&column.column)];

        if self.is_inline_sqlite_key(table, column) {
            parts.push("INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
            return parts.join(" ");
        }

        parts.push(self.column_type(column));

        if !column.nullable && !column.primary {
            parts.push("NOT NULL".to_string());
        }

        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_literal(default)));
        }

        parts.join(" ")
    }

    fn foreign_key_clause(&self, column: &Column) -> Option<String> {
        let relation = column.relation.as_ref().filter(|r| r.is_materialized())?;
        let target_column = relation.target_column()?;

        let mut clause = format!(
            "REFERENCES {} ({})",
            self.quote(&relation.target_table),
            self.quote(target_column)
        );
        if let Some(action) = relation.on_delete {
            clause.push_str(&format!(" ON DELETE {}", action.as_str()));
        }
        if let Some(action) = relation.on_update {
            clause.push_str(&format!(" ON UPDATE {}", action.as_str()));
        }
        Some(clause)
    }

    fn foreign_key_name(&self, table: &Table, column: &Column) -> String {
        format!("fk_{}_{}", table.name, column.column)
    }

    fn index_columns(&self, table: &Table, index: &Index) -> String {
        index
            .fields
            .iter()
            .map(|field| {
                let column = table.get_column(field).map_or(field.as_str(), |c| c.column.as_str());
                self.quote(column)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE` statement.
    pub fn create_table(&self, table: &Table) -> String {
        let mut lines: Vec<String> = table
            .columns
            .values()
            .map(|c| self.column_definition(table, c))
            .collect();

        let pk: Vec<String> = table
            .primary_key()
            .into_iter()
            .filter(|c| !self.is_inline_sqlite_key(table, c))
            .map(|c| self.quote(&c.column))
            .collect();
        if !pk.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }

        for column in table.foreign_keys() {
            if let Some(clause) = self.foreign_key_clause(column) {
                lines.push(format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) {}",
                    self.quote(&self.foreign_key_name(table, column)),
                    self.quote(&column.column),
                    clause
                ));
            }
        }

        let suffix = match self {
            Self::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            Self::Postgres | Self::Sqlite => "",
        };
        format!(
            "CREATE TABLE {} (\n    {}\n){};",
            self.quote(&table.name),
            lines.join(",\n    "),
            suffix
        )
    }

    /// `DROP TABLE` statement.
    pub fn drop_table(&self, table: &Table) -> String {
        match self {
            Self::Postgres => format!("DROP TABLE IF EXISTS {} CASCADE;", self.quote(&table.name)),
            Self::MySql | Self::Sqlite => format!("DROP TABLE IF EXISTS {};", self.quote(&table.name)),
        }
    }

    /// Table rename statement.
    pub fn rename_table(&self, old: &Table, new: &Table) -> String {
        match self {
            Self::MySql => format!(
                "RENAME TABLE {} TO {};",
                self.quote(&old.name),
                self.quote(&new.name)
            ),
            Self::Postgres | Self::Sqlite => format!(
                "ALTER TABLE {} RENAME TO {};",
                self.quote(&old.name),
                self.quote(&new.name)
            ),
        }
    }

    /// Statements adding a column, including its foreign key.
    pub fn add_column(&self, table: &Table, column: &Column) -> Vec<String> {
        let t = self.quote(&table.name);
        let definition = self.column_definition(table, column);

        match (self, self.foreign_key_clause(column)) {
            (Self::Sqlite, Some(clause)) => {
                vec![format!("ALTER TABLE {t} ADD COLUMN {definition} {clause};")]
            }
            (_, Some(clause)) => vec![
                format!("ALTER TABLE {t} ADD COLUMN {definition};"),
                format!(
                    "ALTER TABLE {t} ADD CONSTRAINT {} FOREIGN KEY ({}) {clause};",
                    self.quote(&self.foreign_key_name(table, column)),
                    self.quote(&column.column)
                ),
            ],
            (_, None) => vec![format!("ALTER TABLE {t} ADD COLUMN {definition};")],
        }
    }

    /// Statements changing a column from `old` to `new`.
    pub fn alter_column(&self, table: &Table, old: &Column, new: &Column) -> MigrateResult<Vec<String>> {
        if *self == Self::Sqlite {
            return Err(MigrationError::editor(format!(
                "SQLite cannot alter column `{}.{}` in place; recreate the table",
                table.name, new.column
            )));
        }

        let t = self.quote(&table.name);
        let mut stmts = Vec::new();

        if old.column != new.column {
            stmts.push(format!(
                "ALTER TABLE {t} RENAME COLUMN {} TO {};",
                self.quote(&old.column),
                self.quote(&new.column)
            ));
        }
        let c = self.quote(&new.column);

        match self {
            Self::Postgres => {
                let (old_type, new_type) = (self.column_type(old), self.column_type(new));
                if old_type != new_type {
                    // SERIAL is not a real type; keep the sequence and change the storage type.
                    let storage = new_type.replace("BIGSERIAL", "BIGINT").replace("SERIAL", "INTEGER");
                    stmts.push(format!(
                        "ALTER TABLE {t} ALTER COLUMN {c} TYPE {storage} USING {c}::{storage};"
                    ));
                }
                if old.nullable != new.nullable {
                    let op = if new.nullable { "DROP" } else { "SET" };
                    stmts.push(format!("ALTER TABLE {t} ALTER COLUMN {c} {op} NOT NULL;"));
                }
                if old.default != new.default {
                    stmts.push(match &new.default {
                        Some(value) => format!(
                            "ALTER TABLE {t} ALTER COLUMN {c} SET DEFAULT {};",
                            self.default_literal(value)
                        ),
                        None => format!("ALTER TABLE {t} ALTER COLUMN {c} DROP DEFAULT;"),
                    });
                }
                if old.unique != new.unique {
                    let constraint = self.quote(&format!("{}_{}_key", table.name, new.column));
                    stmts.push(if new.unique {
                        format!("ALTER TABLE {t} ADD CONSTRAINT {constraint} UNIQUE ({c});")
                    } else {
                        format!("ALTER TABLE {t} DROP CONSTRAINT IF EXISTS {constraint};")
                    });
                }
            }
            Self::MySql => {
                let mut modified = new.clone();
                modified.unique = false;
                stmts.push(format!(
                    "ALTER TABLE {t} MODIFY COLUMN {};",
                    self.column_definition(table, &modified)
                ));
                if old.unique != new.unique {
                    stmts.push(if new.unique {
                        format!("ALTER TABLE {t} ADD UNIQUE ({c});")
                    } else {
                        format!("ALTER TABLE {t} DROP INDEX {c};")
                    });
                }
            }
            Self::Sqlite => {}
        }

        Ok(stmts)
    }

    /// Statement dropping a column.
    pub fn drop_column(&self, table: &Table, column: &Column) -> String {
        let exists = if *self == Self::Postgres { "IF EXISTS " } else { "" };
        format!(
            "ALTER TABLE {} DROP COLUMN {exists}{};",
            self.quote(&table.name),
            self.quote(&column.column)
        )
    }

    /// `CREATE INDEX` statement.
    pub fn create_index(&self, table: &Table, index: &Index) -> MigrateResult<String> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let name = self.quote(&index.name);
        let t = self.quote(&table.name);
        let cols = self.index_columns(table, index);
        let unsupported = || {
            MigrationError::editor(format!(
                "{:?} does not support {} index `{}`",
                self,
                index.index_type.as_sql(),
                index.name
            ))
        };

        match (self, index.index_type) {
            (Self::Postgres, IndexType::FullText) => Err(unsupported()),
            (Self::Postgres, IndexType::BTree) => {
                Ok(format!("CREATE {unique}INDEX {name} ON {t} ({cols});"))
            }
            (Self::Postgres, ty) => Ok(format!(
                "CREATE {unique}INDEX {name} ON {t} USING {} ({cols});",
                ty.as_sql()
            )),
            (Self::MySql, IndexType::FullText) => {
                Ok(format!("CREATE FULLTEXT INDEX {name} ON {t} ({cols});"))
            }
            (Self::MySql, IndexType::BTree | IndexType::Hash) => Ok(format!(
                "CREATE {unique}INDEX {name} ON {t} ({cols}) USING {};",
                index.index_type.as_sql()
            )),
            (Self::Sqlite, IndexType::BTree) => {
                Ok(format!("CREATE {unique}INDEX {name} ON {t} ({cols});"))
            }
            _ => Err(unsupported()),
        }
    }

    /// `DROP INDEX` statement.
    pub fn drop_index(&self, table: &Table, index: &Index) -> String {
        match self {
            Self::MySql => format!(
                "DROP INDEX {} ON {};",
                self.quote(&index.name),
                self.quote(&table.name)
            ),
            Self::Postgres | Self::Sqlite => {
                format!("DROP INDEX IF EXISTS {};", self.quote(&index.name))
            }
        }
    }

    /// Statements renaming an index.
    pub fn rename_index(&self, table: &Table, old: &Index, new: &Index) -> MigrateResult<Vec<String>> {
        match self {
            Self::Postgres => Ok(vec![format!(
                "ALTER INDEX {} RENAME TO {};",
                self.quote(&old.name),
                self.quote(&new.name)
            )]),
            Self::MySql => Ok(vec![format!(
                "ALTER TABLE {} RENAME INDEX {} TO {};",
                self.quote(&table.name),
                self.quote(&old.name),
                self.quote(&new.name)
            )]),
            Self::Sqlite => Ok(vec![
                self.drop_index(table, old),
                self.create_index(table, new)?,
            ]),
        }
    }

    /// `CREATE TABLE` statement for the applied-migrations ledger.
    pub fn create_ledger(&self, ledger: &str) -> String {
        let (id, timestamp) = match self {
            Self::Postgres => ("BIGSERIAL PRIMARY KEY", "TIMESTAMP WITH TIME ZONE"),
            Self::MySql => ("BIGINT AUTO_INCREMENT PRIMARY KEY", "DATETIME"),
            Self::Sqlite => ("INTEGER PRIMARY KEY AUTOINCREMENT", "TEXT"),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {} {id},\n    {} VARCHAR(255) NOT NULL,\n    {} VARCHAR(255) NOT NULL,\n    {} VARCHAR(255) NOT NULL,\n    {} {timestamp} NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    UNIQUE ({}, {}, {})\n);",
            self.quote(ledger),
            self.quote("id"),
            self.quote("app"),
            self.quote("model"),
            self.quote("name"),
            self.quote("applied_at"),
            self.quote("app"),
            self.quote("model"),
            self.quote("name"),
        )
    }

    fn ledger_filter(&self) -> String {
        format!(
            "{} = {} AND {} = {} AND {} = {}",
            self.quote("app"),
            self.placeholder(1),
            self.quote("model"),
            self.placeholder(2),
            self.quote("name"),
            self.placeholder(3)
        )
    }

    /// Query checking whether a migration is recorded.
    pub fn select_ledger(&self, ledger: &str) -> String {
        format!(
            "SELECT 1 FROM {} WHERE {};",
            self.quote(ledger),
            self.ledger_filter()
        )
    }

    /// Statement recording a migration.
    pub fn insert_ledger(&self, ledger: &str) -> String {
        format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {});",
            self.quote(ledger),
            self.quote("app"),
            self.quote("model"),
            self.quote("name"),
            self.placeholder(1),
            self.placeholder(2),
            self.placeholder(3)
        )
    }

    /// Statement removing a migration record.
    pub fn delete_ledger(&self, ledger: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {};",
            self.quote(ledger),
            self.ledger_filter()
        )
    }
}

/// A [`SchemaEditor`] that renders DDL and runs it through a [`SqlExecutor`].
pub struct SqlSchemaEditor<E> {
    executor: E,
    dialect: Dialect,
    ledger_table: String,
}

impl<E: SqlExecutor> SqlSchemaEditor<E> {
    /// Create a new editor.
    pub fn new(executor: E, dialect: Dialect) -> Self {
        Self {
            executor,
            dialect,
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    /// Use a different ledger table.
    pub fn with_ledger_table(mut self, name: impl Into<String>) -> Self {
        self.ledger_table = name.into();
        self
    }

    /// Get the dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Get the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn run(&self, stmts: impl IntoIterator<Item = String>) -> MigrateResult<()> {
        for sql in stmts {
            debug!(dialect = ?self.dialect, sql = %sql, "Executing DDL");
            self.executor.execute(&sql, &[]).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<E: SqlExecutor> SchemaEditor for SqlSchemaEditor<E> {
    async fn setup(&self) -> MigrateResult<()> {
        self.run([self.dialect.create_ledger(&self.ledger_table)]).await
    }

    async fn has_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<bool> {
        let sql = self.dialect.select_ledger(&self.ledger_table);
        self.executor.query_exists(&sql, &[app, model, name]).await
    }

    async fn store_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()> {
        let sql = self.dialect.insert_ledger(&self.ledger_table);
        self.executor.execute(&sql, &[app, model, name]).await?;
        Ok(())
    }

    async fn remove_migration(&self, app: &str, model: &str, name: &str) -> MigrateResult<()> {
        let sql = self.dialect.delete_ledger(&self.ledger_table);
        self.executor.execute(&sql, &[app, model, name]).await?;
        Ok(())
    }

    async fn create_table(&self, table: &Table) -> MigrateResult<()> {
        self.run([self.dialect.create_table(table)]).await
    }

    async fn drop_table(&self, table: &Table) -> MigrateResult<()> {
        self.run([self.dialect.drop_table(table)]).await
    }

    async fn rename_table(&self, old: &Table, new: &Table) -> MigrateResult<()> {
        self.run([self.dialect.rename_table(old, new)]).await
    }

    async fn add_index(&self, table: &Table, index: &Index) -> MigrateResult<()> {
        self.run([self.dialect.create_index(table, index)?]).await
    }

    async fn drop_index(&self, table: &Table, index: &Index) -> MigrateResult<()> {
        self.run([self.dialect.drop_index(table, index)]).await
    }

    async fn rename_index(&self, table: &Table, old: &Index, new: &Index) -> MigrateResult<()> {
        self.run(self.dialect.rename_index(table, old, new)?).await
    }

    async fn add_field(&self, table: &Table, column: &Column) -> MigrateResult<()> {
        self.run(self.dialect.add_column(table, column)).await
    }

    async fn alter_field(&self, table: &Table, old: &Column, new: &Column) -> MigrateResult<()> {
        self.run(self.dialect.alter_column(table, old, new)?).await
    }

    async fn remove_field(&self, table: &Table, column: &Column) -> MigrateResult<()> {
        self.run([self.dialect.drop_column(table, column)]).await
    }
}
