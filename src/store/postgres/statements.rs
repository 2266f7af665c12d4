use crate::Aggregate;

/// Statements of the events table of an aggregate, rendered once per store.
#[derive(Clone, Debug)]
pub struct Statements {
    table_name: String,
    migrations: Vec<String>,
    insert: String,
    select_by_aggregate_id: String,
    select_after: String,
    stream_version: String,
    last_position: String,
    lock_shared: String,
    lock_exclusive: String,
    lock_rebuild: String,
}

impl Statements {
    pub fn new<A>() -> Self
    where
        A: Aggregate,
    {
        let table_name: String = format!("{}_events", A::NAME);

        Self {
            migrations: vec![
                format!(include_str!("sql/migrations/01_create_table.sql"), table_name),
                format!(include_str!("sql/migrations/02_create_index.sql"), table_name),
                format!(include_str!("sql/migrations/03_create_unique_constraint.sql"), table_name),
                format!(include_str!("sql/migrations/04_create_global_position_index.sql"), table_name),
            ],
            insert: format!(include_str!("sql/statements/insert.sql"), table_name),
            select_by_aggregate_id: format!(include_str!("sql/statements/select_by_aggregate_id.sql"), table_name),
            select_after: format!(include_str!("sql/statements/select_after.sql"), table_name),
            stream_version: format!(include_str!("sql/statements/stream_version.sql"), table_name),
            last_position: format!(include_str!("sql/statements/last_position.sql"), table_name),
            lock_shared: format!(include_str!("sql/statements/lock_shared.sql"), table_name),
            lock_exclusive: format!(include_str!("sql/statements/lock_exclusive.sql"), table_name),
            lock_rebuild: format!(include_str!("sql/statements/lock_rebuild.sql"), table_name),
            table_name,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn migrations(&self) -> &[String] {
        &self.migrations
    }

    pub fn insert(&self) -> &str {
        &self.insert
    }

    pub fn by_aggregate_id(&self) -> &str {
        &self.select_by_aggregate_id
    }

    /// At most `$3` events with `$1 < global_position <= $2`, in log order.
    pub fn select_after(&self) -> &str {
        &self.select_after
    }

    pub fn stream_version(&self) -> &str {
        &self.stream_version
    }

    pub fn last_position(&self) -> &str {
        &self.last_position
    }

    /// Taken by every append, for the whole append transaction.
    pub fn lock_shared(&self) -> &str {
        &self.lock_shared
    }

    /// Taken by the rebuild while it reads the log position and while it swaps tables.
    pub fn lock_exclusive(&self) -> &str {
        &self.lock_exclusive
    }

    /// Keeps two rebuilds of the same store from sharing the rebuild schema.
    pub fn lock_rebuild(&self) -> &str {
        &self.lock_rebuild
    }

    /// Name of the schema holding the tables of a rebuild in progress.
    pub fn rebuild_schema(&self) -> String {
        format!("{}_rebuild", self.table_name)
    }
}
