/// SQL queries for the local key/value store
pub struct Queries;

impl Queries {
    pub const GET_VALUE: &'static str = "SELECT value FROM kv_store WHERE key = ?1";

    pub const PUT_VALUE: &'static str = r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
    "#;

    pub const DELETE_VALUE: &'static str = "DELETE FROM kv_store WHERE key = ?1";
}

/// Keys under which the manager mirrors its state.
pub struct Keys;

impl Keys {
    pub const TASK_CACHE: &'static str = "task_cache";
    pub const PENDING_OPERATIONS: &'static str = "task_pending_operations";
}
