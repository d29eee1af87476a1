//! Storage scopes over one connection.
//!
//! A scope is closed by [`StorageScope::commit`] and rolled back when
//! dropped uncommitted. Read scopes are plain savepoints. A write scope
//! opened on a connection with no transaction in progress starts
//! `BEGIN IMMEDIATE`, so the write lock is taken up front and contention
//! waits on the busy timeout. Scopes opened inside another scope are
//! savepoints, so a service can own the transaction while repository calls
//! join it.

use super::DbResult;
use log::warn;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Savepoint,
    Immediate,
}

/// Scoped storage transaction bound to one connection.
#[must_use = "an uncommitted scope rolls back when dropped"]
pub struct StorageScope<'conn> {
    conn: &'conn Connection,
    name: &'static str,
    kind: ScopeKind,
    finished: bool,
}

impl<'conn> StorageScope<'conn> {
    /// Opens a read scope as a savepoint named `name`.
    ///
    /// `name` must be a plain SQL identifier; it is interpolated into the
    /// statement text.
    pub fn begin(conn: &'conn Connection, name: &'static str) -> DbResult<Self> {
        conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        Ok(Self::opened(conn, name, ScopeKind::Savepoint))
    }

    /// Opens a write scope. Outermost: `BEGIN IMMEDIATE`. Nested: savepoint.
    pub fn begin_write(conn: &'conn Connection, name: &'static str) -> DbResult<Self> {
        if !conn.is_autocommit() {
            return Self::begin(conn, name);
        }
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(Self::opened(conn, name, ScopeKind::Immediate))
    }

    fn opened(conn: &'conn Connection, name: &'static str, kind: ScopeKind) -> Self {
        Self {
            conn,
            name,
            kind,
            finished: false,
        }
    }

    /// Connection the scope is bound to.
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Makes the scope's changes part of the enclosing transaction, or
    /// durable when outermost.
    pub fn commit(mut self) -> DbResult<()> {
        match self.kind {
            ScopeKind::Savepoint => self
                .conn
                .execute_batch(&format!("RELEASE SAVEPOINT {};", self.name))?,
            ScopeKind::Immediate => self.conn.execute_batch("COMMIT;")?,
        }
        self.finished = true;
        Ok(())
    }

    /// Rolls back every change made since the scope was opened.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> DbResult<()> {
        match self.kind {
            ScopeKind::Savepoint => self.conn.execute_batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};",
                name = self.name
            ))?,
            // A failed COMMIT may already have ended the transaction.
            ScopeKind::Immediate if self.conn.is_autocommit() => {}
            ScopeKind::Immediate => self.conn.execute_batch("ROLLBACK;")?,
        }
        Ok(())
    }
}

impl Drop for StorageScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.rollback_inner() {
            warn!(
                "event=scope_rollback module=db status=error scope={} error={}",
                self.name, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StorageScope;
    use rusqlite::Connection;

    fn conn_with_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL);")
            .unwrap();
        conn
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn committed_scope_keeps_changes() {
        let conn = conn_with_table();
        let scope = StorageScope::begin(&conn, "outer").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        scope.commit().unwrap();
        assert_eq!(row_count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let conn = conn_with_table();
        {
            let _scope = StorageScope::begin(&conn, "outer").unwrap();
            conn.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        }
        assert_eq!(row_count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn inner_commit_is_undone_by_outer_rollback() {
        let conn = conn_with_table();
        let outer = StorageScope::begin(&conn, "outer").unwrap();
        let inner = StorageScope::begin(&conn, "inner").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        inner.commit().unwrap();
        assert_eq!(row_count(&conn), 1);
        outer.rollback().unwrap();
        assert_eq!(row_count(&conn), 0);
    }

    #[test]
    fn outermost_write_scope_holds_the_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock.db");
        let writer = Connection::open(&path).unwrap();
        writer
            .execute_batch("CREATE TABLE t (v INTEGER NOT NULL);")
            .unwrap();
        let other = Connection::open(&path).unwrap();

        let scope = StorageScope::begin_write(&writer, "outer").unwrap();
        assert!(!writer.is_autocommit());
        // Nothing written yet, but a second writer is already locked out.
        match other.execute_batch("BEGIN IMMEDIATE;") {
            Err(rusqlite::Error::SqliteFailure(err, _)) => {
                assert_eq!(err.code, rusqlite::ErrorCode::DatabaseBusy);
            }
            result => panic!("unexpected result: {result:?}"),
        }
        scope.commit().unwrap();
        assert!(writer.is_autocommit());

        other.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
        assert_eq!(row_count(&writer), 1);
    }

    #[test]
    fn write_scope_nests_and_rolls_back_as_a_transaction() {
        let conn = conn_with_table();
        {
            let outer = StorageScope::begin_write(&conn, "outer").unwrap();
            let inner = StorageScope::begin_write(&conn, "inner").unwrap();
            conn.execute("INSERT INTO t (v) VALUES (1);", []).unwrap();
            inner.commit().unwrap();
            assert_eq!(row_count(&conn), 1);
            drop(outer);
        }
        assert_eq!(row_count(&conn), 0);
        assert!(conn.is_autocommit());

        let outer = StorageScope::begin_write(&conn, "outer").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (2);", []).unwrap();
        outer.commit().unwrap();
        assert_eq!(row_count(&conn), 1);
    }
}
