//! Rendering and applying generated statements.

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::Result;

/// Joins statements into a script, each terminated by `;`. With
/// `single_transaction` the script is wrapped in `BEGIN`/`COMMIT`.
#[must_use]
pub fn render_script(stmts: &[String], single_transaction: bool) -> String {
    let mut script = String::new();
    if stmts.is_empty() {
        return script;
    }
    if single_transaction {
        script.push_str("BEGIN;\n\n");
    }
    for stmt in stmts {
        script.push_str(stmt);
        script.push_str(";\n\n");
    }
    if single_transaction {
        script.push_str("COMMIT;\n");
    }
    script
}

/// Executes `stmts` in order inside one transaction. Nothing is applied
/// if any statement fails.
pub async fn apply(pool: &PgPool, stmts: &[String]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for sql in stmts {
        debug!(sql = %sql, "Executing SQL");
        sqlx::query(sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!(statements = stmts.len(), "Applied changes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmts() -> Vec<String> {
        vec![
            "CREATE TABLE t1 (\n    c1 integer)".to_string(),
            "COMMENT ON TABLE t1 IS 'x'".to_string(),
        ]
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(
            render_script(&stmts(), false),
            "CREATE TABLE t1 (\n    c1 integer);\n\nCOMMENT ON TABLE t1 IS 'x';\n\n"
        );
    }

    #[test]
    fn test_render_single_transaction() {
        let script = render_script(&stmts(), true);
        assert!(script.starts_with("BEGIN;\n\nCREATE TABLE t1"));
        assert!(script.ends_with("IS 'x';\n\nCOMMIT;\n"));
    }

    #[test]
    fn test_render_nothing() {
        assert_eq!(render_script(&[], true), "");
    }
}
