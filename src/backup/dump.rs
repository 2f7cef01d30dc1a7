//! Logical SQL dump
//!
//! Produces a self-contained script: table DDL, one INSERT per row, the
//! AUTOINCREMENT counters, then indexes and triggers. Replaying it into an
//! empty database reconstructs the data set.

use std::io::Write;
use rusqlite::Connection;
use crate::Result;
use crate::storage::Value;

/// Write a dump of every user table reachable through `conn`
pub fn write_dump<W: Write>(conn: &Connection, out: &mut W) -> Result<()> {
    writeln!(out, "PRAGMA foreign_keys=OFF;")?;
    writeln!(out, "BEGIN TRANSACTION;")?;

    let objects = schema_objects(conn)?;

    for object in objects.iter().filter(|o| o.kind == "table") {
        writeln!(out, "{};", object.sql.trim())?;
        let rows = dump_table_rows(conn, &object.name, out)?;
        tracing::debug!("Dumped {} rows from {}", rows, object.name);
    }

    if has_sequence_table(conn)? {
        writeln!(out, "DELETE FROM sqlite_sequence;")?;
        let mut stmt = conn.prepare("SELECT name, seq FROM sqlite_sequence ORDER BY name")?;
        let counters = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (name, seq) in counters {
            writeln!(out, "INSERT INTO sqlite_sequence VALUES({},{});", sql_literal(&Value::Text(name)), seq)?;
        }
    }

    for object in objects.iter().filter(|o| o.kind != "table") {
        writeln!(out, "{};", object.sql.trim())?;
    }

    writeln!(out, "COMMIT;")?;
    Ok(())
}

struct SchemaObject {
    kind: String,
    name: String,
    sql: String,
}

fn schema_objects(conn: &Connection) -> Result<Vec<SchemaObject>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT type, name, sql FROM sqlite_master
        WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
        ORDER BY CASE type WHEN 'table' THEN 0 WHEN 'index' THEN 1 ELSE 2 END, rowid
        "#,
    )?;
    let objects = stmt
        .query_map([], |row| {
            Ok(SchemaObject {
                kind: row.get(0)?,
                name: row.get(1)?,
                sql: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(objects)
}

fn has_sequence_table(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn dump_table_rows<W: Write>(conn: &Connection, table: &str, out: &mut W) -> Result<usize> {
    let ident = quote_identifier(table);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {ident}"))?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut count = 0;

    while let Some(row) = rows.next()? {
        let mut literals = Vec::with_capacity(width);
        for idx in 0..width {
            literals.push(sql_literal(&row.get::<_, Value>(idx)?));
        }
        writeln!(out, "INSERT INTO {ident} VALUES({});", literals.join(","))?;
        count += 1;
    }
    Ok(count)
}

/// Quote an identifier with double quotes, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a value as an SQL literal safe to embed in a script.
///
/// Text single quotes are doubled; blobs become `X'..'`; non-finite reals
/// become out-of-range literals SQLite reads back as infinity.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) if f.is_nan() => "NULL".to_string(),
        Value::Real(f) if f.is_infinite() => {
            if *f > 0.0 { "9.0e999".to_string() } else { "-9.0e999".to_string() }
        }
        Value::Real(f) => format!("{f:?}"),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
    }
}
