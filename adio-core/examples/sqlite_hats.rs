//! A small SQLite session: create a table, insert with bound parameters,
//! then read rows back a few different ways.
//!
//! Pass a database path as the first argument, or use an in-memory database.

mod common;

use adio_core::drivers::Sqlite;
use adio_core::{create_container, for_each, Connection, DatabaseService, Program, SqliteErrc};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_logging();

    let path = std::env::args().nth(1).unwrap_or_else(|| ":memory:".to_string());
    let service = DatabaseService::default();
    let conn = Connection::<Sqlite>::new(&service);

    conn.open(&path)
        .await
        .with_context(|| format!("opening {path}"))?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS hats (kind TEXT NOT NULL, color TEXT, size INTEGER);
         DELETE FROM hats;",
    )
    .await
    .context("creating table")?;

    let mut insert = conn
        .prepare("INSERT INTO hats (kind, color, size) VALUES (?, :color, ?)")
        .await?;
    let hats = [("fedora", "black", 7), ("beret", "green", 6), ("bowler", "black", 8)];
    for (kind, color, size) in hats {
        insert.bind(1, kind)?.bind_named(":color", color)?.bind(3, size)?;
        conn.execute_statement(&mut insert).await?;
        println!("Inserted {} as row {}", kind, conn.ext().last_insert_rowid()?);
    }

    let mut by_color = conn
        .prepare("SELECT kind, size FROM hats WHERE color = :color ORDER BY size")
        .await?;
    by_color.bind_named(":color", "black")?;
    let black: Vec<(String, i64)> = conn.query(&mut by_color).await?;
    println!("Black hats: {:?}", black);

    let out = conn
        .run(Program::new(
            "SELECT kind, color FROM hats",
            create_container::<Vec<(String, Option<String>)>>(),
        ))
        .await?;
    println!("All hats: {:?}", out.output);

    conn.run_blocking(Program::new(
        "SELECT count(*) FROM hats",
        for_each(|count: i64| println!("{} hats in total", count)),
    ))?;

    match conn.execute("SELEC nothing").await {
        Err(e) if e.is_sqlite(SqliteErrc::Error) => {
            println!("Bad SQL rejected: {}", conn.last_error())
        }
        other => anyhow::bail!("expected a syntax error, got {:?}", other),
    }

    conn.close().await?;
    Ok(())
}
