//! Drives a connection with the empty driver, which logs every call it
//! receives instead of talking to a database.
//!
//! Run with `RUST_LOG=debug` to also see the service's worker activity.

mod common;

use adio_core::drivers::EmptyDriver;
use adio_core::{ignore_results, Connection, DatabaseService, Program};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_logging();

    let service = DatabaseService::default();
    let conn = Connection::<EmptyDriver>::new(&service);

    conn.open("no-database").await.context("open")?;
    conn.execute("CREATE TABLE hats (kind TEXT, color TEXT)")
        .await
        .context("create table")?;

    let mut st = conn.prepare("SELECT * FROM hats").await?;
    while let Some(row) = conn.step(&mut st).await? {
        println!("unexpected row: {:?}", row);
    }

    conn.run(Program::new("DELETE FROM hats", ignore_results()))
        .await
        .context("delete")?;
    conn.close().await?;

    println!("Service stats: {:?}", service.stats());
    Ok(())
}
