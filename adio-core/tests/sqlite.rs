#![cfg(feature = "sqlite")]

use adio_core::drivers::Sqlite;
use adio_core::{
    create_container, into_container, Connection, DatabaseService, Error, Program, Row,
    ServiceConfig, SqliteErrc, Value, NO_ERROR,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn service() -> DatabaseService {
    DatabaseService::new(ServiceConfig {
        worker_threads: Some(2),
        ..Default::default()
    })
}

async fn memory(service: &DatabaseService) -> Connection<Sqlite> {
    let conn = Connection::<Sqlite>::new(service);
    conn.open(":memory:").await.unwrap();
    conn
}

async fn hats(conn: &Connection<Sqlite>) {
    conn.execute(
        "CREATE TABLE hats (
            id INTEGER PRIMARY KEY NOT NULL,
            type TEXT NOT NULL,
            color VARCHAR(16) NOT NULL
        );
        INSERT INTO hats (type, color) VALUES ('top', 'black');
        INSERT INTO hats (type, color) VALUES ('top', 'green');
        INSERT INTO hats (type, color) VALUES ('bowler', 'black');",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_open_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let service = service();
    let conn = Connection::<Sqlite>::new(&service);

    conn.open(path.to_str().unwrap()).await.unwrap();
    assert!(conn.is_open());
    conn.execute("CREATE TABLE t (v INTEGER)").await.unwrap();
    conn.close().await.unwrap();
    assert!(path.exists());

    // Reopening sees the schema written before
    conn.open_blocking(path.to_str().unwrap()).unwrap();
    conn.execute_blocking("INSERT INTO t VALUES (1)").unwrap();
}

#[tokio::test]
async fn test_bad_open() {
    let service = service();
    let conn = Connection::<Sqlite>::new(&service);
    let err = conn.open("/foo/bar/bad-path/not-real.db").await.unwrap_err();
    assert!(err.is_sqlite(SqliteErrc::CantOpen));
    assert!(!conn.is_open());

    let err = conn.open_blocking("nonexistent-directory/foo.db").unwrap_err();
    assert_eq!(err.sqlite_code().map(SqliteErrc::primary), Some(SqliteErrc::CantOpen));
}

#[tokio::test]
async fn test_not_connected() {
    let service = service();
    let conn = Connection::<Sqlite>::new(&service);
    assert!(matches!(
        conn.execute("CREATE FOO BLARGH").await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn test_invalid_sql() {
    let service = service();
    let conn = memory(&service).await;
    assert_eq!(conn.last_error(), NO_ERROR);

    let err = conn.execute("This is invalid sql").await.unwrap_err();
    assert!(err.is_sqlite(SqliteErrc::Error));
    assert!(conn.last_error().contains("syntax"));

    let err = conn
        .prepare("CREATE WHERE TABLE IF NOT EXISTS myTable (id INTEGER PRIMARY KEY)")
        .await
        .unwrap_err();
    assert_eq!(err.sqlite_code(), Some(SqliteErrc::Error));
}

#[tokio::test]
async fn test_create_table_twice() {
    let service = service();
    let conn = memory(&service).await;
    conn.execute("CREATE TABLE my_table (val INTEGER)").await.unwrap();
    assert!(conn.execute("CREATE TABLE my_table (val INTEGER)").await.is_err());
    conn.execute("CREATE TABLE IF NOT EXISTS my_table (val INTEGER)")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_iterate_rows() {
    let service = service();
    let conn = memory(&service).await;
    conn.execute(
        "CREATE TABLE myTable (id INTEGER PRIMARY KEY, name VARCHAR(1024));
         INSERT INTO myTable (name) VALUES ('Hats');
         INSERT INTO myTable (name) VALUES ('Hats');
         INSERT INTO myTable (name) VALUES ('Hats');",
    )
    .await
    .unwrap();

    let mut st = conn.prepare("SELECT * FROM myTable").await.unwrap();
    let mut count = 0;
    while let Some(row) = conn.step(&mut st).await.unwrap() {
        count += 1;
        assert!(row[0] == count);
        assert!(row[1] == "Hats");
        assert_eq!(row.len(), 2);
    }
    assert_eq!(count, 3);
    assert!(st.is_done());

    // Stepping a finished statement runs it again
    assert!(conn.step(&mut st).await.unwrap().is_some());
}

#[tokio::test]
async fn test_bind_indexed() {
    let service = service();
    let conn = memory(&service).await;
    hats(&conn).await;

    let mut st = conn
        .prepare("SELECT type FROM hats WHERE color = ? ORDER BY id")
        .await
        .unwrap();
    st.bind(1, "black").unwrap();
    let rows: Vec<Row> = conn.query(&mut st).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), 1);
    assert!(rows[0][0] == "top");

    let err = st.bind(2, "green").unwrap_err();
    assert!(matches!(err, Error::ParameterOutOfRange { index: 2, count: 1 }));
}

#[tokio::test]
async fn test_bind_named() {
    let service = service();
    let conn = memory(&service).await;
    hats(&conn).await;

    let mut st = conn
        .prepare("SELECT type FROM hats WHERE color = :color")
        .await
        .unwrap();
    st.bind_named(":color", "green").unwrap();
    let types: Vec<String> = conn.query(&mut st).await.unwrap();
    assert_eq!(types, vec!["top".to_string()]);
}

#[tokio::test]
async fn test_insert_and_retrieve() {
    let service = service();
    let conn = memory(&service).await;
    conn.execute("CREATE TABLE my_table (val INTEGER, str TEXT)")
        .await
        .unwrap();

    let mut insert = conn.prepare("INSERT INTO my_table VALUES (?, ?)").await.unwrap();
    insert.bind_all((12, "I am a string")).unwrap();
    conn.execute_statement(&mut insert).await.unwrap();
    assert_eq!(conn.ext().last_insert_rowid().unwrap(), 1);
    insert.bind_all((4, "I am a different string")).unwrap();
    conn.execute_statement(&mut insert).await.unwrap();
    assert_eq!(conn.ext().changes().unwrap(), 1);

    let select = conn.prepare("SELECT * FROM my_table").await.unwrap();
    let mut rows: Vec<Row> = Vec::new();
    let out = conn
        .run_blocking(Program::new(select, into_container(&mut rows)))
        .unwrap();
    assert_eq!(rows.len(), 2);

    // The statement comes back for reuse
    let select = out.statement.unwrap();
    let pairs = conn
        .run(Program::new(select, create_container::<Vec<(i64, String)>>()))
        .await
        .unwrap()
        .output;
    assert_eq!(
        pairs,
        vec![
            (12, "I am a string".to_string()),
            (4, "I am a different string".to_string()),
        ]
    );

    let wrong_shape = conn
        .run(Program::new(
            "SELECT * FROM my_table",
            create_container::<Vec<i64>>(),
        ))
        .await;
    assert!(matches!(wrong_shape, Err(Error::RowWidth { expected: 1, actual: 2 })));
}

#[tokio::test]
async fn test_value_types() {
    let service = service();
    let conn = memory(&service).await;
    conn.execute("CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n INTEGER, d INTEGER)")
        .await
        .unwrap();

    let when = UNIX_EPOCH + Duration::from_nanos(1_500_000_000_123_456_789);
    let mut insert = conn
        .prepare("INSERT INTO v VALUES (?, ?, ?, ?, ?, ?)")
        .await
        .unwrap();
    insert
        .bind_all((
            7,
            2.5,
            "text",
            vec![0u8, 1, 2],
            Option::<i64>::None,
            when,
        ))
        .unwrap();
    conn.execute_statement(&mut insert).await.unwrap();

    let mut select = conn.prepare("SELECT * FROM v").await.unwrap();
    let row = conn.step(&mut select).await.unwrap().unwrap();
    assert!(row[0] == 7);
    assert!(row[1] == 2.5);
    assert!(row[2] == "text");
    assert!(row[3] == Value::from(vec![0u8, 1, 2]));
    assert!(row[4].is_null());
    assert_eq!(row.get_as::<SystemTime>(5).unwrap(), when);
    assert!(row.get_as::<String>(0).is_err());
}

#[tokio::test]
async fn test_prepare_multiple() {
    let service = service();
    let conn = memory(&service).await;
    hats(&conn).await;

    let statements = conn
        .prepare_multiple("SELECT type FROM hats; SELECT color FROM hats WHERE id = ?;")
        .await
        .unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].column_names(), &["type".to_string()][..]);
    assert_eq!(statements[1].parameter_count(), 1);

    assert!(conn
        .prepare_multiple("SELECT 1; SELECT nothing FROM nowhere;")
        .await
        .is_err());
}

#[tokio::test]
async fn test_connections_share_a_service() {
    let service = service();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let path = path.to_str().unwrap();

    let writer = Connection::<Sqlite>::new(&service);
    writer.open(path).await.unwrap();
    writer
        .execute("CREATE TABLE hats (type TEXT); INSERT INTO hats VALUES ('top');")
        .await
        .unwrap();

    let reader = Connection::<Sqlite>::new(&service);
    reader.open(path).await.unwrap();
    let mut st = reader.prepare("SELECT type FROM hats").await.unwrap();
    let types: Vec<String> = reader.query(&mut st).await.unwrap();
    assert_eq!(types, vec!["top".to_string()]);
}
