use adio_core::drivers::EmptyDriver;
use adio_core::{Connection, DatabaseService, Error, ServiceConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_many_tasks() {
    let service = DatabaseService::new(ServiceConfig {
        worker_threads: Some(4),
        queue_capacity: 8,
        ..Default::default()
    });
    let counter = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let service = service.clone();
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                service
                    .spawn(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        i * 2
                    })
                    .await
            })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap().unwrap();
    }
    assert_eq!(total, (0..64).map(|i| i * 2).sum::<i32>());
    assert_eq!(counter.load(Ordering::SeqCst), 64);

    let stats = service.stats();
    assert_eq!(stats.submitted, 64);
    assert_eq!(stats.panicked, 0);
}

#[tokio::test]
async fn test_thread_names() {
    let service = DatabaseService::new(ServiceConfig {
        worker_threads: Some(1),
        thread_name: "hat-db".to_string(),
        ..Default::default()
    });
    let name = service
        .spawn(|| std::thread::current().name().map(str::to_owned))
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("hat-db-0"));
}

#[tokio::test]
async fn test_connection_after_shutdown() {
    let service = DatabaseService::default();
    let conn = Connection::<EmptyDriver>::new(&service);
    conn.open("db").await.unwrap();

    service.shutdown();
    assert!(matches!(conn.close().await, Err(Error::ServiceShutdown)));
}

#[test]
fn test_drop_joins_workers() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let service = DatabaseService::default();
    let done = Arc::new(AtomicUsize::new(0));
    {
        let done = Arc::clone(&done);
        runtime
            .block_on(service.spawn(move || done.fetch_add(1, Ordering::SeqCst)))
            .unwrap();
    }
    drop(service);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abandoned_submission_is_not_counted() {
    let service = DatabaseService::new(ServiceConfig {
        worker_threads: Some(1),
        queue_capacity: 1,
        ..Default::default()
    });
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    // Occupy the only worker, then fill the only queue slot
    let busy = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .spawn(move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .await
        }
    });
    tokio::task::spawn_blocking(move || started_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let queued = tokio::spawn({
        let service = service.clone();
        async move { service.spawn(|| 2).await }
    });
    while service.stats().submitted < 2 {
        tokio::task::yield_now().await;
    }

    let waiting = tokio::time::timeout(Duration::from_millis(50), service.spawn(|| 3)).await;
    assert!(waiting.is_err());
    assert_eq!(service.stats().submitted, 2);

    release_tx.send(()).unwrap();
    busy.await.unwrap().unwrap();
    assert_eq!(queued.await.unwrap().unwrap(), 2);
    assert_eq!(service.stats().submitted, 2);
}
