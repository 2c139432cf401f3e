use dobro_portal::{ApiError, scope::ViewScope};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::oneshot;

#[tokio::test]
async fn test_result_delivered_while_alive() {
    let mut scope = ViewScope::new("fund_details");
    let handle = scope.spawn(async { Ok::<_, ApiError>(7) });

    assert_eq!(handle.join().await.unwrap(), 7);
    assert!(scope.is_alive());
}

#[tokio::test]
async fn test_errors_pass_through() {
    let mut scope = ViewScope::new("fund_details");
    let handle = scope.spawn(async { Err::<(), _>(ApiError::NotFound { message: None }) });

    assert!(matches!(handle.join().await, Err(ApiError::NotFound { .. })));
}

#[tokio::test]
async fn test_drop_aborts_in_flight_request() {
    let finished = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = oneshot::channel();

    let handle = {
        let mut scope = ViewScope::new("profile");
        let finished = finished.clone();
        let handle = scope.spawn(async move {
            let _ = started_tx.send(());
            tokio::time::sleep(Duration::from_secs(30)).await;
            finished.store(true, Ordering::SeqCst);
            Ok::<_, ApiError>("late")
        });
        started_rx.await.unwrap();
        assert_eq!(scope.pending(), 1);
        handle
        // scope dropped here: the view unmounts
    };

    assert!(matches!(handle.join().await, Err(ApiError::Cancelled)));
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_close_withholds_completed_result() {
    let mut scope = ViewScope::new("donations");
    let (tx, rx) = oneshot::channel::<()>();
    let handle = scope.spawn(async move {
        let _ = tx.send(());
        Ok::<_, ApiError>(1)
    });
    rx.await.unwrap();
    // Give the task a chance to hand its result over.
    tokio::task::yield_now().await;

    scope.close();
    scope.close();

    assert!(!scope.is_alive());
    assert!(matches!(handle.join().await, Err(ApiError::Cancelled)));
}
