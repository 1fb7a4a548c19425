use super::*;

#[tokio::test]
async fn test_shutdown_cancels_active_sessions() {
    let handle = stalled_handle();
    let (downloader, _engine, _temp_dir) =
        create_test_downloader(ScriptedEngine::new(handle.clone())).await;
    let mut events = downloader.subscribe();

    let task = {
        let downloader = downloader.clone();
        tokio::spawn(async move { downloader.download(magnet(), CancellationToken::new()).await })
    };
    wait_for_event(&mut events, |e| matches!(e, Event::FileCompleted { .. })).await;

    downloader.shutdown().await.unwrap();

    let error = task.await.unwrap().unwrap_err();
    assert!(error.is_abort(), "expected abort, got {error:?}");
    assert_eq!(downloader.active_session_count().await, 0);
    assert_eq!(handle.destroy_count(), 1);
    wait_for_event(&mut events, |e| matches!(e, Event::Shutdown)).await;
}

#[tokio::test]
async fn test_no_new_sessions_after_shutdown() {
    let handle = ScriptedHandle::ready(vec![("a.txt", b"a".to_vec())]);
    let (downloader, engine, _temp_dir) = create_test_downloader(ScriptedEngine::new(handle)).await;

    downloader.shutdown().await.unwrap();
    let result = downloader.download(magnet(), CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::ShuttingDown)));
    assert_eq!(engine.submissions(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_sessions_waiting_for_a_permit() {
    let handle = stalled_handle();
    let (downloader, _engine, _temp_dir) =
        create_test_downloader_with(ScriptedEngine::new(handle), |config| {
            config.download.max_concurrent_sessions = Some(1);
        })
        .await;
    let mut events = downloader.subscribe();

    let first = {
        let downloader = downloader.clone();
        tokio::spawn(async move { downloader.download(magnet(), CancellationToken::new()).await })
    };
    wait_for_event(&mut events, |e| matches!(e, Event::FilesListed { .. })).await;
    let waiting = {
        let downloader = downloader.clone();
        tokio::spawn(async move { downloader.download(magnet(), CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    downloader.shutdown().await.unwrap();

    assert!(first.await.unwrap().unwrap_err().is_abort());
    assert!(matches!(waiting.await.unwrap(), Err(Error::ShuttingDown)));
}

#[tokio::test]
async fn test_registration_refused_once_shutdown_begins() {
    let handle = ScriptedHandle::ready(vec![("a.txt", b"a".to_vec())]);
    let (downloader, _engine, _temp_dir) = create_test_downloader(ScriptedEngine::new(handle)).await;

    // A download that passed the early intake check just before shutdown flipped the flag
    downloader
        .registry
        .accepting_new
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let session_id = crate::types::SessionId::generate();
    let result = downloader
        .register_session(&session_id, &magnet(), None, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::ShuttingDown)));
    assert_eq!(downloader.active_session_count().await, 0);
    assert!(downloader.list_sessions().await.is_empty());
}
