use crate::downloader::test_helpers::{
    FileBehavior, ScriptedEngine, ScriptedFile, ScriptedHandle, TEST_MAGNET,
    create_test_downloader, create_test_downloader_with,
};
use crate::error::Error;
use crate::types::{Event, SessionState, Source};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod lifecycle;

/// Receive events until one matches `predicate` (fails the test after 5 seconds)
async fn wait_for_event(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    predicate: impl Fn(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn stalled_handle() -> std::sync::Arc<ScriptedHandle> {
    ScriptedHandle::with_files(
        vec![
            ScriptedFile::new("done.txt", b"finished", FileBehavior::Complete),
            ScriptedFile::new("movie.mkv", b"partial", FileBehavior::Stall),
        ],
        Some(1),
    )
}

fn magnet() -> Source {
    Source::Magnet(TEST_MAGNET.to_string())
}
