//! Behaviour every `FrameStore` backend must share
//!
//! Each check is written once against `Arc<dyn FrameStore>` and instantiated
//! per backend by `backend_suite!`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::*;

fn memory() -> Arc<dyn FrameStore> {
    Arc::new(MemoryStore::new())
}

fn keyspace() -> Arc<dyn FrameStore> {
    Arc::new(PersistentStore::new(
        MemoryKeyspace::new(),
        KeySchema::new("conformance:"),
        64,
    ))
}

fn payload(tag: &str, index: i64) -> Bytes {
    Bytes::from(format!("{}-{}", tag, index))
}

async fn indices(store: &dyn FrameStore, session_id: &str) -> Vec<i64> {
    store
        .list_frames(&OpContext::background(), session_id)
        .await
        .unwrap()
        .iter()
        .map(|f| f.index)
        .collect()
}

async fn check_list_returns_latest_sorted(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();
    let puts = [(4, "a"), (1, "a"), (9, "a"), (1, "b"), (0, "a"), (4, "c")];

    for (index, tag) in puts {
        store
            .put_frame(&ctx, Frame::video("s", index, payload(tag, index)))
            .await
            .unwrap();
    }

    let frames = store.list_frames(&ctx, "s").await.unwrap();
    let seen: Vec<(i64, Bytes)> = frames.into_iter().map(|f| (f.index, f.data)).collect();
    assert_eq!(
        seen,
        vec![
            (0, payload("a", 0)),
            (1, payload("b", 1)),
            (4, payload("c", 4)),
            (9, payload("a", 9)),
        ]
    );
}

async fn check_overwrite_and_idempotence(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();
    let frame = Frame::audio("s", 3, Bytes::from_static(b"first")).with_codec("opus");

    store.put_frame(&ctx, frame.clone()).await.unwrap();
    store.put_frame(&ctx, frame.clone()).await.unwrap();
    assert_eq!(store.get_frame(&ctx, "s", 3).await.unwrap(), frame);
    assert_eq!(indices(store.as_ref(), "s").await, vec![3]);

    let mut newer = frame.clone();
    newer.data = Bytes::from_static(b"second");
    store.put_frame(&ctx, newer).await.unwrap();

    let got = store.get_frame(&ctx, "s", 3).await.unwrap();
    assert_eq!(got.data, Bytes::from_static(b"second"));
    assert_eq!(got.codec, "opus");
    assert_eq!(indices(store.as_ref(), "s").await, vec![3]);
}

async fn check_not_found(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();

    assert!(matches!(
        store.get_frame(&ctx, "missing", 0).await,
        Err(StoreError::SessionNotFound(ref s)) if s == "missing"
    ));
    assert!(matches!(
        store.list_frames(&ctx, "missing").await,
        Err(StoreError::SessionNotFound(_))
    ));

    store
        .put_frame(&ctx, Frame::video("s", 0, Bytes::new()))
        .await
        .unwrap();
    assert!(matches!(
        store.get_frame(&ctx, "s", 1).await,
        Err(StoreError::FrameNotFound { index: 1, .. })
    ));
}

async fn check_delete_session(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();
    for index in 0..5 {
        store
            .put_frame(&ctx, Frame::video("gone", index, Bytes::new()))
            .await
            .unwrap();
    }
    store
        .put_frame(&ctx, Frame::video("kept", 0, Bytes::new()))
        .await
        .unwrap();

    store.delete_session(&ctx, "gone").await.unwrap();

    assert_eq!(store.list_sessions(&ctx).await.unwrap(), vec!["kept"]);
    assert!(store.list_frames(&ctx, "gone").await.unwrap_err().is_not_found());
    assert!(store.get_frame(&ctx, "gone", 0).await.unwrap_err().is_not_found());

    // Deleting twice is an error, not a no-op
    assert!(matches!(
        store.delete_session(&ctx, "gone").await,
        Err(StoreError::SessionNotFound(_))
    ));

    // A later put starts the session from scratch
    store
        .put_frame(&ctx, Frame::video("gone", 7, Bytes::new()))
        .await
        .unwrap();
    assert_eq!(indices(store.as_ref(), "gone").await, vec![7]);
}

async fn check_list_sessions_sorted(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();
    let ids = ["delta", "alpha", "charlie", "echo", "bravo"];

    for (i, id) in ids.iter().enumerate() {
        store
            .put_frame(&ctx, Frame::video(*id, i as i64, Bytes::new()))
            .await
            .unwrap();
    }

    assert_eq!(
        store.list_sessions(&ctx).await.unwrap(),
        vec!["alpha", "bravo", "charlie", "delta", "echo"]
    );
}

async fn check_concurrent_producers(store: Arc<dyn FrameStore>) {
    const PRODUCERS: i64 = 8;
    const FRAMES: i64 = 100;

    let mut tasks = Vec::new();
    for producer in 0..PRODUCERS {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let ctx = OpContext::background();
            for i in 0..FRAMES {
                let index = i * PRODUCERS + producer;
                store
                    .put_frame(&ctx, Frame::video("shared", index, payload("p", index)))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let frames = store
        .list_frames(&OpContext::background(), "shared")
        .await
        .unwrap();
    assert_eq!(frames.len() as i64, PRODUCERS * FRAMES);
    for (expected, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, expected as i64);
        assert_eq!(frame.data, payload("p", frame.index));
    }
}

async fn check_delete_is_all_or_nothing(store: Arc<dyn FrameStore>) {
    const FRAMES: i64 = 50;
    let ctx = OpContext::background();

    for round in 0..10 {
        let session = format!("race-{}", round);
        for index in 0..FRAMES {
            store
                .put_frame(&ctx, Frame::video(session.clone(), index, Bytes::new()))
                .await
                .unwrap();
        }

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            let session = session.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..20 {
                    match store.list_frames(&OpContext::background(), &session).await {
                        Ok(frames) => assert_eq!(frames.len() as i64, FRAMES),
                        Err(err) => assert!(err.is_not_found(), "unexpected error: {}", err),
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        store.delete_session(&ctx, &session).await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert!(!store.list_sessions(&ctx).await.unwrap().contains(&session));
    }
}

async fn check_notifications(store: Arc<dyn FrameStore>) {
    let ctx = OpContext::background();
    let mut rx = store.subscribe("watched");

    store
        .put_frame(&ctx, Frame::video("other", 0, Bytes::new()))
        .await
        .unwrap();
    store
        .put_frame(&ctx, Frame::video("watched", 5, Bytes::new()))
        .await
        .unwrap();
    store.delete_session(&ctx, "watched").await.unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        FrameEvent::Stored {
            session_id: "watched".into(),
            index: 5
        }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        FrameEvent::SessionDeleted {
            session_id: "watched".into()
        }
    );
}

async fn check_cancelled_context(store: Arc<dyn FrameStore>) {
    let token = CancellationToken::new();
    token.cancel();
    let ctx = OpContext::with_cancel(token).timeout(Duration::from_secs(1));

    assert!(matches!(
        store.put_frame(&ctx, Frame::video("s", 0, Bytes::new())).await,
        Err(StoreError::Cancelled)
    ));
    assert!(matches!(
        store.list_sessions(&ctx).await,
        Err(StoreError::Cancelled)
    ));
    assert!(store
        .list_sessions(&OpContext::background())
        .await
        .unwrap()
        .is_empty());
}

macro_rules! backend_suite {
    ($name:ident, $make:path) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn test_list_returns_latest_sorted() {
                check_list_returns_latest_sorted($make()).await;
            }

            #[tokio::test]
            async fn test_overwrite_and_idempotence() {
                check_overwrite_and_idempotence($make()).await;
            }

            #[tokio::test]
            async fn test_not_found() {
                check_not_found($make()).await;
            }

            #[tokio::test]
            async fn test_delete_session() {
                check_delete_session($make()).await;
            }

            #[tokio::test]
            async fn test_list_sessions_sorted() {
                check_list_sessions_sorted($make()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_producers() {
                check_concurrent_producers($make()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_delete_is_all_or_nothing() {
                check_delete_is_all_or_nothing($make()).await;
            }

            #[tokio::test]
            async fn test_notifications() {
                check_notifications($make()).await;
            }

            #[tokio::test]
            async fn test_cancelled_context() {
                check_cancelled_context($make()).await;
            }
        }
    };
}

backend_suite!(memory_backend, memory);
backend_suite!(keyspace_backend, keyspace);

/// Drive both backends through the same pseudo-random sequence and compare
/// every observable result.
#[tokio::test]
async fn test_backends_observably_identical() {
    let a = memory();
    let b = keyspace();
    let ctx = OpContext::background();
    let sessions = ["s0", "s1", "s2"];

    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: u64| {
        seed = seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (seed >> 33) % bound
    };

    for step in 0..400 {
        let session = sessions[next(sessions.len() as u64) as usize];
        match next(10) {
            0 => {
                let ra = a.delete_session(&ctx, session).await;
                let rb = b.delete_session(&ctx, session).await;
                assert_eq!(ra.is_ok(), rb.is_ok(), "delete diverged at step {}", step);
            }
            1..=2 => {
                let index = next(20) as i64;
                let ra = a.get_frame(&ctx, session, index).await;
                let rb = b.get_frame(&ctx, session, index).await;
                match (ra, rb) {
                    (Ok(fa), Ok(fb)) => assert_eq!(fa, fb),
                    (Err(ea), Err(eb)) => assert_eq!(ea.to_string(), eb.to_string()),
                    (ra, rb) => panic!("get diverged at step {}: {:?} vs {:?}", step, ra, rb),
                }
            }
            _ => {
                let index = next(20) as i64;
                let frame = Frame::video(session, index, payload("v", step));
                a.put_frame(&ctx, frame.clone()).await.unwrap();
                b.put_frame(&ctx, frame).await.unwrap();
            }
        }

        assert_eq!(
            a.list_sessions(&ctx).await.unwrap(),
            b.list_sessions(&ctx).await.unwrap()
        );
        for session in sessions {
            match (
                a.list_frames(&ctx, session).await,
                b.list_frames(&ctx, session).await,
            ) {
                (Ok(fa), Ok(fb)) => assert_eq!(fa, fb),
                (Err(ea), Err(eb)) => assert_eq!(ea.to_string(), eb.to_string()),
                (ra, rb) => panic!("list diverged at step {}: {:?} vs {:?}", step, ra, rb),
            }
        }
    }
}
