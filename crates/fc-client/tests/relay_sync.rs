//! Chat sessions converging through a live relay hub.

use std::sync::Arc;
use std::time::Duration;

use fc_client::{Applied, RelayLink, Session, SessionError, SyncError};
use fc_relay::{AppState, Hub};
use uuid::Uuid;

const STEP: Duration = Duration::from_secs(5);

fn attach(hub: &Arc<Hub>, name: &str) -> (Uuid, Session) {
    let (peer_id, tx, rx) = hub.attach();
    let session = Session::join(name, RelayLink::from_channels(tx, rx)).unwrap();
    (peer_id, session)
}

async fn next(session: &mut Session) -> Option<Applied> {
    tokio::time::timeout(STEP, session.next_update())
        .await
        .expect("timed out waiting for relay event")
}

async fn pump(session: &mut Session, n: usize) -> Vec<Applied> {
    let mut applied = Vec::with_capacity(n);
    for _ in 0..n {
        applied.push(next(session).await.expect("relay disconnected"));
    }
    applied
}

#[tokio::test]
async fn test_appends_converge_to_relay_order() {
    let hub = Arc::new(Hub::new());
    let names = ["ann", "ben", "cat"];
    let mut sessions: Vec<Session> = names.iter().map(|n| attach(&hub, n).1).collect();
    for session in &mut sessions {
        assert_eq!(next(session).await, Some(Applied::Snapshot { len: 0 }));
    }

    for round in 0..3 {
        for session in &mut sessions {
            session.append(&format!("msg {round}")).unwrap();
        }
    }
    for session in &mut sessions {
        pump(session, 9).await;
    }

    let canonical: Vec<String> = hub.snapshot().into_iter().map(|e| e.message).collect();
    assert_eq!(canonical.len(), 9);
    for session in &sessions {
        assert_eq!(session.rendered(), canonical);
    }

    // Each author's own entries keep their emission order.
    for name in names {
        let mine: Vec<&str> = sessions[0]
            .entries()
            .iter()
            .filter(|e| e.is_authored_by(name))
            .map(|e| e.text())
            .collect();
        assert_eq!(mine, vec!["msg 0", "msg 1", "msg 2"]);
    }
}

#[tokio::test]
async fn test_edit_and_delete_reach_every_replica() {
    let hub = Arc::new(Hub::new());
    let (_, mut ann) = attach(&hub, "ann");
    let (_, mut ben) = attach(&hub, "ben");
    pump(&mut ann, 1).await;
    pump(&mut ben, 1).await;

    ann.append("first").unwrap();
    ann.append("second").unwrap();
    ann.append("third").unwrap();
    pump(&mut ann, 3).await;
    pump(&mut ben, 3).await;

    ann.edit(1, "v1").unwrap();
    ann.edit(1, "v2").unwrap();
    assert_eq!(
        pump(&mut ann, 2).await,
        vec![Applied::Edited { index: 1 }, Applied::Edited { index: 1 }]
    );
    pump(&mut ben, 2).await;
    assert_eq!(ben.rendered(), vec!["ann: first", "ann: v2", "ann: third"]);

    ann.delete(0).unwrap();
    assert_eq!(pump(&mut ben, 1).await, vec![Applied::Deleted { index: 0 }]);
    pump(&mut ann, 1).await;
    assert_eq!(ben.rendered(), vec!["ann: v2", "ann: third"]);
    assert_eq!(ann.rendered(), ben.rendered());

    // Not ben's to change; nothing reaches the relay.
    assert!(matches!(
        ben.delete(0),
        Err(SessionError::Sync(SyncError::NotOwner { .. }))
    ));
    assert_eq!(hub.entry_count(), 2);
}

#[tokio::test]
async fn test_edit_racing_delete_is_rejected() {
    let hub = Arc::new(Hub::new());
    let (_, mut ann) = attach(&hub, "ann");
    let (_, mut ben) = attach(&hub, "ben");
    pump(&mut ann, 1).await;
    pump(&mut ben, 1).await;

    ann.append("doomed").unwrap();
    pump(&mut ann, 1).await;
    pump(&mut ben, 1).await;

    // Both intents leave before the delete echo arrives.
    ann.delete(0).unwrap();
    ann.edit(0, "too late").unwrap();

    let applied = pump(&mut ann, 2).await;
    assert_eq!(applied[0], Applied::Deleted { index: 0 });
    assert!(matches!(applied[1], Applied::Rejected { id: 1, .. }));

    assert_eq!(pump(&mut ben, 1).await, vec![Applied::Deleted { index: 0 }]);
    assert!(ann.entries().is_empty());
    assert!(ben.entries().is_empty());
}

#[tokio::test]
async fn test_late_joiner_gets_snapshot() {
    let hub = Arc::new(Hub::new());
    let (_, mut ann) = attach(&hub, "ann");
    pump(&mut ann, 1).await;
    ann.append("one").unwrap();
    ann.append("two").unwrap();
    ann.append("three").unwrap();
    pump(&mut ann, 3).await;
    ann.delete(1).unwrap();
    pump(&mut ann, 1).await;

    let (_, mut cat) = attach(&hub, "cat");
    assert_eq!(next(&mut cat).await, Some(Applied::Snapshot { len: 2 }));
    assert_eq!(cat.rendered(), vec!["ann: one", "ann: three"]);

    // Ids survive the snapshot, so later mutations still land.
    ann.edit(1, "3").unwrap();
    assert_eq!(next(&mut cat).await, Some(Applied::Edited { index: 1 }));
    assert_eq!(cat.rendered(), vec!["ann: one", "ann: 3"]);
}

#[tokio::test]
async fn test_relay_disconnect_ends_session() {
    let hub = Arc::new(Hub::new());
    let (peer_id, mut ann) = attach(&hub, "ann");
    pump(&mut ann, 1).await;
    ann.append("hello").unwrap();
    pump(&mut ann, 1).await;

    hub.disconnect(&peer_id);
    assert_eq!(next(&mut ann).await, None);
    assert!(!ann.is_connected());
    assert!(ann.entries().is_empty());
    assert!(matches!(ann.append("again"), Err(SessionError::NotConnected)));

    // The relay keeps the log for the next session.
    let (_, mut ann_again) = attach(&hub, "ann");
    assert_eq!(next(&mut ann_again).await, Some(Applied::Snapshot { len: 1 }));
}

#[tokio::test]
async fn test_sessions_over_websocket() {
    let state = Arc::new(AppState::new(fc_common::AppConfig::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = fc_relay::app(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let url = format!("ws://{addr}/ws");
    let mut ann = Session::connect(&url, "ann").await.unwrap();
    let mut ben = Session::connect(&url, "ben").await.unwrap();
    pump(&mut ann, 1).await;
    pump(&mut ben, 1).await;

    ann.append("over the wire").unwrap();
    assert_eq!(next(&mut ben).await, Some(Applied::Appended { index: 0 }));
    assert_eq!(next(&mut ann).await, Some(Applied::Appended { index: 0 }));
    assert_eq!(ben.rendered(), vec!["ann: over the wire"]);
    assert_eq!(ben.entries()[0].id, 1);

    assert!(matches!(
        Session::connect(&url, "  ").await,
        Err(SessionError::EmptyDisplayName)
    ));

    ann.disconnect();
    ben.disconnect();
    assert_eq!(state.hub.entry_count(), 1);
}
