//! Reconnect and resubscribe behaviour of the event supervisor


use freeswitch_esl_control::{
    BackoffConfig, EslClient, EslConfig, HandlerRegistry, Subscription, SupervisorState,
};
use mock_server::MockEslServer;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const PASSWORD: &str = "ClueCon";

async fn wait_for_state<F>(rx: &mut watch::Receiver<SupervisorState>, pred: F) -> SupervisorState
where
    F: Fn(&SupervisorState) -> bool,
{
    let wait = async {
        loop {
            let state = rx
                .borrow_and_update()
                .clone();
            if pred(&state) {
                return state;
            }
            if rx
                .changed()
                .await
                .is_err()
            {
                return rx
                    .borrow()
                    .clone();
            }
        }
    };
    timeout(Duration::from_secs(5), wait)
        .await
        .expect("supervisor state not reached")
}

#[tokio::test]
async fn test_resubscribes_after_connection_loss() {
    let server = MockEslServer::start(PASSWORD).await;
    let client = EslClient::new(server.config(PASSWORD));

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = assert_ok!(client.subscribe_events(
        ["CHANNEL_CREATE", "CHANNEL_ANSWER"],
        move |event| {
            let _ = tx.send(
                event
                    .unique_id()
                    .unwrap_or_default()
                    .to_string(),
            );
            Ok(())
        }
    ));
    let mut states = handle.watch_state();

    let server_task = tokio::spawn(async move {
        let mut first = server
            .accept()
            .await;
        let first_cmd = first
            .read_command()
            .await;
        first
            .reply_ok()
            .await;
        first
            .send_event_plain("CHANNEL_CREATE", &[("Unique-ID", "before")])
            .await;
        // Give the client time to read the event before the socket goes away
        tokio::time::sleep(Duration::from_millis(50)).await;
        first
            .drop_connection()
            .await;

        let mut second = server
            .accept()
            .await;
        let second_cmd = second
            .read_command()
            .await;
        second
            .reply_ok()
            .await;
        second
            .send_event_plain("CHANNEL_ANSWER", &[("Unique-ID", "after")])
            .await;
        (first_cmd, second_cmd, second)
    });

    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "before");
    let second = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "after");

    let (first_cmd, second_cmd, _conn) = server_task
        .await
        .unwrap();
    assert_eq!(first_cmd, "event plain CHANNEL_ANSWER CHANNEL_CREATE\n\n");
    assert_eq!(second_cmd, first_cmd);

    wait_for_state(&mut states, |s| *s == SupervisorState::Running).await;
    handle
        .stop()
        .await;
    assert_eq!(*states.borrow(), SupervisorState::Stopped);
}

#[tokio::test]
async fn test_keeps_retrying_bad_credentials() {
    let server = MockEslServer::start(PASSWORD).await;
    let client = EslClient::new(server.config("not-the-password"));

    let server_task = tokio::spawn(async move {
        loop {
            let (_conn, ok) = server
                .accept_checked()
                .await;
            assert!(!ok);
        }
    });

    let handle = client.supervise(
        Subscription::call_events(),
        HandlerRegistry::new(),
    );
    let mut states = handle.watch_state();

    let reached = wait_for_state(&mut states, |s| match s {
        SupervisorState::Backoff { attempt, .. } => *attempt >= 3,
        SupervisorState::Connecting { attempt } => *attempt >= 4,
        _ => false,
    })
    .await;
    assert_ne!(reached, SupervisorState::Stopped);

    handle
        .stop()
        .await;
    assert_eq!(*states.borrow(), SupervisorState::Stopped);
    server_task.abort();
    assert_err!(server_task.await);
}

#[tokio::test]
async fn test_stop_interrupts_backoff() {
    // Grab a free port, then close it so every connect is refused
    let server = MockEslServer::start(PASSWORD).await;
    let config = server
        .config(PASSWORD)
        .with_backoff(BackoffConfig::fixed(Duration::from_secs(60)));
    drop(server);

    let client = EslClient::new(config);
    let handle = assert_ok!(client.subscribe_configured(HandlerRegistry::new()));
    let mut states = handle.watch_state();

    let backoff = wait_for_state(&mut states, |s| matches!(s, SupervisorState::Backoff { .. })).await;
    assert_eq!(
        backoff,
        SupervisorState::Backoff {
            attempt: 1,
            delay: Duration::from_secs(60),
        }
    );

    assert_ok!(timeout(Duration::from_secs(2), handle.stop()).await);
    assert_eq!(*states.borrow(), SupervisorState::Stopped);
}

#[tokio::test]
async fn test_configured_events_and_late_handlers() {
    let server = MockEslServer::start(PASSWORD).await;
    let config = server
        .config(PASSWORD)
        .with_events(["CHANNEL_HANGUP_COMPLETE"]);
    let client = EslClient::new(config);

    let handle = assert_ok!(client.subscribe_configured(HandlerRegistry::new()));
    let mut states = handle.watch_state();

    let mut conn = server
        .accept()
        .await;
    assert_eq!(
        conn.read_command()
            .await,
        "event plain CHANNEL_HANGUP_COMPLETE\n\n"
    );
    conn.reply_ok()
        .await;
    wait_for_state(&mut states, |s| *s == SupervisorState::Running).await;

    // Handlers registered on a running supervisor see the next event
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    handle
        .registry()
        .on("CHANNEL_HANGUP_COMPLETE", move |event| {
            let _ = tx.send(
                event
                    .header("Hangup-Cause")
                    .unwrap_or_default()
                    .to_string(),
            );
            Ok(())
        });
    conn.send_event_plain(
        "CHANNEL_HANGUP_COMPLETE",
        &[("Unique-ID", "call-1"), ("Hangup-Cause", "NORMAL_CLEARING")],
    )
    .await;

    let cause = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cause, "NORMAL_CLEARING");

    handle
        .stop()
        .await;
    assert!(conn
        .wait_closed()
        .await);
}

/// Free port with nothing listening on it
async fn refused_port() -> u16 {
    let server = MockEslServer::start(PASSWORD).await;
    server.port()
}

/// Record `Running` and `Backoff` states until `done` says stop.
async fn record_states<F>(
    rx: &mut watch::Receiver<SupervisorState>,
    mut done: F,
) -> Vec<SupervisorState>
where
    F: FnMut(&[SupervisorState]) -> bool,
{
    let mut seen: Vec<SupervisorState> = Vec::new();
    let wait = async {
        loop {
            let state = rx
                .borrow_and_update()
                .clone();
            let wanted = matches!(
                state,
                SupervisorState::Running | SupervisorState::Backoff { .. }
            );
            if wanted && seen.last() != Some(&state) {
                seen.push(state);
                if done(&seen) {
                    return;
                }
            }
            rx.changed()
                .await
                .expect("supervisor gone");
        }
    };
    timeout(Duration::from_secs(3600), wait)
        .await
        .expect("states not reached");
    seen
}

#[tokio::test(start_paused = true)]
async fn test_default_backoff_sequence() {
    let port = refused_port().await;
    let client = EslClient::new(EslConfig::new("127.0.0.1", port, PASSWORD));
    assert_eq!(client.config().backoff, BackoffConfig::default());

    let handle = client.supervise(
        Subscription::call_events(),
        HandlerRegistry::new(),
    );
    let mut states = handle.watch_state();

    let seen = record_states(&mut states, |seen| seen.len() == 7).await;
    let expected: Vec<SupervisorState> = [3, 6, 12, 24, 30, 30, 30]
        .iter()
        .enumerate()
        .map(|(i, secs)| SupervisorState::Backoff {
            attempt: i as u32 + 1,
            delay: Duration::from_secs(*secs),
        })
        .collect();
    assert_eq!(seen, expected);

    handle
        .stop()
        .await;
    assert_eq!(*states.borrow(), SupervisorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_after_running() {
    let server = MockEslServer::start(PASSWORD).await;
    let config = server
        .config(PASSWORD)
        .with_backoff(BackoffConfig::default());
    let client = EslClient::new(config);
    let (drop_tx, drop_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        // Two rejected logins, then one session that is later dropped
        for _ in 0..2 {
            let mut conn = server
                .accept_raw()
                .await;
            conn.send_raw("Content-Type: auth/request\n\n")
                .await;
            conn.read_command()
                .await;
            conn.reply_err("invalid")
                .await;
        }
        let mut conn = server
            .accept()
            .await;
        conn.read_command()
            .await;
        conn.reply_ok()
            .await;
        let _ = drop_rx.await;
        conn.drop_connection()
            .await;
    });

    let handle = assert_ok!(client.subscribe_configured(HandlerRegistry::new()));
    let mut states = handle.watch_state();

    let mut drop_tx = Some(drop_tx);
    let seen = record_states(&mut states, |seen| {
        if seen.last() == Some(&SupervisorState::Running) {
            if let Some(tx) = drop_tx.take() {
                let _ = tx.send(());
            }
        }
        seen.len() == 4
    })
    .await;

    assert_eq!(
        seen,
        vec![
            SupervisorState::Backoff {
                attempt: 1,
                delay: Duration::from_secs(3),
            },
            SupervisorState::Backoff {
                attempt: 2,
                delay: Duration::from_secs(6),
            },
            SupervisorState::Running,
            SupervisorState::Backoff {
                attempt: 1,
                delay: Duration::from_secs(3),
            },
        ]
    );

    handle
        .stop()
        .await;
    server_task.abort();
}
