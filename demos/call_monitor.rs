//! Call-lifecycle monitor
//!
//! Subscribes to the five call events, prints each as a JSON line and keeps
//! reconnecting until the run time elapses.
//!
//! Usage: cargo run --example call_monitor -- [host[:port]] [password] [seconds]

use freeswitch_esl_control::{
    CallRecord, EslClient, EslConfig, HandlerRegistry, SupervisorState, DEFAULT_ESL_PORT,
};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args()
        .skip(1)
        .collect();
    let (host, port) = match args
        .first()
        .and_then(|hp| hp.split_once(':'))
    {
        Some((host, port)) => (host.to_string(), port.parse()?),
        None => (
            args.first()
                .cloned()
                .unwrap_or_else(|| "localhost".to_string()),
            DEFAULT_ESL_PORT,
        ),
    };
    let password = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "ClueCon".to_string());
    let run_for = match args.get(2) {
        Some(secs) => Duration::from_secs(secs.parse()?),
        None => Duration::from_secs(300),
    };

    let client = EslClient::new(EslConfig::new(host, port, password));

    let registry = HandlerRegistry::new();
    registry.on_any(|event| {
        match CallRecord::from_event(event) {
            Some(record) => println!("{}", record.to_json()?),
            None => warn!("Unexpected event {}", event.event_name()),
        }
        Ok(())
    });

    let handle = client.subscribe_configured(registry)?;
    let mut states = handle.watch_state();

    let watch_states = async {
        while states
            .changed()
            .await
            .is_ok()
        {
            let state = states
                .borrow_and_update()
                .clone();
            match state {
                SupervisorState::Backoff { attempt, delay } => {
                    warn!("Event channel down, retry {} in {:?}", attempt, delay)
                }
                other => info!("Event channel: {:?}", other),
            }
        }
    };

    tokio::select! {
        _ = watch_states => {}
        _ = tokio::time::sleep(run_for) => info!("Run time elapsed, stopping"),
    }

    handle
        .stop()
        .await;
    Ok(())
}
