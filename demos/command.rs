//! One-shot administrative command
//!
//! Usage: cargo run --example command -- [host[:port]] [password] <command...>
//!
//!   cargo run --example command -- localhost ClueCon status
//!   cargo run --example command -- 10.0.0.5:8021 secret sofia profile external rescan

use freeswitch_esl_control::{EslClient, EslConfig, EslError, DEFAULT_ESL_PORT};
use std::time::Duration;
use tracing::{error, info};

fn parse_host(arg: Option<&str>) -> Result<(String, u16), Box<dyn std::error::Error>> {
    match arg {
        Some(hp) => match hp.split_once(':') {
            Some((host, port)) => Ok((host.to_string(), port.parse()?)),
            None => Ok((hp.to_string(), DEFAULT_ESL_PORT)),
        },
        None => Ok(("localhost".to_string(), DEFAULT_ESL_PORT)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args()
        .skip(1)
        .collect();
    let (host, port) = parse_host(
        args.first()
            .map(|s| s.as_str()),
    )?;
    let password = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("ClueCon");
    let command = if args.len() > 2 {
        args[2..].join(" ")
    } else {
        "status".to_string()
    };

    let config = EslConfig::new(host, port, password).with_command_timeout(Duration::from_secs(10));
    let client = EslClient::new(config);

    info!("Running '{}'", command);
    match client
        .execute_command(&command)
        .await
    {
        Ok(body) => {
            print!("{}", body);
            Ok(())
        }
        Err(EslError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            error!("Failed to connect to FreeSWITCH - is mod_event_socket listening?");
            Err(e.into())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e.into())
        }
    }
}
