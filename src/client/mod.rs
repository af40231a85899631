//! CLI client for the facade daemon.
//!
//! `invoke` runs one command and prints its result. `watch` starts
//! tracking the requested categories and prints events until the
//! count is reached or the daemon goes away. `inject` connects as a
//! harness and feeds one platform payload.

mod broker_client;
mod format;

use std::path::PathBuf;

use crate::broker;
use crate::cli::{ClientAction, WatchCategory};
use crate::ipc::protocol::{Command, Role};
use crate::telephony::SubscriptionId;
use broker_client::{BrokerClient, build_command, build_payload, parse_params};

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("broker: {0}")]
    Broker(String),
    #[error("usage: {0}")]
    Usage(String),
    #[error(transparent)]
    NoSocket(#[from] broker::BrokerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command.
///
/// Connects to the daemon, performs the requested action, prints the
/// result, and returns. Called from `main.rs` for `Command::Client`.
pub async fn run(socket: Option<PathBuf>, action: ClientAction) -> Result<(), ClientError> {
    let socket_path = match socket {
        Some(path) => path,
        None => broker::default_socket_path()?,
    };

    match action {
        ClientAction::Invoke { method, params } => {
            let call = build_command(&method, &parse_params(&params)?)?;
            let mut broker = BrokerClient::connect(&socket_path, Role::Client).await?;
            let result = broker.invoke(call).await?;
            format::print_result(&result);
        }
        ClientAction::Watch {
            categories,
            sub_id,
            count,
        } => {
            let mut broker = BrokerClient::connect(&socket_path, Role::Client).await?;
            let sub_id = sub_id.map(SubscriptionId);
            for category in categories {
                broker.invoke(start_tracking(category, sub_id)).await?;
            }
            let mut seen = 0;
            while count.is_none_or(|limit| seen < limit) {
                let Some(event) = broker.next_event().await? else {
                    break;
                };
                format::print_event(&event);
                seen += 1;
            }
        }
        ClientAction::Inject {
            kind,
            params,
            sub_id,
        } => {
            let payload = build_payload(&kind, &parse_params(&params)?)?;
            let mut broker = BrokerClient::connect(&socket_path, Role::Harness).await?;
            broker.inject(sub_id.map(SubscriptionId), payload).await?;
            format::print_injected(&kind);
        }
    }

    Ok(())
}

/// The start-tracking command for a watched category.
fn start_tracking(category: WatchCategory, sub_id: Option<SubscriptionId>) -> Command {
    match (category, sub_id) {
        (WatchCategory::Call, None) => Command::StartTrackingCallState,
        (WatchCategory::Call, Some(sub_id)) => {
            Command::StartTrackingCallStateForSubscription { sub_id }
        }
        (WatchCategory::PowerLevel, None) => Command::StartTrackingDataConnectionRTInfo,
        (WatchCategory::PowerLevel, Some(sub_id)) => {
            Command::StartTrackingDataConnectionRTInfoForSubscription { sub_id }
        }
        (WatchCategory::DataConnection, None) => Command::StartTrackingDataConnectionStateChange,
        (WatchCategory::DataConnection, Some(sub_id)) => {
            Command::StartTrackingDataConnectionStateChangeForSubscription { sub_id }
        }
        (WatchCategory::Service, None) => Command::StartTrackingServiceStateChange,
        (WatchCategory::Service, Some(sub_id)) => {
            Command::StartTrackingServiceStateChangeForSubscription { sub_id }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::telephony::sim::SimulatedPlatform;

    #[test]
    fn watch_categories_map_to_tracking_commands() {
        assert_eq!(
            start_tracking(WatchCategory::Call, None),
            Command::StartTrackingCallState
        );
        assert_eq!(
            start_tracking(WatchCategory::Service, Some(SubscriptionId(2))),
            Command::StartTrackingServiceStateChangeForSubscription {
                sub_id: SubscriptionId(2)
            }
        );
    }

    #[tokio::test]
    async fn bad_params_fail_before_connecting() {
        let err = run(
            Some(PathBuf::from("/nonexistent/facade.sock")),
            ClientAction::Invoke {
                method: "telecomDialNumber".into(),
                params: vec!["oops".into()],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
    }

    #[tokio::test]
    async fn invoke_and_inject_against_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("facade.sock");
        let platform = Arc::new(SimulatedPlatform::with_sim_accounts(1, SubscriptionId(1)));
        let served = platform.clone();
        let path = sock.clone();
        tokio::spawn(async move { broker::run(Some(path), served).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut watcher = BrokerClient::connect(&sock, Role::Client).await.unwrap();
        watcher
            .invoke(start_tracking(WatchCategory::Call, None))
            .await
            .unwrap();

        run(
            Some(sock.clone()),
            ClientAction::Inject {
                kind: "call_state".into(),
                params: vec!["state:=1".into(), "incoming_number=2025550123".into()],
                sub_id: None,
            },
        )
        .await
        .unwrap();

        let event = watcher.next_event().await.unwrap().unwrap();
        assert_eq!(event.name, "onCallStateChangedRinging");

        let result = watcher
            .invoke(build_command("telecomIsRinging", &Default::default()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            result.value,
            Some(crate::events::PropertyValue::Bool(true))
        );
    }
}
