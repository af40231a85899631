//! Output formatting for CLI client commands.
//!
//! Scalars print on one line, account lists as tables. Events print
//! one per line so `watch` output can be piped through `grep`.

use crate::events::PropertyBag;
use crate::telephony::{PhoneAccount, PhoneAccountHandle};

use super::broker_client::{InvokeResult, ReceivedEvent};

/// Print the result of an invoke to stdout.
pub fn print_result(result: &InvokeResult) {
    let mut printed = false;
    if let Some(value) = &result.value {
        println!("{value}");
        printed = true;
    }
    if let Some(accounts) = &result.accounts {
        print_accounts(accounts);
        printed = true;
    }
    if let Some(handles) = &result.handles {
        print_handles(handles);
        printed = true;
    }
    if let Some(handle) = &result.handle {
        println!("{}", format_handle(handle));
        printed = true;
    }
    if !printed {
        println!("ok");
    }
}

fn print_accounts(accounts: &[PhoneAccount]) {
    if accounts.is_empty() {
        println!("No phone accounts");
        return;
    }

    println!("{:<32} {:<20} {:>6} ADDRESS", "HANDLE", "LABEL", "SUB");
    println!("{}", "-".repeat(76));
    for a in accounts {
        println!(
            "{:<32} {:<20} {:>6} {}",
            a.handle.id,
            a.label,
            a.subscription_id
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            a.address.as_deref().unwrap_or("-"),
        );
    }
}

fn print_handles(handles: &[PhoneAccountHandle]) {
    if handles.is_empty() {
        println!("No phone account handles");
        return;
    }
    for h in handles {
        println!("{}", format_handle(h));
    }
}

/// Print one state event to stdout.
pub fn print_event(event: &ReceivedEvent) {
    println!(
        "{} {} {}",
        event.timestamp,
        event.name,
        format_properties(&event.properties)
    );
}

/// Print inject success.
pub fn print_injected(kind: &str) {
    println!("Injected {kind}");
}

fn format_handle(handle: &PhoneAccountHandle) -> String {
    format!("{} ({})", handle.id, handle.component)
}

/// Format a bag as space-separated `key=value` pairs, in order.
fn format_properties(properties: &PropertyBag) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
