//! Waiting on session events

use ircget::Event;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wait until an event matching `predicate` arrives, collecting everything seen
///
/// Returns `None` on timeout or when the channel closes.
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Option<Vec<Event>>
where
    F: FnMut(&Event) -> bool,
{
    let mut seen = Vec::new();
    let finished = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = predicate(&event);
                    seen.push(event);
                    if done {
                        return true;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    match finished {
        Ok(true) => Some(seen),
        _ => None,
    }
}

/// Wait until the session issues a search for `query`
pub async fn wait_for_search(
    events: &mut broadcast::Receiver<Event>,
    query: &str,
    timeout: Duration,
) -> Option<Vec<Event>> {
    collect_events_until(events, timeout, |event| {
        matches!(event, Event::SearchIssued { query: q } if q == query)
    })
    .await
}
