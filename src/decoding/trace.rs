use alloy::rpc::types::Log;

use super::interfaces::InterfaceSet;

/// Sentinel written when no log in a receipt matched any known interface.
/// Real tokens always contain a `:` so the sentinel can never collide with
/// decoded content.
pub const NO_EVENTS: &str = "NoEvents";

/// Separator between trace tokens in the flattened form.
pub const TRACE_SEPARATOR: &str = "->";

/// One decoded log: which interface claimed it and the event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub interface: String,
    pub event: String,
}

/// Ordered list of decoded event names for one receipt. Ordering matches
/// the log ordering in the receipt; logs matching no interface contribute
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct EventTrace {
    entries: Vec<TraceEntry>,
}

impl EventTrace {
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the trace contains a specific `interface:Event` token.
    pub fn contains(&self, interface: &str, event: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.interface == interface && e.event == event)
    }

    /// Flatten to `iface:Event->iface:Event`, or the `NoEvents` sentinel.
    pub fn flatten(&self) -> String {
        if self.entries.is_empty() {
            return NO_EVENTS.to_string();
        }
        self.entries
            .iter()
            .map(|e| format!("{}:{}", e.interface, e.event))
            .collect::<Vec<_>>()
            .join(TRACE_SEPARATOR)
    }
}

/// Decode every receipt log against the interface set. Per log, interfaces
/// are tried in set order and the first topic0 match wins; non-matching
/// logs are dropped silently.
pub fn decode_logs(logs: &[Log], interfaces: &InterfaceSet) -> EventTrace {
    let mut entries = Vec::new();

    for log in logs {
        let topic0 = match log.inner.data.topics().first() {
            Some(t) => t,
            None => continue,
        };

        for interface in interfaces.interfaces() {
            if let Some(event) = interface.match_topic(topic0) {
                entries.push(TraceEntry {
                    interface: interface.name.clone(),
                    event: event.name.clone(),
                });
                break;
            }
        }
    }

    EventTrace { entries }
}
