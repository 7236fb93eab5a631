pub mod interfaces;
pub mod trace;

pub use interfaces::{ContractInterface, InterfaceSet, ParsedEvent, SignatureParseError};
pub use trace::{decode_logs, EventTrace, TraceEntry, NO_EVENTS, TRACE_SEPARATOR};
