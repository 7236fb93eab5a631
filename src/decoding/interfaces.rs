use alloy::primitives::{keccak256, B256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureParseError {
    #[error("Invalid event signature: {0}")]
    InvalidSignature(String),
    #[error("Missing closing parenthesis")]
    MissingCloseParen,
    #[error("Empty parameter in signature: {0}")]
    EmptyParam(String),
}

/// An event schema known to the decoder: name plus the topic0 derived from
/// its canonical signature.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub name: String,
    pub canonical_signature: String,
    pub topic0: B256,
}

impl ParsedEvent {
    /// Parse a human-readable ABI signature like
    /// `Transfer(address indexed from, address indexed to, uint256 value)`.
    /// Parameter names and `indexed` markers are stripped to produce the
    /// canonical signature the topic hash is computed from.
    pub fn from_signature(signature: &str) -> Result<Self, SignatureParseError> {
        let signature = signature.trim();

        let open_paren = signature
            .find('(')
            .ok_or_else(|| SignatureParseError::InvalidSignature(signature.to_string()))?;

        let name = signature[..open_paren].trim().to_string();
        if name.is_empty() {
            return Err(SignatureParseError::InvalidSignature(
                "empty event name".to_string(),
            ));
        }

        let close_paren = find_matching_close_paren(signature, open_paren)
            .ok_or(SignatureParseError::MissingCloseParen)?;
        if signature[close_paren + 1..].trim() != "" {
            return Err(SignatureParseError::InvalidSignature(signature.to_string()));
        }

        let params_str = &signature[open_paren + 1..close_paren];
        let canonical_types = canonicalize_params(params_str)?;
        let canonical_signature = format!("{}({})", name, canonical_types.join(","));
        let topic0 = keccak256(canonical_signature.as_bytes());

        Ok(Self {
            name,
            canonical_signature,
            topic0,
        })
    }
}

/// A named contract interface: an ordered set of event schemas.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    pub name: String,
    events: Vec<ParsedEvent>,
}

impl ContractInterface {
    pub fn new(name: &str, signatures: &[&str]) -> Result<Self, SignatureParseError> {
        let events = signatures
            .iter()
            .map(|sig| ParsedEvent::from_signature(sig))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            events,
        })
    }

    /// Find the event whose topic0 matches, if any.
    pub fn match_topic(&self, topic0: &B256) -> Option<&ParsedEvent> {
        self.events.iter().find(|e| &e.topic0 == topic0)
    }
}

/// The interfaces a log is decoded against, in fixed precedence order: when
/// a log satisfies more than one schema the earliest interface wins.
#[derive(Debug, Clone)]
pub struct InterfaceSet {
    interfaces: Vec<ContractInterface>,
}

impl InterfaceSet {
    pub fn new(interfaces: Vec<ContractInterface>) -> Self {
        Self { interfaces }
    }

    pub fn interfaces(&self) -> &[ContractInterface] {
        &self.interfaces
    }

    /// The bridge contract interfaces the ledger's transactions touch.
    /// Precedence: connext, spokeConnector, hubConnector, rootManager.
    pub fn bridge_default() -> Self {
        let connext = ContractInterface::new(
            "connext",
            &[
                "XCalled(bytes32 indexed transferId, uint256 indexed nonce, bytes32 indexed messageHash, address asset, uint256 amount, address local, bytes callData)",
                "Executed(bytes32 indexed transferId, address indexed to, address indexed asset, uint256 amount, address caller)",
                "Reconciled(bytes32 indexed transferId, uint32 indexed originDomain, address indexed local, uint256 amount, address caller)",
                "TransferRelayerFeesIncreased(bytes32 indexed transferId, uint256 increase, address caller)",
                "RouterLiquidityAdded(address indexed router, address local, bytes32 key, uint256 amount, address caller)",
                "RouterLiquidityRemoved(address indexed router, address recipient, address local, bytes32 key, uint256 amount, address caller)",
            ],
        );
        let spoke_connector = ContractInterface::new(
            "spokeConnector",
            &[
                "MessageSent(bytes data, bytes encodedData, address caller)",
                "MessageProcessed(bytes data, address caller)",
                "AggregateRootReceived(bytes32 indexed root)",
                "Dispatch(bytes32 leaf, uint256 index, bytes32 root, bytes message)",
                "Process(bytes32 leaf, bool success, bytes returnData)",
            ],
        );
        let hub_connector = ContractInterface::new(
            "hubConnector",
            &[
                "MessageSent(bytes data, bytes encodedData, address caller)",
                "MessageProcessed(bytes data, address caller)",
                "MirrorConnectorUpdated(address previous, address current)",
            ],
        );
        let root_manager = ContractInterface::new(
            "rootManager",
            &[
                "RootAggregated(uint32 domain, bytes32 receivedRoot, uint256 queueIndex)",
                "RootPropagated(bytes32 aggregateRoot, uint256 count, bytes32 domainsHash)",
                "ConnectorAdded(uint32 domain, address connector, uint32[] domains, address[] connectors)",
                "ConnectorRemoved(uint32 domain, address connector, uint32[] domains, address[] connectors, address caller)",
            ],
        );

        // The built-in signatures are static and must parse.
        Self::new(vec![
            connext.expect("connext interface signatures"),
            spoke_connector.expect("spokeConnector interface signatures"),
            hub_connector.expect("hubConnector interface signatures"),
            root_manager.expect("rootManager interface signatures"),
        ])
    }
}

/// Find the matching close paren for an open paren at the given position.
fn find_matching_close_paren(s: &str, open_pos: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, c) in s[open_pos..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_pos + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a parameter list by top-level commas, respecting nested
/// parentheses, and reduce each parameter to its canonical type.
fn canonicalize_params(params_str: &str) -> Result<Vec<String>, SignatureParseError> {
    let params_str = params_str.trim();
    if params_str.is_empty() {
        return Ok(Vec::new());
    }

    let mut types = Vec::new();
    for part in split_top_level(params_str) {
        let part = part.trim();
        if part.is_empty() {
            return Err(SignatureParseError::EmptyParam(params_str.to_string()));
        }
        types.push(canonical_type(part)?);
    }
    Ok(types)
}

/// Reduce one parameter ("uint256 indexed value", "(address a, address b) key",
/// "uint32[] domains") to its canonical type token.
fn canonical_type(param: &str) -> Result<String, SignatureParseError> {
    if param.starts_with('(') {
        let close = find_matching_close_paren(param, 0)
            .ok_or(SignatureParseError::MissingCloseParen)?;
        let inner = canonicalize_params(&param[1..close])?;
        // Array suffix may directly follow the tuple, before any name.
        let suffix: String = param[close + 1..]
            .chars()
            .take_while(|c| *c == '[' || *c == ']')
            .collect();
        return Ok(format!("({}){}", inner.join(","), suffix));
    }

    // First whitespace token is the type; the rest is `indexed` and/or a name.
    let type_token = param
        .split_whitespace()
        .next()
        .ok_or_else(|| SignatureParseError::EmptyParam(param.to_string()))?;
    Ok(type_token.to_string())
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < s.len() {
        parts.push(&s[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_transfer_signature() {
        let sig = "Transfer(address indexed from, address indexed to, uint256 value)";
        let parsed = ParsedEvent::from_signature(sig).unwrap();
        assert_eq!(parsed.name, "Transfer");
        assert_eq!(
            parsed.canonical_signature,
            "Transfer(address,address,uint256)"
        );
        // Known keccak256 of "Transfer(address,address,uint256)".
        assert_eq!(
            format!("{:?}", parsed.topic0),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn canonicalizes_tuple_and_array_params() {
        let sig = "Settled((address a, uint256 b) key, uint32[] domains)";
        let parsed = ParsedEvent::from_signature(sig).unwrap();
        assert_eq!(
            parsed.canonical_signature,
            "Settled((address,uint256),uint32[])"
        );
    }

    #[test]
    fn empty_params_allowed() {
        let parsed = ParsedEvent::from_signature("Paused()").unwrap();
        assert_eq!(parsed.canonical_signature, "Paused()");
    }

    #[test]
    fn rejects_missing_parens() {
        assert!(matches!(
            ParsedEvent::from_signature("Transfer"),
            Err(SignatureParseError::InvalidSignature(_))
        ));
        assert!(matches!(
            ParsedEvent::from_signature("Transfer(address"),
            Err(SignatureParseError::MissingCloseParen)
        ));
    }

    #[test]
    fn bridge_default_precedence_order() {
        let set = InterfaceSet::bridge_default();
        let names: Vec<&str> = set.interfaces().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["connext", "spokeConnector", "hubConnector", "rootManager"]
        );
    }

    #[test]
    fn interface_matches_by_topic() {
        let iface = ContractInterface::new(
            "connext",
            &["Executed(bytes32 indexed transferId, address indexed to, address indexed asset, uint256 amount, address caller)"],
        )
        .unwrap();
        let topic0 = keccak256("Executed(bytes32,address,address,uint256,address)".as_bytes());
        assert_eq!(iface.match_topic(&topic0).unwrap().name, "Executed");
        assert!(iface.match_topic(&B256::ZERO).is_none());
    }
}
