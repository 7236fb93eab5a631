mod client;

pub use client::{ChainRpcPool, DecodedReceipt, L1FeeInfo, ReceiptSource, RpcClient, RpcError};
