use crate::rpc::{
    RpcError,
    TransportError,
    TxHash,
    revert_data,
};
use alloy_primitives::U256;
use bingo_abi::AbiError;
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejections raised by the contracts themselves, or by the node on their
/// behalf.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("transaction reverted: {}", reason_or_default(.reason))]
    Reverted { reason: Option<String> },
    #[error("nonce conflict ({message}); resubmit only after confirming with the user")]
    NonceConflict { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),
    #[error("request rejected by the user: {0}")]
    UserRejected(String),
    #[error("insufficient funds{}: {message}", shortfall_suffix(.shortfall))]
    InsufficientFunds {
        shortfall: Option<U256>,
        message: String,
    },
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("decoding error: {0}")]
    Decoding(String),
    #[error(
        "transaction {hash} not settled after {}s; outcome unknown, check a block explorer",
        whole_seconds(.waited)
    )]
    Timeout { hash: TxHash, waited: Duration },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("inconsistent chain state: {0}")]
    Inconsistent(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    UserRejected,
    InsufficientFunds,
    Reverted,
    NonceConflict,
    Encoding,
    Decoding,
    Timeout,
    Configuration,
    InvalidInput,
    Inconsistent,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::UserRejected(_) => ErrorKind::UserRejected,
            Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Error::Contract(ContractError::Reverted { .. }) => ErrorKind::Reverted,
            Error::Contract(ContractError::NonceConflict { .. }) => {
                ErrorKind::NonceConflict
            }
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Decoding(_) => ErrorKind::Decoding,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Inconsistent(_) => ErrorKind::Inconsistent,
        }
    }

    /// Only transport failures are worth another attempt, and only for reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Outcomes where the caller may offer the user an explicit resubmission.
    pub fn needs_user_confirmation(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Contract(ContractError::NonceConflict { .. })
        )
    }
}

fn reason_or_default(reason: &Option<String>) -> &str {
    reason.as_deref().unwrap_or("no reason given")
}

fn whole_seconds(waited: &Duration) -> u64 {
    waited.as_secs()
}

fn shortfall_suffix(shortfall: &Option<U256>) -> String {
    match shortfall {
        Some(missing) => format!(" (short by {missing} wei)"),
        None => String::new(),
    }
}

impl From<AbiError> for Error {
    fn from(err: AbiError) -> Self {
        match err {
            AbiError::Encoding(message) => Error::Encoding(message),
            AbiError::Decoding(message) => Error::Decoding(message),
            AbiError::Registry(message) => Error::Configuration(message),
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(message) => Error::Network(message),
            TransportError::Rpc(object) => classify_rpc_error(&object),
            TransportError::Malformed(message) => Error::Decoding(message),
        }
    }
}

const USER_REJECTED_CODE: i64 = 4001;
const EXECUTION_REVERTED_CODE: i64 = 3;

const NONCE_CONFLICT_MESSAGES: [&str; 4] = [
    "nonce too low",
    "nonce too high",
    "replacement transaction underpriced",
    "already known",
];

/// Maps a JSON-RPC error object onto the client taxonomy.
pub fn classify_rpc_error(object: &RpcError) -> Error {
    let message = object.message.to_lowercase();

    if object.code == USER_REJECTED_CODE
        || message.contains("user rejected")
        || message.contains("user denied")
    {
        return Error::UserRejected(object.message.to_string());
    }
    if message.contains("insufficient funds") {
        return Error::InsufficientFunds {
            shortfall: parse_shortfall(&message),
            message: object.message.to_string(),
        };
    }
    if NONCE_CONFLICT_MESSAGES
        .iter()
        .any(|pattern| message.contains(pattern))
    {
        return ContractError::NonceConflict {
            message: object.message.to_string(),
        }
        .into();
    }

    let revert = revert_data(object);
    if object.code == EXECUTION_REVERTED_CODE
        || message.contains("execution reverted")
        || revert.is_some()
    {
        let reason = revert
            .and_then(|data| bingo_abi::decode_revert_reason(&data))
            .or_else(|| reason_from_message(&object.message));
        return ContractError::Reverted { reason }.into();
    }

    Error::Network(format!("rpc error {}: {}", object.code, object.message))
}

/// geth reports `... have 1000 want 2500`.
fn parse_shortfall(message: &str) -> Option<U256> {
    let amount_after = |marker: &str| {
        let start = message.find(marker)? + marker.len();
        let digits: String = message[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        U256::from_str_radix(&digits, 10).ok()
    };
    let have = amount_after("have ")?;
    let want = amount_after("want ")?;
    Some(want.saturating_sub(have))
}

fn reason_from_message(message: &str) -> Option<String> {
    let (_, reason) = message.split_once("execution reverted:")?;
    let reason = reason.trim();
    (!reason.is_empty()).then(|| reason.to_string())
}
