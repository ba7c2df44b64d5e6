//! The process-wide handle: one endpoint, one signer, one tracker and one
//! view model shared by every clone.

use crate::{
    Error,
    Result,
    retry::{
        RetryPolicy,
        retry_read,
    },
    rpc::{
        ChainClient,
        HttpTransport,
        Transport,
    },
    tracker::{
        Tracker,
        TrackerConfig,
    },
    view_model::ViewModel,
};
use alloy_primitives::Address;
use bingo_abi::{
    ContractKind,
    bingo_game,
    cartela,
};
use deployments::DeploymentRecord;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractAddresses {
    pub cartela: Address,
    pub bingo_game: Address,
}

impl ContractAddresses {
    pub fn of(&self, kind: ContractKind) -> Address {
        match kind {
            ContractKind::Cartela => self.cartela,
            ContractKind::BingoGame => self.bingo_game,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub request_timeout: Duration,
    /// Connecting fails when the node reports a different chain.
    pub chain_id: Option<u64>,
    pub contracts: ContractAddresses,
    /// Defaults to the node's first account.
    pub sender: Option<Address>,
    /// Source of the recorded ABI fingerprints, when known.
    pub deployment: Option<DeploymentRecord>,
    pub tracker: TrackerConfig,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(rpc_url: impl Into<String>, contracts: ContractAddresses) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            request_timeout: Duration::from_secs(10),
            chain_id: None,
            contracts,
            sender: None,
            deployment: None,
            tracker: TrackerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_deployment(record: &DeploymentRecord) -> Result<Self> {
        let address = |raw: &str, which: &str| {
            raw.parse::<Address>().map_err(|e| {
                Error::Configuration(format!("deployment {which} address `{raw}`: {e}"))
            })
        };
        let contracts = ContractAddresses {
            cartela: address(&record.cartela_contract, "cartela")?,
            bingo_game: address(&record.bingo_game_contract, "bingo game")?,
        };
        let mut config = Self::new(record.network_url.clone(), contracts);
        config.chain_id = Some(record.chain_id);
        config.deployment = Some(record.clone());
        Ok(config)
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = rpc_url.into();
        self
    }

    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that need no network access.
    fn verify(&self) -> Result<()> {
        for (kind, address) in [
            (ContractKind::Cartela, self.contracts.cartela),
            (ContractKind::BingoGame, self.contracts.bingo_game),
        ] {
            if address.is_zero() {
                return Err(Error::Configuration(format!("no address configured for {kind}")));
            }
        }
        let Some(record) = &self.deployment else {
            return Ok(());
        };
        let cartela_fp = cartela::abi().fingerprint();
        let bingo_game_fp = bingo_game::abi().fingerprint();
        if record.is_compatible_with(&cartela_fp, &bingo_game_fp) {
            return Ok(());
        }
        let mismatched: Vec<String> = [
            (ContractKind::Cartela, &record.cartela_abi_fingerprint, cartela_fp),
            (ContractKind::BingoGame, &record.bingo_game_abi_fingerprint, bingo_game_fp),
        ]
        .into_iter()
        .filter_map(|(kind, recorded, local)| {
            let recorded = recorded.as_deref()?;
            (recorded != local).then(|| format!("{kind} (deployed {recorded}, client {local})"))
        })
        .collect();
        Err(Error::Configuration(format!(
            "ABI fingerprint mismatch for {}",
            mismatched.join(", ")
        )))
    }
}

/// Connects over HTTP.
pub async fn connect(config: ClientConfig) -> Result<Connection<HttpTransport>> {
    config.verify()?;
    let transport = HttpTransport::new(config.rpc_url.clone(), config.request_timeout)?;
    Connection::with_transport(config, transport).await
}

pub struct Connection<T> {
    client: ChainClient<T>,
    tracker: Tracker<T>,
    view: ViewModel<T>,
    contracts: ContractAddresses,
    sender: Address,
    chain_id: u64,
    retry: RetryPolicy,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            tracker: self.tracker.clone(),
            view: self.view.clone(),
            contracts: self.contracts,
            sender: self.sender,
            chain_id: self.chain_id,
            retry: self.retry.clone(),
        }
    }
}

impl<T: Transport> Connection<T> {
    pub async fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.verify()?;
        let client = ChainClient::new(transport);

        let chain_id = retry_read(&config.retry, "eth_chainId", || client.chain_id()).await?;
        if let Some(expected) = config.chain_id {
            if expected != chain_id {
                return Err(Error::Configuration(format!(
                    "expected chain id {expected}, node at {} reports {chain_id}",
                    config.rpc_url
                )));
            }
        }

        let sender = match config.sender {
            Some(sender) => sender,
            None => retry_read(&config.retry, "eth_accounts", || client.accounts())
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::Configuration(
                        "node exposes no accounts; configure a sender".to_string(),
                    )
                })?,
        };

        let tracker = Tracker::new(client.clone(), config.tracker.clone());
        let view = ViewModel::new(client.clone(), config.contracts, config.retry.clone());
        info!(
            rpc_url = %config.rpc_url,
            chain_id,
            %sender,
            cartela = %config.contracts.cartela,
            bingo_game = %config.contracts.bingo_game,
            "connected"
        );
        Ok(Self {
            client,
            tracker,
            view,
            contracts: config.contracts,
            sender,
            chain_id,
            retry: config.retry,
        })
    }

    pub fn client(&self) -> &ChainClient<T> {
        &self.client
    }

    pub fn tracker(&self) -> &Tracker<T> {
        &self.tracker
    }

    pub fn view(&self) -> &ViewModel<T> {
        &self.view
    }

    pub fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Stops all lifecycle polling. Transactions already broadcast stay
    /// broadcast.
    pub fn disconnect(self) {
        info!(chain_id = self.chain_id, "disconnecting");
        self.tracker.shutdown();
    }
}
