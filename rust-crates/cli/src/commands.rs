use crate::{
    Args,
    Command,
    DEFAULT_LOCAL_RPC_URL,
    render,
};
use alloy_primitives::Address;
use bingo_abi::{
    bingo_game,
    cartela,
};
use bingo_client::{
    ClientConfig,
    Error,
    GameClient,
    PendingAction,
    UserConfirmed,
    connect,
    model::{
        CardId,
        Intent,
        RoundId,
        StartRoundParams,
    },
    rpc::{
        ChainClient,
        HttpTransport,
    },
    view_model::Reconciled,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use std::{
    io::{
        self,
        BufRead,
        Write,
    },
    time::Duration,
};

type Game = GameClient<HttpTransport>;

const RECORD_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(args: Args) -> Result<()> {
    deployments::ensure_structure().map_err(|e| eyre!(e))?;
    let env = args.env();
    let store = DeploymentStore::new(env).map_err(|e| eyre!(e))?;

    if let Command::RecordDeployment {
        cartela: cartela_address,
        bingo_game: bingo_game_address,
        block,
    } = args.command
    {
        return record_deployment(
            &store,
            env,
            args.rpc_url,
            cartela_address,
            bingo_game_address,
            block,
        )
        .await;
    }

    let record = store.load().map_err(|e| eyre!(e))?.ok_or_else(|| {
        eyre!("no {env} deployment recorded, run `bingo record-deployment` first")
    })?;
    let config = configure(&args, &record)?;
    let connection = connect(config)
        .await
        .wrap_err_with(|| format!("connecting to the {env} deployment"))?;
    tracing::info!(
        chain_id = connection.chain_id(),
        sender = %connection.sender(),
        "connected"
    );

    let game = GameClient::new(connection.clone());
    let deployed_at = record.deployment_block_height.unwrap_or(0);
    let result = execute(&game, args.command, deployed_at).await;
    connection.disconnect();
    result
}

fn configure(args: &Args, record: &DeploymentRecord) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_deployment(record)?;
    if let Some(url) = &args.rpc_url {
        config = config.with_rpc_url(url.clone());
    }
    if let Some(from) = args.from {
        config = config.with_sender(from);
    }

    let mut tracker = config.tracker.clone();
    if let Some(ms) = args.poll_interval_ms {
        tracker.poll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = args.max_wait_secs {
        tracker.max_wait = Duration::from_secs(secs);
    }
    if let Some(confirmations) = args.confirmations {
        if confirmations == 0 {
            return Err(eyre!("--confirmations must be at least 1"));
        }
        tracker.confirmations = confirmations;
    }
    Ok(config.with_tracker(tracker))
}

async fn execute(game: &Game, command: Command, deployed_at: u64) -> Result<()> {
    let view = game.view();
    let intent = match command {
        Command::Round { id } => {
            let round = view.refresh_round(RoundId(id)).await?;
            println!("{}", render::round(&round));
            return Ok(());
        }
        Command::Card { id } => {
            let card = view.refresh_card(CardId(id)).await?;
            println!("{}", render::card(&card));
            return Ok(());
        }
        Command::CurrentRound => {
            match game.current_round().await? {
                Some(round) => println!("{}", render::round(&round)),
                None => println!("no round has been started yet"),
            }
            return Ok(());
        }
        Command::History { round, from_block } => {
            let events = game
                .round_history(RoundId(round), from_block.unwrap_or(deployed_at))
                .await?;
            if events.is_empty() {
                println!("no events for round {round}");
            }
            for event in &events {
                println!("{}", render::game_event(event));
            }
            return Ok(());
        }
        Command::RecordDeployment { .. } => {
            return Err(eyre!("record-deployment does not need a connection"));
        }
        Command::CreateCard { dimensions } => Intent::CreateCard { dimensions },
        Command::RegisterNumbers { card, numbers } => Intent::RegisterNumbers {
            card: CardId(card),
            numbers,
        },
        Command::TransferCard { card, to } => Intent::TransferCard {
            card: CardId(card),
            to,
        },
        Command::StartRound {
            max_number,
            entry_fee,
            timeout_secs,
            patterns,
        } => Intent::StartRound(StartRoundParams {
            max_number,
            entry_fee,
            timeout: Duration::from_secs(timeout_secs),
            win_patterns: patterns,
        }),
        Command::Draw { round } => Intent::DrawNumber {
            round: RoundId(round),
        },
        Command::Join { round, card } => Intent::JoinRound {
            round: RoundId(round),
            card: CardId(card),
        },
        Command::Distribute { round } => Intent::DistributePrizes {
            round: RoundId(round),
        },
    };

    let reconciled = write(game, intent).await?;
    println!("{}", render::reconciled(&reconciled));
    Ok(())
}

/// Sends an intent and follows it to a terminal state. Conflicting or
/// ambiguous outcomes are only resent after the user agrees.
async fn write(game: &Game, intent: Intent) -> Result<Reconciled> {
    let mut attempt = submit(game, &intent).await;
    loop {
        let err = match attempt {
            Ok(action) => match follow(game, action).await {
                Ok(reconciled) => return Ok(reconciled),
                Err(err) => err,
            },
            Err(err) => err,
        };
        if !err.needs_user_confirmation() {
            return Err(err.into());
        }
        if !confirm_resubmit(&err, &intent)? {
            return Err(err).wrap_err("not resubmitted");
        }
        attempt = game
            .resubmit(intent.clone(), UserConfirmed::acknowledged())
            .await;
    }
}

async fn submit(game: &Game, intent: &Intent) -> bingo_client::Result<PendingAction> {
    match intent.clone() {
        Intent::CreateCard { dimensions } => game.create_card(dimensions).await,
        Intent::RegisterNumbers { card, numbers } => game.register_numbers(card, numbers).await,
        Intent::TransferCard { card, to } => game.transfer_card(card, to).await,
        Intent::StartRound(params) => game.start_round(params).await,
        Intent::DrawNumber { round } => game.draw_number(round).await,
        Intent::JoinRound { round, card } => game.join_round(round, card).await,
        Intent::DistributePrizes { round } => game.distribute_prizes(round).await,
    }
}

async fn follow(game: &Game, action: PendingAction) -> bingo_client::Result<Reconciled> {
    println!("sent {} as {}", action.record.intent, action.hash());
    let watcher = game.connection().tracker().subscribe(action.hash());
    let print_events = async move {
        if let Some(mut watcher) = watcher {
            while let Some(event) = watcher.next().await {
                println!("  {}", render::tx_event(&event));
            }
        }
    };
    let (settled, ()) = tokio::join!(action.settle(game.view()), print_events);
    settled
}

fn confirm_resubmit(err: &Error, intent: &Intent) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{err}\nsend \"{intent}\" again? [y/N] ")?;
    stderr.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn record_deployment(
    store: &DeploymentStore,
    env: DeploymentEnv,
    rpc_url: Option<String>,
    cartela_address: Address,
    bingo_game_address: Address,
    block: Option<u64>,
) -> Result<()> {
    let rpc_url = match (rpc_url, env) {
        (Some(url), _) => url,
        (None, DeploymentEnv::Local) => DEFAULT_LOCAL_RPC_URL.to_string(),
        (None, env) => return Err(eyre!("--rpc-url is required to record a {env} deployment")),
    };
    if cartela_address.is_zero() || bingo_game_address.is_zero() {
        return Err(eyre!("contract addresses must not be zero"));
    }

    let transport = HttpTransport::new(rpc_url.clone(), RECORD_REQUEST_TIMEOUT)
        .wrap_err("creating RPC transport")?;
    let chain_id = ChainClient::new(transport)
        .chain_id()
        .await
        .wrap_err_with(|| format!("reading chain id from {rpc_url}"))?;

    let mut record = DeploymentRecord::new(
        rpc_url,
        chain_id,
        cartela_address.to_string(),
        bingo_game_address.to_string(),
    );
    record.cartela_abi_fingerprint = Some(cartela::abi().fingerprint());
    record.bingo_game_abi_fingerprint = Some(bingo_game::abi().fingerprint());
    record.deployment_block_height = block;
    store
        .append(record.clone())
        .map_err(|e| eyre!(e))
        .wrap_err("saving deployment record")?;

    println!("{}", render::deployment(&record, store.path()));
    Ok(())
}
