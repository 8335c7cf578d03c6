#[cfg(not(feature = "std"))]
fn main() {}

#[cfg(feature = "std")]
use duelsync::{
    init_logging,
    session::{in_memory::InMemoryNetwork, tcp::TcpConnector},
    ConnectionStatus, GameEngine, MultiplayerCoordinator, PeerId, SquadEngine,
};

#[cfg(feature = "std")]
use clap::Parser;
#[cfg(feature = "std")]
use rand::rngs::SmallRng;
#[cfg(feature = "std")]
use rand::SeedableRng;
#[cfg(feature = "std")]
use serde_json::json;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[cfg(feature = "std")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
#[cfg(feature = "std")]
enum Commands {
    /// Play both peers in-process over the in-memory network.
    Local {
        #[arg(long, help = "Fix the host RNG seed for a reproducible session")]
        seed: Option<u64>,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
    /// Host a session and wait for a guest to dial in.
    Host {
        #[arg(long, default_value = "0.0.0.0:7788")]
        bind: String,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
        #[arg(long, help = "Fix the host RNG seed for a reproducible session")]
        seed: Option<u64>,
    },
    /// Join a hosted session.
    Join {
        #[arg(long)]
        connect: String,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

#[cfg(feature = "std")]
fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => {
            let mut seed_rng = rand::rng();
            SmallRng::from_rng(&mut seed_rng)
        }
    }
}

/// Drive one peer through `rounds` rounds: wait for the game to start,
/// then alternate ending the local turn and pumping session events until
/// the round counter advances. `train_offset` varies which unit gets
/// buffed each round so the two boards diverge the way shop phases would.
#[cfg(feature = "std")]
async fn play_rounds(
    coordinator: &mut MultiplayerCoordinator<SquadEngine>,
    rounds: u32,
    train_offset: usize,
) -> anyhow::Result<()> {
    while coordinator.status() != ConnectionStatus::InGame {
        if !coordinator.step().await? {
            anyhow::bail!("session closed before the game started");
        }
    }
    for i in 0..rounds {
        coordinator.engine_mut().train(i as usize + train_offset);
        let round = coordinator.engine().current_round();
        coordinator.end_turn().await?;
        while coordinator.engine().current_round() == round {
            if !coordinator.step().await? {
                anyhow::bail!("session closed mid-round");
            }
        }
    }
    Ok(())
}

#[cfg(feature = "std")]
fn summary(coordinator: &MultiplayerCoordinator<SquadEngine>) -> serde_json::Value {
    let engine = coordinator.engine();
    json!({
        "role": coordinator.role().map(|r| format!("{r:?}")),
        "session_seed": coordinator.session_seed(),
        "rounds_played": engine.results().len(),
        "record": engine.results().iter().map(|r| format!("{r:?}")).collect::<Vec<_>>(),
        "round_seeds": engine.seeds_used(),
    })
}

#[cfg(feature = "std")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Local { seed, rounds } => {
            let net = InMemoryNetwork::new();
            let mut host = MultiplayerCoordinator::new(
                Box::new(net.connector()),
                SquadEngine::ready_now(),
                make_rng(seed),
            );
            let mut guest = MultiplayerCoordinator::new(
                Box::new(net.connector()),
                SquadEngine::ready_now(),
                make_rng(seed.map(|s| s.wrapping_add(1))),
            );

            let host_id = host.initialize_peer().await?;
            guest.initialize_peer().await?;

            let host_task = tokio::spawn(async move {
                host.accept_peer().await?;
                play_rounds(&mut host, rounds, 0).await?;
                Ok::<_, anyhow::Error>(host)
            });

            guest.connect_to_peer(&host_id).await?;
            play_rounds(&mut guest, rounds, 1).await?;

            let host = host_task.await??;
            let lockstep = host.engine().seeds_used() == guest.engine().seeds_used();
            let result = json!({
                "host": summary(&host),
                "guest": summary(&guest),
                "lockstep": lockstep,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Host { bind, rounds, seed } => {
            let mut coordinator = MultiplayerCoordinator::new(
                Box::new(TcpConnector::new(bind)),
                SquadEngine::ready_now(),
                make_rng(seed),
            );
            let local_id = coordinator.initialize_peer().await?;
            println!("Hosting at {local_id}. Waiting for a guest...");
            let remote = coordinator.accept_peer().await?;
            println!("Guest {remote} connected.");
            play_rounds(&mut coordinator, rounds, 0).await?;
            println!("{}", serde_json::to_string_pretty(&summary(&coordinator))?);
        }
        Commands::Join { connect, rounds } => {
            let mut coordinator = MultiplayerCoordinator::new(
                Box::new(TcpConnector::new("0.0.0.0:0")),
                SquadEngine::ready_now(),
                make_rng(None),
            );
            coordinator.initialize_peer().await?;
            let remote = PeerId::from(connect.as_str());
            println!("Joining {remote}...");
            coordinator.connect_to_peer(&remote).await?;
            play_rounds(&mut coordinator, rounds, 1).await?;
            println!("{}", serde_json::to_string_pretty(&summary(&coordinator))?);
        }
    }

    Ok(())
}
