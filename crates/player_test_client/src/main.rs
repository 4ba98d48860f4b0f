//! # Player Simulator
//!
//! Connects a number of simulated players to a running world server. Each
//! player walks around with random input through a full client session,
//! now and then places a block or mines one, and reports how many updates
//! it saw from everyone else.

use anyhow::Context;
use blockworld_protocol::{BlockType, Vec3};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::AddAssign;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use world_client::{ClientSession, MiningState, MovementInput, ReplicaChange};

#[derive(Parser, Debug, Clone)]
#[command(name = "player-simulator")]
#[command(about = "Simulated players for a blockworld server")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:9001")]
    url: String,

    /// Number of simultaneous players to simulate
    #[arg(short, long, default_value = "5")]
    players: u32,

    /// Client frame rate in Hz
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Block placements or mining attempts per minute, per player
    #[arg(short, long, default_value = "6.0")]
    build_rate: f64,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: u64,

    /// Edge of the square area players spawn in
    #[arg(short, long, default_value = "20.0")]
    spawn_area: f32,
}

/// Give up on a block that has not broken after this long.
const MINING_PATIENCE: Duration = Duration::from_secs(5);
/// Height of the eyes above the body's center.
const EYE_HEIGHT: f32 = 0.6;

#[derive(Debug, Default, Clone, Copy)]
struct PlayerStats {
    ticks: u64,
    positions_sent: u64,
    blocks_placed: u64,
    blocks_mined: u64,
    blocks_added_seen: u64,
    blocks_removed_seen: u64,
    moves_seen: u64,
    leaves_seen: u64,
}

impl PlayerStats {
    fn record(&mut self, change: &ReplicaChange) {
        match change {
            ReplicaChange::BlockAdded(_) => self.blocks_added_seen += 1,
            ReplicaChange::BlockRemoved(_) => self.blocks_removed_seen += 1,
            ReplicaChange::PlayerMoved(_) => self.moves_seen += 1,
            ReplicaChange::PlayerLeft(_) => self.leaves_seen += 1,
            ReplicaChange::Reset | ReplicaChange::Unchanged => {}
        }
    }
}

impl AddAssign for PlayerStats {
    fn add_assign(&mut self, other: Self) {
        self.ticks += other.ticks;
        self.positions_sent += other.positions_sent;
        self.blocks_placed += other.blocks_placed;
        self.blocks_mined += other.blocks_mined;
        self.blocks_added_seen += other.blocks_added_seen;
        self.blocks_removed_seen += other.blocks_removed_seen;
        self.moves_seen += other.moves_seen;
        self.leaves_seen += other.leaves_seen;
    }
}

/// Random walk with occasional pauses.
fn random_input(rng: &mut StdRng) -> MovementInput {
    if rng.gen_bool(0.2) {
        return MovementInput::default();
    }
    MovementInput {
        forward: rng.gen_bool(0.7),
        backward: rng.gen_bool(0.1),
        left: rng.gen_bool(0.2),
        right: rng.gen_bool(0.2),
        jump: rng.gen_bool(0.1),
    }
}

/// Looking ahead and down at the ground in front of the player.
fn look_direction(yaw: f32) -> Vec3 {
    Vec3::new(yaw.cos(), -0.8, yaw.sin()).normalize()
}

async fn simulate_player(index: u32, args: Args, spawn: Vec3) -> anyhow::Result<PlayerStats> {
    let mut session = ClientSession::connect_at(&args.url, spawn)
        .await
        .with_context(|| format!("player {index} failed to connect"))?;
    let player_id = session.player_id().clone();
    info!("🎮 Player {} joined as {} at {:?}", index, player_id, spawn);

    let mut rng = StdRng::from_entropy();
    let frame = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);
    let mut ticker = interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let build_chance = (args.build_rate / 60.0 * frame.as_secs_f64()).clamp(0.0, 1.0);
    let simulation_duration = Duration::from_secs(args.duration);
    let started = Instant::now();

    let mut stats = PlayerStats::default();
    let mut input = MovementInput::default();
    let mut yaw = rng.gen_range(0.0..std::f32::consts::TAU);
    let mut next_input_change = Instant::now();
    let mut mining_since: Option<Instant> = None;
    let mut block_type = first_block_type(index);
    let mut last_tick = Instant::now();

    while started.elapsed() < simulation_duration {
        ticker.tick().await;
        let now = Instant::now();
        let dt = now - last_tick;
        last_tick = now;

        if mining_since.is_none() && now >= next_input_change {
            input = random_input(&mut rng);
            yaw += rng.gen_range(-1.0..1.0);
            next_input_change = now + Duration::from_millis(rng.gen_range(500..2000));
        }

        if mining_since.is_none() && rng.gen_bool(build_chance) {
            let eye = session.position() + Vec3::Y * EYE_HEIGHT;
            if rng.gen_bool(0.5) {
                if let Some(block) = session.place_block(eye, look_direction(yaw), block_type)? {
                    info!("🧱 Player {} places {:?} at {}", index, block.block_type, block.key);
                    stats.blocks_placed += 1;
                    block_type = block_type.next();
                }
            } else if session.start_mining(eye, look_direction(yaw)) {
                // stand still while holding the mine input
                input = MovementInput::default();
                mining_since = Some(now);
            }
        }

        let report = match session.tick(&input, look_direction(yaw), dt) {
            Ok(report) => report,
            Err(e) => {
                warn!("Player {} lost the connection: {}", index, e);
                break;
            }
        };
        stats.ticks += 1;
        if report.position_sent {
            stats.positions_sent += 1;
        }
        for change in &report.changes {
            stats.record(change);
        }
        if let Some(update) = report.mined {
            info!("⛏️ Player {} breaks {}", index, update.key());
            stats.blocks_mined += 1;
        }

        if let Some(since) = mining_since {
            let finished = session.miner().state() == MiningState::Idle;
            if finished || since.elapsed() >= MINING_PATIENCE {
                session.stop_mining();
                mining_since = None;
            }
        }
    }

    info!(
        "📊 Player {} saw {} other player(s) at the end, {} block(s) in its replica",
        index,
        session.replica().other_players().len(),
        session.replica().block_count()
    );
    session.close().await;
    Ok(stats)
}

/// Players start their placement cycle at different types.
fn first_block_type(index: u32) -> BlockType {
    (0..index % BlockType::ALL.len() as u32).fold(BlockType::ALL[0], |t, _| t.next())
}

/// Spawn points spread over a square around the origin, above the terrain.
fn spawn_position(rng: &mut StdRng, spawn_area: f32) -> Vec3 {
    let half = spawn_area.max(1.0) / 2.0;
    Vec3::new(
        rng.gen_range(-half..half) + half,
        1.4,
        rng.gen_range(-half..half) + half,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("🚀 Starting player simulation");
    info!("   • Players: {}", args.players);
    info!("   • Tick rate: {} Hz", args.tick_rate);
    info!("   • Build rate: {:.1}/min", args.build_rate);
    info!("   • Duration: {} seconds", args.duration);
    info!("   • Server URL: {}", args.url);

    let mut rng = StdRng::from_entropy();
    let mut handles = Vec::new();
    for index in 0..args.players {
        let spawn = spawn_position(&mut rng, args.spawn_area);
        let args = args.clone();
        handles.push(tokio::spawn(simulate_player(index, args, spawn)));

        // stagger connections
        sleep(Duration::from_millis(100)).await;
    }
    info!("🎮 All {} players started", args.players);

    let mut total = PlayerStats::default();
    let mut failed = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(stats)) => total += stats,
            Ok(Err(e)) => {
                error!("❌ {:#}", e);
                failed += 1;
            }
            Err(e) => {
                error!("❌ Player task panicked: {}", e);
                failed += 1;
            }
        }
    }

    info!("✅ Player simulation complete ({} failed)", failed);
    info!("📊 Totals:");
    info!("   • Frames: {}", total.ticks);
    info!("   • Positions sent: {}", total.positions_sent);
    info!("   • Blocks placed: {} / mined: {}", total.blocks_placed, total.blocks_mined);
    info!(
        "   • Seen: {} block adds, {} block removes, {} moves, {} leaves",
        total.blocks_added_seen, total.blocks_removed_seen, total.moves_seen, total.leaves_seen
    );
    Ok(())
}
