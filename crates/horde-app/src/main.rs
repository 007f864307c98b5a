use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use horde_core::{
    AgentId, FormationAnchor, FormationKind, HordeConfig, SlotOffset, TickSummary, Vec2,
    WorldState, WorldStateError, wrap_signed_angle,
};
use std::f32::consts::FRAC_PI_2;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "horde",
    version,
    about = "Run a headless horde simulation: waves of agents held in formation around an orbiting player"
)]
struct Cli {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Waves spawned before the first tick.
    #[arg(long, default_value_t = 4)]
    waves: usize,
    /// RNG seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
    /// Side length of the square play area.
    #[arg(long)]
    world_size: Option<f32>,
    /// Entries a spatial index node holds before splitting.
    #[arg(long)]
    node_capacity: Option<usize>,
    /// Slot costs at or above this value are never assigned.
    #[arg(long)]
    cost_limit: Option<f32>,
    /// Formation shape used for every wave.
    #[arg(long, value_enum, default_value_t = FormationChoice::Circle)]
    formation: FormationChoice,
    /// Inline JSON config applied before the individual flags.
    #[arg(long)]
    config_json: Option<String>,
    /// Print the final tick summary as JSON on stdout.
    #[arg(long)]
    summary_json: bool,
    /// Distance an agent covers per tick while walking to its target.
    #[arg(long, default_value_t = 4.0)]
    agent_speed: f32,
    /// Emit a progress line every N ticks (0 disables).
    #[arg(long, default_value_t = 60)]
    log_every: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormationChoice {
    Circle,
    Roles,
}

impl From<FormationChoice> for FormationKind {
    fn from(choice: FormationChoice) -> Self {
        match choice {
            FormationChoice::Circle => FormationKind::DefensiveCircle,
            FormationChoice::Roles => FormationKind::SlotRole,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    info!(
        width = config.world_width,
        height = config.world_height,
        node_capacity = config.node_capacity,
        cost_limit = config.cost_limit,
        "Starting horde simulation"
    );

    let mut world = WorldState::new(config).context("failed to construct world")?;
    let leaders = seed_waves(&mut world, cli.waves, cli.formation.into())?;

    let orbit_radius = world.config().world_width.min(world.config().world_height) * 0.25;
    let mut last = TickSummary::default();
    for tick in 0..cli.ticks {
        let player = player_pose(tick, orbit_radius);
        last = world.step(player);
        steer_leaders(&mut world, &leaders, player.position);
        advance_agents(&mut world, cli.agent_speed);

        if cli.log_every > 0 && last.tick.0 % cli.log_every == 0 {
            info!(
                tick = last.tick.0,
                agents = last.agent_count,
                indexed = last.indexed,
                neighbor_links = last.neighbor_links,
                targets_pushed = last.targets_pushed,
                unassigned = last.unassigned,
                "tick"
            );
        }
    }

    info!(
        tick = last.tick.0,
        agents = last.agent_count,
        formations = last.formations,
        dropped = last.dropped,
        "Simulation finished"
    );
    if cli.summary_json {
        let json =
            serde_json::to_string_pretty(&last).context("failed to serialize tick summary")?;
        println!("{json}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_config(cli: &Cli) -> Result<HordeConfig> {
    let mut config = match &cli.config_json {
        Some(raw) => serde_json::from_str::<HordeConfig>(raw).context("invalid --config-json")?,
        None => HordeConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    if let Some(size) = cli.world_size {
        config.world_width = size;
        config.world_height = size;
    }
    if let Some(capacity) = cli.node_capacity {
        config.node_capacity = capacity;
    }
    if let Some(limit) = cli.cost_limit {
        config.cost_limit = limit;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Spawn `waves` groups around the origin. The first forms up on the player;
/// every later wave forms up on its own leader, which chases the player.
fn seed_waves(world: &mut WorldState, waves: usize, kind: FormationKind) -> Result<Vec<AgentId>> {
    let mut leaders = Vec::new();
    for wave in 0..waves {
        let ids = match world.spawn_wave(Vec2::ZERO) {
            Ok(ids) => ids,
            Err(err @ WorldStateError::PopulationLimit { .. }) => {
                warn!(wave, %err, "stopped spawning waves");
                break;
            }
            Err(err) => return Err(err).context("failed to spawn wave"),
        };
        let (anchor, members) = match ids.split_first() {
            Some((&leader, rest)) if wave > 0 => {
                leaders.push(leader);
                (FormationAnchor::Leader(leader), rest)
            }
            _ => (FormationAnchor::Player, ids.as_slice()),
        };
        let formation = world.create_formation(kind, anchor);
        for &agent in members {
            if let Err(err) = world.join_formation(agent, formation) {
                debug!(?agent, %err, "agent left out of formation");
            }
        }
    }
    Ok(leaders)
}

fn player_pose(tick: u64, orbit_radius: f32) -> SlotOffset {
    let angle = tick as f32 * 0.01;
    SlotOffset::new(
        Vec2::from_angle(angle) * orbit_radius,
        wrap_signed_angle(angle + FRAC_PI_2),
    )
}

fn steer_leaders(world: &mut WorldState, leaders: &[AgentId], player: Vec2) {
    for &leader in leaders {
        if let Some(agent) = world.agents_mut().get_mut(leader) {
            agent.target_position = player;
            agent.target_orientation = (player - agent.position).to_angle();
        }
    }
}

/// Fixed-speed follower standing in for real steering.
fn advance_agents(world: &mut WorldState, speed: f32) {
    let area = world.config().play_area();
    for (_, agent) in world.agents_mut().iter_mut() {
        let delta = agent.target_position - agent.position;
        if delta.length() <= speed {
            agent.position = agent.target_position;
        } else {
            agent.position += delta.normalized() * speed;
        }
        agent.position = area.clamp_point(agent.position);
        agent.heading = agent.target_orientation;
    }
}
