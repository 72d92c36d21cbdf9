use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use waymark_nav::doctor as nav_doctor;
use waymark_nav::geo::{bearing_deg, distance_m};
use waymark_nav::route::{EventConfig, Route};
use waymark_nav::runner::{self, CueSink, RunEnd};
use waymark_nav::sensor::{GnssConfig, SensorSession};
use waymark_nav::{NavEngine, NavParams};
use waymark_proto::{Cue, NavSnapshot};

#[derive(Debug, Parser)]
#[command(name = "waymark", version, about = "Waymark - walking route guide with arrival and off-route cues")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config, the event document and the GNSS source.
    Doctor,
    /// Print the route legs.
    Route,
    /// Navigate the route from live or replayed GNSS.
    Run {
        /// Team walking the route; must be listed in the event when given.
        #[arg(long)]
        team: Option<String>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    event: EventCfg,
    gnss: GnssConfig,
    #[serde(default)]
    nav: NavParams,
    #[serde(default)]
    audio: AudioCfg,
}

#[derive(Debug, serde::Deserialize)]
struct EventCfg {
    path: String,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct AudioCfg {
    off_route: bool,
    waypoint_reached: bool,
}

impl Default for AudioCfg {
    fn default() -> Self {
        Self { off_route: true, waypoint_reached: true }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Route => route(&cfg)?,
        Command::Run { team } => run(&cfg, team).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    let event = EventConfig::load(&cfg.event.path)?;
    nav_doctor::check_event(&event)?;
    nav_doctor::check_params(&cfg.nav)?;
    nav_doctor::check_gnss(&cfg.gnss)?;

    info!("doctor: OK ({} waypoints, {} teams)", event.route.len(), event.teams.len());
    Ok(())
}

fn route(cfg: &Config) -> Result<()> {
    let event = EventConfig::load(&cfg.event.path)?;
    let route = Route::new(&event.route)?;

    println!("{} ({} .. {})", event.name, event.starts_at, event.ends_at);
    let mut total = 0.0;
    let mut prev = None;
    for w in route.iter() {
        match prev {
            None => println!("{:>4}  {:<24} start", w.order, w.name),
            Some(p) => {
                let leg = distance_m(&p, &w.coord);
                total += leg;
                println!("{:>4}  {:<24} {:>7.0} m  {:>5.1}°", w.order, w.name, leg, bearing_deg(&p, &w.coord));
            }
        }
        prev = Some(w.coord);
    }
    println!("total {:.0} m", total);
    Ok(())
}

/// Rings the terminal bell for enabled cues.
struct TerminalNotifier {
    off_route: bool,
    waypoint_reached: bool,
}

impl CueSink for TerminalNotifier {
    fn cue(&mut self, cue: Cue) {
        let enabled = match cue {
            Cue::OffRoute => self.off_route,
            Cue::WaypointReached => self.waypoint_reached,
        };
        if !enabled {
            return;
        }
        info!("cue: {:?}", cue);
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}

fn print_snapshot(s: &NavSnapshot) {
    let target = s.target.as_ref().map(|t| t.name.as_str()).unwrap_or("-");
    match (s.distance_m, s.bearing_deg) {
        (Some(d), Some(b)) => println!(
            "[{}] {} | {} {:.0} m @ {:.0}° (pointer {:.0}°) corridor={}",
            s.status_class.as_str(),
            s.status,
            target,
            d,
            b,
            s.pointer_rotation_deg().unwrap_or_default(),
            s.in_corridor
        ),
        _ => println!("[{}] {}", s.status_class.as_str(), s.status),
    }
}

async fn run(cfg: &Config, team: Option<String>) -> Result<()> {
    info!("run: starting");

    let event = match EventConfig::load(&cfg.event.path) {
        Ok(ev) => Some(ev),
        Err(e) => {
            warn!("run: no event loaded: {:#}", e);
            None
        }
    };
    if let (Some(ev), Some(team)) = (event.as_ref(), team.as_ref()) {
        anyhow::ensure!(ev.teams.iter().any(|t| t == team), "team {:?} is not registered for {}", team, ev.name);
        info!("run: team {}", team);
    }

    let mut engine = NavEngine::from_event(event.as_ref(), cfg.nav.clone());
    if let Err(e) = engine.start() {
        // sensors stay off without a usable route
        print_snapshot(&engine.snapshot());
        warn!("run: navigation not started: {}", e);
        return Ok(());
    }
    print_snapshot(&engine.snapshot());

    let mut session = SensorSession::new();
    let mut events = session.start(&cfg.gnss);
    let mut notifier = TerminalNotifier { off_route: cfg.audio.off_route, waypoint_reached: cfg.audio.waypoint_reached };

    tokio::select! {
        end = runner::drive(&mut engine, &mut events, &mut notifier, print_snapshot) => match end {
            RunEnd::Completed => info!("run: route complete"),
            RunEnd::SensorsClosed => warn!("run: sensor stream ended before the route was complete"),
        },
        _ = tokio::signal::ctrl_c() => info!("run: interrupted"),
    }
    session.stop();

    let visited: Vec<_> = engine.visited().map(|w| w.name.as_str()).collect();
    info!("run: visited {}/{}: {}", visited.len(), engine.route().len(), visited.join(", "));
    Ok(())
}
