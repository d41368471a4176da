mod cli;

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;

use atc_radio::atc::{RadioEngine, RadioEvent};
use atc_radio::clock::{Clock, SimClock};
use atc_radio::radio::{HeadlessPlayer, PhraseRef, Priority, RadioMessage, RadioPlayer};
use atc_radio::settings::RadioSettings;
use atc_radio::taxi::{PositionUpdate, RouteLeg, StaticRoutes};

use cli::{Args, Scenario};

const PARKING: &str = "gate_a3";
const RUNWAY: &str = "28R";

/// One scripted thing that happens at a given sim time.
enum Action {
    RequestTaxi,
    Event(RadioEvent),
    Say(RadioMessage),
    Acknowledge,
    Repeat,
}

struct Step {
    at: f64,
    action: Action,
}

fn step(at: f64, action: Action) -> Step {
    Step { at, action }
}

fn demo_routes() -> StaticRoutes {
    StaticRoutes::new().with_route(
        PARKING,
        RUNWAY,
        vec![
            RouteLeg::taxiway("A"),
            RouteLeg::crossing("B", "1L"),
            RouteLeg::taxiway("C"),
        ],
    )
}

fn position(callsign: &str, taxiway: &str, distance: f64) -> Action {
    Action::Event(RadioEvent::PositionUpdated(PositionUpdate::new(
        callsign, taxiway, distance,
    )))
}

fn atc(phrase: &str, text: String) -> Action {
    Action::Say(RadioMessage::atc(PhraseRef::single(phrase), Priority::NORMAL).with_text(text))
}

// --- Scenarios ---

fn taxi_steps(cs: &str, start: f64) -> Vec<Step> {
    vec![
        step(start, Action::RequestTaxi),
        step(start + 20.0, position(cs, "Taxiway A", 400.0)),
        step(start + 35.0, position(cs, "Taxiway A", 60.0)),
        step(start + 50.0, position(cs, "Taxiway B", 300.0)),
        step(start + 65.0, position(cs, "Taxiway B", 45.0)),
        step(start + 80.0, position(cs, "Taxiway C", 500.0)),
        step(start + 95.0, position(cs, "Taxiway C", 20.0)),
        step(
            start + 110.0,
            Action::Event(RadioEvent::HoldingShort {
                aircraft_id: cs.to_string(),
            }),
        ),
    ]
}

fn script(scenario: Scenario, cs: &str) -> Result<Vec<Step>> {
    let steps = match scenario {
        Scenario::Taxi => {
            let mut steps = taxi_steps(cs, 0.0);
            steps.push(step(125.0, Action::Acknowledge));
            steps
        }
        Scenario::Takeoff => {
            let mut steps = taxi_steps(cs, 0.0);
            steps.push(step(
                125.0,
                atc(
                    "ATC_CLEARED_TAKEOFF",
                    format!(
                        "{}, runway {}, cleared for takeoff, fly heading 310, climb and maintain 3000",
                        cs, RUNWAY
                    ),
                ),
            ));
            let mayday = RadioMessage::pilot(PhraseRef::single("PILOT_MAYDAY"), Priority::MAX, 1.0)?
                .with_text("Mayday, mayday, mayday, N77X, engine failure, returning to the field");
            steps.push(step(127.0, Action::Say(mayday)));
            steps.push(step(150.0, Action::Acknowledge));
            steps
        }
        Scenario::Readback => vec![
            step(
                0.0,
                atc(
                    "ATC_VECTOR",
                    format!("{}, turn left heading 270, descend and maintain 4000", cs),
                ),
            ),
            step(
                20.0,
                Action::Event(RadioEvent::PilotReadback(format!(
                    "left heading 250, descend and maintain 4000, {}",
                    cs
                ))),
            ),
            step(21.0, Action::Acknowledge),
            step(
                50.0,
                atc(
                    "ATC_HANDOFF",
                    format!("{}, contact NorCal approach 135.65, squawk 4521", cs),
                ),
            ),
            step(70.0, Action::Repeat),
            step(100.0, Action::Acknowledge),
        ],
    };
    Ok(steps)
}

fn run_step<P: RadioPlayer>(engine: &mut RadioEngine<P>, action: Action) {
    match action {
        Action::RequestTaxi => {
            if let Err(e) = engine.request_taxi(PARKING, RUNWAY, None) {
                log::warn!("taxi request refused: {}", e);
            }
        }
        Action::Event(event) => {
            engine.handle_event(event);
        }
        Action::Say(message) => engine.enqueue(message),
        Action::Acknowledge => match engine.acknowledge() {
            Ok(check) if !check.correct => {
                log::info!("readback had {} mismatches", check.mismatches.len())
            }
            Ok(_) => {}
            Err(e) => log::warn!("{}", e),
        },
        Action::Repeat => {
            if let Err(e) = engine.request_repeat() {
                log::warn!("{}", e);
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => RadioSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => RadioSettings::default(),
    };
    if let Some(callsign) = args.callsign {
        settings.callsign = callsign;
    }
    if args.seed.is_some() {
        settings.queue.seed = args.seed;
    }
    settings.validate().context("invalid settings")?;
    if !(args.dt.is_finite() && args.dt > 0.0) {
        bail!("--dt must be a positive number of seconds, got {}", args.dt);
    }

    let clock = SimClock::new();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let mut engine = RadioEngine::new(
        &settings,
        HeadlessPlayer::new(shared.clone()),
        shared,
        Box::new(demo_routes()),
    )
    .context("building radio engine")?;

    let mut pending: VecDeque<Step> = script(args.scenario, &settings.callsign)?.into();
    log::info!(
        "running {:?} for {:.0}s as {}",
        args.scenario,
        args.duration,
        settings.callsign
    );

    while clock.now() < args.duration {
        while pending.front().map_or(false, |s| s.at <= clock.now()) {
            if let Some(next) = pending.pop_front() {
                run_step(&mut engine, next.action);
            }
        }
        engine.tick(args.dt);
    }

    println!("--- Radio log ({} transmissions) ---", engine.queue().log().len());
    for record in engine.queue().log() {
        let text = record
            .text
            .clone()
            .unwrap_or_else(|| record.phrase.to_string());
        println!(
            "{:>7.1}s  {:<5} {}{}",
            record.started_at,
            record.sender.label(),
            text,
            if record.interrupted { "  (cut off)" } else { "" }
        );
    }
    if !engine.queue().is_empty() {
        println!("({} still queued)", engine.queue().len());
    }
    Ok(())
}
