use clap::{crate_version, Parser, Subcommand};
use klavir_core::{AppCore, Command, Event, PracticeMode};
use klavir_domain_notation::{parse_report, resolve_tempo_multiplier, timeline, NotationToken};
use klavir_infra_audio_cpal::CpalAudioOutputPort;
use klavir_infra_midi_midir::MidirMidiInputPort;
use klavir_infra_storage_fs::FsStorage;
use klavir_infra_synth_simple::SimpleSynth;
use klavir_ports::storage::StoragePort;
use klavir_ports::types::{DeviceId, MidiInputDevice, SourceId};
use std::error::Error;
use std::io::{self, BufRead};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(16);
/// Lets the last note ring out before the process exits.
const RELEASE_TAIL: Duration = Duration::from_millis(400);
const SOURCE: &str = "cli";

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    about = "Plays melody notation and checks practice runs against it."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows how a notation string is read.
    Parse {
        notation: String,
        /// Prints tokens and skipped elements as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Plays a notation string through the audio output.
    Play {
        notation: String,
        /// Tempo marking, e.g. Largo, Andante, Allegro.
        #[clap(long)]
        tempo: Option<String>,
    },
    /// Checks notes typed on stdin or played on a MIDI keyboard against the notation.
    Practice {
        notation: String,
        /// Any wrong note restarts the series.
        #[clap(long)]
        challenge: bool,
        /// MIDI input id or part of its name.
        #[clap(long)]
        midi: Option<String>,
    },
    /// Lists audio outputs and MIDI inputs.
    Devices {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { notation, json } => print_parse(&notation, json)?,
        Commands::Play { notation, tempo } => play(&notation, tempo)?,
        Commands::Practice {
            notation,
            challenge,
            midi,
        } => practice(&notation, challenge, midi)?,
        Commands::Devices {} => devices()?,
    }
    Ok(())
}

fn build_core() -> AppCore {
    let storage: Option<Box<dyn StoragePort>> = Some(Box::new(FsStorage::default()));
    AppCore::new(
        Box::new(CpalAudioOutputPort::new()),
        Box::new(MidirMidiInputPort::default()),
        Arc::new(SimpleSynth::default()),
        storage,
    )
}

fn open_output(core: &mut AppCore) -> Result<(), Box<dyn Error>> {
    let device_id = core.settings().selected_audio_out.clone();
    core.handle_command(Command::SelectAudioOutput {
        device_id,
        config: None,
    })?;
    Ok(())
}

fn load(core: &mut AppCore, notation: &str, tempo: Option<String>) -> Result<(), Box<dyn Error>> {
    core.handle_command(Command::LoadNotation {
        source_id: SourceId::new(SOURCE),
        notation: notation.to_string(),
        tempo,
    })?;
    Ok(())
}

fn print_parse(notation: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let report = parse_report(notation);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let events = timeline(&report.tokens, resolve_tempo_multiplier(None));
    for event in &events {
        let token = &report.tokens[event.token_index];
        match &event.pitch {
            Some(pitch) => println!(
                "{:>3}  {:<6} {:<4} {:>5} ms",
                event.token_index,
                token.to_string(),
                pitch.as_str(),
                event.wait_ms
            ),
            None => println!(
                "{:>3}  {:<6} rest {:>5} ms",
                event.token_index,
                token.to_string(),
                event.wait_ms
            ),
        }
    }
    let bars = report
        .tokens
        .iter()
        .filter(|t| matches!(t, NotationToken::BarBreak))
        .count();
    println!(
        "{} notes, {} bar breaks, {} skipped",
        report.notes().count(),
        bars,
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {:?}: {:?}", skipped.element, skipped.reason);
    }
    Ok(())
}

fn play(notation: &str, tempo: Option<String>) -> Result<(), Box<dyn Error>> {
    let mut core = build_core();
    open_output(&mut core)?;
    load(&mut core, notation, tempo)?;

    let tokens = parse_report(notation).tokens;
    core.handle_command(Command::TogglePlayback {
        source_id: SourceId::new(SOURCE),
    })?;

    loop {
        let mut finished = false;
        for event in core.drain_events() {
            match event {
                Event::NotationLoaded { note_count, .. } => println!("{} notes", note_count),
                Event::PlaybackUpdated {
                    current_index: Some(index),
                    ..
                } => {
                    if let Some(token) = tokens.get(index) {
                        println!("{:>3}  {}", index, token);
                    }
                }
                Event::PlaybackUpdated { playing: false, .. } => finished = true,
                _ => {}
            }
        }
        if finished {
            break;
        }
        thread::sleep(TICK);
        core.tick();
    }

    thread::sleep(RELEASE_TAIL);
    Ok(())
}

fn practice(notation: &str, challenge: bool, midi: Option<String>) -> Result<(), Box<dyn Error>> {
    let mut core = build_core();
    if let Err(err) = open_output(&mut core) {
        warn!(%err, "no audio output, practicing silently");
    }
    load(&mut core, notation, None)?;

    if let Some(wanted) = midi {
        let device_id = find_midi_input(&mut core, &wanted)?;
        core.handle_command(Command::SelectMidiInput { device_id })?;
    }

    let mode = if challenge {
        PracticeMode::Challenge
    } else {
        PracticeMode::Practice
    };
    core.handle_command(Command::StartPractice {
        source_id: SourceId::new(SOURCE),
        mode,
    })?;
    println!("Type notes separated by spaces, Ctrl-D to finish.");

    let lines = spawn_stdin_reader();
    loop {
        match lines.try_recv() {
            Ok(line) => {
                for note in line.split_whitespace() {
                    core.handle_command(Command::PressNote {
                        note: note.to_string(),
                    })?;
                }
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => break,
        }

        core.tick();
        for event in core.drain_events() {
            print_practice_event(&event);
        }
        thread::sleep(TICK);
    }

    core.handle_command(Command::StopPractice)?;
    thread::sleep(RELEASE_TAIL);
    Ok(())
}

fn print_practice_event(event: &Event) {
    match event {
        Event::PracticeFeedback {
            input,
            expected,
            correct,
            error_count,
            progress,
            total,
        } => {
            let mark = if *correct { "ok  " } else { "miss" };
            println!(
                "{} {:<5} expected {:<4} {}/{}  errors {}",
                mark, input, expected, progress, total, error_count
            );
        }
        Event::PracticeCompleted {
            perfect,
            error_count,
            reward_eligible,
        } => {
            if *reward_eligible {
                println!("Challenge passed without a mistake.");
            } else if *perfect {
                println!("Completed without mistakes.");
            } else {
                println!("Completed with {} mistakes.", error_count);
            }
        }
        Event::PracticeReset => println!("-- from the start --"),
        Event::PracticeAdvanced { .. } => println!("-- next round --"),
        other => debug!(?other, "event"),
    }
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn list_midi_inputs(core: &mut AppCore) -> Result<Vec<MidiInputDevice>, Box<dyn Error>> {
    core.handle_command(Command::ListMidiInputs)?;
    Ok(core
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            Event::MidiInputsUpdated { devices } => Some(devices),
            _ => None,
        })
        .unwrap_or_default())
}

fn find_midi_input(core: &mut AppCore, wanted: &str) -> Result<DeviceId, Box<dyn Error>> {
    let wanted_lower = wanted.to_lowercase();
    list_midi_inputs(core)?
        .into_iter()
        .find(|device| {
            device.id.0 == wanted || device.name.to_lowercase().contains(&wanted_lower)
        })
        .map(|device| device.id)
        .ok_or_else(|| format!("no MIDI input matching {:?}", wanted).into())
}

fn devices() -> Result<(), Box<dyn Error>> {
    let mut core = build_core();

    core.handle_command(Command::ListAudioOutputs)?;
    for event in core.drain_events() {
        if let Event::AudioOutputsUpdated { devices } = event {
            println!("Audio outputs:");
            for device in devices {
                println!(
                    "  {} ({} Hz, {} ch)  [{}]",
                    device.name,
                    device.default_config.sample_rate_hz,
                    device.default_config.channels,
                    device.id
                );
            }
        }
    }

    println!("MIDI inputs:");
    for device in list_midi_inputs(&mut core)? {
        println!("  {}  [{}]", device.name, device.id);
    }
    Ok(())
}
