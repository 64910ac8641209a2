//! midi-flash - flash the terminal on incoming MIDI notes

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::io::{self, stdout, Stdout};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use midiflash_app::{action_for_key, logger, ui, App, Config, Error, Screen};
use midiflash_core::{ui_channel, Coordinator, InputProvider, MidirProvider, RelayMode, UiInbox};

#[derive(Parser)]
#[command(name = "midi-flash")]
#[command(author, version, about = "Flash the terminal on incoming MIDI notes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/midi-flash/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// MIDI input to listen on (default: first input)
    #[arg(short, long)]
    port: Option<String>,

    /// Flash on time in milliseconds
    #[arg(long)]
    flash_ms: Option<u64>,

    /// Flashes per note
    #[arg(short, long)]
    repetitions: Option<u32>,

    /// Gap after each flash in milliseconds
    #[arg(long)]
    gap_ms: Option<u64>,

    /// Flash color (name or #rrggbb)
    #[arg(long)]
    color: Option<String>,

    /// Log every MIDI message, not just note on
    #[arg(long)]
    all_events: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// List available MIDI ports
    ListPorts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        env_logger::init();
        run_command(command, &cli)?;
        return Ok(());
    }

    logger::init_logger();

    // Load config
    let mut config = if let Some(path) = &cli.config {
        Config::load_from(Path::new(path))?
    } else {
        Config::load_or_default()
    };

    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.midi.port = Some(port);
    }
    if let Some(on_ms) = cli.flash_ms {
        config.flash.on_ms = on_ms;
    }
    if let Some(repetitions) = cli.repetitions {
        config.flash.repetitions = repetitions;
    }
    if let Some(gap_ms) = cli.gap_ms {
        config.flash.gap_ms = gap_ms;
    }
    if let Some(color) = cli.color {
        config.flash.color = color;
    }
    if cli.all_events {
        config.relay.mode = RelayMode::All;
    }

    let config_path = cli.config.as_deref().map(Path::new);
    run_tui(config, config_path)
}

fn run_command(command: &Commands, cli: &Cli) -> midiflash_app::Result<()> {
    match command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
        Commands::ListPorts => {
            let config = match &cli.config {
                Some(path) => Config::load_from(Path::new(path))?,
                None => Config::load_or_default(),
            };
            let ports = MidirProvider::new(config.midi.client_name).list_ports()?;
            if ports.inputs.is_empty() {
                println!("No MIDI input ports found");
            } else {
                println!("Available MIDI input ports:");
                for port in &ports.inputs {
                    println!("  {}", port);
                }
            }
            if !ports.outputs.is_empty() {
                println!("MIDI output ports:");
                for port in &ports.outputs {
                    println!("  {}", port);
                }
            }
        }
    }
    Ok(())
}

fn run_tui(config: Config, config_path: Option<&Path>) -> Result<()> {
    // SIGINT/SIGTERM end the event loop like 'q' does
    let terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&terminate))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&terminate))?;

    let coordinator_config = config.to_coordinator_config();
    let mut screen = Screen::new(coordinator_config.idle_color);
    let (ui, inbox) = ui_channel::<Screen>();
    let coordinator = Coordinator::start(
        MidirProvider::new(config.midi.client_name.clone()),
        ui,
        coordinator_config,
    )?;
    let mut app = App::new(coordinator, config);
    if let Some(path) = config_path {
        app = app.with_config_path(path.to_path_buf());
    }

    let mut terminal = setup_terminal()?;

    let (log_tx, log_rx) = bounded(256);
    logger::enter_tui_mode(log_tx);
    app.refresh();

    let result = run_event_loop(&mut terminal, &mut app, &mut screen, &inbox, &log_rx, &terminate);

    // Cleanup
    logger::leave_tui_mode();
    let restored = restore_terminal(&mut terminal);

    app.shutdown();
    result?;
    restored?;
    Ok(())
}

fn setup_terminal() -> midiflash_app::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().map_err(|e| Error::Terminal(format!("enable raw mode: {}", e)))?;

    let entered = (|| -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        Terminal::new(CrosstermBackend::new(stdout))
    })();

    entered.map_err(|e| {
        // Best effort, the original error is what gets reported
        let _ = execute!(stdout(), LeaveAlternateScreen);
        let _ = disable_raw_mode();
        Error::Terminal(e.to_string())
    })
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> midiflash_app::Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let cursor = terminal.show_cursor();
    raw.and(screen)
        .and(cursor)
        .map_err(|e| Error::Terminal(format!("restore terminal: {}", e)))
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    screen: &mut Screen,
    inbox: &UiInbox<Screen>,
    log_rx: &crossbeam_channel::Receiver<String>,
    terminate: &AtomicBool,
) -> Result<()> {
    use midiflash_core::LogSink;

    loop {
        // Apply everything the worker threads queued for us
        inbox.run_pending(screen);
        for line in log_rx.try_iter() {
            screen.append(&line);
        }
        app.poll();

        terminal.draw(|frame| ui::draw(frame, app, screen))?;

        if terminate.load(Ordering::Relaxed) || app.should_quit() {
            return Ok(());
        }

        // Poll for terminal events
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = action_for_key(key) {
                    if app.handle(action) {
                        screen.clear_log();
                    }
                }
            }
        }
    }
}
