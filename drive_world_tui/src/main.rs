use anyhow::{Context, Result, bail};
use clap::Parser;
use drive_world_core::{
    Position,
    config::SimConfig,
    entity::Observable,
    map::Grid,
    navigation::DecisionRules,
    simulation::{SimState, Simulation, TickReport},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use log::info;
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

mod view;

#[derive(Parser, Debug)]
#[command(version, about = "Self-driving car grid simulation", long_about = None)]
struct Args {
    /// TOML file with a full simulation configuration; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Random seed (default: current time)
    #[arg(long)]
    seed: Option<u64>,

    /// World width
    #[arg(long)]
    dim_x: Option<u32>,

    /// World height
    #[arg(long)]
    dim_y: Option<u32>,

    /// Number of moving cars
    #[arg(long)]
    num_moving_cars: Option<u32>,

    /// Number of moving bikes
    #[arg(long)]
    num_moving_bikes: Option<u32>,

    /// Number of parked cars
    #[arg(long)]
    num_parked_cars: Option<u32>,

    /// Number of STOP signs
    #[arg(long)]
    num_stop_signs: Option<u32>,

    /// Number of traffic lights
    #[arg(long)]
    num_traffic_lights: Option<u32>,

    /// Maximum simulation ticks
    #[arg(long)]
    simulation_ticks: Option<u32>,

    /// Minimum fused confidence, in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    min_confidence_threshold: Option<u8>,

    /// GPS coordinates `x1 y1 [x2 y2 ...]`: the start, then the targets
    #[arg(long, num_args = 2.., value_name = "COORD", allow_negative_numbers = true)]
    gps: Vec<i32>,

    /// Let a stopped car creep through stop-sign and approach zones
    #[arg(long)]
    creep: bool,

    /// Print a text log of every tick instead of the interactive view
    #[arg(long)]
    headless: bool,

    /// Milliseconds between ticks in the interactive view
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

impl Args {
    /// Merges the optional config file with the command line.
    fn to_config(&self) -> Result<SimConfig> {
        let config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => SimConfig::default(),
        };
        self.merge(config)
    }

    /// Applies the command-line flags on top of `config`.
    fn merge(&self, mut config: SimConfig) -> Result<SimConfig> {

        if !self.gps.is_empty() {
            if self.gps.len() % 2 != 0 {
                bail!("GPS coordinates come in x y pairs, got {} numbers", self.gps.len());
            }
            let mut points = self.gps.chunks(2).map(|p| Position::new(p[0], p[1]));
            if let Some(start) = points.next() {
                config.start = start;
            }
            config.targets = points.collect();
            if config.targets.is_empty() {
                // Already at the only destination.
                config.targets.push(config.start);
            }
        } else if self.config.is_none() {
            bail!("GPS coordinates required: use --gps <x1> <y1> [x2 y2 ...]");
        }

        let population = &mut config.population;
        let overrides = [
            (self.num_moving_cars, &mut population.moving_cars),
            (self.num_moving_bikes, &mut population.moving_bikes),
            (self.num_parked_cars, &mut population.parked_cars),
            (self.num_stop_signs, &mut population.stop_signs),
            (self.num_traffic_lights, &mut population.traffic_lights),
            (self.dim_x, &mut config.width),
            (self.dim_y, &mut config.height),
            (self.simulation_ticks, &mut config.max_ticks),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value;
            }
        }
        if let Some(percent) = self.min_confidence_threshold {
            config.min_confidence = f64::from(percent) / 100.0;
        }
        if self.creep {
            config.rules = DecisionRules {
                creep_when_stopped: true,
                ..config.rules
            };
        }
        let seed = self.seed.or(config.seed).unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });
        info!("Using seed {}", seed);
        config.seed = Some(seed);
        Ok(config)
    }
}

struct App {
    /// The core simulation.
    simulation: Simulation,
    /// Report of the most recent tick.
    last_report: Option<TickReport>,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
}

impl App {
    fn new(simulation: Simulation) -> Self {
        App {
            simulation,
            last_report: None,
            should_quit: false,
            paused: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.paused {
            return;
        }
        if let Some(report) = self.simulation.step() {
            self.last_report = Some(report);
        }
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Log to stderr; keep quiet by default while the alternate screen is up
    let default_filter = if args.headless { "info" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = args.to_config()?;
    let simulation = Simulation::new(&config).context("Invalid simulation configuration")?;

    if args.headless {
        run_headless(simulation, &config);
        return Ok(());
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Create the application state
    let mut app = App::new(simulation);

    // Run the main application loop, restoring the terminal even on error
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    result?;

    println!(
        "Simulation finished after {} ticks: {} (seed {})",
        app.simulation.tick(),
        app.simulation.state(),
        config.seed.unwrap_or_default()
    );
    Ok(())
}

/// Prints every tick as text, with a point-of-view map every ten ticks.
fn run_headless(mut simulation: Simulation, config: &SimConfig) {
    println!("=== SIMULATION PARAMETERS ===");
    println!("World Size: {}x{}", config.width, config.height);
    println!("Starting Position: {}", config.start);
    println!("GPS Targets: {}", config.targets.len());
    for (i, target) in config.targets.iter().enumerate() {
        println!("  Target {}: {}", i + 1, target);
    }
    let p = &config.population;
    println!("Moving Cars: {}", p.moving_cars);
    println!("Moving Bikes: {}", p.moving_bikes);
    println!("Parked Cars: {}", p.parked_cars);
    println!("Stop Signs: {}", p.stop_signs);
    println!("Traffic Lights: {}", p.traffic_lights);
    println!("Simulation Ticks: {}", config.max_ticks);
    println!("Min Confidence: {}%", config.min_confidence * 100.0);
    println!("Random Seed: {}", config.seed.unwrap_or_default());
    print!("{}", view::full_view(&simulation.snapshot()));

    while let Some(report) = simulation.step() {
        println!("\n=== TICK {} ===", report.tick);
        for id in &report.removed {
            println!("  {} left the world", id);
        }
        println!("Raw Sensor Readings:");
        if report.raw.is_empty() {
            println!("  No objects detected");
        }
        for reading in &report.raw {
            println!("  {}", reading);
        }
        println!("Fused Sensor Readings:");
        if report.fused.is_empty() {
            println!("  No fused readings");
        }
        for reading in &report.fused {
            println!("  {}", reading);
        }
        println!(
            "Decision: {} -> {} facing {} at speed {}",
            report.action,
            report.position,
            report.heading,
            report.speed.cells_per_tick()
        );
        if report.tick % 10 == 0 || report.state.is_terminal() {
            println!("--- POV ---");
            print!("{}", view::pov_view(&simulation.snapshot(), report.position, 5));
        }
    }

    println!("\n=== SIMULATION COMPLETE: {} ===", simulation.state());
    println!("Final Position: {}", simulation.car().position());
    if simulation.car().navigator().has_more_targets() {
        println!("Remaining targets: Yes");
    } else {
        println!("All targets reached!");
    }
    print!("{}", view::full_view(&simulation.snapshot()));
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        // Draw the UI
        terminal.draw(|f| ui(f, app))?;

        // Calculate timeout for event polling
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // Poll for events (keyboard, mouse, etc.)
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.toggle_pause(),
                    _ => {}
                }
            }
        }

        // Update application state if enough time has passed
        if last_tick.elapsed() >= tick_rate {
            app.tick(); // Perform simulation step
            last_tick = Instant::now();
        }

        // Exit loop if requested
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),   // Map and readings
            Constraint::Length(4), // Car status
            Constraint::Length(2), // Help
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_map(frame, top[0], &app.simulation.snapshot());
    render_readings(frame, top[1], app.last_report.as_ref());
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Press 'q' or 'Esc' to quit, 'space' to pause.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn glyph_style(glyph: char) -> Style {
    match glyph {
        '@' => Style::default().fg(Color::Red).bold(),
        'R' => Style::default().fg(Color::Red),
        'G' => Style::default().fg(Color::Green),
        'Y' => Style::default().fg(Color::Yellow),
        'B' => Style::default().fg(Color::Cyan),
        'C' => Style::default().fg(Color::Blue),
        'S' => Style::default().fg(Color::Magenta),
        'P' => Style::default().fg(Color::Gray),
        _ => Style::default().fg(Color::DarkGray),
    }
}

/// Renders the world snapshot, north at the top.
fn render_map(frame: &mut Frame, area: Rect, grid: &Grid<char>) {
    let lines: Vec<Line> = (0..grid.height())
        .rev()
        .filter_map(|y| grid.row(y))
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .map(|&glyph| Span::styled(glyph.to_string(), glyph_style(glyph)))
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Drive World").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Lists the fused readings of the last tick.
fn render_readings(frame: &mut Frame, area: Rect, report: Option<&TickReport>) {
    let items: Vec<ListItem> = match report {
        Some(report) if !report.fused.is_empty() => report
            .fused
            .iter()
            .map(|reading| ListItem::new(reading.to_string()))
            .collect(),
        _ => vec![ListItem::new("No fused readings")],
    };
    let title = match report {
        Some(report) => format!("Fused readings ({} raw)", report.raw.len()),
        None => "Fused readings".to_string(),
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let sim = &app.simulation;
    let car = sim.car();
    let target = car
        .navigator()
        .current_target()
        .map_or_else(|| "none".to_string(), |t| t.to_string());
    let decision = app
        .last_report
        .as_ref()
        .map_or_else(|| "-".to_string(), |r| r.action.to_string());
    let state_style = match sim.state() {
        SimState::Running => Style::default().fg(Color::Green),
        SimState::TargetsExhausted => Style::default().fg(Color::Cyan),
        _ => Style::default().fg(Color::Red),
    };

    let lines = vec![
        Line::from(format!(
            "Tick {}/{}  Car {} facing {} speed {}  Target {}  Decision {}",
            sim.tick(),
            sim.max_ticks(),
            car.position(),
            car.facing(),
            car.speed(),
            target,
            decision
        )),
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(sim.state().to_string(), state_style),
            Span::raw(if app.paused { "  (paused)" } else { "" }),
        ]),
    ];
    let status = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Car"));
    frame.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gps_pairs_become_start_and_targets() {
        let args = Args::parse_from(["drive", "--seed", "3", "--gps", "1", "2", "8", "9", "-4", "5"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.start, Position::new(1, 2));
        assert_eq!(config.targets, vec![Position::new(8, 9), Position::new(-4, 5)]);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn single_gps_pair_targets_the_start() {
        let args = Args::parse_from(["drive", "--seed", "1", "--gps", "4", "4"]);
        let config = args.to_config().unwrap();
        assert_eq!(config.targets, vec![Position::new(4, 4)]);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "drive",
            "--seed",
            "1",
            "--dim-x",
            "12",
            "--num-moving-bikes",
            "0",
            "--min-confidence-threshold",
            "55",
            "--creep",
            "--gps",
            "0",
            "0",
            "5",
            "5",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.width, 12);
        assert_eq!(config.height, 40);
        assert_eq!(config.population.moving_bikes, 0);
        assert!((config.min_confidence - 0.55).abs() < 1e-12);
        assert!(config.rules.creep_when_stopped);
    }

    #[test]
    fn config_file_seed_zero_is_kept() {
        let file: SimConfig = toml::from_str(
            "seed = 0\nmax_ticks = 30\ntargets = [{ x = 3, y = 4 }]\n",
        )
        .unwrap();
        let args = Args::parse_from(["drive", "--config", "sim.toml"]);
        let config = args.merge(file).unwrap();
        assert_eq!(config.seed, Some(0));
        assert_eq!(config.max_ticks, 30);
        assert_eq!(config.targets, vec![Position::new(3, 4)]);
        assert!(!config.rules.creep_when_stopped);

        let args = Args::parse_from(["drive", "--config", "sim.toml", "--seed", "9"]);
        let file: SimConfig = toml::from_str("seed = 0").unwrap();
        assert_eq!(args.merge(file).unwrap().seed, Some(9));
    }

    #[test]
    fn missing_seed_is_filled_in() {
        let args = Args::parse_from(["drive", "--gps", "1", "1"]);
        assert!(args.to_config().unwrap().seed.is_some());
    }

    #[test]
    fn missing_gps_is_an_error() {
        let args = Args::parse_from(["drive", "--seed", "1"]);
        assert!(args.to_config().is_err());
        let args = Args::parse_from(["drive", "--gps", "1", "2", "3"]);
        assert!(args.to_config().is_err());
    }
}
