//! auxterm - Lend a terminal's keyboard and display to a remote peer
//!
//! auxterm turns the terminal it runs in into an auxiliary console for
//! another machine. A host on the far end of a socket or serial line
//! polls for keystrokes, writes to the display, and asks the terminal to
//! identify itself; auxterm answers one request at a time until the host
//! interrupts the session.
//!
//! # Quick Start
//!
//! ```text
//! auxterm /dev/ttyUSB0        # serve a serial line
//! auxterm -D /tmp/aux.sock    # serve a unix socket
//! auxterm --demo              # scripted in-process exchange, no device
//! ```
//!
//! Settings persist in `~/.auxterm/config.toml`; the log lands in
//! `~/.auxterm/auxterm.log`, never on the terminal being lent out.

use std::env;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::thread;
use std::time::Duration;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use auxterm::config::Config;
use auxterm::host::HostDriver;
use auxterm::link::{DeviceLink, Link, MemoryLink, UnixLink};
use auxterm::session::{LoopMode, Session, SessionError, SessionOptions};
use auxterm::term::{FakeConsole, TermConsole};

/// Command-line overrides
#[derive(Default)]
struct Cli {
    /// Socket or character device to attach
    device: Option<String>,
    /// Block on the link instead of polling
    blocking: bool,
    /// Suppress local echo
    no_echo: bool,
    /// Largest frame payload in bytes
    max_frame: Option<usize>,
    /// Identification string returned to the host
    termspec: Option<String>,
    /// Run the scripted in-process exchange and exit
    demo: bool,
    /// Log at debug level
    debug: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("auxterm {}", VERSION);
}

fn print_help() {
    eprintln!(
        "auxterm {} - Lend this terminal's keyboard and display to a remote peer",
        VERSION
    );
    eprintln!();
    eprintln!("Usage: auxterm [OPTIONS] [DEVICE]");
    eprintln!();
    eprintln!("Link options:");
    eprintln!("  -D, --device <PATH>   Socket or character device to attach");
    eprintln!("  -b, --blocking        Block on the link instead of polling");
    eprintln!("  -m, --max-frame <N>   Largest frame payload in bytes (default: 8192)");
    eprintln!();
    eprintln!("Terminal options:");
    eprintln!("      --no-echo         Do not echo keystrokes to the local display");
    eprintln!("  -t, --termspec <ID>   Identification string returned to the host");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("      --demo            Run a scripted host/terminal exchange and exit");
    eprintln!("      --debug           Log at debug level");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  auxterm /dev/ttyUSB0            Serve a serial line");
    eprintln!("  auxterm -D /tmp/aux.sock -b     Serve a socket in blocking mode");
    eprintln!("  auxterm --demo                  In-process demonstration");
    eprintln!();
    eprintln!("Configuration: ~/.auxterm/config.toml");
    eprintln!("Log file:      ~/.auxterm/auxterm.log");
    eprintln!();
    eprintln!("Exit: the host ends the session with an interrupt packet");
}

fn parse_args() -> Result<Cli, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = Cli::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-D" | "--device" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing device argument".to_string());
                }
                cli.device = Some(args[i].clone());
            }
            "-b" | "--blocking" => {
                cli.blocking = true;
            }
            "--no-echo" => {
                cli.no_echo = true;
            }
            "-m" | "--max-frame" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing max-frame argument".to_string());
                }
                match args[i].parse() {
                    Ok(n) => cli.max_frame = Some(n),
                    Err(_) => {
                        return Err(format!("Invalid max-frame value: {}", args[i]));
                    }
                }
            }
            "-t" | "--termspec" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing termspec argument".to_string());
                }
                cli.termspec = Some(args[i].clone());
            }
            "--demo" => {
                cli.demo = true;
            }
            "--debug" => {
                cli.debug = true;
            }
            arg => {
                if !arg.starts_with('-') && cli.device.is_none() {
                    cli.device = Some(arg.to_string());
                } else {
                    return Err(format!("Unknown argument: {}. Use -h for help.", arg));
                }
            }
        }
        i += 1;
    }

    Ok(cli)
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    // Initialize logging to file. The terminal itself belongs to the
    // peer, so nothing may be printed there once a session starts.
    let home = std::env::var_os("HOME").map(std::path::PathBuf::from);

    let log_path = home
        .map(|h| h.join(".auxterm").join("auxterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("auxterm.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let level = if cli.debug { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    info!("auxterm starting...");

    // Merge: command line args override the config file
    let mut config = Config::load();
    if let Some(device) = cli.device {
        config.device = Some(device);
    }
    if cli.blocking {
        config.mode = "blocking".to_string();
    }
    if cli.no_echo {
        config.local_echo = false;
    }
    if let Some(max_frame) = cli.max_frame {
        config.max_frame = max_frame;
    }
    if let Some(termspec) = cli.termspec {
        config.termspec = Some(termspec);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if cli.demo {
        return run_demo(&config);
    }

    let device = match config.device.clone() {
        Some(device) => device,
        None => {
            eprintln!("Error: no device given. Use -D <PATH> or see --help.");
            std::process::exit(1);
        }
    };

    let options = session_options(&config);
    info!("Device: {}", device);
    info!("Mode: {:?}", options.mode);
    info!("Max frame: {} bytes", options.max_frame);
    info!("Termspec: {}", options.termspec);

    let metadata = match fs::metadata(&device) {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("Cannot stat {}: {}", device, e);
            eprintln!("Error: cannot stat {}: {}", device, e);
            std::process::exit(1);
        }
    };

    let file_type = metadata.file_type();
    if file_type.is_socket() {
        let link = UnixLink::connect(&device)?;
        run_session(link, options)
    } else if file_type.is_char_device() {
        let link = DeviceLink::open(&device)?;
        run_session(link, options)
    } else {
        anyhow::bail!("{} is neither a socket nor a character device", device);
    }
}

fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        mode: config.loop_mode(),
        max_frame: config.max_frame,
        key_buffer: config.key_buffer,
        poll_interval: Duration::from_millis(config.poll_interval_ms),
        local_echo: config.local_echo,
        termspec: config
            .termspec
            .clone()
            .unwrap_or_else(|| format!("auxterm {}", VERSION)),
        idle_timeout: config.idle_timeout_secs.map(Duration::from_secs),
    }
}

/// Attach the real terminal to the link and serve until the peer is done.
fn run_session<L: Link>(link: L, options: SessionOptions) -> anyhow::Result<()> {
    let console = TermConsole::new(options.local_echo)?;
    let mut session = Session::new(link, console, options);

    let result = session.run();

    // Hand the terminal back (raw mode off) before reporting anything.
    drop(session);

    if let Err(ref e) = result {
        error!("session ended with an error: {}", e);
    }
    result.map_err(Into::into)
}

/// Scripted exchange over a memory link: a session thread plays the
/// terminal while this thread plays the host. Exercises every request
/// the protocol defines without touching a real device.
fn run_demo(config: &Config) -> anyhow::Result<()> {
    println!("=== auxterm Demo Mode ===\n");
    println!("Driving an in-process terminal session over a memory link.\n");

    let mut options = session_options(config);
    options.mode = LoopMode::Blocking;

    let (term_end, host_end) = MemoryLink::pair();

    let terminal = thread::spawn(move || -> Result<Vec<u8>, SessionError> {
        let mut console = FakeConsole::new();
        console.queue_key(b"h");
        console.queue_key(b"i");
        let mut session = Session::new(term_end, console, options);
        session.run()?;
        Ok(session.console().output.clone())
    });

    let mut host = HostDriver::new(host_end, config.max_frame);

    let spec = host.query_termspec()?;
    println!("terminal identifies as: {}", spec);

    host.write_display(b"Hello from the host side.\r\n")?;

    let keys = host.poll_keys()?;
    println!("keys collected from the terminal: {:?}", String::from_utf8_lossy(&keys));

    host.send_interrupt()?;

    match terminal.join() {
        Ok(Ok(display)) => {
            println!("terminal display received: {:?}", String::from_utf8_lossy(&display));
        }
        Ok(Err(e)) => anyhow::bail!("demo session failed: {}", e),
        Err(_) => anyhow::bail!("demo session thread panicked"),
    }

    println!("\nDemo complete. Attach a device to serve a real host.");
    Ok(())
}
