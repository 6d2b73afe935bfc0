//! DiSEqC command calculator.
//!
//! Runs each operation against an in-memory transport and prints the frames
//! that a tuner would transmit.
//!
//! Usage:
//!   diseqc usals <lat> <long> <sat_long>
//!   diseqc switch <committed 0-4> <uncommitted 0-8> [13|18] [on|off]
//!   diseqc step <east|west>
//!   diseqc goto <slot>
//!   diseqc store <slot>
//!   diseqc decode <hex bytes...>
//!
//! Set RUST_LOG=debug to see each frame as it is sent.

use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use diseqc::transport::{Event, Recorder};
use diseqc::{Command, CommandFrame, Controller, Direction, Settings, Site, Tone, Voltage};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "usals" => usals(&args[2..]),
        "switch" => switch(&args[2..]),
        "step" => step(&args[2..]),
        "goto" => slot_command(&args[2..], false),
        "store" => slot_command(&args[2..], true),
        "decode" => decode(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        other => Err(format!("unknown command: {other}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"DiSEqC command calculator

USAGE:
    diseqc <COMMAND> [ARGS]

COMMANDS:
    usals  <lat> <long> <sat_long>       USALS goto-angle for a site and satellite
    switch <committed> <uncommitted> [13|18] [on|off]
                                         Switch selection (0 = skip)
    step   <east|west>                   Drive one step
    goto   <slot>                        Go to stored position
    store  <slot>                        Store current position
    decode <hex bytes...>                Identify a command frame

Degrees are signed: negative latitude is South, negative longitude is West."#
    );
}

fn dry_run(settings: Settings) -> Controller<Recorder> {
    Controller::from_settings(
        Recorder::new(),
        Settings {
            servo_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..settings
        },
    )
}

fn print_events(ctl: &Controller<Recorder>) {
    for event in ctl.transport().events() {
        match event {
            Event::Tone(t) => println!("tone     {t}"),
            Event::Voltage(v) => println!("voltage  {v}"),
            Event::Command(f) => match Command::decode(f) {
                Ok(cmd) => println!("command  {f}  {cmd}"),
                Err(_) => println!("command  {f}"),
            },
        }
    }
}

fn arg<T: FromStr>(args: &[String], i: usize, name: &str) -> Result<T, String> {
    let raw = args.get(i).ok_or_else(|| format!("missing <{name}>"))?;
    raw.parse().map_err(|_| format!("invalid <{name}>: {raw}"))
}

fn usals(args: &[String]) -> Result<(), String> {
    let site = Site::new(arg(args, 0, "lat")?, arg(args, 1, "long")?);
    let sat_long: f64 = arg(args, 2, "sat_long")?;

    let mut ctl = dry_run(Settings::with_site(site));
    let sol = ctl.goto_satellite(sat_long).map_err(|e| e.to_string())?;
    println!("site         {site}");
    println!("satellite    {sat_long:.2}°");
    println!("motor angle  {:.2}°", sol.motor_angle);
    println!("declination  {:.2}°", sol.declination);
    println!("rotor bytes  {:02x} {:02x}", sol.bytes[0], sol.bytes[1]);
    print_events(&ctl);
    Ok(())
}

fn switch(args: &[String]) -> Result<(), String> {
    let committed: u8 = arg(args, 0, "committed")?;
    let uncommitted: u8 = arg(args, 1, "uncommitted")?;
    let voltage = match args.get(2).map(String::as_str) {
        None | Some("13") => Voltage::V13,
        Some("18") => Voltage::V18,
        Some(other) => return Err(format!("invalid voltage: {other}")),
    };
    let tone = match args.get(3).map(String::as_str) {
        None | Some("off") => Tone::Off,
        Some("on") => Tone::On,
        Some(other) => return Err(format!("invalid tone: {other}")),
    };

    let mut ctl = dry_run(Settings {
        voltage,
        tone,
        ..Settings::default()
    });
    ctl.select_switch(committed, uncommitted)
        .map_err(|e| e.to_string())?;
    print_events(&ctl);
    Ok(())
}

fn step(args: &[String]) -> Result<(), String> {
    let direction = match args.first().map(String::as_str) {
        Some("east") => Direction::East,
        Some("west") => Direction::West,
        _ => return Err("expected <east|west>".into()),
    };
    let mut ctl = dry_run(Settings::default());
    ctl.step(direction).map_err(|e| e.to_string())?;
    print_events(&ctl);
    Ok(())
}

fn slot_command(args: &[String], store: bool) -> Result<(), String> {
    let slot: i32 = arg(args, 0, "slot")?;
    let mut ctl = dry_run(Settings::default());
    let result = if store {
        ctl.store_position(slot)
    } else {
        ctl.goto_position(slot)
    };
    result.map_err(|e| e.to_string())?;
    print_events(&ctl);
    Ok(())
}

fn decode(args: &[String]) -> Result<(), String> {
    let bytes = args
        .iter()
        .map(|s| u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|_| format!("invalid byte: {s}")))
        .collect::<Result<Vec<u8>, String>>()?;
    let frame = CommandFrame::new(&bytes).map_err(|e| e.to_string())?;
    let cmd = Command::decode(&frame).map_err(|e| e.to_string())?;
    println!("{frame}  {cmd}");
    Ok(())
}
