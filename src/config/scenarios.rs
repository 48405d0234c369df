//! Preset scenarios and the interactive scenario picker

use super::Config;
use crate::errors::{Result, StampedeError};
use std::io::{BufRead, Write};

/// A named population/timing preset
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub label: &'static str,
    pub user_count: u32,
    pub duration_secs: u64,
    pub ramp_up_secs: u64,
}

/// Presets offered by the interactive picker
pub const PRESETS: &[Preset] = &[
    Preset {
        label: "Micro test (5 users)",
        user_count: 5,
        duration_secs: 30,
        ramp_up_secs: 5,
    },
    Preset {
        label: "Light test (10 users)",
        user_count: 10,
        duration_secs: 60,
        ramp_up_secs: 10,
    },
    Preset {
        label: "Medium test (25 users)",
        user_count: 25,
        duration_secs: 120,
        ramp_up_secs: 15,
    },
    Preset {
        label: "Heavy test (50 users)",
        user_count: 50,
        duration_secs: 120,
        ramp_up_secs: 20,
    },
    Preset {
        label: "Stress test (100 users)",
        user_count: 100,
        duration_secs: 180,
        ramp_up_secs: 30,
    },
    Preset {
        label: "Extreme test (200 users)",
        user_count: 200,
        duration_secs: 300,
        ramp_up_secs: 60,
    },
];

/// The fixed ladder the batch driver runs
pub fn batch_scenarios(base: &Config) -> Vec<(String, Config)> {
    [
        ("10 user test", 10, 60, 10),
        ("25 user test", 25, 90, 15),
        ("50 user test", 50, 120, 20),
        ("100 user test", 100, 180, 30),
    ]
    .into_iter()
    .map(|(name, users, duration, ramp_up)| {
        (name.to_string(), base.with_load(users, duration, ramp_up))
    })
    .collect()
}

/// Outcome of the interactive picker
#[derive(Debug)]
pub enum Selection {
    Config(Config),
    Quit,
}

/// Present the scenario menu on stdout and read a selection from stdin
pub fn pick_interactive(base: &Config) -> Result<Selection> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    pick_from(base, &mut input, &mut output)
}

fn pick_from<R: BufRead, W: Write>(base: &Config, input: &mut R, output: &mut W) -> Result<Selection> {
    writeln!(output, "\nSelect a test scenario:\n")?;
    for (index, preset) in PRESETS.iter().enumerate() {
        writeln!(output, "  {}. {}", index + 1, preset.label)?;
        writeln!(
            output,
            "     └─ {} users, {}s duration, {}s ramp-up\n",
            preset.user_count, preset.duration_secs, preset.ramp_up_secs
        )?;
    }
    writeln!(output, "  {}. Custom test", PRESETS.len() + 1)?;
    writeln!(output, "  0. Quit\n")?;
    write!(output, "Enter choice (0-{}): ", PRESETS.len() + 1)?;
    output.flush()?;

    let choice = read_line(input)?;

    if choice == "0" {
        return Ok(Selection::Quit);
    }

    let custom_choice = (PRESETS.len() + 1).to_string();
    if choice == custom_choice {
        let users = prompt_number(input, output, "Number of users", 10)?;
        let duration = prompt_number(input, output, "Duration in seconds", 60)?;
        let ramp_up = prompt_number(input, output, "Ramp-up in seconds", 10)?;
        return Ok(Selection::Config(base.with_load(
            users as u32,
            duration,
            ramp_up,
        )));
    }

    let index: usize = choice
        .parse()
        .ok()
        .filter(|n| (1..=PRESETS.len()).contains(n))
        .ok_or_else(|| StampedeError::config(format!("Invalid scenario choice '{}'", choice)))?;

    let preset = &PRESETS[index - 1];
    Ok(Selection::Config(base.with_load(
        preset.user_count,
        preset.duration_secs,
        preset.ramp_up_secs,
    )))
}

fn prompt_number<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: u64,
) -> Result<u64> {
    write!(output, "{} (default: {}): ", label, default)?;
    output.flush()?;
    let line = read_line(input)?;
    if line.is_empty() {
        return Ok(default);
    }
    line.parse()
        .map_err(|_| StampedeError::config(format!("Invalid number '{}' for {}", line, label)))
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
