//! Line-oriented input surface.
//!
//! ```text
//! pan <dx> <dy>      pan by a delta in display units
//! inset <dx> <dy>    drag the minimap rectangle by a delta in minimap units
//! contrast <v>       set contrast, clamped to [0, 2]
//! brightness <v>     set brightness, clamped to [0, 2]
//! cell <size>        set the cell size, clamped to the configured range
//! quit               end the session
//! ```

use std::io::{self, BufRead, IsTerminal};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::InputEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputCommand {
    Event(InputEvent),
    Quit,
}

/// Parses one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<InputCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let mut number = |name: &str| -> Result<f32> {
        let raw = words
            .next()
            .ok_or_else(|| anyhow!("`{verb}` expects {name}"))?;
        let value: f32 = raw
            .parse()
            .with_context(|| format!("invalid {name} `{raw}`"))?;
        if !value.is_finite() {
            bail!("{name} must be finite");
        }
        Ok(value)
    };

    let command = match verb.as_str() {
        "pan" => {
            let dx = number("dx")?;
            let dy = number("dy")?;
            InputCommand::Event(InputEvent::Pan { dx, dy })
        }
        "inset" => {
            let dx = number("dx")?;
            let dy = number("dy")?;
            InputCommand::Event(InputEvent::InsetDrag { dx, dy })
        }
        "contrast" => InputCommand::Event(InputEvent::SetContrast(number("a value")?)),
        "brightness" => InputCommand::Event(InputEvent::SetBrightness(number("a value")?)),
        "cell" => InputCommand::Event(InputEvent::SetCellSize(number("a size")?)),
        "quit" | "exit" => InputCommand::Quit,
        other => bail!("unknown command `{other}`"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected argument `{extra}`");
    }
    Ok(Some(command))
}

/// Forwards commands from `reader` until EOF, `quit`, or cancellation.
///
/// Returns `true` when the session should end (a `quit` was read).
pub fn forward_commands<R: BufRead>(
    reader: R,
    events: &Sender<InputEvent>,
    cancel: &CancellationToken,
) -> Result<bool> {
    for line in reader.lines() {
        if cancel.is_cancelled() {
            break;
        }
        let line = line.context("failed to read input line")?;
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(InputCommand::Quit)) => return Ok(true),
            Ok(Some(InputCommand::Event(event))) => {
                debug!(?event, "input event");
                if events.blocking_send(event).is_err() {
                    break;
                }
            }
            Err(err) => warn!(line = %line.trim(), "ignoring input: {err:#}"),
        }
    }
    Ok(false)
}

/// Reads commands from stdin on a detached thread.
///
/// EOF ends the session only when stdin is a terminal, so piped command
/// scripts can run out while the pipeline keeps going.
pub fn spawn_stdin_reader(events: Sender<InputEvent>, cancel: CancellationToken) -> Result<()> {
    let interactive = io::stdin().is_terminal();
    thread::Builder::new()
        .name("stdin-input".into())
        .spawn(move || {
            let stdin = io::stdin();
            match forward_commands(stdin.lock(), &events, &cancel) {
                Ok(true) => {
                    info!("quit requested; initiating shutdown");
                    cancel.cancel();
                }
                Ok(false) if interactive => {
                    info!("stdin closed; initiating shutdown");
                    cancel.cancel();
                }
                Ok(false) => debug!("input script exhausted"),
                Err(err) => warn!("stdin reader failed: {err:#}"),
            }
        })
        .context("failed to spawn stdin reader thread")?;
    Ok(())
}
