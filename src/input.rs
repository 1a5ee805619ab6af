use crate::controls::Controls;
use crossterm::event::{poll, read, Event, KeyCode};
use crossterm::terminal;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// things the viewer can ask of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Quit,
    /// time runs 10x slower
    Slower,
    /// time runs 10x faster, up to real time
    Faster,
    /// stop time, or restart it at the speed it stopped at
    TogglePause,
    /// advance one dot while paused
    Step,
    /// back to real time
    Reset,
}

/// map of keys to commands
const KEYMAP: [(char, Command); 7] = [
    ('q', Command::Quit),
    ('t', Command::Slower),
    ('T', Command::Faster),
    ('s', Command::TogglePause),
    (' ', Command::Step),
    ('r', Command::Reset),
    ('R', Command::Reset),
];

/// reads commands from the viewer
pub trait Input {
    /// everything asked for since the last call, oldest first; never blocks
    fn poll_commands(&mut self) -> Result<Vec<Command>, io::Error>;
}

/// keyboard in a raw-mode terminal, via crossterm
pub struct TermInput {
    keymap: HashMap<char, Command>,
}

impl TermInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput {
            keymap: HashMap::from(KEYMAP),
        })
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TermInput {
    fn poll_commands(&mut self) -> Result<Vec<Command>, io::Error> {
        let mut commands = Vec::new();
        while poll(Duration::from_millis(0))? {
            if let Event::Key(evt) = read()? {
                match evt.code {
                    KeyCode::Char(key) => match self.keymap.get(&key) {
                        Some(cmd) => commands.push(*cmd),
                        None => debug!("no command for key {:?}", key),
                    },
                    KeyCode::Esc => commands.push(Command::Quit),
                    KeyCode::End => commands.push(Command::Reset),
                    _ => {}
                }
            }
        }
        Ok(commands)
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    commands: Vec<Command>,
}

impl DummyInput {
    pub fn new(commands: &[Command]) -> Self {
        DummyInput {
            commands: Vec::from(commands),
        }
    }
}

impl Input for DummyInput {
    fn poll_commands(&mut self) -> Result<Vec<Command>, io::Error> {
        Ok(std::mem::take(&mut self.commands))
    }
}

/// Turns commands into changes on the shared controls.
pub struct Controller {
    controls: Arc<Controls>,
    /// speed to go back to when unpausing
    paused_dilation: Option<f64>,
}

impl Controller {
    pub fn new(controls: Arc<Controls>) -> Self {
        Controller {
            controls,
            paused_dilation: None,
        }
    }

    /// act on `cmd`; false once the viewer wants to quit
    pub fn apply(&mut self, cmd: Command) -> bool {
        let c = &self.controls;
        match cmd {
            Command::Quit => return false,
            Command::Slower => c.set_dilation(c.dilation() / 10.0),
            Command::Faster => c.set_dilation((c.dilation() * 10.0).min(1.0)),
            Command::TogglePause => match self.paused_dilation.take() {
                Some(d) => c.set_dilation(d),
                None => {
                    self.paused_dilation = Some(c.dilation());
                    c.set_dilation(0.0);
                }
            },
            Command::Step => c.request_step(),
            Command::Reset => {
                self.paused_dilation = None;
                c.set_dilation(1.0);
            }
        }
        debug!(?cmd, dilation = c.dilation(), "control change");
        true
    }
}
