//! Composite video monitor: a stylised CRT that scans a composite signal onto
//! a phosphor screen, keeping its deflection in step with the sync pulses it
//! finds in the signal.
//!
//! ## Design
//!
//! * one dot per sample: the sample rate comes from the signal bandwidth
//! * sawtooth deflection oscillators, nudged straight onto the phase of each
//!   accepted sync pulse; no loop filter, so lock is instant and brittle
//! * simulated time runs against the wall clock, scaled by a dilation factor
//!   the viewer can change live; falling more than a frame behind throws away
//!   whole frames rather than trying to catch up
//! * the phosphor is published as immutable snapshots so the screen never
//!   waits on the simulation
//! * abstract signal, clock, display and input so each can be swapped for a
//!   dummy in tests
//!
//! Model
//!
//! main
//!  |-- config (file + command line) -> timing, glow, dilation
//!  |-- signal (test pattern | noise | tcp feeder -> channel)
//!  |-- simulation thread
//!  |    `-- monitor.run(time keeper, cancel)
//!  |         |-- elapsed = time keeper.elapsed()   // waits
//!  |         |-- signal.skip(elapsed.skipped)
//!  |         |-- for each dot: oscillators -> signal -> sync engine
//!  |         `-- tube.commit(sections, end)
//!  `-- main loop, ~30 Hz
//!       |-- input.poll_commands() -> controller -> controls
//!       `-- display.draw(tube.snapshot())
pub mod config;
pub mod controls;
pub mod display;
pub mod error;
pub mod ingest;
pub mod input;
pub mod monitor;
pub mod oscillator;
pub mod signal;
pub mod sync;
pub mod timekeeper;
pub mod timing;
pub mod tube;
