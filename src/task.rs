//! Background scheduling: the trigger clock and the fan-out task runner.

pub mod runner;
pub mod trigger_clock;
