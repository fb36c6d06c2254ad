//! Input routing: slash command table, line parser, and the router that
//! acts on parsed input.

pub mod command;
pub mod dispatch;
pub mod parser;

pub use command::{COMMAND_SENTINEL, Command, CommandAction, SeedPayload};
pub use dispatch::{InputRouter, RouteOutcome, SubmitPermit, UserInput};
pub use parser::{InputParser, ParsedInput};
