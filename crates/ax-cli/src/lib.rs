//! `ax` command-line runner: concrete strategies plus subcommands on top of
//! `ax-engine`.

pub mod commands;
pub mod strategies;
pub mod targets;
