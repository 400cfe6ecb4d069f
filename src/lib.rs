#![allow(
    clippy::len_zero,
    clippy::new_without_default,
    clippy::too_many_arguments,
    clippy::should_implement_trait
)]

#[macro_use]
mod macros;

pub mod cli;
pub mod client;
pub mod config;
pub mod event_loop;
pub mod globals;
pub mod ifs;
#[cfg(test)]
mod it;
pub mod logger;
pub mod object;
pub mod state;
pub mod time;
pub mod tree;
pub mod utils;
pub mod wheel;
pub mod wire;
