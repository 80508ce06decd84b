#![cfg_attr(not(test), no_std)]

//! Board-independent control loop for the plantlink sensor gateway.
//!
//! Everything that touches hardware or the network sits behind the traits
//! in [`device`], [`frame::LineSource`] and [`clock::WallClock`], so the
//! whole cycle runs on the host under test.

pub mod app;
pub mod clock;
pub mod config;
pub mod device;
pub mod frame;
pub mod observer;
pub mod publish;
pub mod retry;
pub mod schedule;
pub mod validate;
