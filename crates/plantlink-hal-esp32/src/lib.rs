#![no_std]

//! ESP32 board adapters for the plantlink gateway.

pub mod cloud;
pub mod network;
pub mod platform;
pub mod sensor;
pub mod serial;
