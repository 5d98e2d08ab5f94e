#![no_std]

// Shared logic for the multiplexed LED/ADC acquisition controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod adc;
pub mod channels;
pub mod config;
pub mod control;
pub mod health;
pub mod leds;
pub mod orchestrator;
pub mod report;
pub mod sequencer;
pub mod telemetry;
