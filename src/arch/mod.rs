//! # Board Support
//!
//! Hardware bindings for the STM32F411 Nucleo: the core timer that drives
//! the scheduler clock, and register-level drivers for the encoder, the
//! motor bridge, the serial link and the user button.

pub mod cortex_m4;
pub mod stm32f4;
