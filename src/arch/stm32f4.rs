//! # STM32F411 Peripherals
//!
//! Register-level drivers for the Nucleo-F411RE wiring:
//!
//! | Function        | Peripheral | Pins               |
//! |-----------------|------------|--------------------|
//! | Encoder A/B     | TIM4 CH1/2 | PB6, PB7 (AF2)     |
//! | Motor IN1/IN2   | TIM3 CH1/2 | PB4, PB5 (AF2)     |
//! | Motor enable    | GPIO       | PA10               |
//! | Host serial     | USART2     | PA2 TX, PA3 RX (AF7) |
//! | Stop button     | GPIO       | PC13 (active low)  |
//!
//! All clocks run from the 16 MHz HSI selected at reset.

use core::ptr::{read_volatile, write_volatile};

use crate::config::{ENCODER_MODULUS, SYSTEM_CLOCK_HZ};
use crate::drivers::{Actuator, PositionSensor, SerialTransport};
use crate::error::TransportError;

// ---------------------------------------------------------------------------
// Register map
// ---------------------------------------------------------------------------

const RCC: usize = 0x4002_3800;
const RCC_AHB1ENR: usize = RCC + 0x30;
const RCC_APB1ENR: usize = RCC + 0x40;

const GPIOA: usize = 0x4002_0000;
const GPIOB: usize = 0x4002_0400;
const GPIOC: usize = 0x4002_0800;
const GPIO_MODER: usize = 0x00;
const GPIO_IDR: usize = 0x10;
const GPIO_BSRR: usize = 0x18;
const GPIO_AFRL: usize = 0x20;
const GPIO_AFRH: usize = 0x24;

const TIM3: usize = 0x4000_0400;
const TIM4: usize = 0x4000_0800;
const TIM_CR1: usize = 0x00;
const TIM_SMCR: usize = 0x08;
const TIM_EGR: usize = 0x14;
const TIM_CCMR1: usize = 0x18;
const TIM_CCER: usize = 0x20;
const TIM_CNT: usize = 0x24;
const TIM_PSC: usize = 0x28;
const TIM_ARR: usize = 0x2C;
const TIM_CCR1: usize = 0x34;
const TIM_CCR2: usize = 0x38;

const USART2: usize = 0x4000_4400;
const USART_SR: usize = 0x00;
const USART_DR: usize = 0x04;
const USART_BRR: usize = 0x08;
const USART_CR1: usize = 0x0C;

const SR_PE: u32 = 1 << 0;
const SR_FE: u32 = 1 << 1;
const SR_NF: u32 = 1 << 2;
const SR_ORE: u32 = 1 << 3;
const SR_RXNE: u32 = 1 << 5;
const SR_TXE: u32 = 1 << 7;

#[inline]
fn read(addr: usize) -> u32 {
    // SAFETY: every address used in this module is a valid, aligned
    // STM32F411 peripheral register
    unsafe { read_volatile(addr as *const u32) }
}

#[inline]
fn write(addr: usize, value: u32) {
    // SAFETY: see `read`
    unsafe { write_volatile(addr as *mut u32, value) }
}

#[inline]
fn modify(addr: usize, f: impl FnOnce(u32) -> u32) {
    write(addr, f(read(addr)));
}

/// Put `pin` of `port` in mode `mode` (0 input, 1 output, 2 alternate).
fn set_mode(port: usize, pin: u32, mode: u32) {
    modify(port + GPIO_MODER, |v| (v & !(0b11 << (pin * 2))) | (mode << (pin * 2)));
}

/// Route `pin` of `port` to alternate function `af`.
fn set_alternate(port: usize, pin: u32, af: u32) {
    let (reg, shift) = if pin < 8 {
        (GPIO_AFRL, pin * 4)
    } else {
        (GPIO_AFRH, (pin - 8) * 4)
    };
    modify(port + reg, |v| (v & !(0xF << shift)) | (af << shift));
    set_mode(port, pin, 0b10);
}

/// Enable the GPIOA/B/C, TIM3, TIM4 and USART2 clocks.
pub fn enable_clocks() {
    modify(RCC_AHB1ENR, |v| v | 0b111);
    modify(RCC_APB1ENR, |v| v | (1 << 1) | (1 << 2) | (1 << 17));
    // Two cycles before touching the peripherals
    let _ = read(RCC_APB1ENR);
}

// ---------------------------------------------------------------------------
// Quadrature encoder (TIM4)
// ---------------------------------------------------------------------------

/// TIM4 in encoder mode 3, counting both edges of both channels.
pub struct QuadratureEncoder {
    _private: (),
}

impl QuadratureEncoder {
    pub fn new() -> Self {
        set_alternate(GPIOB, 6, 2);
        set_alternate(GPIOB, 7, 2);

        write(TIM4 + TIM_CR1, 0);
        write(TIM4 + TIM_PSC, 0);
        write(TIM4 + TIM_ARR, ENCODER_MODULUS - 1);
        // CC1S = CC2S = 01: TI1/TI2 inputs
        write(TIM4 + TIM_CCMR1, 0b01 | (0b01 << 8));
        write(TIM4 + TIM_CCER, 0);
        // SMS = 011: encoder mode 3
        write(TIM4 + TIM_SMCR, 0b011);
        write(TIM4 + TIM_CNT, 0);
        write(TIM4 + TIM_CR1, 1);
        Self { _private: () }
    }
}

impl PositionSensor for QuadratureEncoder {
    fn read(&mut self) -> u32 {
        read(TIM4 + TIM_CNT) & (ENCODER_MODULUS - 1)
    }

    fn modulus(&self) -> u32 {
        ENCODER_MODULUS
    }
}

// ---------------------------------------------------------------------------
// H-bridge motor (TIM3 PWM)
// ---------------------------------------------------------------------------

/// PWM frequency on both bridge inputs.
const PWM_HZ: u32 = 20_000;
const PWM_TOP: u32 = SYSTEM_CLOCK_HZ / PWM_HZ;

/// Two-input H-bridge: CH1 drives forward, CH2 reverse, PA10 enables.
pub struct HBridgeMotor {
    _private: (),
}

impl HBridgeMotor {
    /// Configure the PWM outputs and enable the bridge at zero duty.
    pub fn new() -> Self {
        set_alternate(GPIOB, 4, 2);
        set_alternate(GPIOB, 5, 2);
        set_mode(GPIOA, 10, 0b01);

        write(TIM3 + TIM_CR1, 0);
        write(TIM3 + TIM_PSC, 0);
        write(TIM3 + TIM_ARR, PWM_TOP - 1);
        write(TIM3 + TIM_CCR1, 0);
        write(TIM3 + TIM_CCR2, 0);
        // OCxM = 110 (PWM mode 1), OCxPE preload
        write(
            TIM3 + TIM_CCMR1,
            (0b110 << 4) | (1 << 3) | (0b110 << 12) | (1 << 11),
        );
        write(TIM3 + TIM_CCER, (1 << 0) | (1 << 4));
        write(TIM3 + TIM_EGR, 1);
        // ARPE | CEN
        write(TIM3 + TIM_CR1, (1 << 7) | 1);

        write(GPIOA + GPIO_BSRR, 1 << 10);
        Self { _private: () }
    }
}

impl Actuator for HBridgeMotor {
    fn set_output(&mut self, percent: f32) {
        let percent = percent.clamp(-100.0, 100.0);
        let magnitude = if percent < 0.0 { -percent } else { percent };
        let duty = (magnitude * PWM_TOP as f32 / 100.0) as u32;
        if percent >= 0.0 {
            write(TIM3 + TIM_CCR2, 0);
            write(TIM3 + TIM_CCR1, duty);
        } else {
            write(TIM3 + TIM_CCR1, 0);
            write(TIM3 + TIM_CCR2, duty);
        }
    }
}

// ---------------------------------------------------------------------------
// Host serial link (USART2)
// ---------------------------------------------------------------------------

/// Blocking USART2, 8N1, no flow control.
pub struct Usart2 {
    _private: (),
}

impl Usart2 {
    pub fn new(baud: u32) -> Self {
        set_alternate(GPIOA, 2, 7);
        set_alternate(GPIOA, 3, 7);

        write(USART2 + USART_CR1, 0);
        // Oversampling by 16: BRR = fck / baud, rounded
        write(USART2 + USART_BRR, (SYSTEM_CLOCK_HZ + baud / 2) / baud);
        // UE | TE | RE
        write(USART2 + USART_CR1, (1 << 13) | (1 << 3) | (1 << 2));
        Self { _private: () }
    }

    fn write_byte(&mut self, byte: u8) {
        while read(USART2 + USART_SR) & SR_TXE == 0 {}
        write(USART2 + USART_DR, u32::from(byte));
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        loop {
            let sr = read(USART2 + USART_SR);
            if sr & (SR_PE | SR_FE | SR_NF | SR_ORE) != 0 {
                // Reading DR after SR clears the error flags
                let _ = read(USART2 + USART_DR);
                return Err(TransportError::Io);
            }
            if sr & SR_RXNE != 0 {
                return Ok(read(USART2 + USART_DR) as u8);
            }
        }
    }
}

impl SerialTransport for Usart2 {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for &b in bytes {
            self.write_byte(b);
        }
        Ok(())
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut n = 0;
        loop {
            let byte = self.read_byte()?;
            if n == buf.len() {
                // Discard the rest of the line so the next read starts clean
                while byte != b'\n' && self.read_byte()? != b'\n' {}
                return Err(TransportError::LineTooLong);
            }
            buf[n] = byte;
            n += 1;
            if byte == b'\n' {
                return Ok(n);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// User button (PC13)
// ---------------------------------------------------------------------------

/// Configure PC13 as an input. The Nucleo board has the pull-up.
pub fn init_user_button() {
    set_mode(GPIOC, 13, 0b00);
}

/// Whether the blue user button is held down.
#[inline]
pub fn user_button_pressed() -> bool {
    read(GPIOC + GPIO_IDR) & (1 << 13) == 0
}
