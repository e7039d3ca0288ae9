//! SSD1306 status panel for the device.
//!
//! Thin wrapper over the `ssd1306` driver and a GPIO alert LED. The
//! display is cleared and redrawn on every `show`, so the panel always
//! carries exactly one status line.

use super::{FlashGate, LedMode, StatusPanel};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_sys::EspError;
use log::warn;
use ssd1306::{
    mode::BufferedGraphicsMode, prelude::*, I2CDisplayInterface, Ssd1306,
};
use std::fmt;
use std::time::Instant;

type Display<'d> = Ssd1306<
    I2CInterface<I2cDriver<'d>>,
    DisplaySize128x32,
    BufferedGraphicsMode<DisplaySize128x32>,
>;

/// Errors raised while bringing up the panel hardware.
///
/// The firmware treats these as fatal: a unit that cannot show status is
/// not operable.
#[derive(Debug)]
pub enum PanelError {
    /// The display controller did not initialize.
    Display(String),
    /// The LED pin could not be configured.
    Pin(EspError),
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display(msg) => write!(f, "display init failed: {}", msg),
            Self::Pin(e) => write!(f, "LED pin init failed: {:?}", e),
        }
    }
}

impl std::error::Error for PanelError {}

impl From<EspError> for PanelError {
    fn from(e: EspError) -> Self {
        Self::Pin(e)
    }
}

/// OLED display plus alert LED.
pub struct OledPanel<'d> {
    display: Display<'d>,
    led: PinDriver<'d, AnyOutputPin, Output>,
    mode: LedMode,
    gate: FlashGate,
    style: MonoTextStyle<'static, BinaryColor>,
}

impl<'d> OledPanel<'d> {
    /// Initialize the display and the LED pin.
    pub fn new(i2c: I2cDriver<'d>, led_pin: AnyOutputPin) -> Result<Self, PanelError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display
            .init()
            .map_err(|e| PanelError::Display(format!("{:?}", e)))?;

        let mut led = PinDriver::output(led_pin)?;
        led.set_low()?;

        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();

        Ok(Self {
            display,
            led,
            mode: LedMode::Off,
            gate: FlashGate::new(),
            style,
        })
    }

    /// Service the flash gate. Called every loop tick.
    pub fn run(&mut self, now: Instant) {
        if self.mode != LedMode::Flash {
            return;
        }
        if let Some(level) = self.gate.tick(now) {
            let result = if level {
                self.led.set_high()
            } else {
                self.led.set_low()
            };
            if let Err(e) = result {
                warn!("failed to toggle LED: {:?}", e);
            }
        }
    }
}

impl<'d> StatusPanel for OledPanel<'d> {
    fn show(&mut self, text: &str) {
        self.display.clear_buffer();
        let _ = Text::with_baseline(text, Point::zero(), self.style, Baseline::Top)
            .draw(&mut self.display);
        if let Err(e) = self.display.flush() {
            warn!("failed to flush display: {:?}", e);
        }
    }

    fn led(&mut self, mode: LedMode) {
        self.mode = mode;
        self.gate.reset();
        let result = match mode {
            LedMode::On => self.led.set_high(),
            // Flash starts from off; the next run tick lights it.
            LedMode::Off | LedMode::Flash => self.led.set_low(),
        };
        if let Err(e) = result {
            warn!("failed to set LED: {:?}", e);
        }
    }
}
