use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use spin_sleep::SpinSleeper;

pub const MATRIX_ROWS: usize = 4;
pub const MATRIX_COLS: usize = 4;

/// The three status leds on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Alert,
    Info,
    Ok,
}

impl Led {
    pub const ALL: [Led; 3] = [Led::Alert, Led::Info, Led::Ok];

    pub const fn index(self) -> usize {
        match self {
            Led::Alert => 0,
            Led::Info => 1,
            Led::Ok => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Led::Alert => "alert",
            Led::Info => "info",
            Led::Ok => "ok",
        }
    }
}

/// Physical line numbering, fixed at startup and passed by reference.
///
/// `leds` is indexed by `Led::index`.
pub struct PinAssignment {
    pub rows: [u8; MATRIX_ROWS],
    pub cols: [u8; MATRIX_COLS],
    pub leds: [u8; 3],
    pub buzzer: u8,
}

impl PinAssignment {
    /// Wiring of the reference board: rows R1-R4, columns C1-C4,
    /// alert/info/ok leds on the red/blue/green lines, buzzer on GPIO 21.
    pub const fn reference_board() -> Self {
        Self {
            rows: [8, 7, 6, 5],
            cols: [4, 3, 2, 28],
            leds: [13, 12, 11],
            buzzer: 21,
        }
    }
}

/// Line-level capability the firmware is written against.
///
/// Row lines are inputs biased to inactive, column lines are outputs.
/// `delay_ms` blocks; the firmware has no other work to yield to.
pub trait Board {
    fn drive_column(&mut self, col: usize, active: bool);
    fn read_row(&mut self, row: usize) -> bool;
    fn set_led(&mut self, led: Led, on: bool);
    fn delay_ms(&mut self, ms: u64);
    /// One-way exit into the boot facility. Does not return control to
    /// normal scanning; callers stop after invoking it.
    fn reset_to_bootloader(&mut self);
}

/// Electrical state shared between the firmware thread and the simulator
/// UI thread: switch closures, led levels and the reset latch.
pub struct SharedLines {
    switches: [AtomicBool; MATRIX_ROWS * MATRIX_COLS],
    leds: [AtomicBool; 3],
    reset: AtomicBool,
}

impl SharedLines {
    pub fn new() -> Self {
        Self {
            switches: Default::default(),
            leds: Default::default(),
            reset: AtomicBool::new(false),
        }
    }

    pub fn press(&self, row: usize, col: usize) {
        self.switches[row * MATRIX_COLS + col].store(true, Ordering::Relaxed);
    }

    pub fn release(&self, row: usize, col: usize) {
        self.switches[row * MATRIX_COLS + col].store(false, Ordering::Relaxed);
    }

    pub fn is_closed(&self, row: usize, col: usize) -> bool {
        self.switches[row * MATRIX_COLS + col].load(Ordering::Relaxed)
    }

    pub fn led(&self, led: Led) -> bool {
        self.leds[led.index()].load(Ordering::Relaxed)
    }

    pub fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::Relaxed)
    }

    fn set_led(&self, led: Led, on: bool) {
        self.leds[led.index()].store(on, Ordering::Relaxed);
    }

    fn latch_reset(&self) {
        self.reset.store(true, Ordering::Relaxed);
    }
}

/// Board implementation backed by the simulated matrix.
///
/// A row reads active when some driven column has a closed switch on that
/// row, which is how the real matrix conducts.
pub struct SimBoard {
    pins: PinAssignment,
    lines: Arc<SharedLines>,
    driven: [bool; MATRIX_COLS],
    sleeper: SpinSleeper,
}

impl SimBoard {
    pub fn new(pins: PinAssignment, lines: Arc<SharedLines>) -> Self {
        log::debug!(
            "matrix wiring: rows {:?} cols {:?} leds {:?} buzzer {}",
            pins.rows,
            pins.cols,
            pins.leds,
            pins.buzzer
        );
        Self {
            pins,
            lines,
            driven: [false; MATRIX_COLS],
            sleeper: SpinSleeper::default(),
        }
    }
}

impl Board for SimBoard {
    fn drive_column(&mut self, col: usize, active: bool) {
        log::trace!("col {} (gpio {}) -> {}", col, self.pins.cols[col], active);
        self.driven[col] = active;
    }

    fn read_row(&mut self, row: usize) -> bool {
        (0..MATRIX_COLS).any(|col| self.driven[col] && self.lines.is_closed(row, col))
    }

    fn set_led(&mut self, led: Led, on: bool) {
        log::debug!("led {} (gpio {}) -> {}", led.name(), self.pins.leds[led.index()], on);
        self.lines.set_led(led, on);
    }

    fn delay_ms(&mut self, ms: u64) {
        self.sleeper.sleep(Duration::from_millis(ms));
    }

    fn reset_to_bootloader(&mut self) {
        println!("resetting into firmware-update mode");
        self.lines.latch_reset();
    }
}
