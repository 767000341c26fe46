use std::time::Duration;

use crate::beeper::Buzzer;
use crate::board::{Board, Led};
use crate::keypad::{self, Key};

/// Pause between sweeps while no key is down.
pub const IDLE_PAUSE_MS: u64 = 50;
/// Length of the `#` tone burst.
pub const BEEP_MS: u64 = 100;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Handled(Key),
    Reset,
}

/// Owns the output lines and the buzzer; everything here runs on the one
/// firmware thread of control.
pub struct Controller<B: Board, Z: Buzzer> {
    board: B,
    buzzer: Z,
}

impl<B: Board, Z: Buzzer> Controller<B, Z> {
    pub fn new(board: B, buzzer: Z) -> Self {
        Self { board, buzzer }
    }

    /// Startup banner, then the poll loop. Returns only after a `*`
    /// press has handed the device over to the boot facility.
    pub fn run(&mut self) {
        println!("matrixpad ready");
        println!("A/B/C light one led, D lights all, # beeps, * resets to bootloader");

        loop {
            if let Step::Reset = self.step() {
                return;
            }
        }
    }

    /// One poll cycle: sweep the matrix, dispatch at most one action,
    /// then hold until the key is released so a single physical press
    /// yields a single action.
    pub fn step(&mut self) -> Step {
        if let Some(key) = keypad::scan(&mut self.board) {
            println!("key pressed: {}", key);

            if let Step::Reset = self.handle(key) {
                self.board.reset_to_bootloader();
                return Step::Reset;
            }

            while keypad::scan(&mut self.board).is_some() {}
            self.board.delay_ms(IDLE_PAUSE_MS);
            return Step::Handled(key);
        }

        self.board.delay_ms(IDLE_PAUSE_MS);
        Step::Idle
    }

    fn handle(&mut self, key: Key) -> Step {
        // Known-off baseline before every dispatch
        for led in Led::ALL.iter() {
            self.board.set_led(*led, false);
        }

        match key {
            Key::A => self.board.set_led(Led::Alert, true),
            Key::B => self.board.set_led(Led::Info, true),
            Key::C => self.board.set_led(Led::Ok, true),
            Key::D => {
                for led in Led::ALL.iter() {
                    self.board.set_led(*led, true);
                }
            }
            Key::Hash => self.buzzer.beep(Duration::from_millis(BEEP_MS)),
            Key::Star => return Step::Reset,
            // Digits carry no actuation
            _ => (),
        }

        Step::Handled(key)
    }
}

#[cfg(test)]
mod tests {
    use super::{Controller, Step, BEEP_MS};
    use crate::beeper::Buzzer;
    use crate::board::{Board, Led, MATRIX_COLS, MATRIX_ROWS};
    use crate::keypad::{Key, KEYMAP};
    use std::time::Duration;

    fn position(key: Key) -> (usize, usize) {
        for row in 0..MATRIX_ROWS {
            for col in 0..MATRIX_COLS {
                if KEYMAP[row][col] == key {
                    return (row, col);
                }
            }
        }
        unreachable!()
    }

    /// One switch held for a fixed number of sweeps, then released.
    /// Sweeps are counted when column 0 goes active.
    struct HeldKeyBoard {
        closed: Option<(usize, usize)>,
        hold_sweeps: u32,
        sweeps: u32,
        driven: [bool; MATRIX_COLS],
        leds: [bool; 3],
        led_on_events: u32,
        reset: bool,
    }

    impl HeldKeyBoard {
        fn new(key: Key, hold_sweeps: u32) -> Self {
            Self {
                closed: Some(position(key)),
                hold_sweeps,
                sweeps: 0,
                driven: [false; MATRIX_COLS],
                leds: [false; 3],
                led_on_events: 0,
                reset: false,
            }
        }

        fn idle() -> Self {
            Self {
                closed: None,
                hold_sweeps: 0,
                sweeps: 0,
                driven: [false; MATRIX_COLS],
                leds: [false; 3],
                led_on_events: 0,
                reset: false,
            }
        }
    }

    impl Board for HeldKeyBoard {
        fn drive_column(&mut self, col: usize, active: bool) {
            if col == 0 && active {
                self.sweeps += 1;
                if self.sweeps > self.hold_sweeps {
                    self.closed = None;
                }
            }
            self.driven[col] = active;
        }

        fn read_row(&mut self, row: usize) -> bool {
            (0..MATRIX_COLS).any(|col| self.driven[col] && self.closed == Some((row, col)))
        }

        fn set_led(&mut self, led: Led, on: bool) {
            if on {
                self.led_on_events += 1;
            }
            self.leds[led.index()] = on;
        }

        fn delay_ms(&mut self, _ms: u64) {}

        fn reset_to_bootloader(&mut self) {
            self.reset = true;
        }
    }

    #[derive(Default)]
    struct TestBuzzer {
        beeps: Vec<Duration>,
    }

    impl Buzzer for TestBuzzer {
        fn beep(&mut self, duration: Duration) {
            self.beeps.push(duration);
        }
    }

    // Test helper
    fn step_once(key: Key) -> (Step, Controller<HeldKeyBoard, TestBuzzer>) {
        let mut controller =
            Controller::new(HeldKeyBoard::new(key, 1), TestBuzzer::default());
        let step = controller.step();
        (step, controller)
    }

    #[test]
    fn led_dispatch_test() {
        let cases = [
            (Key::A, [true, false, false]),
            (Key::B, [false, true, false]),
            (Key::C, [false, false, true]),
            (Key::D, [true, true, true]),
        ];

        for (key, expected) in cases.iter() {
            let (step, controller) = step_once(*key);
            assert_eq!(step, Step::Handled(*key));
            assert_eq!(&controller.board.leds, expected);
            assert!(controller.buzzer.beeps.is_empty());
        }
    }

    #[test]
    fn dispatch_clears_previous_leds_test() {
        let mut controller =
            Controller::new(HeldKeyBoard::new(Key::B, 1), TestBuzzer::default());
        controller.board.leds = [true, true, true];

        controller.step();
        assert_eq!(controller.board.leds, [false, true, false]);
    }

    #[test]
    fn hash_beeps_once_test() {
        let (step, controller) = step_once(Key::Hash);
        assert_eq!(step, Step::Handled(Key::Hash));
        // Exactly one burst of the configured duration, leds at baseline
        assert_eq!(
            controller.buzzer.beeps,
            vec![Duration::from_millis(BEEP_MS)]
        );
        assert_eq!(controller.board.leds, [false, false, false]);
    }

    #[test]
    fn digit_no_actuation_test() {
        let (step, controller) = step_once(Key::D5);
        assert_eq!(step, Step::Handled(Key::D5));
        assert_eq!(controller.board.leds, [false, false, false]);
        assert_eq!(controller.board.led_on_events, 0);
        assert!(controller.buzzer.beeps.is_empty());
    }

    #[test]
    fn star_resets_test() {
        let (step, controller) = step_once(Key::Star);
        assert_eq!(step, Step::Reset);
        assert!(controller.board.reset);
    }

    #[test]
    fn run_exits_on_reset_test() {
        let mut controller =
            Controller::new(HeldKeyBoard::new(Key::Star, 1), TestBuzzer::default());
        controller.run();
        assert!(controller.board.reset);
    }

    #[test]
    fn idle_step_test() {
        let mut controller = Controller::new(HeldKeyBoard::idle(), TestBuzzer::default());
        assert_eq!(controller.step(), Step::Idle);
        assert_eq!(controller.board.led_on_events, 0);
    }

    #[test]
    fn single_action_per_press_test() {
        // Key held across many sweeps: step() must wait for release and
        // fire the action exactly once.
        let mut controller =
            Controller::new(HeldKeyBoard::new(Key::Hash, 8), TestBuzzer::default());

        assert_eq!(controller.step(), Step::Handled(Key::Hash));
        assert_eq!(controller.buzzer.beeps.len(), 1);
        assert!(controller.board.sweeps > 8, "scanned until release");

        // Key is up now; no second action
        assert_eq!(controller.step(), Step::Idle);
        assert_eq!(controller.buzzer.beeps.len(), 1);
    }

    #[test]
    fn held_led_key_fires_once_test() {
        let mut controller =
            Controller::new(HeldKeyBoard::new(Key::D, 5), TestBuzzer::default());

        assert_eq!(controller.step(), Step::Handled(Key::D));
        assert_eq!(controller.board.leds, [true, true, true]);
        assert_eq!(controller.board.led_on_events, 3);
    }
}
