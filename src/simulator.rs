use std::sync::Arc;
use std::thread;

use winit::{
    event::{DeviceEvent, ElementState, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::ControlFlow,
    window::Window,
};

use crate::beeper::{Beeper, ToneConfig, BUZZER_TONE_HZ, PWM_DIVIDER, SYS_CLOCK_HZ};
use crate::board::{Led, PinAssignment, SharedLines, SimBoard};
use crate::controller::Controller;
use crate::timing::Timing;

// Led readout refreshes per second
const DEFAULT_REFRESH_RATE: u64 = 30;

/// Hosts the firmware: spawns its thread, feeds the simulated matrix from
/// host key events and mirrors the led lines into the window title.
pub struct Simulator {
    lines: Arc<SharedLines>,
    timing: Timing,
}

impl Simulator {
    pub fn new() -> Self {
        let lines = Arc::new(SharedLines::new());
        let firmware_lines = lines.clone();

        // The firmware is one blocking poll loop (settle waits, release
        // waits, idle pauses), so it gets its own thread and the event
        // loop stays responsive. The beeper must be built on that thread;
        // its stream is not Send.
        thread::Builder::new()
            .name("firmware".into())
            .spawn(move || {
                let tone = ToneConfig::new(SYS_CLOCK_HZ, PWM_DIVIDER, BUZZER_TONE_HZ);
                let mut beeper = Beeper::new(tone);
                beeper.start_stream();

                let board = SimBoard::new(PinAssignment::reference_board(), firmware_lines);
                Controller::new(board, beeper).run();
            })
            .expect("failed to spawn firmware thread");

        Self {
            lines,
            timing: Timing::new(DEFAULT_REFRESH_RATE),
        }
    }

    pub fn handle_window_event(&mut self, event: WindowEvent) -> Option<ControlFlow> {
        if let WindowEvent::CloseRequested = event {
            println!("The close button was pressed; stopping");
            return Some(ControlFlow::Exit);
        }

        None
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) -> Option<ControlFlow> {
        if let DeviceEvent::Key(KeyboardInput {
            state: element_state,
            virtual_keycode: Some(keycode),
            ..
        }) = event
        {
            if let Some((row, col)) = map_key(keycode) {
                match element_state {
                    ElementState::Pressed => self.lines.press(row, col),
                    ElementState::Released => self.lines.release(row, col),
                }
            }
        }

        None
    }

    pub fn handle_update(&mut self, window: &Window) -> Option<ControlFlow> {
        // The `*` action latched a reset; the boot facility takes over.
        if self.lines.reset_requested() {
            return Some(ControlFlow::Exit);
        }

        if self.timing.should_refresh() {
            window.set_title(&self.format_title());
            self.timing.mark_refresh();
        }

        self.timing.try_sleep();

        None
    }

    fn format_title(&self) -> String {
        fn lamp(on: bool) -> char {
            if on {
                '#'
            } else {
                '.'
            }
        }

        format!(
            "matrixpad | alert [{}] info [{}] ok [{}]",
            lamp(self.lines.led(Led::Alert)),
            lamp(self.lines.led(Led::Info)),
            lamp(self.lines.led(Led::Ok))
        )
    }
}

/// Maps host keys to matrix positions, one block of four per pad row:
/// 1234 / qwer / asdf / zxcv.
fn map_key(scancode: VirtualKeyCode) -> Option<(usize, usize)> {
    match scancode {
        VirtualKeyCode::Key1 => Some((0, 0)),
        VirtualKeyCode::Key2 => Some((0, 1)),
        VirtualKeyCode::Key3 => Some((0, 2)),
        VirtualKeyCode::Key4 => Some((0, 3)),

        VirtualKeyCode::Q => Some((1, 0)),
        VirtualKeyCode::W => Some((1, 1)),
        VirtualKeyCode::E => Some((1, 2)),
        VirtualKeyCode::R => Some((1, 3)),

        VirtualKeyCode::A => Some((2, 0)),
        VirtualKeyCode::S => Some((2, 1)),
        VirtualKeyCode::D => Some((2, 2)),
        VirtualKeyCode::F => Some((2, 3)),

        VirtualKeyCode::Z => Some((3, 0)),
        VirtualKeyCode::X => Some((3, 1)),
        VirtualKeyCode::C => Some((3, 2)),
        VirtualKeyCode::V => Some((3, 3)),

        _ => None,
    }
}
