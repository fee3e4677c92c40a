//! The three root counters at `0x1F80_1100`.
//!
//! Counters advance once per CPU tick regardless of the selected clock
//! source, except that timer 2 honours its divide-by-8 source.

use crate::api::BusDevice;
use crate::peripherals::interrupt::{InterruptController, Irq};
use crate::savestate::{SaveStateError, Snapshot, StateReader, StateWriter};

/// First timer register.
pub const TIMERS_START: u32 = 0x1F80_1100;
const TIMER_STRIDE: u32 = 0x10;
const TIMER_COUNT: usize = 3;
const TIMERS_END: u32 = TIMERS_START + TIMER_STRIDE * 3;

const MODE_RESET_AT_TARGET: u16 = 1 << 3;
const MODE_IRQ_AT_TARGET: u16 = 1 << 4;
const MODE_IRQ_AT_OVERFLOW: u16 = 1 << 5;
const MODE_IRQ_REPEAT: u16 = 1 << 6;
const MODE_IRQ_LINE: u16 = 1 << 10;
const MODE_REACHED_TARGET: u16 = 1 << 11;
const MODE_REACHED_OVERFLOW: u16 = 1 << 12;
const MODE_WRITABLE: u16 = 0x03FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Timer {
    counter: u16,
    mode: u16,
    target: u16,
    prescale: u8,
    fired: bool,
}

impl Timer {
    const fn divider(&self, index: usize) -> u8 {
        if index == 2 && (self.mode >> 8) & 0x3 >= 2 {
            8
        } else {
            1
        }
    }

    fn write_mode(&mut self, value: u16) {
        self.mode = (value & MODE_WRITABLE) | MODE_IRQ_LINE | (self.mode & 0x1800);
        self.counter = 0;
        self.prescale = 0;
        self.fired = false;
    }

    /// Returns true when this tick raised the timer's interrupt.
    fn step(&mut self, index: usize) -> bool {
        self.prescale += 1;
        if self.prescale < self.divider(index) {
            return false;
        }
        self.prescale = 0;

        let (next, overflowed) = self.counter.overflowing_add(1);
        self.counter = next;
        let mut fire = false;
        if self.counter == self.target {
            self.mode |= MODE_REACHED_TARGET;
            fire |= self.mode & MODE_IRQ_AT_TARGET != 0;
            if self.mode & MODE_RESET_AT_TARGET != 0 {
                self.counter = 0;
            }
        }
        if overflowed {
            self.mode |= MODE_REACHED_OVERFLOW;
            fire |= self.mode & MODE_IRQ_AT_OVERFLOW != 0;
        }
        if fire && (self.mode & MODE_IRQ_REPEAT != 0 || !self.fired) {
            self.fired = true;
            return true;
        }
        false
    }
}

/// Root counters 0..2.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Timers {
    timers: [Timer; TIMER_COUNT],
}

impl Timers {
    /// Creates stopped counters.
    #[must_use]
    pub fn new() -> Self {
        let mut timers = Self::default();
        for timer in &mut timers.timers {
            timer.mode = MODE_IRQ_LINE;
        }
        timers
    }

    /// Current count of timer `index`.
    #[must_use]
    pub const fn counter(&self, index: usize) -> u16 {
        self.timers[index].counter
    }

    const fn irq(index: usize) -> Irq {
        match index {
            0 => Irq::Timer0,
            1 => Irq::Timer1,
            _ => Irq::Timer2,
        }
    }

    fn locate(addr: u32) -> (usize, u32) {
        let offset = addr - TIMERS_START;
        ((offset / TIMER_STRIDE) as usize, offset % TIMER_STRIDE)
    }
}

impl BusDevice for Timers {
    fn is_address_for_device(&self, addr: u32) -> bool {
        (TIMERS_START..TIMERS_END).contains(&addr)
    }

    fn get_byte(&mut self, addr: u32) -> u8 {
        let (index, offset) = Self::locate(addr);
        let timer = &mut self.timers[index];
        let (register, high) = match offset {
            0 | 1 => (timer.counter, offset == 1),
            4 | 5 => {
                let mode = timer.mode;
                if offset == 5 {
                    timer.mode &= !(MODE_REACHED_TARGET | MODE_REACHED_OVERFLOW);
                }
                (mode, offset == 5)
            }
            8 | 9 => (timer.target, offset == 9),
            _ => return 0,
        };
        let [low, upper] = register.to_le_bytes();
        if high {
            upper
        } else {
            low
        }
    }

    fn set_byte(&mut self, addr: u32, value: u8) {
        let (index, offset) = Self::locate(addr);
        let timer = &mut self.timers[index];
        let merge = |register: u16| {
            if offset & 1 == 0 {
                (register & 0xFF00) | u16::from(value)
            } else {
                (register & 0x00FF) | (u16::from(value) << 8)
            }
        };
        match offset {
            0 | 1 => timer.counter = merge(timer.counter),
            4 | 5 => timer.write_mode(merge(timer.mode)),
            8 | 9 => timer.target = merge(timer.target),
            _ => {}
        }
    }

    fn tick(&mut self, irq: &mut InterruptController) {
        for (index, timer) in self.timers.iter_mut().enumerate() {
            if timer.step(index) {
                irq.request(Self::irq(index));
            }
        }
    }
}

impl Snapshot for Timers {
    fn save(&self, w: &mut StateWriter) {
        for timer in &self.timers {
            w.write_u16(timer.counter);
            w.write_u16(timer.mode);
            w.write_u16(timer.target);
            w.write_u8(timer.prescale);
            w.write_bool(timer.fired);
        }
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError> {
        r.enter("timers");
        for timer in &mut self.timers {
            timer.counter = r.read_u16()?;
            timer.mode = r.read_u16()?;
            timer.target = r.read_u16()?;
            timer.prescale = r.read_u8()?;
            timer.fired = r.read_bool()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Timers, TIMERS_START};
    use crate::api::BusDevice;
    use crate::peripherals::interrupt::{InterruptController, Irq};

    fn run(timers: &mut Timers, irq: &mut InterruptController, ticks: usize) {
        for _ in 0..ticks {
            timers.tick(irq);
        }
    }

    #[test]
    fn counter_resets_at_target_and_raises_irq_once() {
        let mut timers = Timers::new();
        let mut irq = InterruptController::new();
        timers.set_halfword(TIMERS_START + 8, 10);
        timers.set_halfword(TIMERS_START + 4, (1 << 3) | (1 << 4));
        run(&mut timers, &mut irq, 10);
        assert_eq!(timers.counter(0), 0);
        assert_ne!(irq.status() & Irq::Timer0.bit(), 0);

        irq.acknowledge(0);
        run(&mut timers, &mut irq, 10);
        assert_eq!(irq.status(), 0, "one-shot mode fires once");
    }

    #[test]
    fn reading_mode_clears_reached_flags() {
        let mut timers = Timers::new();
        let mut irq = InterruptController::new();
        timers.set_halfword(TIMERS_START + 0x18, 3);
        run(&mut timers, &mut irq, 3);
        assert_ne!(timers.get_halfword(TIMERS_START + 0x14) & (1 << 11), 0);
        assert_eq!(timers.get_halfword(TIMERS_START + 0x14) & (1 << 11), 0);
    }

    #[test]
    fn timer2_divides_by_eight_when_selected() {
        let mut timers = Timers::new();
        let mut irq = InterruptController::new();
        timers.set_halfword(TIMERS_START + 0x24, 2 << 8);
        run(&mut timers, &mut irq, 16);
        assert_eq!(timers.counter(2), 2);
        assert_eq!(timers.counter(0), 16);
    }
}
