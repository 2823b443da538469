use crate::irq::{IRQ_TIMER, Irq};

/// Divider/timer unit.
///
/// DIV is the upper byte of a free-running 16-bit counter. TIMA increments on
/// falling edges of the counter bit selected by TAC, overflows into a
/// reload from TMA that is delayed by a few cycles, and requests the timer
/// interrupt when the reload lands.
pub struct Timer {
    /// 16-bit internal divider counter. The DIV register is its upper byte.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    last_signal: bool,
    /// Value to reload TIMA with after the overflow delay.
    pending_reload: Option<u8>,
    reload_delay: u8,
    /// True on the exact cycle the reload is applied.
    reloading: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            pending_reload: None,
            reload_delay: 0,
            reloading: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, irq: &mut Irq) {
        match addr {
            0xFF04 => self.reset_div(irq),
            0xFF05 => {
                // Writes on the reload cycle itself are ignored; writes
                // during the delay cancel the pending reload.
                if self.reloading {
                    return;
                }
                self.tima = val;
                self.pending_reload = None;
                self.reload_delay = 0;
            }
            0xFF06 => {
                self.tma = val;
                if self.pending_reload.is_some() {
                    self.pending_reload = Some(val);
                }
                if self.reloading {
                    self.tima = val;
                }
            }
            0xFF07 => {
                let prev = Self::signal_of(self.div, self.tac);
                self.tac = val & 0x07;
                let now = Self::signal_of(self.div, self.tac);
                // Disabling (or re-muxing) the selected bit while it is high
                // produces a spurious falling edge on hardware.
                if prev && !now {
                    self.increment(irq);
                }
                self.last_signal = now;
            }
            _ => {}
        }
    }

    /// Advance by `cycles` CPU clock cycles.
    pub fn step(&mut self, cycles: u32, irq: &mut Irq) {
        if self.tac & 0x04 == 0 && self.pending_reload.is_none() {
            // Nothing can fire: just advance the divider.
            self.div = self.div.wrapping_add(cycles as u16);
            self.reloading = false;
            return;
        }
        for _ in 0..cycles {
            self.step_one(irq);
        }
    }

    fn step_one(&mut self, irq: &mut Irq) {
        self.reloading = false;
        if let Some(val) = self.pending_reload {
            if self.reload_delay == 0 {
                self.tima = val;
                irq.request(IRQ_TIMER);
                self.pending_reload = None;
                self.reloading = true;
            } else {
                self.reload_delay -= 1;
            }
        }
        let prev = self.last_signal;
        self.div = self.div.wrapping_add(1);
        let now = self.signal();
        if prev && !now {
            self.increment(irq);
        }
        self.last_signal = now;
    }

    /// Reset the internal divider (DIV write or STOP), applying edge logic.
    pub fn reset_div(&mut self, irq: &mut Irq) {
        let prev = Self::signal_of(self.div, self.tac);
        self.div = 0;
        if prev {
            self.increment(irq);
        }
        self.last_signal = false;
    }

    fn increment(&mut self, _irq: &mut Irq) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.pending_reload = Some(self.tma);
            self.reload_delay = 3;
        } else {
            self.tima += 1;
        }
    }

    /// Period in cycles of the TIMA input, i.e. the distance between falling
    /// edges of the selected divider bit.
    fn edge_period(tac: u8) -> u32 {
        match tac & 0x03 {
            0x00 => 1024,
            0x01 => 16,
            0x02 => 64,
            _ => 256,
        }
    }

    fn selected_bit(div: u16, tac: u8) -> bool {
        let shift = match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        (div >> shift) & 1 != 0
    }

    fn signal(&self) -> bool {
        Self::signal_of(self.div, self.tac)
    }

    fn signal_of(div: u16, tac: u8) -> bool {
        tac & 0x04 != 0 && Self::selected_bit(div, tac)
    }

    /// Exact cycle distance to the timer interrupt, if one is coming.
    /// Used by the CPU's predictive HALT wake.
    pub fn cycles_until_irq(&self) -> Option<u32> {
        if self.pending_reload.is_some() {
            return Some(self.reload_delay as u32 + 1);
        }
        if self.tac & 0x04 == 0 {
            return None;
        }
        let period = Self::edge_period(self.tac);
        let phase = (self.div as u32) % period;
        let first_edge = period - phase;
        let increments = 0x100 - self.tima as u32;
        // Overflow happens on the edge; the IRQ lands after the reload delay.
        Some(first_edge + (increments - 1) * period + 4)
    }
}

impl Timer {
    pub(crate) fn save_state(&self, w: &mut crate::snapshot::Writer) {
        w.u16(self.div);
        w.u8(self.tima);
        w.u8(self.tma);
        w.u8(self.tac);
        w.bool(self.last_signal);
        w.u8(self.pending_reload.map_or(0xFF, |v| v));
        w.bool(self.pending_reload.is_some());
        w.u8(self.reload_delay);
        w.bool(self.reloading);
    }

    pub(crate) fn load_state(
        &mut self,
        r: &mut crate::snapshot::Reader<'_>,
    ) -> Result<(), crate::snapshot::SnapshotError> {
        self.div = r.u16()?;
        self.tima = r.u8()?;
        self.tma = r.u8()?;
        self.tac = r.u8()? & 0x07;
        self.last_signal = r.bool()?;
        let reload_val = r.u8()?;
        let has_reload = r.bool()?;
        self.pending_reload = has_reload.then_some(reload_val);
        self.reload_delay = r.u8()?;
        self.reloading = r.bool()?;
        Ok(())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
