use crate::{
    FRAME_CYCLES, SCREEN_HEIGHT, SCREEN_WIDTH,
    cartridge::{Cartridge, CartridgeError, RtcSnapshot},
    cpu::Cpu,
    hardware::Model,
    input::Button,
    mmu::Mmu,
    snapshot::{Reader, SnapshotError, Writer},
};

/// The machine facade: one CPU, one bus, one clock.
///
/// The embedder drives it a frame slice at a time with [`GameBoy::run_frame`]
/// and services presentation, audio and input in between. There is no
/// concurrency; all state is owned here and mutated one CPU step at a time.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    model: Model,
    /// CPU-cycle budget for the next frame slice (normal-speed domain),
    /// stretched or shrunk by the audio collaborator's fill reports.
    frame_budget: u32,
}

impl GameBoy {
    /// Machine in the post-boot state (boot ROM skipped).
    pub fn new(model: Model) -> Self {
        let mut mmu = Mmu::new(model);
        mmu.apply_boot_state();
        Self {
            cpu: Cpu::new(model),
            mmu,
            model,
            frame_budget: FRAME_CYCLES,
        }
    }

    /// Machine at power-on, expecting a boot ROM to be mapped at 0x0000.
    pub fn new_power_on(model: Model) -> Self {
        Self {
            cpu: Cpu::new_power_on(model),
            mmu: Mmu::new(model),
            model,
            frame_budget: FRAME_CYCLES,
        }
    }

    /// Load a ROM image and build a machine for the model its header asks
    /// for, boot ROM skipped.
    pub fn from_rom(data: Vec<u8>) -> Result<Self, CartridgeError> {
        let cart = Cartridge::load(data)?;
        let model = if cart.cgb { Model::Cgb } else { Model::Dmg };
        let mut gb = Self::new(model);
        gb.mmu.load_cart(cart);
        Ok(gb)
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.mmu.load_cart(cart);
    }

    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.cpu = Cpu::new_power_on(self.model);
        self.mmu.load_boot_rom(data);
    }

    /// Reset to the initial state while preserving the loaded cartridge and
    /// boot ROM.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        let boot = self.mmu.boot_rom.take();
        let had_boot = boot.is_some();
        self.mmu = Mmu::new(self.model);
        if had_boot {
            self.cpu = Cpu::new_power_on(self.model);
        } else {
            self.cpu = Cpu::new(self.model);
            self.mmu.apply_boot_state();
        }
        if let Some(c) = cart {
            self.mmu.load_cart(c);
        }
        if let Some(b) = boot {
            self.mmu.load_boot_rom(b);
        }
    }

    /// Execute one CPU step (instruction, interrupt dispatch, or a halted
    /// skip) and advance every subsystem by its cycle cost.
    pub fn step(&mut self) -> u32 {
        self.step_bounded(FRAME_CYCLES)
    }

    fn step_bounded(&mut self, budget_left: u32) -> u32 {
        let t = if self.cpu.halted && self.mmu.irq.pending() == 0 {
            // Predictive low-power skip: jump straight to the next possible
            // wake event instead of looping one cycle at a time. With no
            // computable event, sleep out the remainder of the slice.
            let skip = self
                .cpu
                .halt_wake_cycles(&self.mmu)
                .map_or(budget_left, |d| d.min(budget_left))
                .clamp(4, budget_left.max(4));
            self.cpu.cycles += skip as u64;
            skip
        } else {
            self.cpu.step(&mut self.mmu)
        };
        self.mmu.tick(t, self.cpu.speed_shift);
        self.cpu.try_wake(&self.mmu);
        t
    }

    /// Run one frame slice (~1/60th of emulated time, scaled for
    /// double-speed mode), then return control so the embedder can present
    /// the frame, drain audio and apply input.
    pub fn run_frame(&mut self) {
        let budget = self.frame_budget << self.cpu.speed_shift;
        let mut left = budget;
        while left > 0 && self.cpu.fault.is_none() {
            let t = self.step_bounded(left);
            left = left.saturating_sub(t);
        }
        // End of slice: flush lazily accumulated audio into samples.
        self.mmu.apu.catch_up();
    }

    /// Audio collaborator feedback: with a draining buffer the next slice
    /// lengthens (produce more), with an overfull one it shortens, within
    /// ±25% of the nominal frame.
    pub fn report_audio_fill(&mut self, buffered: usize, capacity: usize) {
        let fill = buffered as f32 / capacity.max(1) as f32;
        let scale = (1.25 - fill * 0.5).clamp(0.75, 1.25);
        self.frame_budget = (FRAME_CYCLES as f32 * scale) as u32;
    }

    pub fn frame_ready(&self) -> bool {
        self.mmu.ppu.frame_ready()
    }

    pub fn framebuffer(&self) -> &[u32; SCREEN_WIDTH * SCREEN_HEIGHT] {
        self.mmu.ppu.framebuffer()
    }

    /// Apply a press edge. Wakes STOP; on DMG it also requests the joypad
    /// interrupt. Applied between CPU steps, never mid-instruction.
    pub fn press_button(&mut self, button: Button) {
        self.mmu.input.press(
            button,
            self.model,
            self.mmu.boot_mapped,
            &mut self.mmu.irq,
        );
        self.cpu.stopped = false;
    }

    pub fn release_button(&mut self, button: Button) {
        self.mmu.input.release(button);
    }

    /// Advance the cartridge RTC by wall-clock milliseconds measured by the
    /// embedder (typically once per presented frame).
    pub fn advance_rtc(&mut self, millis: u64) {
        if let Some(cart) = self.mmu.cart.as_mut() {
            cart.advance_rtc(millis);
        }
    }

    /// Battery-backed RAM payload for persistence, if the cartridge has one.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.mmu.cart.as_ref().and_then(|c| c.battery_ram())
    }

    pub fn load_battery_ram(&mut self, bytes: &[u8]) {
        if let Some(cart) = self.mmu.cart.as_mut() {
            cart.load_battery_ram(bytes);
        }
    }

    pub fn rtc_snapshot(&self) -> Option<RtcSnapshot> {
        self.mmu.cart.as_ref().and_then(|c| c.rtc_snapshot())
    }

    pub fn load_rtc_snapshot(&mut self, snap: &RtcSnapshot) {
        if let Some(cart) = self.mmu.cart.as_mut() {
            cart.load_rtc_snapshot(snap);
        }
    }

    pub(crate) fn save_state(&self, w: &mut Writer) {
        w.u8(self.model.is_cgb() as u8);
        w.bool(self.mmu.cart.is_some());
        w.u32(self.frame_budget);
        self.cpu.save_state(w);
        self.mmu.save_state(w);
    }

    pub(crate) fn load_state(&mut self, r: &mut Reader<'_>) -> Result<(), SnapshotError> {
        let cgb = r.u8()? != 0;
        if cgb != self.model.is_cgb() {
            return Err(SnapshotError::Mismatch("hardware model differs"));
        }
        let had_cart = r.bool()?;
        if had_cart != self.mmu.cart.is_some() {
            return Err(SnapshotError::Mismatch("cartridge presence differs"));
        }
        self.frame_budget = r.u32()?;
        self.cpu.load_state(r)?;
        self.mmu.load_state(r)?;
        Ok(())
    }
}
