use log::{info, warn};
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Errors rejecting a ROM image at load, before any execution.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image is {len} bytes, smaller than one 16KB bank")]
    Undersized { len: usize },
}

/// Mapper family declared by the cartridge-type header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
    Mbc7,
    HuC1,
    HuC3,
    /// Recognized but unimplemented hardware (camera, TAMA5, MMM01, …).
    /// Reads fall back to flat ROM; writes are ignored.
    Unknown(u8),
}

/// Feature flags derived from the cartridge-type byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub battery: bool,
    pub rtc: bool,
    pub rumble: bool,
    pub camera: bool,
}

/// The five RTC counter registers plus phase, flattened for persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcSnapshot {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days: u16,
    pub halted: bool,
    pub day_carry: bool,
    pub subsecond_millis: u32,
}

const MILLIS_PER_SECOND: u32 = 1000;

/// MBC3 real-time clock.
///
/// Advanced by wall-clock milliseconds supplied by the embedder (once per
/// presented frame); the core never reads a system clock. A single `halted`
/// flag gates both the tick path and the register read path.
#[derive(Debug, Clone, Default)]
struct Rtc {
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,
    halted: bool,
    day_carry: bool,
    millis: u32,
    latched: [u8; 5],
}

impl Rtc {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halted {
            out |= 0x40;
        }
        if self.day_carry {
            out |= 0x80;
        }
        out
    }

    fn latch(&mut self) {
        self.latched = [
            self.seconds & 0x3F,
            self.minutes & 0x3F,
            self.hours & 0x1F,
            (self.days & 0xFF) as u8,
            self.control_byte(),
        ];
    }

    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08..=0x0C => self.latched[(reg - 0x08) as usize],
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        match reg {
            0x08 => {
                self.seconds = value & 0x3F;
                self.millis = 0;
            }
            0x09 => self.minutes = value & 0x3F,
            0x0A => self.hours = value & 0x1F,
            0x0B => self.days = (self.days & 0x0100) | value as u16,
            0x0C => {
                self.days = (self.days & 0x00FF) | (((value & 0x01) as u16) << 8);
                self.halted = value & 0x40 != 0;
                self.day_carry = value & 0x80 != 0;
            }
            _ => {}
        }
        self.latch();
    }

    fn advance_millis(&mut self, millis: u64) {
        if self.halted {
            return;
        }
        let total = self.millis as u64 + millis;
        self.millis = (total % MILLIS_PER_SECOND as u64) as u32;
        self.advance_seconds(total / MILLIS_PER_SECOND as u64);
    }

    fn advance_seconds(&mut self, seconds: u64) {
        for _ in 0..seconds {
            // The seconds register is writable with out-of-range values; the
            // 6-bit counter wraps at 64 and only a 59->0 rollover carries.
            let carry = self.seconds == 59;
            self.seconds = (self.seconds + 1) & 0x3F;
            if carry {
                self.seconds = 0;
                self.minute_tick();
            }
        }
    }

    fn minute_tick(&mut self) {
        let carry = self.minutes == 59;
        self.minutes = (self.minutes + 1) & 0x3F;
        if carry {
            self.minutes = 0;
            self.hour_tick();
        }
    }

    fn hour_tick(&mut self) {
        let carry = self.hours == 23;
        self.hours = (self.hours + 1) & 0x1F;
        if carry {
            self.hours = 0;
            self.day_tick();
        }
    }

    fn day_tick(&mut self) {
        if self.days >= 0x01FF {
            self.days = 0;
            self.day_carry = true;
        } else {
            self.days += 1;
        }
    }

    fn snapshot(&self) -> RtcSnapshot {
        RtcSnapshot {
            seconds: self.seconds,
            minutes: self.minutes,
            hours: self.hours,
            days: self.days,
            halted: self.halted,
            day_carry: self.day_carry,
            subsecond_millis: self.millis,
        }
    }

    fn restore(&mut self, snap: &RtcSnapshot) {
        self.seconds = snap.seconds & 0x3F;
        self.minutes = snap.minutes & 0x3F;
        self.hours = snap.hours & 0x1F;
        self.days = snap.days & 0x01FF;
        self.halted = snap.halted;
        self.day_carry = snap.day_carry;
        self.millis = snap.subsecond_millis.min(MILLIS_PER_SECOND - 1);
        self.latch();
    }
}

/// Per-mapper banking state, chosen once at load.
#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        bank_hi: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    /// Also carries HuC3 (no RTC) and, with `rtc: None`, RTC-less MBC3 carts.
    Mbc3 {
        rom_bank: u8,
        ram_select: u8,
        ram_enable: bool,
        rtc: Option<Rtc>,
        latch_armed: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
        rumble: bool,
        rumble_on: bool,
    },
    Mbc7 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Unknown,
}

/// A loaded cartridge: ROM bytes, external RAM, mapper state and header
/// metadata.
#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub kind: MbcKind,
    pub features: Features,
    pub title: String,
    pub cgb: bool,
    pub cart_type: u8,
    pub declared_rom_banks: usize,
    pub declared_ram_banks: usize,
    state: MbcState,
}

impl Cartridge {
    pub fn load(data: Vec<u8>) -> Result<Self, CartridgeError> {
        if data.len() < ROM_BANK_SIZE {
            return Err(CartridgeError::Undersized { len: data.len() });
        }

        let header = Header(&data);
        let kind = header.mbc_kind();
        let features = header.features();
        let ram_size = header.ram_size();
        let title = header.title();
        let cgb = header.cgb_supported();
        let cart_type = header.cart_type();

        if let MbcKind::Unknown(byte) = kind {
            warn!("unknown cartridge type {byte:#04X}; continuing with flat ROM mapping");
        }

        let state = match kind {
            MbcKind::NoMbc => MbcState::NoMbc,
            MbcKind::Mbc1 | MbcKind::HuC1 => MbcState::Mbc1 {
                rom_bank: 1,
                bank_hi: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcKind::Mbc2 => MbcState::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcKind::Mbc3 | MbcKind::HuC3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_select: 0,
                ram_enable: false,
                rtc: features.rtc.then(Rtc::default),
                latch_armed: false,
            },
            MbcKind::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
                rumble: features.rumble,
                rumble_on: false,
            },
            MbcKind::Mbc7 => MbcState::Mbc7 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcKind::Unknown(_) => MbcState::Unknown,
        };

        info!(
            "loaded cartridge \"{}\" ({:?}, {} ROM banks, {} bytes RAM, CGB: {})",
            title,
            kind,
            data.len() / ROM_BANK_SIZE,
            ram_size,
            cgb
        );

        Ok(Self {
            declared_rom_banks: header.rom_banks(),
            declared_ram_banks: ram_size.div_ceil(RAM_BANK_SIZE),
            rom: data,
            ram: vec![0; ram_size],
            kind,
            features,
            title,
            cgb,
            cart_type,
            state,
        })
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_at(&self, bank: usize, offset: usize) -> u8 {
        self.rom
            .get(bank * ROM_BANK_SIZE + offset)
            .copied()
            .unwrap_or(0xFF)
    }

    /// Read from the ROM window (0x0000-0x7FFF) or the external RAM window
    /// (0xA000-0xBFFF), through the current banking state.
    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.read_rom_low(addr),
            0x4000..=0x7FFF => self.read_rom_high(addr),
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_rom_low(&self, addr: u16) -> u8 {
        let banks = self.rom_bank_count();
        match &self.state {
            // In mode 1 the upper-bank bits also remap the fixed window.
            MbcState::Mbc1 { bank_hi, mode, .. } if *mode == 1 => {
                let bank = ((*bank_hi as usize) << 5) % banks;
                self.rom_at(bank, addr as usize)
            }
            _ => self.rom_at(0, addr as usize),
        }
    }

    fn read_rom_high(&self, addr: u16) -> u8 {
        let banks = self.rom_bank_count();
        let offset = addr as usize - 0x4000;
        let bank = match &self.state {
            MbcState::NoMbc | MbcState::Unknown => 1 % banks,
            MbcState::Mbc1 {
                rom_bank, bank_hi, ..
            } => {
                // The 5-bit register never selects bank 0; the aliasing to
                // 0x01/0x21/0x41/0x61 happens before the high bits join in.
                let low = if *rom_bank & 0x1F == 0 {
                    1
                } else {
                    *rom_bank as usize & 0x1F
                };
                (((*bank_hi as usize) << 5) | low) % banks
            }
            MbcState::Mbc2 { rom_bank, .. } => {
                let bank = (*rom_bank & 0x0F).max(1) as usize;
                bank % banks
            }
            MbcState::Mbc3 { rom_bank, .. } => (*rom_bank).max(1) as usize % banks,
            MbcState::Mbc5 { rom_bank, .. } => *rom_bank as usize % banks,
            MbcState::Mbc7 { rom_bank, .. } => (*rom_bank).max(1) as usize % banks,
        };
        self.rom_at(bank, offset)
    }

    fn read_ram(&self, addr: u16) -> u8 {
        let offset = addr as usize - 0xA000;
        match &self.state {
            MbcState::NoMbc => self.ram.get(offset).copied().unwrap_or(0xFF),
            MbcState::Mbc1 {
                ram_enable,
                bank_hi,
                mode,
                ..
            } => {
                if !*ram_enable {
                    return 0xFF;
                }
                let bank = if *mode == 1 { *bank_hi as usize } else { 0 };
                self.ram_read_banked(bank, offset)
            }
            MbcState::Mbc2 { ram_enable, .. } => {
                if !*ram_enable {
                    return 0xFF;
                }
                // 512x4-bit internal RAM, mirrored across the window.
                let nibble = self.ram.get(offset & 0x01FF).copied().unwrap_or(0x0F);
                0xF0 | (nibble & 0x0F)
            }
            MbcState::Mbc3 {
                ram_enable,
                ram_select,
                rtc,
                ..
            } => {
                if !*ram_enable {
                    return 0xFF;
                }
                match *ram_select {
                    0x00..=0x07 => self.ram_read_banked(*ram_select as usize, offset),
                    0x08..=0x0C => rtc
                        .as_ref()
                        .map(|r| r.read_latched(*ram_select))
                        .unwrap_or(0xFF),
                    _ => 0xFF,
                }
            }
            MbcState::Mbc5 {
                ram_enable,
                ram_bank,
                ..
            } => {
                if !*ram_enable {
                    return 0xFF;
                }
                self.ram_read_banked(*ram_bank as usize, offset)
            }
            MbcState::Mbc7 { ram_enable, .. } => {
                if !*ram_enable {
                    return 0xFF;
                }
                self.ram.get(offset).copied().unwrap_or(0xFF)
            }
            MbcState::Unknown => 0xFF,
        }
    }

    fn ram_read_banked(&self, bank: usize, offset: usize) -> u8 {
        let banks = self.ram.len() / RAM_BANK_SIZE;
        if banks == 0 {
            // 2KB carts and smaller: a single partial bank.
            return self.ram.get(offset).copied().unwrap_or(0xFF);
        }
        let idx = (bank % banks) * RAM_BANK_SIZE + offset;
        self.ram.get(idx).copied().unwrap_or(0xFF)
    }

    fn ram_write_banked(&mut self, bank: usize, offset: usize, val: u8) {
        let banks = self.ram.len() / RAM_BANK_SIZE;
        let idx = if banks == 0 {
            offset
        } else {
            (bank % banks) * RAM_BANK_SIZE + offset
        };
        if let Some(b) = self.ram.get_mut(idx) {
            *b = val;
        }
    }

    /// Write to ROM space (bank-select / enable commands) or external RAM.
    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.state, addr) {
            (MbcState::NoMbc, 0xA000..=0xBFFF) => {
                let offset = addr as usize - 0xA000;
                if let Some(b) = self.ram.get_mut(offset) {
                    *b = val;
                }
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
            }
            (MbcState::Mbc1 { bank_hi, .. }, 0x4000..=0x5FFF) => {
                *bank_hi = val & 0x03;
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (
                MbcState::Mbc1 {
                    ram_enable,
                    bank_hi,
                    mode,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                if *ram_enable {
                    let bank = if *mode == 1 { *bank_hi as usize } else { 0 };
                    let offset = addr as usize - 0xA000;
                    self.ram_write_banked(bank, offset, val);
                }
            }
            (
                MbcState::Mbc2 {
                    rom_bank,
                    ram_enable,
                },
                0x0000..=0x3FFF,
            ) => {
                // Address bit 8 selects between RAM enable and ROM bank.
                if addr & 0x0100 == 0 {
                    *ram_enable = val & 0x0F == 0x0A;
                } else {
                    *rom_bank = val & 0x0F;
                }
            }
            (MbcState::Mbc2 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let idx = (addr as usize - 0xA000) & 0x01FF;
                    if let Some(b) = self.ram.get_mut(idx) {
                        *b = val & 0x0F;
                    }
                }
            }
            (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
            }
            (MbcState::Mbc3 { ram_select, .. }, 0x4000..=0x5FFF) => {
                *ram_select = val & 0x0F;
            }
            (
                MbcState::Mbc3 {
                    latch_armed, rtc, ..
                },
                0x6000..=0x7FFF,
            ) => {
                // A 0x00 -> 0x01 write pair snapshots the live counters into
                // the latched copy that reads return.
                if val == 0 {
                    *latch_armed = true;
                } else {
                    if val == 1
                        && *latch_armed
                        && let Some(rtc) = rtc
                    {
                        rtc.latch();
                    }
                    *latch_armed = false;
                }
            }
            (
                MbcState::Mbc3 {
                    ram_enable,
                    ram_select,
                    rtc,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                if *ram_enable {
                    match *ram_select {
                        0x00..=0x07 => {
                            let bank = *ram_select as usize;
                            let offset = addr as usize - 0xA000;
                            self.ram_write_banked(bank, offset, val);
                        }
                        0x08..=0x0C => {
                            if let Some(rtc) = rtc.as_mut() {
                                rtc.write_register(*ram_select, val);
                            }
                        }
                        _ => {}
                    }
                }
            }
            (MbcState::Mbc5 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = (*rom_bank & 0x100) | val as u16;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0x0FF) | (((val & 0x01) as u16) << 8);
            }
            (
                MbcState::Mbc5 {
                    ram_bank,
                    rumble,
                    rumble_on,
                    ..
                },
                0x4000..=0x5FFF,
            ) => {
                if *rumble {
                    // Bit 3 drives the rumble motor instead of bank select.
                    *rumble_on = val & 0x08 != 0;
                    *ram_bank = val & 0x07;
                } else {
                    *ram_bank = val & 0x0F;
                }
            }
            (
                MbcState::Mbc5 {
                    ram_enable,
                    ram_bank,
                    ..
                },
                0xA000..=0xBFFF,
            ) => {
                if *ram_enable {
                    let bank = *ram_bank as usize;
                    let offset = addr as usize - 0xA000;
                    self.ram_write_banked(bank, offset, val);
                }
            }
            (MbcState::Mbc7 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc7 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
            }
            (MbcState::Mbc7 { ram_enable, .. }, 0xA000..=0xBFFF) => {
                if *ram_enable {
                    let offset = addr as usize - 0xA000;
                    if let Some(b) = self.ram.get_mut(offset) {
                        *b = val;
                    }
                }
            }
            _ => {}
        }
    }

    /// Advance the RTC by externally-measured wall-clock milliseconds.
    /// The embedder calls this once per presented frame.
    pub fn advance_rtc(&mut self, millis: u64) {
        if let Some(rtc) = self.rtc_mut() {
            rtc.advance_millis(millis);
        }
    }

    fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match &mut self.state {
            MbcState::Mbc3 { rtc: Some(rtc), .. } => Some(rtc),
            _ => None,
        }
    }

    fn rtc_ref(&self) -> Option<&Rtc> {
        match &self.state {
            MbcState::Mbc3 { rtc: Some(rtc), .. } => Some(rtc),
            _ => None,
        }
    }

    /// Battery-backed RAM payload for the persistence collaborator, or None
    /// for cartridges without a battery.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        (self.features.battery && !self.ram.is_empty()).then_some(self.ram.as_slice())
    }

    /// Seed external RAM from a previously-persisted payload.
    pub fn load_battery_ram(&mut self, bytes: &[u8]) {
        for (dst, src) in self.ram.iter_mut().zip(bytes) {
            *dst = *src;
        }
    }

    pub fn rtc_snapshot(&self) -> Option<RtcSnapshot> {
        self.rtc_ref().map(Rtc::snapshot)
    }

    pub fn load_rtc_snapshot(&mut self, snap: &RtcSnapshot) {
        if let Some(rtc) = self.rtc_mut() {
            rtc.restore(snap);
        }
    }

    /// Whether the rumble motor line is currently driven.
    pub fn rumble_active(&self) -> bool {
        matches!(self.state, MbcState::Mbc5 { rumble_on: true, .. })
    }

    pub(crate) fn save_state(&self, w: &mut crate::snapshot::Writer) {
        w.bytes(&self.ram);
        match &self.state {
            MbcState::NoMbc | MbcState::Unknown => {}
            MbcState::Mbc1 {
                rom_bank,
                bank_hi,
                mode,
                ram_enable,
            } => {
                w.u8(*rom_bank);
                w.u8(*bank_hi);
                w.u8(*mode);
                w.bool(*ram_enable);
            }
            MbcState::Mbc2 {
                rom_bank,
                ram_enable,
            } => {
                w.u8(*rom_bank);
                w.bool(*ram_enable);
            }
            MbcState::Mbc3 {
                rom_bank,
                ram_select,
                ram_enable,
                rtc,
                latch_armed,
            } => {
                w.u8(*rom_bank);
                w.u8(*ram_select);
                w.bool(*ram_enable);
                w.bool(*latch_armed);
                w.bool(rtc.is_some());
                if let Some(rtc) = rtc {
                    w.u8(rtc.seconds);
                    w.u8(rtc.minutes);
                    w.u8(rtc.hours);
                    w.u16(rtc.days);
                    w.bool(rtc.halted);
                    w.bool(rtc.day_carry);
                    w.u32(rtc.millis);
                    w.bytes(&rtc.latched);
                }
            }
            MbcState::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
                rumble: _,
                rumble_on,
            } => {
                w.u16(*rom_bank);
                w.u8(*ram_bank);
                w.bool(*ram_enable);
                w.bool(*rumble_on);
            }
            MbcState::Mbc7 {
                rom_bank,
                ram_enable,
            } => {
                w.u8(*rom_bank);
                w.bool(*ram_enable);
            }
        }
    }

    pub(crate) fn load_state(
        &mut self,
        r: &mut crate::snapshot::Reader<'_>,
    ) -> Result<(), crate::snapshot::SnapshotError> {
        let ram_len = self.ram.len();
        self.ram = r.bytes(ram_len)?.to_vec();
        match &mut self.state {
            MbcState::NoMbc | MbcState::Unknown => {}
            MbcState::Mbc1 {
                rom_bank,
                bank_hi,
                mode,
                ram_enable,
            } => {
                *rom_bank = r.u8()?;
                *bank_hi = r.u8()?;
                *mode = r.u8()?;
                *ram_enable = r.bool()?;
            }
            MbcState::Mbc2 {
                rom_bank,
                ram_enable,
            } => {
                *rom_bank = r.u8()?;
                *ram_enable = r.bool()?;
            }
            MbcState::Mbc3 {
                rom_bank,
                ram_select,
                ram_enable,
                rtc,
                latch_armed,
            } => {
                *rom_bank = r.u8()?;
                *ram_select = r.u8()?;
                *ram_enable = r.bool()?;
                *latch_armed = r.bool()?;
                let has_rtc = r.bool()?;
                if has_rtc {
                    let rtc = rtc.get_or_insert_with(Rtc::default);
                    rtc.seconds = r.u8()?;
                    rtc.minutes = r.u8()?;
                    rtc.hours = r.u8()?;
                    rtc.days = r.u16()?;
                    rtc.halted = r.bool()?;
                    rtc.day_carry = r.bool()?;
                    rtc.millis = r.u32()?;
                    rtc.latched.copy_from_slice(r.bytes(5)?);
                } else {
                    *rtc = None;
                }
            }
            MbcState::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
                rumble: _,
                rumble_on,
            } => {
                *rom_bank = r.u16()?;
                *ram_bank = r.u8()?;
                *ram_enable = r.bool()?;
                *rumble_on = r.bool()?;
            }
            MbcState::Mbc7 {
                rom_bank,
                ram_enable,
            } => {
                *rom_bank = r.u8()?;
                *ram_enable = r.bool()?;
            }
        }
        Ok(())
    }
}

struct Header<'a>(&'a [u8]);

impl Header<'_> {
    fn byte(&self, offset: usize) -> u8 {
        self.0.get(offset).copied().unwrap_or(0)
    }

    fn title(&self) -> String {
        let mut slice = &self.0[0x0134.min(self.0.len())..0x0143.min(self.0.len())];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn cgb_supported(&self) -> bool {
        self.byte(0x0143) & 0x80 != 0
    }

    fn cart_type(&self) -> u8 {
        self.byte(0x0147)
    }

    fn mbc_kind(&self) -> MbcKind {
        match self.cart_type() {
            0x00 | 0x08 | 0x09 => MbcKind::NoMbc,
            0x01..=0x03 => MbcKind::Mbc1,
            0x05 | 0x06 => MbcKind::Mbc2,
            0x0F..=0x13 => MbcKind::Mbc3,
            0x19..=0x1E => MbcKind::Mbc5,
            0x22 => MbcKind::Mbc7,
            0xFE => MbcKind::HuC3,
            0xFF => MbcKind::HuC1,
            other => MbcKind::Unknown(other),
        }
    }

    fn features(&self) -> Features {
        let t = self.cart_type();
        Features {
            battery: matches!(
                t,
                0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E | 0x22 | 0xFF
            ),
            rtc: matches!(t, 0x0F | 0x10),
            rumble: matches!(t, 0x1C..=0x1E),
            camera: t == 0xFC,
        }
    }

    fn rom_banks(&self) -> usize {
        let code = self.byte(0x0148);
        if code <= 0x08 { 2 << code } else { 2 }
    }

    fn ram_size(&self) -> usize {
        // MBC2 carries its 512x4-bit RAM regardless of the header code.
        if matches!(self.cart_type(), 0x05 | 0x06) {
            return 0x200;
        }
        match self.byte(0x0149) {
            0x00 => 0,
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0x2000,
        }
    }
}
