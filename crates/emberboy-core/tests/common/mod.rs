//! Shared helpers: synthetic in-memory ROM images and machine builders.
//! The suite runs fully offline; no ROM binaries are checked in or fetched.
#![allow(dead_code)]

use once_cell::sync::Lazy;

use emberboy_core::cartridge::Cartridge;
use emberboy_core::gameboy::GameBoy;
use emberboy_core::hardware::Model;

pub const ROM_BANK_SIZE: usize = 0x4000;

static BASE_ROM: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut rom = vec![0u8; 2 * ROM_BANK_SIZE];
    rom[0x0134..0x0138].copy_from_slice(b"TEST");
    rom[0x0147] = 0x00;
    rom[0x0148] = 0x00;
    rom[0x0149] = 0x00;
    rom
});

/// A minimal 32KB header: no MBC, no RAM, DMG-only.
pub fn flat_rom() -> Vec<u8> {
    BASE_ROM.clone()
}

/// Flat ROM with `code` placed at the entry point 0x0100.
pub fn rom_with_program(code: &[u8]) -> Vec<u8> {
    let mut rom = flat_rom();
    rom[0x0100..0x0100 + code.len()].copy_from_slice(code);
    rom
}

/// Post-boot DMG machine executing `code` from 0x0100.
pub fn machine_with_program(code: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new(Model::Dmg);
    gb.load_cart(Cartridge::load(rom_with_program(code)).expect("valid test ROM"));
    gb
}

/// Post-boot machine for an explicit model.
pub fn machine_with_program_on(model: Model, code: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new(model);
    let mut rom = rom_with_program(code);
    if model.is_cgb() {
        rom[0x0143] = 0x80;
    }
    gb.load_cart(Cartridge::load(rom).expect("valid test ROM"));
    gb
}

/// Step `n` CPU steps.
pub fn step_n(gb: &mut GameBoy, n: usize) {
    for _ in 0..n {
        gb.step();
    }
}

/// Step until the program counter reaches `target`, with a step bound.
pub fn step_until_pc(gb: &mut GameBoy, target: u16, max_steps: usize) -> bool {
    for _ in 0..max_steps {
        if gb.cpu.pc == target {
            return true;
        }
        gb.step();
    }
    false
}
