mod common;

use common::{machine_with_program, step_until_pc};
use emberboy_core::irq::{IRQ_STAT, IRQ_TIMER};

#[test]
fn lowest_bit_wins_and_only_it_clears() {
    // Timer (bit 2) and joypad (bit 4) both requested and enabled: the
    // lower bit index dispatches and only its request clears.
    let mut gb = machine_with_program(&[0x00, 0x00]);
    gb.cpu.sp = 0xCFFE;
    gb.mmu.irq.write_enabled(0x1F);
    gb.mmu.irq.write_requested(0x14);
    gb.mmu.irq.set_ime(true);

    let t = gb.step();
    assert_eq!(t, 20, "interrupt entry is a fixed 20-cycle cost");
    assert_eq!(gb.cpu.pc, 0x0050, "timer vector");
    assert!(!gb.mmu.irq.ime());
    assert_eq!(gb.mmu.irq.read_requested() & 0x1F, 0x10, "joypad still set");
    // Return address on the stack, high byte first.
    assert_eq!(gb.mmu.read_byte(0xCFFD), 0x01);
    assert_eq!(gb.mmu.read_byte(0xCFFC), 0x00);
}

#[test]
fn dispatch_order_walks_bit_indices() {
    let vectors = [
        (0x01, 0x0040),
        (0x02, 0x0048),
        (0x04, 0x0050),
        (0x08, 0x0058),
        (0x10, 0x0060),
    ];
    for (bit, vector) in vectors {
        let mut gb = machine_with_program(&[0x00]);
        gb.cpu.sp = 0xCFFE;
        gb.mmu.irq.write_enabled(0x1F);
        gb.mmu.irq.write_requested(bit);
        gb.mmu.irq.set_ime(true);
        gb.step();
        assert_eq!(gb.cpu.pc, vector, "vector for bit {bit:#04X}");
    }
}

#[test]
fn masked_requests_do_not_dispatch() {
    let mut gb = machine_with_program(&[0x00, 0x00]);
    gb.mmu.irq.write_enabled(IRQ_STAT);
    gb.mmu.irq.write_requested(IRQ_TIMER);
    gb.mmu.irq.set_ime(true);
    gb.step();
    assert_eq!(gb.cpu.pc, 0x0101, "plain instruction executed");
}

#[test]
fn ei_takes_effect_after_one_instruction() {
    // EI; NOP; NOP with a pending, enabled interrupt: the dispatch must
    // happen after the NOP that follows EI, not before it.
    let mut gb = machine_with_program(&[0xFB, 0x00, 0x00]);
    gb.cpu.sp = 0xCFFE;
    gb.mmu.irq.write_enabled(IRQ_TIMER);
    gb.mmu.irq.write_requested(IRQ_TIMER);

    gb.step(); // EI
    assert!(!gb.mmu.irq.ime());
    assert_eq!(gb.cpu.pc, 0x0101);
    gb.step(); // NOP; IME turns on at its end
    assert!(gb.mmu.irq.ime());
    assert_eq!(gb.cpu.pc, 0x0102);
    gb.step(); // dispatch
    assert_eq!(gb.cpu.pc, 0x0050);
}

#[test]
fn di_cancels_pending_ei() {
    // EI; DI: interrupts stay disabled.
    let mut gb = machine_with_program(&[0xFB, 0xF3, 0x00, 0x00]);
    gb.mmu.irq.write_enabled(IRQ_TIMER);
    gb.mmu.irq.write_requested(IRQ_TIMER);
    gb.step();
    gb.step();
    gb.step();
    assert!(!gb.mmu.irq.ime());
    assert_eq!(gb.cpu.pc, 0x0103);
}

#[test]
fn reti_returns_and_reenables() {
    // Dispatch, then a RETI placed at the vector returns to the pushed PC
    // with IME on again.
    let mut rom = common::rom_with_program(&[0x00, 0x00]);
    rom[0x0050] = 0xD9; // RETI
    let mut gb = emberboy_core::gameboy::GameBoy::new(emberboy_core::hardware::Model::Dmg);
    gb.load_cart(emberboy_core::cartridge::Cartridge::load(rom).unwrap());
    gb.cpu.sp = 0xCFFE;
    gb.mmu.irq.write_enabled(IRQ_TIMER);
    gb.mmu.irq.write_requested(IRQ_TIMER);
    gb.mmu.irq.set_ime(true);

    gb.step(); // dispatch to 0x50
    assert_eq!(gb.cpu.pc, 0x0050);
    gb.step(); // RETI
    assert_eq!(gb.cpu.pc, 0x0100);
    assert!(gb.mmu.irq.ime());
}

#[test]
fn software_if_write_triggers_dispatch() {
    // The request mask is software-writable: LD A,0x04; LDH (0x0F),A.
    let mut gb = machine_with_program(&[0x3E, 0x04, 0xE0, 0x0F, 0x00]);
    gb.cpu.sp = 0xCFFE;
    gb.mmu.irq.write_requested(0);
    gb.mmu.irq.write_enabled(IRQ_TIMER);
    gb.mmu.irq.set_ime(true);
    assert!(step_until_pc(&mut gb, 0x0050, 10), "reached timer vector");
}
