//! ARMv7-A handoff through CP15
//!
//! The kernel expects the MMU off, the data cache off and cleaned, r0 = 0,
//! r1 = machine type and r2 = the tags or device tree address.

use core::arch::asm;

use crate::boot::handoff::Cpu;

const SCTLR_M: u32 = 1 << 0;
const SCTLR_C: u32 = 1 << 2;
const SCTLR_I: u32 = 1 << 12;

/// The running core
pub struct ArmV7 {
    uninit: fn(),
}

impl ArmV7 {
    /// `uninit` shuts down board drivers before caches go off
    pub const fn new(uninit: fn()) -> Self {
        Self { uninit }
    }
}

#[inline(always)]
fn read_sctlr() -> u32 {
    let v: u32;
    unsafe { asm!("mrc p15, 0, {}, c1, c0, 0", out(reg) v, options(nomem, nostack)) };
    v
}

#[inline(always)]
fn write_sctlr(v: u32) {
    unsafe { asm!("mcr p15, 0, {}, c1, c0, 0", "isb", in(reg) v, options(nostack)) };
}

/// Clean and invalidate every data cache level by set/way
fn clean_invalidate_dcache() {
    let clidr: u32;
    unsafe { asm!("mrc p15, 1, {}, c0, c0, 1", out(reg) clidr, options(nomem, nostack)) };
    let loc = (clidr >> 24) & 0x7;

    for level in 0..loc {
        // 2 = data only, 3 = split, 4 = unified
        if (clidr >> (level * 3)) & 0x7 < 2 {
            continue;
        }
        let ccsidr: u32;
        unsafe {
            asm!(
                "mcr p15, 2, {sel}, c0, c0, 0",
                "isb",
                "mrc p15, 1, {id}, c0, c0, 0",
                sel = in(reg) level << 1,
                id = out(reg) ccsidr,
                options(nostack),
            )
        };
        let line_shift = (ccsidr & 0x7) + 4;
        let ways = ((ccsidr >> 3) & 0x3ff) + 1;
        let sets = ((ccsidr >> 13) & 0x7fff) + 1;
        let way_shift = (ways - 1).leading_zeros();

        for way in 0..ways {
            for set in 0..sets {
                let sw = way.checked_shl(way_shift).unwrap_or(0) | (set << line_shift) | (level << 1);
                unsafe { asm!("mcr p15, 0, {}, c7, c14, 2", in(reg) sw, options(nostack)) };
            }
        }
    }
    unsafe { asm!("dsb", "isb", options(nostack)) };
}

impl Cpu for ArmV7 {
    fn platform_uninit(&mut self) {
        (self.uninit)();
    }

    fn disable_cache(&mut self) {
        write_sctlr(read_sctlr() & !SCTLR_C);
        clean_invalidate_dcache();
        write_sctlr(read_sctlr() & !SCTLR_I);
        unsafe { asm!("mcr p15, 0, {}, c7, c5, 0", in(reg) 0u32, options(nostack)) };
    }

    fn barrier(&mut self) {
        unsafe { asm!("dsb", "isb", options(nostack)) };
    }

    fn disable_mmu(&mut self) {
        write_sctlr(read_sctlr() & !SCTLR_M);
        unsafe { asm!("mcr p15, 0, {}, c8, c7, 0", "dsb", "isb", in(reg) 0u32, options(nostack)) };
    }

    fn jump(&mut self, entry: u32, r0: u32, machine: u32, tags: u32) -> ! {
        unsafe {
            asm!(
                "bx {entry}",
                entry = in(reg) entry,
                in("r0") r0,
                in("r1") machine,
                in("r2") tags,
                options(noreturn),
            )
        }
    }
}
