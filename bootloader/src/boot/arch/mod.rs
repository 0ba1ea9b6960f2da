//! Architecture-specific boot code
//!
//! ARMv7 only: CP15 cache and MMU control plus the branch into the kernel.

pub mod armv7;

pub use armv7::ArmV7;
