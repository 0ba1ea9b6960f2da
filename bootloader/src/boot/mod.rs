// Boot module - image loading, authentication and kernel handoff

pub mod auth;
pub mod boot_params;
pub mod cmdline;
pub mod context;
pub mod cpr;
pub mod handoff;
pub mod loader;
pub mod memory;

// Architecture-specific boot code
#[cfg(target_arch = "arm")]
pub mod arch;

pub use auth::{RejectAll, Verifier};
pub use boot_params::{BootParams, ParameterEncoder};
pub use cmdline::{build_cmdline, Baseband, BootMode};
pub use context::{BootConfig, BootContext};
pub use handoff::{transfer, Cpu};
pub use loader::{load_boot_image, BootTarget, LoadedImage};
pub use memory::{MemoryError, PhysicalMemory, RamWindow};
