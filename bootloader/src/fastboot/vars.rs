// Variables answered through getvar

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::boot::context::BootContext;
use crate::platform::Platform;

/// Partitions `fastboot -w` formats as ext4
const WIPE_PARTITIONS: [&str; 2] = ["userdata", "cache"];

/// Name/value pairs published once fastboot starts
#[derive(Debug, Default, Clone)]
pub struct Variables {
    entries: Vec<(String, String)>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// The standard set for this device
    pub fn for_device(ctx: &BootContext, platform: &Platform<'_>) -> Self {
        let mut vars = Self::new();
        vars.publish("version", "0.5");
        vars.publish(
            "max-download-size",
            format!("0x{:x}", ctx.config.max_download_size),
        );
        vars.publish("product", platform.board.product());
        vars.publish("kernel", "lk");
        vars.publish("serialno", ctx.serial.as_str());

        if ctx.is_emmc() {
            for name in WIPE_PARTITIONS {
                let size = platform
                    .storage
                    .find(name)
                    .map(|p| p.byte_len())
                    .unwrap_or(0);
                log::trace!("partition-size:{}: 0x{:x}", name, size);
                vars.publish(format!("partition-type:{}", name), "ext4");
                vars.publish(format!("partition-size:{}", name), format!("0x{:x}", size));
            }
        }
        vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
