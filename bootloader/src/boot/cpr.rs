// CPR (core power reduction) setting kept in the misc partition

use droidboot_core::disk::misc::{self, CprStatus, MiscError, MiscRegion};
use droidboot_core::Storage;

use super::context::Staging;

/// Read the record at the start of the CPR region
pub fn read_status(storage: &mut dyn Storage, staging: &mut Staging) -> Result<CprStatus, MiscError> {
    let page = staging.misc(storage.page_size() as usize);
    misc::read_region(storage, MiscRegion::Cpr, 0, page)?;
    CprStatus::decode(page).ok_or(MiscError::OutOfRegion)
}

/// Replace the record with a valid one
pub fn write_status(
    storage: &mut dyn Storage,
    staging: &mut Staging,
    enabled: bool,
) -> Result<(), MiscError> {
    let page = staging.misc(storage.page_size() as usize);
    CprStatus::new(enabled).encode(page);
    misc::write_region(storage, MiscRegion::Cpr, 0, page)
}

/// Kernel argument for a valid record
pub fn cmdline_fragment(status: &CprStatus) -> Option<&'static str> {
    status.enabled().map(|on| {
        if on {
            " msm_cpr.enable=1"
        } else {
            " msm_cpr.enable=0"
        }
    })
}
