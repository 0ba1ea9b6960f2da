// flash: and erase: for both storage backends

use alloc::vec;

use bootimg::header::has_magic;
use bootimg::sparse::{is_sparse, ChunkKind, SparseImage};
use bootimg::BootImageError;
use droidboot_core::{PartitionRegion, Storage};

use super::CommandError;
use crate::boot::context::BootContext;
use crate::error::BootError;
use crate::platform::Platform;

/// Partitions whose images carry yaffs2 tags in the spare area
const SPARE_BYTE_PARTITIONS: [&str; 4] = ["system", "userdata", "persist", "recoveryfs"];

/// Size limit granularity on eMMC
const SECTOR: u64 = 512;

type Reply = Result<(), CommandError>;

pub(super) fn flash(
    ctx: &BootContext,
    platform: &mut Platform<'_>,
    name: &str,
    data: &[u8],
) -> Reply {
    if ctx.is_emmc() {
        flash_block(&mut *platform.storage, name, data)
    } else {
        flash_raw(&mut *platform.storage, name, data)
    }
}

pub(super) fn erase(ctx: &BootContext, platform: &mut Platform<'_>, name: &str) -> Reply {
    let storage = &mut *platform.storage;
    let part = if ctx.is_emmc() {
        storage
            .find(name)
            .map_err(|_| CommandError::NoPartitionTable)?
    } else {
        raw_partition(storage, name)?
    };
    storage.erase(&part).map_err(|e| {
        log::error!("erase {}: {}", name, e);
        CommandError::Erase
    })
}

fn check_boot_magic(name: &str, data: &[u8]) -> Reply {
    if (name == "boot" || name == "recovery") && !has_magic(data) {
        return Err(CommandError::NotBootImage);
    }
    Ok(())
}

fn flash_block(storage: &mut dyn Storage, name: &str, data: &[u8]) -> Reply {
    if name == "partition" {
        log::info!("Attempt to write partition image.");
        return storage.write_partition_table(data).map_err(|e| {
            log::error!("partition image: {}", e);
            CommandError::PartitionImage
        });
    }

    let part = storage
        .find(name)
        .map_err(|_| CommandError::NoPartitionTable)?;

    let rounded = (data.len() as u64 + SECTOR - 1) / SECTOR * SECTOR;
    if rounded > part.byte_len() {
        return Err(CommandError::SizeTooLarge);
    }

    if is_sparse(data) {
        return write_sparse(storage, &part, data);
    }

    check_boot_magic(name, data)?;
    storage.write(&part, 0, data).map_err(|e| {
        log::error!("flash {}: {}", name, e);
        BootError::StorageWriteError.into()
    })
}

/// Expand a sparse image into `part`
fn write_sparse(storage: &mut dyn Storage, part: &PartitionRegion, data: &[u8]) -> Reply {
    let image = SparseImage::parse(data).map_err(|e| {
        log::error!("sparse: {}", e);
        BootError::SparseFormatError
    })?;
    let header = *image.header();
    let blk_sz = header.blk_sz as u64;
    let mut blocks: u64 = 0;

    for chunk in image.chunks() {
        let chunk = chunk.map_err(|e| match e {
            BootImageError::BogusChunkSize => CommandError::BogusChunkSize,
            BootImageError::UnknownChunkType => CommandError::UnknownChunkType,
            _ => BootError::SparseFormatError.into(),
        })?;

        match chunk.kind {
            ChunkKind::Raw => {
                storage
                    .write(part, blocks * blk_sz, chunk.data)
                    .map_err(|_| BootError::StorageWriteError)?;
            }
            ChunkKind::Fill(pattern) => {
                let mut block = vec![0u8; blk_sz as usize];
                for word in block.chunks_exact_mut(4) {
                    word.copy_from_slice(&pattern.to_le_bytes());
                }
                for i in 0..chunk.blocks as u64 {
                    storage
                        .write(part, (blocks + i) * blk_sz, &block)
                        .map_err(|_| BootError::StorageWriteError)?;
                }
            }
            ChunkKind::DontCare | ChunkKind::Crc32 => {}
        }
        blocks += chunk.blocks as u64;
    }

    log::info!(
        "Wrote {} blocks, expected to write {} blocks",
        blocks,
        header.total_blks
    );
    if blocks != header.total_blks as u64 {
        return Err(BootError::SparseFormatError.into());
    }
    Ok(())
}

fn raw_partition(storage: &dyn Storage, name: &str) -> Result<PartitionRegion, CommandError> {
    if storage.partitions().is_empty() {
        return Err(CommandError::NoPartitionTable);
    }
    storage.find(name).map_err(|_| CommandError::UnknownPartition)
}

fn flash_raw(storage: &mut dyn Storage, name: &str, data: &[u8]) -> Reply {
    let part = raw_partition(storage, name)?;
    check_boot_magic(name, data)?;

    log::info!("writing {} bytes to '{}'", data.len(), name);
    let written = if SPARE_BYTE_PARTITIONS.contains(&name) {
        let extra = storage.spare_per_page().unwrap_or(0);
        storage.write_with_spare(&part, extra, data)
    } else {
        // the last page is padded out by the backend
        storage.write(&part, 0, data)
    };
    written.map_err(|e| {
        log::error!("flash {}: {}", name, e);
        BootError::StorageWriteError
    })?;
    log::info!("partition '{}' updated", name);
    Ok(())
}
