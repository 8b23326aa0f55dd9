//! Storage enumeration, description, and formatting.

use log::debug;

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{container, op, ResponseCode};
use mtp_vfs::{Vfs, VfsError};

use super::Command;
use crate::engine::Core;
use crate::handle::{drive_index, storage_id};

/// Storage type codes from the StorageInfo dataset.
const STORAGE_TYPE_FIXED_RAM: u16 = 3;
const STORAGE_TYPE_REMOVABLE_RAM: u16 = 4;
const FILESYSTEM_TYPE_FLAT: u16 = 1;
const FILESYSTEM_TYPE_HIERARCHICAL: u16 = 2;
const ACCESS_READ_WRITE: u16 = 0;

pub(crate) fn get_storage_ids<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetStorageIds");
    }

    let mut len = 0;
    len += container::write_data_header(w, op::GET_STORAGE_IDS, core.tx_id, core.tx_total);

    // Volumes with no media keep their slot but are not announced.
    let mut count = 0u32;
    let mut i = 0;
    while let Some(vol) = core.vfs.volume(i) {
        if core.vfs.fs_size(&vol).is_ok() {
            count += 1;
        }
        i += 1;
    }
    len += w.u32(count);

    let mut i = 0;
    while let Some(vol) = core.vfs.volume(i) {
        if core.vfs.fs_size(&vol).is_ok() {
            len += w.u32(storage_id(i));
        }
        i += 1;
    }
    Command::Data(len)
}

pub(crate) fn get_storage_info<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetStorageInfo {:08X}", core.session.params[0]);
    }

    let volume = drive_index(core.session.params[0]).and_then(|i| core.vfs.volume(i));
    let Some(volume) = volume else {
        core.session.response.stage(ResponseCode::InvalidStorageId);
        return Command::Respond;
    };
    let Ok(capacity) = core.vfs.fs_size(&volume) else {
        core.session.response.stage(ResponseCode::StoreNotAvailable);
        return Command::Respond;
    };
    let free = core.vfs.fs_free(&volume).unwrap_or(0);
    let Ok(info) = core.vfs.stat(&volume) else {
        core.session.response.stage(ResponseCode::StoreNotAvailable);
        return Command::Respond;
    };

    let mut len = 0;
    len += container::write_data_header(w, op::GET_STORAGE_INFO, core.tx_id, core.tx_total);
    len += w.u16(if info.attrs.removable_disk() {
        STORAGE_TYPE_REMOVABLE_RAM
    } else {
        STORAGE_TYPE_FIXED_RAM
    });
    len += w.u16(if info.attrs.flat_filesystem() {
        FILESYSTEM_TYPE_FLAT
    } else {
        FILESYSTEM_TYPE_HIERARCHICAL
    });
    len += w.u16(ACCESS_READ_WRITE);
    len += w.u64(capacity);
    len += w.u64(free);
    len += w.u32(u32::MAX); // FreeSpaceInObjects: not used
    len += w.string(Some(&info.name)); // StorageDescription
    len += w.string(Some(&volume)); // VolumeIdentifier
    Command::Data(len)
}

pub(crate) fn format_store<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("FormatStore {:08X}", core.session.params[0]);

        let volume = drive_index(core.session.params[0]).and_then(|i| core.vfs.volume(i));
        let Some(volume) = volume else {
            core.session.response.stage(ResponseCode::InvalidStorageId);
            return Command::Respond;
        };
        match core.vfs.format(&volume) {
            Ok(()) => {}
            Err(VfsError::ReadOnly) => {
                core.session.response.stage(ResponseCode::StoreReadOnly);
                return Command::Respond;
            }
            Err(_) => {
                core.session.response.stage(ResponseCode::GeneralError);
                return Command::Respond;
            }
        }
    }
    Command::Respond
}
