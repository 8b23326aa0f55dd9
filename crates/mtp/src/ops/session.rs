//! OpenSession and CloseSession.

use log::debug;

use mtp_proto::writer::PayloadWriter;
use mtp_proto::ResponseCode;
use mtp_vfs::Vfs;

use super::Command;
use crate::engine::Core;

pub(crate) fn open_session<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        let id = core.session.params[0];
        debug!("OpenSession {id:08X}");

        if id == 0 {
            core.session.response.stage(ResponseCode::InvalidParameter);
            return Command::Respond;
        }
        if core.session.id == id {
            core.session.response.stage(ResponseCode::SessionAlreadyOpen);
            return Command::Respond;
        }
        if core.session.id != 0 {
            core.session.response.stage(ResponseCode::DeviceBusy);
            return Command::Respond;
        }

        truncate_folder_caches(core);
        core.session.open(id);
        if let Some(hook) = core.config.on_session_open.as_mut() {
            hook(id);
        }
    }
    Command::Respond
}

/// Starts every hierarchical volume's folder cache from a clean slate.
#[cfg(not(feature = "flat-namespace"))]
fn truncate_folder_caches<V: Vfs>(core: &mut Core<V>) {
    use mtp_vfs::OpenFlags;

    let mut i = 0;
    while let Some(vol) = core.vfs.volume(i) {
        i += 1;
        let Ok(info) = core.vfs.stat(&vol) else { continue };
        if info.attrs.flat_filesystem() {
            continue;
        }
        // Truncate without create: a volume that never listed a directory
        // has no cache to clear.
        let flags = OpenFlags::new().with_read(true).with_write(true).with_truncate(true);
        let _ = core.vfs.open(&crate::resolver::cache_path(&vol), flags);
    }
}

#[cfg(feature = "flat-namespace")]
fn truncate_folder_caches<V: Vfs>(_core: &mut Core<V>) {}

pub(crate) fn close_session<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("CloseSession");
        shutdown(core, false);
    }
    Command::Respond
}

/// Tears the session down: drops the send-object handle, deletes folder
/// caches (every dirty one, or all of them on a device reset), and releases
/// the resolver state. Shared by CloseSession and `reset()`.
pub(crate) fn shutdown<V: Vfs>(core: &mut Core<V>, purge_all_caches: bool) {
    #[cfg(not(feature = "flat-namespace"))]
    {
        let dirty = core.session.folder_cache_dirty;
        for i in 0..(1usize << crate::handle::STORAGE_BITS) {
            if !purge_all_caches && dirty & (1 << i) == 0 {
                continue;
            }
            if let Some(vol) = core.vfs.volume(i) {
                let _ = core.vfs.remove(&crate::resolver::cache_path(&vol));
            }
        }
    }
    #[cfg(feature = "flat-namespace")]
    let _ = purge_all_caches;

    core.session.close();
    if let Some(hook) = core.config.on_session_close.as_mut() {
        hook();
    }
}
