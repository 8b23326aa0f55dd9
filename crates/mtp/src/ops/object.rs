//! Object enumeration, transfer, creation and deletion.

use log::{debug, trace, warn};

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{container, format, object_info, op, ResponseCode};
use mtp_vfs::{OpenFlags, Vfs, VfsError};

use super::{Command, DataIn};
use crate::engine::Core;
use crate::handle::{dir_handle, drive_index, item_hash, root_handle, storage_id, volume_index, FOLDER_MASK};
use crate::props::{self, PropContext};
use crate::resolver;

/// Cache line for a subdirectory of the directory whose relative path is
/// `rel` (`"/"` at a volume root).
fn cache_line_for(rel: &str, name: &str) -> String {
    if rel.ends_with('/') {
        format!("{rel}{name}")
    } else {
        format!("{rel}/{name}")
    }
}

fn folder_ordinal(lines: &[String], line: &str) -> u32 {
    match lines.iter().position(|l| l == line) {
        Some(pos) => pos as u32 + 1,
        None => {
            warn!("folder {line} missing from cache");
            lines.len() as u32 + 1
        }
    }
}

#[cfg(not(feature = "flat-namespace"))]
fn prepare_cache<V: Vfs>(core: &mut Core<V>, volume: Option<&str>) {
    let Some(vol) = volume else { return };
    let path = resolver::cache_path(vol);
    let _ = core.vfs.open(&path, OpenFlags::read_write_create());
    if let Ok(mut info) = core.vfs.stat(&path) {
        if !info.attrs.hidden() {
            info.attrs = info.attrs.with_hidden(true);
            let _ = core.vfs.touch(&path, &info);
        }
    }
}

#[cfg(feature = "flat-namespace")]
fn prepare_cache<V: Vfs>(_core: &mut Core<V>, _volume: Option<&str>) {}

#[cfg(not(feature = "flat-namespace"))]
fn load_cache_lines<V: Vfs>(core: &mut Core<V>, volume: Option<&str>) -> Vec<String> {
    match volume {
        Some(vol) => resolver::read_cache_lines(&mut core.vfs, vol),
        None => Vec::new(),
    }
}

#[cfg(feature = "flat-namespace")]
fn load_cache_lines<V: Vfs>(_core: &mut Core<V>, _volume: Option<&str>) -> Vec<String> {
    Vec::new()
}

#[cfg(not(feature = "flat-namespace"))]
fn cache_new_folder<V: Vfs>(core: &mut Core<V>, volume: Option<&str>, lines: &mut Vec<String>, line: String) {
    if lines.iter().any(|l| *l == line) {
        return;
    }
    if let Some(vol) = volume {
        if let Err(err) = resolver::append_cache_line(&mut core.vfs, vol, &line) {
            warn!("folder cache append failed on {vol}: {err}");
        }
    }
    lines.push(line);
}

#[cfg(feature = "flat-namespace")]
fn cache_new_folder<V: Vfs>(_core: &mut Core<V>, _volume: Option<&str>, _lines: &mut Vec<String>, _line: String) {}

fn skip_entry(name: &str) -> bool {
    name == "." || name == ".."
}

/// Two phases over the same directory: count the visible entries (updating
/// the folder cache with any new subdirectory), then emit one handle per
/// entry. Emission calls that are already past the 16-byte header skip the
/// counting phase.
pub(crate) fn get_object_handles<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let [sid, format_filter, parent, ..] = core.session.params;
    if w.is_measure() {
        debug!("GetObjectHandles {sid:08X},{format_filter:08X},{parent:08X}");
    }

    if format_filter != 0 {
        core.session.response.stage(ResponseCode::SpecificationByFormatUnsupported);
        return Command::Respond;
    }

    let path = if parent != 0 && parent != u32::MAX {
        match resolver::resolve(core, parent, true) {
            Some((_, path)) => path,
            None => {
                core.session.response.stage(ResponseCode::InvalidParentObject);
                return Command::Respond;
            }
        }
    } else {
        match drive_index(sid).map(root_handle).and_then(|h| resolver::resolve(core, h, true)) {
            Some((_, path)) => path,
            None => {
                core.session.response.stage(ResponseCode::InvalidStorageId);
                return Command::Respond;
            }
        }
    };
    let rel = resolver::relative(&path).to_string();
    let volume = drive_index(sid).and_then(|i| core.vfs.volume(i));
    let drive = match drive_index(sid) {
        Some(i) => i,
        None => volume_index(core.session.current_parent),
    };

    let mut len = 0u32;
    if w.skip_block(16) {
        len += 16;
    } else {
        prepare_cache(core, volume.as_deref());
        let mut cache_lines = load_cache_lines(core, volume.as_deref());

        let mut dir = match core.vfs.open_dir(&path) {
            Ok(dir) => dir,
            Err(VfsError::NotADirectory | VfsError::NoDevice) => {
                core.session.response.stage(ResponseCode::StoreNotAvailable);
                return Command::Respond;
            }
            Err(_) => {
                core.session.response.stage(ResponseCode::GeneralError);
                return Command::Respond;
            }
        };

        let mut count = 0u32;
        while let Ok(Some(entry)) = dir.next_entry() {
            if skip_entry(&entry.name) || entry.attrs.hidden() {
                continue;
            }
            if entry.attrs.directory() {
                cache_new_folder(core, volume.as_deref(), &mut cache_lines, cache_line_for(&rel, &entry.name));
            }
            count += 1;
        }

        len += container::write_data_header(w, op::GET_OBJECT_HANDLES, core.tx_id, core.tx_total);
        len += w.u32(count);
    }

    if let Ok(mut dir) = core.vfs.open_dir(&path) {
        let cache_lines = load_cache_lines(core, volume.as_deref());
        while let Ok(Some(entry)) = dir.next_entry() {
            if skip_entry(&entry.name) || entry.attrs.hidden() {
                continue;
            }
            let handle = if entry.attrs.directory() {
                dir_handle(drive, folder_ordinal(&cache_lines, &cache_line_for(&rel, &entry.name)))
            } else {
                item_hash(&entry.name) | core.session.current_parent
            };
            if w.is_measure() {
                trace!("list: {handle:08X} - {}", entry.name);
            }
            len += w.u32(handle);
        }
    }
    Command::Data(len)
}

pub(crate) fn get_object_info<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let handle = core.session.params[0];
    if w.is_measure() {
        debug!("GetObjectInfo {handle:08X}");
    }

    let Some((info, _)) = resolver::resolve(core, handle, false) else {
        core.session.response.stage(ResponseCode::AccessDenied);
        return Command::Respond;
    };
    let is_dir = info.attrs.directory();
    let ctx = PropContext {
        handle,
        info: Some(&info),
        current_parent: core.session.current_parent,
        config: &core.config,
    };

    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT_INFO, core.tx_id, core.tx_total);
    len += props::prop_storage_id(w, &ctx);
    len += props::prop_object_format(w, &ctx);
    len += props::prop_protection_status(w, &ctx);
    len += w.u32(info.size as u32); // ObjectCompressedSize
    len += w.u16(0); // ThumbFormat
    len += w.u32(0); // ThumbCompressedSize
    len += w.u32(0); // ThumbPixWidth
    len += w.u32(0); // ThumbPixHeight
    len += w.u32(0); // ImagePixWidth
    len += w.u32(0); // ImagePixHeight
    len += w.u32(0); // ImageBitDepth
    len += props::prop_parent_object(w, &ctx);
    len += w.u16(if is_dir { 1 } else { 0 }); // AssociationType
    len += w.u32(0); // AssociationDesc
    len += w.u32(0); // SequenceNumber
    len += props::prop_file_name(w, &ctx);
    len += props::prop_date_created(w, &ctx);
    len += props::prop_date_modified(w, &ctx);
    len += w.string(None); // Keywords
    Command::Data(len)
}

/// Opens the file on the measurement pass, then streams it into each
/// emission window; the file position is the real cursor for the body.
pub(crate) fn get_object<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT, core.tx_id, core.tx_total);

    if w.is_measure() {
        let handle = core.session.params[0];
        debug!("GetObject {handle:08X}");

        let Some((info, path)) = resolver::resolve(core, handle, false) else {
            core.session.response.stage(ResponseCode::GeneralError);
            return Command::Respond;
        };
        match core.vfs.open(&path, OpenFlags::read_only()) {
            Ok(file) => {
                core.session.xfer = Some(file);
                len += info.size as u32;
            }
            Err(_) => {
                core.session.response.stage(ResponseCode::AccessDenied);
                return Command::Respond;
            }
        }
    } else if let Some(file) = core.session.xfer.as_mut() {
        let mut failed = false;
        w.fill_with(|out| match file.read(out) {
            Ok(n) => n,
            Err(_) => {
                failed = true;
                0
            }
        });
        if failed || file.eof() {
            core.session.xfer = None;
        }
    }
    Command::Data(len)
}

/// Directory removal recurses one level: direct children go first, then the
/// directory itself. Children that refuse to go surface as PartialDeletion.
#[cfg(not(feature = "read-only"))]
pub(crate) fn delete_object<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        let handle = core.session.params[0];
        debug!("DeleteObject {handle:08X}");

        let Some((info, path)) = resolver::resolve(core, handle, false) else {
            core.session.response.stage(ResponseCode::GeneralError);
            return Command::Respond;
        };

        let mut failed_children = 0u32;
        if info.attrs.directory() {
            if let Ok(mut dir) = core.vfs.open_dir(&path) {
                let mut children = Vec::new();
                while let Ok(Some(entry)) = dir.next_entry() {
                    if !skip_entry(&entry.name) {
                        children.push(entry.name);
                    }
                }
                drop(dir);
                for name in children {
                    if core.vfs.remove(&resolver::join(&path, &name)).is_err() {
                        failed_children += 1;
                    }
                }
            }
            // The cache ordinals are no longer meaningful for this volume.
            core.session.folder_cache_dirty |= 1 << volume_index(handle);
        }

        let code = match core.vfs.remove(&path) {
            Ok(()) if failed_children == 0 => ResponseCode::Ok,
            // A backend may unlink the directory even though a child
            // survived; either way children were lost.
            Ok(()) | Err(VfsError::NotEmpty) => ResponseCode::PartialDeletion,
            Err(VfsError::InvalidArgument) => ResponseCode::InvalidObjectHandle,
            Err(VfsError::ReadOnly) => ResponseCode::ObjectWriteProtected,
            Err(VfsError::NoSpace | VfsError::NotADirectory) => ResponseCode::AccessDenied,
            Err(_) => ResponseCode::GeneralError,
        };
        // The cached resolution now points at a dead path.
        core.session.prev_handle = u32::MAX;
        core.session.response.stage(code);
    }
    Command::Respond
}

#[cfg(not(feature = "read-only"))]
pub(crate) fn send_object_info<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        let [sid, parent, ..] = core.session.params;
        debug!("SendObjectInfo {sid:08X},{parent:08X}");

        let mut send_parent = parent;
        if send_parent == 0 || send_parent == u32::MAX {
            match drive_index(sid).filter(|&i| core.vfs.volume(i).is_some()) {
                Some(i) => send_parent = root_handle(i),
                None => {
                    core.session.response.stage(ResponseCode::InvalidStorageId);
                    return Command::Respond;
                }
            }
        }
        let Some((_, path)) = resolver::resolve(core, send_parent, true) else {
            core.session.response.stage(ResponseCode::InvalidParentObject);
            return Command::Respond;
        };
        match core.vfs.stat(&path) {
            Ok(_) => {
                core.session.send_parent = send_parent;
                core.session.send_path.clear();
                core.session.begin_data_phase();
            }
            Err(VfsError::NotADirectory | VfsError::NoDevice) => {
                core.session.response.stage(ResponseCode::StoreNotAvailable);
                return Command::Respond;
            }
            Err(_) => {
                core.session.response.stage(ResponseCode::GeneralError);
                return Command::Respond;
            }
        }
    }
    Command::AwaitData
}

#[cfg(not(feature = "read-only"))]
pub(crate) fn send_object_info_data<V: Vfs>(core: &mut Core<V>, pkt: &[u8]) -> DataIn {
    {
        let s = &mut core.session;
        if s.send_expect == 0 {
            if pkt.len() < 4 {
                s.response.stage(ResponseCode::InvalidDataset);
                return DataIn::Done;
            }
            s.send_expect = u32::from_le_bytes(pkt[..4].try_into().unwrap());
            s.send_received = 0;
            s.send_buf.clear();
        }
        s.send_buf.extend_from_slice(pkt);
        s.send_received += pkt.len() as u32;
        if s.send_received < s.send_expect {
            return DataIn::Continue;
        }
    }
    finish_object_info(core)
}

/// The accumulated ObjectInfo dataset is complete: vet the target, create
/// the file or directory, and stage `{storage, parent, handle}`.
#[cfg(not(feature = "read-only"))]
fn finish_object_info<V: Vfs>(core: &mut Core<V>) -> DataIn {
    let dataset = std::mem::take(&mut core.session.send_buf);
    let info = match object_info::parse_object_info(&dataset) {
        Ok(info) => info,
        Err(err) => {
            debug!("bad ObjectInfo dataset: {err}");
            core.session.response.stage(ResponseCode::InvalidDataset);
            return DataIn::Done;
        }
    };
    debug!("SendObjectInfo dataset: {} ({} bytes)", info.name, info.size);

    let Some((_, parent_path)) = resolver::resolve(core, core.session.send_parent, false) else {
        core.session.response.stage(ResponseCode::InvalidParentObject);
        return DataIn::Done;
    };
    let target = resolver::join(&parent_path, &info.name);
    core.session.send_created = info.created;
    core.session.send_modified = info.modified;

    let code = create_target(core, &target, &info);
    if code == ResponseCode::Ok {
        if let Ok(mut st) = core.vfs.stat(&target) {
            st.created = info.created.unwrap_or(0);
            st.modified = info.modified.unwrap_or(0);
            let _ = core.vfs.touch(&target, &st);
        }
        debug!("assigned handle {:08X} to {target}", core.session.send_handle);

        let parent_param = if core.session.send_parent & FOLDER_MASK == FOLDER_MASK {
            u32::MAX
        } else {
            core.session.send_parent
        };
        core.session.response.stage_with_params(
            ResponseCode::Ok,
            &[
                storage_id(volume_index(core.session.send_handle)),
                parent_param,
                core.session.send_handle,
            ],
        );
    } else {
        core.session.response.stage(code);
    }
    DataIn::Done
}

#[cfg(not(feature = "read-only"))]
fn create_target<V: Vfs>(core: &mut Core<V>, target: &str, info: &object_info::ObjectInfo) -> ResponseCode {
    if core.vfs.fs_size(target).is_err() {
        return ResponseCode::StoreNotAvailable;
    }
    let free = core.vfs.fs_free(target).unwrap_or(0);

    if let Ok(existing) = core.vfs.stat(target) {
        if !existing.attrs.writable() {
            return ResponseCode::ObjectWriteProtected;
        }
        if existing.attrs.hidden() || existing.attrs.system() {
            return ResponseCode::AccessDenied;
        }
        // Overwriting releases the old allocation.
        if info.size as u64 >= free + existing.size {
            return ResponseCode::ObjectTooLarge;
        }
    } else if info.format == format::ASSOCIATION {
        return create_directory(core, target);
    } else if info.size as u64 >= free {
        return ResponseCode::ObjectTooLarge;
    }

    match core.vfs.open(target, OpenFlags::read_write_create().with_truncate(true)) {
        Ok(mut file) => {
            let _ = file.sync();
            core.session.send_handle = item_hash(&info.name) | core.session.current_parent;
            core.session.send_path = target.to_string();
            core.session.xfer = Some(file);
            ResponseCode::Ok
        }
        Err(VfsError::ReadOnly) => ResponseCode::ObjectWriteProtected,
        Err(VfsError::PermissionDenied) => ResponseCode::AccessDenied,
        Err(_) => ResponseCode::GeneralError,
    }
}

#[cfg(all(not(feature = "read-only"), not(feature = "flat-namespace")))]
fn create_directory<V: Vfs>(core: &mut Core<V>, target: &str) -> ResponseCode {
    match core.vfs.mkdir(target) {
        Ok(()) => {
            let drive = volume_index(core.session.send_parent);
            let Some(vol) = core.vfs.volume(drive) else {
                return ResponseCode::GeneralError;
            };
            let line = resolver::relative(target).to_string();
            let ordinal = resolver::find_or_append(&mut core.vfs, &vol, &line);
            core.session.send_handle = dir_handle(drive, ordinal);
            core.session.send_path = target.to_string();
            core.session.xfer = None;
            ResponseCode::Ok
        }
        Err(VfsError::ReadOnly) => ResponseCode::ObjectWriteProtected,
        Err(err) => {
            debug!("mkdir {target} failed: {err}");
            ResponseCode::GeneralError
        }
    }
}

#[cfg(all(not(feature = "read-only"), feature = "flat-namespace"))]
fn create_directory<V: Vfs>(_core: &mut Core<V>, _target: &str) -> ResponseCode {
    ResponseCode::AccessDenied
}

#[cfg(not(feature = "read-only"))]
pub(crate) fn send_object<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("SendObject");
        core.session.begin_data_phase();
    }
    Command::AwaitData
}

#[cfg(not(feature = "read-only"))]
pub(crate) fn send_object_data<V: Vfs>(core: &mut Core<V>, pkt: &[u8]) -> DataIn {
    let s = &mut core.session;
    if s.xfer.is_none() {
        s.response.stage(ResponseCode::NoValidObjectInfo);
        return DataIn::Done;
    }

    let mut payload = pkt;
    if s.send_expect == 0 && s.send_received == 0 {
        if pkt.len() < container::CONTAINER_HEADER_LEN {
            s.response.stage(ResponseCode::IncompleteTransfer);
            return DataIn::Done;
        }
        let announced = u32::from_le_bytes(pkt[..4].try_into().unwrap());
        s.send_expect = announced.saturating_sub(container::CONTAINER_HEADER_LEN as u32);
        payload = &pkt[container::CONTAINER_HEADER_LEN..];
    }

    if !payload.is_empty() {
        if let Some(file) = s.xfer.as_mut() {
            if file.write(payload).is_err() {
                s.response.stage(ResponseCode::GeneralError);
                return DataIn::Done;
            }
        }
    }
    s.send_received += payload.len() as u32;
    trace!("SendObject {} of {} bytes", s.send_received, s.send_expect);
    if s.send_received < s.send_expect {
        return DataIn::Continue;
    }

    let mut file = s.xfer.take().expect("checked above");
    let close_ok = file.sync().is_ok();
    drop(file);
    let path = std::mem::take(&mut s.send_path);
    let created = s.send_created.take();
    let modified = s.send_modified.take();
    let received = s.send_received;

    if !close_ok {
        core.session.response.stage(ResponseCode::GeneralError);
        return DataIn::Done;
    }
    if let Ok(mut st) = core.vfs.stat(&path) {
        if let Some(t) = created {
            st.created = t;
        }
        if let Some(t) = modified {
            st.modified = t;
        }
        let _ = core.vfs.touch(&path, &st);
    }
    debug!("saved {received} bytes to {path}");
    core.session.response.stage(ResponseCode::Ok);
    if let Some(hook) = core.config.on_send_object.as_mut() {
        hook(&path);
    }
    DataIn::Done
}
