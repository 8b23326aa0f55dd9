//! Handle resolution and the per-volume folder side-cache.
//!
//! The cache file (`/_.MTP`, hidden) lists the relative path of every
//! directory encountered this session, one per line; a directory handle's
//! folder field is its 1-based line ordinal. Resolution works by XOR-diffing
//! the requested handle against the last one resolved, so repeated lookups
//! in the same folder reuse the cached working path.

use log::{trace, warn};

use mtp_vfs::{OpenFlags, Vfs, VfsInfo, VfsResult};

use crate::engine::Core;
use crate::handle::{
    item_hash, volume_index, ObjectHandle, FOLDER_MASK, ITEM_MASK, STORAGE_MASK,
};

pub(crate) const FOLDER_CACHE_FILE: &str = "/_.MTP";

pub(crate) fn cache_path(volume: &str) -> String {
    format!("{volume}{FOLDER_CACHE_FILE}")
}

/// Appends `name` under directory path `dir`, avoiding a doubled slash at a
/// volume root.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// The path after the drive prefix; `"0:/DOCS"` becomes `"/DOCS"`.
pub(crate) fn relative(path: &str) -> &str {
    match path.find(':') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

pub(crate) fn read_cache_lines<V: Vfs>(vfs: &mut V, volume: &str) -> Vec<String> {
    let Ok(mut file) = vfs.open(&cache_path(volume), OpenFlags::read_only()) else {
        return Vec::new();
    };
    let mut data = Vec::new();
    let mut buf = [0u8; 128];
    while let Ok(n) = file.read(&mut buf) {
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&data)
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn append_cache_line<V: Vfs>(vfs: &mut V, volume: &str, line: &str) -> VfsResult<()> {
    let mut file = vfs.open(&cache_path(volume), OpenFlags::read_write_create())?;
    let end = file.size();
    file.seek(end)?;
    file.write(line.as_bytes())?;
    file.write(b"\n")?;
    Ok(())
}

/// 1-based cache ordinal of `line`, appending it first if absent.
pub(crate) fn find_or_append<V: Vfs>(vfs: &mut V, volume: &str, line: &str) -> u32 {
    let lines = read_cache_lines(vfs, volume);
    if let Some(pos) = lines.iter().position(|l| l == line) {
        return pos as u32 + 1;
    }
    if let Err(err) = append_cache_line(vfs, volume, line) {
        warn!("folder cache append failed on {volume}: {err}");
    }
    lines.len() as u32 + 1
}

/// Resolves a handle to the entry's stat data and full path.
///
/// `want_parent` marks the handle as the parent directory of an upcoming
/// operation: `current_parent` is updated so freshly hashed file handles get
/// stamped with the right storage and folder bits.
///
/// Handle 0 re-resolves whatever was resolved last; hosts probe with it
/// right after enumeration.
pub(crate) fn resolve<V: Vfs>(
    core: &mut Core<V>,
    handle: u32,
    want_parent: bool,
) -> Option<(VfsInfo, String)> {
    let handle = if handle == 0 {
        if core.session.prev_handle == u32::MAX {
            return None;
        }
        core.session.prev_handle
    } else {
        handle
    };

    let s = &mut core.session;
    if handle == s.prev_handle && !want_parent {
        return Some((s.cached_info.clone(), s.work_path.clone()));
    }

    let diff = s.prev_handle ^ handle;

    if diff & STORAGE_MASK != 0 {
        let Some(vol) = core.vfs.volume(volume_index(handle)) else {
            return None;
        };
        s.work_path = format!("{vol}/");
        s.current_parent = handle & STORAGE_MASK;
    }
    if diff & (STORAGE_MASK | FOLDER_MASK) != 0 {
        s.prev_handle = handle & (FOLDER_MASK | STORAGE_MASK);

        if handle & FOLDER_MASK == FOLDER_MASK {
            // Back to the volume root.
            if let Some(pos) = s.work_path.find('/') {
                s.work_path.truncate(pos + 1);
            }
            if want_parent {
                s.current_parent = (handle & STORAGE_MASK) | FOLDER_MASK;
            }
            s.work_dir_len = s.work_path.len();
        } else {
            #[cfg(not(feature = "flat-namespace"))]
            {
                let vol = core.vfs.volume(volume_index(handle))?;
                let ordinal = ObjectHandle::from(handle).folder() as usize;
                let lines = read_cache_lines(&mut core.vfs, &vol);
                match ordinal.checked_sub(1).and_then(|i| lines.get(i)) {
                    Some(line) => {
                        s.work_path = format!("{vol}{line}");
                        if want_parent {
                            s.current_parent = handle;
                        }
                        s.work_dir_len = s.work_path.len();
                    }
                    None => {
                        warn!("no folder cache entry for ordinal {ordinal} on {vol}");
                    }
                }
            }
        }
    } else if s.work_dir_len != 0 {
        s.work_path.truncate(s.work_dir_len);
    }

    let mut found = false;
    if handle & ITEM_MASK == 0 {
        // The folder entry itself.
        if let Ok(info) = core.vfs.stat(&s.work_path) {
            s.cached_info = info;
            found = true;
        }
    } else if let Ok(mut dir) = core.vfs.open_dir(&s.work_path) {
        while let Ok(Some(entry)) = dir.next_entry() {
            if entry.name == "." || entry.name == ".." {
                continue;
            }
            if (item_hash(&entry.name) | s.current_parent) == handle {
                s.work_path = join(&s.work_path, &entry.name);
                trace!("{handle:08X} -> {}", s.work_path);
                s.cached_info = entry;
                found = true;
                break;
            }
        }
    }

    s.prev_handle = handle;
    if found {
        Some((s.cached_info.clone(), s.work_path.clone()))
    } else {
        None
    }
}
