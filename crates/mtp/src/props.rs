//! Table-driven object and device properties.
//!
//! Each row binds a property code and wire type to a typed encoder; every
//! property opcode walks these tables, so a new property is one new row.

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{datatype, datetime, devprop, form, format, objprop};
use mtp_vfs::VfsInfo;

use crate::handle::{storage_id, volume_index, FOLDER_MASK};
use crate::DeviceConfig;

/// Everything an encoder may draw on. `info` is `None` when a default value
/// is requested (descriptor queries pass no object).
pub(crate) struct PropContext<'a> {
    pub handle: u32,
    pub info: Option<&'a VfsInfo>,
    pub current_parent: u32,
    pub config: &'a DeviceConfig,
}

impl PropContext<'_> {
    fn live_info(&self) -> Option<&VfsInfo> {
        if self.handle == 0 || self.handle == u32::MAX {
            return None;
        }
        self.info.filter(|i| !i.name.is_empty())
    }
}

type ObjectPropProc = fn(&mut PayloadWriter<'_>, &PropContext<'_>) -> u32;

pub(crate) struct ObjectProp {
    pub code: u16,
    pub datatype: u16,
    pub proc: ObjectPropProc,
}

/// Maps a directory entry to its object format code. The directory check
/// outranks extension lookup.
pub(crate) fn format_code(info: &VfsInfo) -> u16 {
    if info.attrs.directory() {
        return format::ASSOCIATION;
    }
    let Some(ext) = info.name.rsplit_once('.').map(|(_, e)| e) else {
        return format::UNDEFINED;
    };
    OBJECT_FORMATS
        .iter()
        .find(|(_, e)| e.eq_ignore_ascii_case(ext))
        .map(|&(code, _)| code)
        .unwrap_or(format::UNDEFINED)
}

/// Extension table, first match wins.
pub(crate) static OBJECT_FORMATS: &[(u16, &str)] = &[
    (format::DEVICE_BINARY, "BIN"),
    (format::DEVICE_BINARY, "FWX"),
    (format::TEXT_FILE, "TXT"),
    (format::TEXT_FILE, "DCF"),
    (format::TEXT_FILE, "EDS"),
    (format::DEVICE_SCRIPT, "INI"),
    (format::TEXT_FILE, "LOG"),
    (format::HTML, "HTM"),
    (format::HTML, "HTML"),
    (format::IMAGE_BMP, "BMP"),
    (format::IMAGE_PNG, "PNG"),
    (format::IMAGE_JPG, "JPG"),
    (format::IMAGE_GIF, "GIF"),
    (format::UNKNOWN_IMAGE, "ICO"),
];

/// Format codes announced by GetDeviceInfo.
pub(crate) static SUPPORTED_FORMATS: &[u16] = &[
    format::DEVICE_BINARY,
    format::TEXT_FILE,
    format::DEVICE_SCRIPT,
    format::HTML,
    format::IMAGE_BMP,
    format::IMAGE_PNG,
    format::IMAGE_JPG,
    format::IMAGE_GIF,
    format::UNKNOWN_IMAGE,
    format::UNDEFINED,
    format::ASSOCIATION,
];

pub(crate) fn prop_storage_id(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let id = if ctx.handle != 0 && ctx.handle != u32::MAX {
        storage_id(volume_index(ctx.handle))
    } else {
        0
    };
    w.u32(id)
}

pub(crate) fn prop_object_format(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let code = ctx.live_info().map(format_code).unwrap_or(format::UNDEFINED);
    w.u16(code)
}

pub(crate) fn prop_protection_status(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let protected = ctx
        .live_info()
        .map(|i| if i.attrs.writable() { 0 } else { 1 })
        .unwrap_or(0);
    w.u16(protected)
}

fn prop_object_size(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    w.u64(ctx.live_info().map(|i| i.size).unwrap_or(0))
}

fn prop_association_type(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let assoc = ctx
        .live_info()
        .map(|i| if i.attrs.directory() { 1 } else { 0 })
        .unwrap_or(0);
    w.u16(assoc)
}

pub(crate) fn prop_file_name(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    w.string(ctx.live_info().map(|i| i.name.as_str()))
}

pub(crate) fn prop_date_created(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let s = match ctx.live_info() {
        Some(i) => datetime::format_timestamp(i.created),
        None => "20010101T000000".to_string(),
    };
    w.string(Some(&s))
}

pub(crate) fn prop_date_modified(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    let s = match ctx.live_info() {
        Some(i) => datetime::format_timestamp(i.modified),
        None => "20010101T000000".to_string(),
    };
    w.string(Some(&s))
}

pub(crate) fn prop_parent_object(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    // Objects in the volume root report an all-ones parent, everything else
    // the folder resolved most recently.
    let parent = if ctx.handle & FOLDER_MASK == FOLDER_MASK {
        u32::MAX
    } else {
        ctx.current_parent
    };
    w.u32(parent)
}

fn prop_persistent_uid(w: &mut PayloadWriter<'_>, ctx: &PropContext<'_>) -> u32 {
    // 128 bits: the handle widened, then zeros.
    let handle = if ctx.handle != u32::MAX { ctx.handle } else { 0 };
    w.u64(handle as u64) + w.u64(0)
}

/// Without PersistentUID (0xDC41) Windows refuses to delete files.
pub(crate) static OBJECT_PROPS: &[ObjectProp] = &[
    ObjectProp { code: objprop::STORAGE_ID, datatype: datatype::UINT32, proc: prop_storage_id },
    ObjectProp { code: objprop::OBJECT_FORMAT, datatype: datatype::UINT16, proc: prop_object_format },
    ObjectProp { code: objprop::PROTECTION_STATUS, datatype: datatype::UINT16, proc: prop_protection_status },
    ObjectProp { code: objprop::OBJECT_SIZE, datatype: datatype::UINT64, proc: prop_object_size },
    ObjectProp { code: objprop::ASSOCIATION_TYPE, datatype: datatype::UINT16, proc: prop_association_type },
    ObjectProp { code: objprop::OBJECT_FILE_NAME, datatype: datatype::STR, proc: prop_file_name },
    ObjectProp { code: objprop::DATE_CREATED, datatype: datatype::STR, proc: prop_date_created },
    ObjectProp { code: objprop::DATE_MODIFIED, datatype: datatype::STR, proc: prop_date_modified },
    ObjectProp { code: objprop::PARENT_OBJECT, datatype: datatype::UINT32, proc: prop_parent_object },
    ObjectProp { code: objprop::PERSISTENT_UID, datatype: datatype::UINT128, proc: prop_persistent_uid },
    ObjectProp { code: objprop::NAME, datatype: datatype::STR, proc: prop_file_name },
];

pub(crate) fn object_prop(code: u16) -> Option<&'static ObjectProp> {
    OBJECT_PROPS.iter().find(|p| p.code == code)
}

/// Which slot of a property descriptor is being encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropPass {
    Value,
    Default,
    Min,
    Max,
    Step,
}

type DevicePropProc = fn(&mut PayloadWriter<'_>, &PropContext<'_>, PropPass, &DeviceProp) -> u32;

pub(crate) struct DeviceProp {
    pub code: u16,
    pub datatype: u16,
    pub proc: DevicePropProc,
    pub form: u8,
    pub min: u32,
    pub max: u32,
}

fn devprop_battery_level(
    w: &mut PayloadWriter<'_>,
    _ctx: &PropContext<'_>,
    pass: PropPass,
    prop: &DeviceProp,
) -> u32 {
    // No battery on bus-powered hardware; the level pins to the minimum.
    let value = match pass {
        PropPass::Min => prop.min as u16,
        PropPass::Max => prop.max as u16,
        PropPass::Step => 1,
        PropPass::Value | PropPass::Default => prop.min as u16,
    };
    w.u16(value)
}

fn devprop_friendly_name(
    w: &mut PayloadWriter<'_>,
    ctx: &PropContext<'_>,
    _pass: PropPass,
    _prop: &DeviceProp,
) -> u32 {
    w.string(Some(&ctx.config.model))
}

pub(crate) static DEVICE_PROPS: &[DeviceProp] = &[
    DeviceProp {
        code: devprop::BATTERY_LEVEL,
        datatype: datatype::UINT16,
        proc: devprop_battery_level,
        form: form::RANGE,
        min: 0,
        max: 100,
    },
    DeviceProp {
        code: devprop::DEVICE_FRIENDLY_NAME,
        datatype: datatype::STR,
        proc: devprop_friendly_name,
        form: form::NONE,
        min: 0,
        max: 0,
    },
];

pub(crate) fn device_prop(code: u16) -> Option<&'static DeviceProp> {
    DEVICE_PROPS.iter().find(|p| p.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_vfs::FileAttributes;

    fn file_info(name: &str, size: u64) -> VfsInfo {
        VfsInfo {
            name: name.to_string(),
            size,
            created: 0,
            modified: 0,
            attrs: FileAttributes::new().with_writable(true),
        }
    }

    #[test]
    fn format_lookup_is_case_insensitive() {
        assert_eq!(format_code(&file_info("A.TXT", 0)), format::TEXT_FILE);
        assert_eq!(format_code(&file_info("a.txt", 0)), format::TEXT_FILE);
        assert_eq!(format_code(&file_info("fw.fwx", 0)), format::DEVICE_BINARY);
        assert_eq!(format_code(&file_info("noext", 0)), format::UNDEFINED);
        assert_eq!(format_code(&file_info("odd.xyz", 0)), format::UNDEFINED);
    }

    #[test]
    fn directories_outrank_extensions() {
        let mut info = file_info("PHOTOS.JPG", 0);
        info.attrs = info.attrs.with_directory(true);
        assert_eq!(format_code(&info), format::ASSOCIATION);
    }

    #[test]
    fn every_required_row_is_present() {
        for code in [
            objprop::STORAGE_ID,
            objprop::OBJECT_FORMAT,
            objprop::PROTECTION_STATUS,
            objprop::OBJECT_SIZE,
            objprop::ASSOCIATION_TYPE,
            objprop::OBJECT_FILE_NAME,
            objprop::DATE_CREATED,
            objprop::DATE_MODIFIED,
            objprop::PARENT_OBJECT,
            objprop::PERSISTENT_UID,
            objprop::NAME,
        ] {
            assert!(object_prop(code).is_some(), "missing 0x{code:04X}");
        }
        assert!(object_prop(0xDC99).is_none());
    }

    #[test]
    fn persistent_uid_is_always_16_bytes() {
        let config = crate::DeviceConfig::default();
        for handle in [0u32, 0x0FF1_2345, u32::MAX] {
            let ctx = PropContext {
                handle,
                info: None,
                current_parent: 0,
                config: &config,
            };
            let mut buf = vec![0u8; 32];
            let mut w = PayloadWriter::emit(0, &mut buf);
            let len = prop_persistent_uid(&mut w, &ctx);
            assert_eq!(len, 16);
            assert_eq!(w.written(), 16);
        }
    }

    #[test]
    fn object_size_encodes_the_live_value() {
        let config = crate::DeviceConfig::default();
        let info = file_info("HI.TXT", 5);
        let ctx = PropContext {
            handle: 0x0FF7_D34C,
            info: Some(&info),
            current_parent: 0x0FF0_0000,
            config: &config,
        };
        let mut buf = vec![0u8; 8];
        let mut w = PayloadWriter::emit(0, &mut buf);
        assert_eq!(prop_object_size(&mut w, &ctx), 8);
        assert_eq!(buf, 5u64.to_le_bytes());
    }
}
