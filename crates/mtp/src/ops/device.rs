//! GetDeviceInfo and the device-property operations.

use log::debug;

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{container, form, op, ResponseCode};
use mtp_vfs::Vfs;

use super::{Command, SUPPORTED_OPS};
use crate::engine::Core;
use crate::props::{self, PropContext, PropPass};

const PTP_VERSION: u16 = 100;
const MTP_VENDOR_EXTENSION_ID: u32 = 0x0000_0006;
const MTP_VERSION: u16 = 100;
const FUNCTIONAL_MODE: u16 = 0x0000;

pub(crate) fn get_device_info<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetDeviceInfo");
    }

    let mut len = 0;
    len += container::write_data_header(w, op::GET_DEVICE_INFO, core.tx_id, core.tx_total);

    len += w.u16(PTP_VERSION);
    len += w.u32(MTP_VENDOR_EXTENSION_ID);
    len += w.u16(MTP_VERSION);
    len += w.string(None); // VendorExtensionDesc
    len += w.u16(FUNCTIONAL_MODE);

    len += w.u32(SUPPORTED_OPS.len() as u32);
    for &code in SUPPORTED_OPS {
        len += w.u16(code);
    }

    #[cfg(feature = "events")]
    {
        len += w.u32(crate::engine::SUPPORTED_EVENTS.len() as u32);
        for &code in crate::engine::SUPPORTED_EVENTS {
            len += w.u16(code);
        }
    }
    #[cfg(not(feature = "events"))]
    {
        len += w.u32(0); // EventsSupported
    }

    len += w.u32(props::DEVICE_PROPS.len() as u32);
    for prop in props::DEVICE_PROPS {
        len += w.u16(prop.code);
    }

    len += w.u32(0); // CaptureFormats

    len += w.u32(props::SUPPORTED_FORMATS.len() as u32);
    for &code in props::SUPPORTED_FORMATS {
        len += w.u16(code);
    }

    len += w.string(Some(&core.config.manufacturer));
    len += w.string(Some(&core.config.model));
    len += w.string(Some(&core.config.device_version));
    len += w.string(Some(&core.config.serial));

    Command::Data(len)
}

pub(crate) fn get_device_prop_desc<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetDevicePropDesc {:04X}", core.session.params[0]);
    }

    let mut len = 0;
    len += container::write_data_header(w, op::GET_DEVICE_PROP_DESC, core.tx_id, core.tx_total);

    if let Some(prop) = props::device_prop(core.session.params[0] as u16) {
        let ctx = PropContext {
            handle: 0,
            info: None,
            current_parent: core.session.current_parent,
            config: &core.config,
        };
        len += w.u16(prop.code);
        len += w.u16(prop.datatype);
        len += w.u8(0); // Get (read-only)
        len += (prop.proc)(w, &ctx, PropPass::Default, prop);
        len += (prop.proc)(w, &ctx, PropPass::Value, prop);
        len += w.u8(prop.form);
        if prop.form == form::RANGE {
            len += (prop.proc)(w, &ctx, PropPass::Min, prop);
            len += (prop.proc)(w, &ctx, PropPass::Max, prop);
            len += (prop.proc)(w, &ctx, PropPass::Step, prop);
        }
    }
    Command::Data(len)
}

pub(crate) fn get_device_prop_value<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetDevicePropValue {:04X}", core.session.params[0]);
    }

    let Some(prop) = props::device_prop(core.session.params[0] as u16) else {
        core.session.response.stage(ResponseCode::DevicePropNotSupported);
        return Command::Respond;
    };

    let mut len = 0;
    len += container::write_data_header(w, op::GET_DEVICE_PROP_VALUE, core.tx_id, core.tx_total);
    let ctx = PropContext {
        handle: 0,
        info: None,
        current_parent: core.session.current_parent,
        config: &core.config,
    };
    len += (prop.proc)(w, &ctx, PropPass::Value, prop);
    Command::Data(len)
}

/// No device property is writable; the setter table does not exist yet.
pub(crate) fn set_device_prop_value<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("SetDevicePropValue {:04X}", core.session.params[0]);
        core.session.response.stage(ResponseCode::AccessDenied);
    }
    Command::Respond
}
