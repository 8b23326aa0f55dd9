//! The MTP object-property operations (0x98xx).

use log::debug;

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{container, form, op, ResponseCode};
use mtp_vfs::Vfs;

use super::{Command, DataIn};
use crate::engine::Core;
use crate::props::{self, PropContext};
use crate::resolver;

pub(crate) fn get_object_props_supported<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!("GetObjectPropsSupported {:08X}", core.session.params[0]);
    }

    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT_PROPS_SUPPORTED, core.tx_id, core.tx_total);
    len += w.u32(props::OBJECT_PROPS.len() as u32);
    for prop in props::OBJECT_PROPS {
        len += w.u16(prop.code);
    }
    Command::Data(len)
}

pub(crate) fn get_object_prop_desc<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let [prop_code, object_format, ..] = core.session.params;
    if w.is_measure() {
        debug!("GetObjectPropDesc {prop_code:04X},{object_format:04X}");
    }

    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT_PROP_DESC, core.tx_id, core.tx_total);

    if let Some(prop) = props::object_prop(prop_code as u16) {
        let ctx = PropContext {
            handle: 0,
            info: None,
            current_parent: core.session.current_parent,
            config: &core.config,
        };
        len += w.u16(prop.code);
        len += w.u16(prop.datatype);
        len += w.u8(0); // Get (read-only)
        len += (prop.proc)(w, &ctx); // Default value
        len += w.u32(0); // Group code
        len += w.u8(form::NONE);
    }
    Command::Data(len)
}

pub(crate) fn get_object_prop_value<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let [handle, prop_code, ..] = core.session.params;
    if w.is_measure() {
        debug!("GetObjectPropValue {handle:08X},{prop_code:04X}");
    }

    let Some(prop) = props::object_prop(prop_code as u16) else {
        core.session.response.stage(ResponseCode::ObjectPropNotSupported);
        return Command::Respond;
    };
    let Some((info, _)) = resolver::resolve(core, handle, false) else {
        core.session.response.stage(ResponseCode::InvalidObjectHandle);
        return Command::Respond;
    };

    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT_PROP_VALUE, core.tx_id, core.tx_total);
    let ctx = PropContext {
        handle,
        info: Some(&info),
        current_parent: core.session.current_parent,
        config: &core.config,
    };
    len += (prop.proc)(w, &ctx);
    Command::Data(len)
}

/// Emits `{handle, code, type, value}` quadruples: one per table row for the
/// all-ones wildcard, exactly the matching row otherwise, none when nothing
/// matches.
pub(crate) fn get_object_prop_list<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    let [handle, object_format, prop_code, group, depth] = core.session.params;
    if w.is_measure() {
        debug!("GetObjectPropList {handle:08X},{object_format:04X},{prop_code:08X},{group},{depth}");
    }

    if object_format != 0 {
        core.session.response.stage(ResponseCode::SpecificationByFormatUnsupported);
        return Command::Respond;
    }
    if group != 0 {
        core.session.response.stage(ResponseCode::SpecificationByGroupUnsupported);
        return Command::Respond;
    }
    if depth != 0 {
        core.session.response.stage(ResponseCode::SpecificationByDepthUnsupported);
        return Command::Respond;
    }

    let info = if handle != 0 && handle != u32::MAX {
        match resolver::resolve(core, handle, false) {
            Some((info, _)) => Some(info),
            None => {
                core.session.response.stage(ResponseCode::InvalidObjectHandle);
                return Command::Respond;
            }
        }
    } else {
        None
    };

    let matches = |code: u16| prop_code == u32::MAX || prop_code == code as u32;

    let mut len = 0;
    len += container::write_data_header(w, op::GET_OBJECT_PROP_LIST, core.tx_id, core.tx_total);

    let count = props::OBJECT_PROPS.iter().filter(|p| matches(p.code)).count();
    len += w.u32(count as u32);

    let ctx = PropContext {
        handle,
        info: info.as_ref(),
        current_parent: core.session.current_parent,
        config: &core.config,
    };
    for prop in props::OBJECT_PROPS.iter().filter(|p| matches(p.code)) {
        len += w.u32(handle);
        len += w.u16(prop.code);
        len += w.u16(prop.datatype);
        len += (prop.proc)(w, &ctx);
    }
    Command::Data(len)
}

/// No object property is writable yet; the data phase is drained so the
/// transaction stays well-formed, then the set is refused.
#[cfg(not(feature = "read-only"))]
pub(crate) fn set_object_prop_value<V: Vfs>(core: &mut Core<V>, w: &mut PayloadWriter<'_>) -> Command {
    if w.is_measure() {
        debug!(
            "SetObjectPropValue {:08X},{:04X}",
            core.session.params[0], core.session.params[1]
        );
        core.session.begin_data_phase();
    }
    Command::AwaitData
}

#[cfg(not(feature = "read-only"))]
pub(crate) fn set_object_prop_value_data<V: Vfs>(core: &mut Core<V>, pkt: &[u8]) -> DataIn {
    let s = &mut core.session;
    if s.send_expect == 0 {
        if pkt.len() < 4 {
            s.response.stage(ResponseCode::GeneralError);
            return DataIn::Done;
        }
        s.send_expect = u32::from_le_bytes(pkt[..4].try_into().unwrap());
        s.send_received = 0;
    }
    s.send_received += pkt.len() as u32;
    if s.send_received < s.send_expect {
        return DataIn::Continue;
    }
    s.response.stage(ResponseCode::AccessDenied);
    DataIn::Done
}
