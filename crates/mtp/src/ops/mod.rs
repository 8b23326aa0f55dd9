//! Operation handlers and the opcode dispatch table.
//!
//! A command handler is called once in measure mode when the command
//! container arrives (parse, validate, acquire resources, count the data
//! phase) and then once per outbound window in emit mode, where it re-runs
//! the same encoding with the already-sent prefix skipped. Handlers must be
//! deterministic for a given transaction.

pub(crate) mod device;
#[cfg_attr(feature = "read-only", allow(unused_imports))]
pub(crate) mod object;
#[cfg_attr(feature = "read-only", allow(unused_imports))]
pub(crate) mod props;
pub(crate) mod session;
pub(crate) mod storage;

use mtp_proto::op;
use mtp_proto::writer::PayloadWriter;
use mtp_vfs::Vfs;

use crate::engine::Core;

/// What a command handler decided.
pub(crate) enum Command {
    /// A data phase of this many bytes (container header included) streams
    /// out, then the staged response follows.
    Data(u32),
    /// No data phase; the staged response goes out immediately.
    Respond,
    /// An inbound data phase follows; route it to the data handler.
    AwaitData,
}

/// What a data handler made of the latest inbound packet.
pub(crate) enum DataIn {
    Continue,
    /// Phase complete (or aborted); a response is staged.
    Done,
}

pub(crate) type CommandProc<V> = fn(&mut Core<V>, &mut PayloadWriter<'_>) -> Command;
pub(crate) type DataProc<V> = fn(&mut Core<V>, &[u8]) -> DataIn;

pub(crate) struct OpcodeEntry<V: Vfs> {
    pub code: u16,
    pub proc: CommandProc<V>,
    pub data: Option<DataProc<V>>,
}

impl<V: Vfs> Clone for OpcodeEntry<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vfs> Copy for OpcodeEntry<V> {}

fn entry<V: Vfs>(code: u16, proc: CommandProc<V>) -> OpcodeEntry<V> {
    OpcodeEntry { code, proc, data: None }
}

#[cfg_attr(feature = "read-only", allow(dead_code))]
fn entry_with_data<V: Vfs>(code: u16, proc: CommandProc<V>, data: DataProc<V>) -> OpcodeEntry<V> {
    OpcodeEntry { code, proc, data: Some(data) }
}

/// The dispatch table. Unknown opcodes resolve to `None` and stall the pipe.
pub(crate) fn lookup<V: Vfs>(code: u16) -> Option<OpcodeEntry<V>> {
    Some(match code {
        op::GET_DEVICE_INFO => entry(code, device::get_device_info),
        op::OPEN_SESSION => entry(code, session::open_session),
        op::CLOSE_SESSION => entry(code, session::close_session),
        op::GET_STORAGE_IDS => entry(code, storage::get_storage_ids),
        op::GET_STORAGE_INFO => entry(code, storage::get_storage_info),
        op::GET_OBJECT_HANDLES => entry(code, object::get_object_handles),
        op::GET_OBJECT_INFO => entry(code, object::get_object_info),
        op::GET_OBJECT => entry(code, object::get_object),
        #[cfg(not(feature = "read-only"))]
        op::DELETE_OBJECT => entry(code, object::delete_object),
        #[cfg(not(feature = "read-only"))]
        op::SEND_OBJECT_INFO => {
            entry_with_data(code, object::send_object_info, object::send_object_info_data)
        }
        #[cfg(not(feature = "read-only"))]
        op::SEND_OBJECT => entry_with_data(code, object::send_object, object::send_object_data),
        op::FORMAT_STORE => entry(code, storage::format_store),
        op::GET_DEVICE_PROP_DESC => entry(code, device::get_device_prop_desc),
        op::GET_DEVICE_PROP_VALUE => entry(code, device::get_device_prop_value),
        op::SET_DEVICE_PROP_VALUE => entry(code, device::set_device_prop_value),
        op::GET_OBJECT_PROPS_SUPPORTED => entry(code, props::get_object_props_supported),
        op::GET_OBJECT_PROP_DESC => entry(code, props::get_object_prop_desc),
        op::GET_OBJECT_PROP_VALUE => entry(code, props::get_object_prop_value),
        #[cfg(not(feature = "read-only"))]
        op::SET_OBJECT_PROP_VALUE => {
            entry_with_data(code, props::set_object_prop_value, props::set_object_prop_value_data)
        }
        op::GET_OBJECT_PROP_LIST => entry(code, props::get_object_prop_list),
        _ => return None,
    })
}

/// Operation list announced by GetDeviceInfo; keep in step with [`lookup`].
#[cfg(not(feature = "read-only"))]
pub(crate) const SUPPORTED_OPS: &[u16] = &[
    op::GET_DEVICE_INFO,
    op::OPEN_SESSION,
    op::CLOSE_SESSION,
    op::GET_STORAGE_IDS,
    op::GET_STORAGE_INFO,
    op::GET_OBJECT_HANDLES,
    op::GET_OBJECT_INFO,
    op::GET_OBJECT,
    op::DELETE_OBJECT,
    op::SEND_OBJECT_INFO,
    op::SEND_OBJECT,
    op::FORMAT_STORE,
    op::GET_DEVICE_PROP_DESC,
    op::GET_DEVICE_PROP_VALUE,
    op::SET_DEVICE_PROP_VALUE,
    op::GET_OBJECT_PROPS_SUPPORTED,
    op::GET_OBJECT_PROP_DESC,
    op::GET_OBJECT_PROP_VALUE,
    op::SET_OBJECT_PROP_VALUE,
    op::GET_OBJECT_PROP_LIST,
];

#[cfg(feature = "read-only")]
pub(crate) const SUPPORTED_OPS: &[u16] = &[
    op::GET_DEVICE_INFO,
    op::OPEN_SESSION,
    op::CLOSE_SESSION,
    op::GET_STORAGE_IDS,
    op::GET_STORAGE_INFO,
    op::GET_OBJECT_HANDLES,
    op::GET_OBJECT_INFO,
    op::GET_OBJECT,
    op::FORMAT_STORE,
    op::GET_DEVICE_PROP_DESC,
    op::GET_DEVICE_PROP_VALUE,
    op::SET_DEVICE_PROP_VALUE,
    op::GET_OBJECT_PROPS_SUPPORTED,
    op::GET_OBJECT_PROP_DESC,
    op::GET_OBJECT_PROP_VALUE,
    op::GET_OBJECT_PROP_LIST,
];
