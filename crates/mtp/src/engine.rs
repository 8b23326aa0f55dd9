//! The transaction engine: container routing, the outbound cursor, and the
//! control-endpoint surface (cancel, device status, reset).

use log::{debug, trace, warn};

use mtp_proto::writer::PayloadWriter;
use mtp_proto::{container, op, CancelPayload, ContainerHeader, ContainerType, ResponseCode};
use mtp_proto::{CLASS_REQ_CANCEL_CODE, CONTAINER_HEADER_LEN};
use mtp_vfs::Vfs;

use crate::ops::{self, Command, DataIn, OpcodeEntry};
use crate::session::Session;
use crate::DeviceConfig;

#[cfg(feature = "events")]
use mtp_proto::EventCode;

/// Event codes announced by GetDeviceInfo when the interrupt path is built.
#[cfg(feature = "events")]
pub(crate) const SUPPORTED_EVENTS: &[u16] = &[
    EventCode::CancelTransaction as u16,
    EventCode::ObjectAdded as u16,
    EventCode::ObjectRemoved as u16,
    EventCode::StoreAdded as u16,
    EventCode::StoreRemoved as u16,
    EventCode::DevicePropChanged as u16,
    EventCode::ObjectInfoChanged as u16,
    EventCode::DeviceInfoChanged as u16,
    EventCode::StoreFull as u16,
    EventCode::ObjectRefsChanged as u16,
];

/// State the handlers work against, split from the transaction plumbing so a
/// handler call and the emission window can borrow disjoint parts of the
/// engine.
pub(crate) struct Core<V: Vfs> {
    pub vfs: V,
    pub config: DeviceConfig,
    pub session: Session,
    /// Transaction id of the command in flight.
    pub tx_id: u32,
    /// Measured length of the data phase, available to emission passes for
    /// the container length field (zero while measuring).
    pub tx_total: u32,
}

impl<V: Vfs> Core<V> {
    pub(crate) fn new(vfs: V, config: DeviceConfig) -> Self {
        Core {
            vfs,
            config,
            session: Session::default(),
            tx_id: 0,
            tx_total: 0,
        }
    }
}

/// One transaction: `Idle -> [DataIn* | DataOut*] -> Response -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    /// Streaming the handler's data phase; `index` is the byte offset the
    /// next window starts at.
    DataOut { index: u32, length: u32 },
    /// Collecting an inbound data phase; only the first packet carries a
    /// container header.
    DataIn { started: bool },
    /// The response container is pending.
    Response,
}

pub struct PtpEngine<V: Vfs> {
    core: Core<V>,
    state: TxState,
    current: Option<OpcodeEntry<V>>,
    scratch: Vec<u8>,
}

impl<V: Vfs> PtpEngine<V> {
    pub fn new(vfs: V, config: DeviceConfig) -> Self {
        PtpEngine {
            core: Core::new(vfs, config),
            state: TxState::Idle,
            current: None,
            scratch: Vec::new(),
        }
    }

    /// The backing volume set, e.g. for host-side bookkeeping between
    /// transfers.
    pub fn vfs(&self) -> &V {
        &self.core.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut V {
        &mut self.core.vfs
    }

    /// Feeds one inbound bulk packet. Returns `false` when the transport
    /// should stall the endpoint (unknown opcode, unknown container type, or
    /// a transaction-id mismatch).
    pub fn payload_in(&mut self, pkt: &[u8]) -> bool {
        // Continuation packets of an inbound data phase carry no header.
        if let TxState::DataIn { started: true } = self.state {
            return self.deliver_data(pkt);
        }

        let Ok(hdr) = ContainerHeader::parse(pkt) else {
            warn!("runt container ({} bytes)", pkt.len());
            return false;
        };
        trace!(
            "container type {} code {:04X} len {} id {}",
            hdr.kind,
            hdr.code,
            hdr.length,
            hdr.transaction_id
        );

        match hdr.container_type() {
            Some(ContainerType::Command) => {
                let Some(entry) = ops::lookup::<V>(hdr.code) else {
                    warn!("unsupported opcode {:04X}", hdr.code);
                    return false;
                };
                trace!("dispatch {:04X} id {}", entry.code, hdr.transaction_id);
                self.core.tx_id = hdr.transaction_id;
                self.core.tx_total = 0;
                self.core.session.response.clear();
                self.core.session.params = container::parse_params(pkt, 5);
                self.current = Some(entry);

                // Only device discovery and session establishment may run
                // outside a session.
                if self.core.session.id == 0
                    && !matches!(hdr.code, op::GET_DEVICE_INFO | op::OPEN_SESSION)
                {
                    self.core.session.response.stage(ResponseCode::SessionNotOpen);
                    self.state = TxState::Response;
                    return true;
                }

                let mut w = PayloadWriter::Measure;
                self.state = match (entry.proc)(&mut self.core, &mut w) {
                    Command::Data(length) => TxState::DataOut { index: 0, length },
                    Command::Respond => TxState::Response,
                    Command::AwaitData => TxState::DataIn { started: false },
                };
                true
            }
            Some(ContainerType::Data) => {
                if hdr.transaction_id != self.core.tx_id {
                    return false;
                }
                match self.state {
                    TxState::DataIn { started: false } => {
                        self.state = TxState::DataIn { started: true };
                        self.deliver_data(pkt)
                    }
                    // The handler already staged its response (usually an
                    // error); swallow the remainder of the phase.
                    TxState::Response => true,
                    _ => false,
                }
            }
            Some(ContainerType::Response) | Some(ContainerType::Event) | None => false,
        }
    }

    fn deliver_data(&mut self, pkt: &[u8]) -> bool {
        let Some(data_proc) = self.current.as_ref().and_then(|e| e.data) else {
            return false;
        };
        match data_proc(&mut self.core, pkt) {
            DataIn::Continue => {}
            DataIn::Done => self.state = TxState::Response,
        }
        true
    }

    /// Produces the next outbound chunk of at most `window` bytes, or `None`
    /// when there is nothing to send. The data phase comes out first, one
    /// window per call (a full-window multiple ends with an empty chunk, the
    /// bulk ZLP), then the response container.
    pub fn payload_out(&mut self, window: usize) -> Option<&[u8]> {
        match self.state {
            TxState::DataOut { index, length } if index <= length => {
                let entry = self.current?;
                if self.scratch.len() < window {
                    self.scratch.resize(window, 0);
                }
                self.core.tx_total = length;
                {
                    let mut w = PayloadWriter::emit(index, &mut self.scratch[..window]);
                    (entry.proc)(&mut self.core, &mut w);
                }
                let out_len = ((length - index) as usize).min(window);
                trace!("data out {out_len} bytes at {index}/{length}");
                self.state = TxState::DataOut {
                    index: index.saturating_add(window as u32),
                    length,
                };
                Some(&self.scratch[..out_len])
            }
            TxState::DataOut { .. } | TxState::Response => {
                let code = self.core.session.response.code_or_ok();
                let count = self.core.session.response.param_count;
                let params = self.core.session.response.params;
                self.core.session.response.clear();

                let total = CONTAINER_HEADER_LEN + 4 * count;
                if self.scratch.len() < total {
                    self.scratch.resize(total, 0);
                }
                {
                    let mut w = PayloadWriter::emit(0, &mut self.scratch[..total]);
                    container::write_response(&mut w, code.into(), self.core.tx_id, &params[..count]);
                }
                debug!("response {:04X} id {}", u16::from(code), self.core.tx_id);
                self.state = TxState::Idle;
                self.current = None;
                Some(&self.scratch[..total])
            }
            TxState::Idle | TxState::DataIn { .. } => None,
        }
    }

    /// Class request 0x4001 from the control endpoint. Safe in any state:
    /// aborts the transaction, and if an upload was in flight, drops the
    /// half-written file and arms the `TransactionCancelled` status.
    pub fn cancel_request(&mut self, payload: &[u8]) {
        let Ok(cancel) = CancelPayload::parse(payload) else {
            return;
        };
        if cancel.code != CLASS_REQ_CANCEL_CODE {
            return;
        }
        debug!("cancel request, transaction {}", cancel.transaction_id);

        let s = &mut self.core.session;
        if s.xfer.take().is_some() {
            s.cancelled = true;
            let partial = std::mem::take(&mut s.send_path);
            if !partial.is_empty() {
                let _ = self.core.vfs.remove(&partial);
            }
        }
        self.state = TxState::Idle;
        self.current = None;
    }

    /// Class request 0x67: 4-byte status, `TransactionCancelled` exactly
    /// once after a cancel, `OK` otherwise.
    pub fn get_device_status(&mut self) -> [u8; 4] {
        let code = if self.core.session.cancelled {
            self.core.session.cancelled = false;
            ResponseCode::TransactionCancelled
        } else {
            ResponseCode::Ok
        };
        container::device_status(code)
    }

    /// Bus reset / class DeviceReset: tears down the session and every
    /// folder-cache file, leaving the engine as if freshly constructed.
    pub fn reset(&mut self) {
        debug!("reset");
        ops::session::shutdown(&mut self.core, true);
        self.state = TxState::Idle;
        self.current = None;
    }

    /// Builds a single-parameter event container for the interrupt pipe, or
    /// `None` while no session is open.
    #[cfg(feature = "events")]
    pub fn event(&mut self, code: EventCode, param: u32) -> Option<[u8; 20]> {
        if self.core.session.id == 0 {
            return None;
        }
        Some(container::event_container(code as u16, param))
    }
}
