//! Session and transaction state.
//!
//! Everything the original kept in function-level statics lives here as one
//! value owned by the engine: the resolver's working path, the pending
//! response, and the send-object bookkeeping. `OpenSession` re-initializes
//! it, `CloseSession` and reset drop it.

use mtp_proto::ResponseCode;
use mtp_vfs::{VfsFile, VfsInfo};

/// Response staged by the current transaction's handler. Emitted as the
/// closing response container; an unset code means `Ok`.
#[derive(Debug, Default)]
pub(crate) struct ResponseStage {
    pub code: Option<ResponseCode>,
    pub params: [u32; 5],
    pub param_count: usize,
}

impl ResponseStage {
    pub fn stage(&mut self, code: ResponseCode) {
        self.code = Some(code);
    }

    pub fn stage_with_params(&mut self, code: ResponseCode, params: &[u32]) {
        self.code = Some(code);
        self.params[..params.len()].copy_from_slice(params);
        self.param_count = params.len();
    }

    pub fn clear(&mut self) {
        *self = ResponseStage::default();
    }

    pub fn code_or_ok(&self) -> ResponseCode {
        self.code.unwrap_or(ResponseCode::Ok)
    }
}

pub(crate) struct Session {
    /// Non-zero while a session is open.
    pub id: u32,
    /// Handle bits of the last directory resolved as a parent; stamps the
    /// folder bits of freshly hashed file handles.
    pub current_parent: u32,
    /// One bit per volume; set when a directory removal invalidated the
    /// folder-cache ordinals.
    pub folder_cache_dirty: u32,

    /// Command parameters of the transaction in flight.
    pub params: [u32; 5],
    pub response: ResponseStage,

    // Resolver cache.
    pub prev_handle: u32,
    pub work_path: String,
    /// Length of the directory portion of `work_path`.
    pub work_dir_len: usize,
    pub cached_info: VfsInfo,

    // The one transfer file handle, shared by GetObject (read) and
    // SendObjectInfo/SendObject (write); the transaction state machine keeps
    // the two from overlapping.
    pub xfer: Option<Box<dyn VfsFile>>,
    /// Set by a cancel, cleared by the next GetDeviceStatus.
    pub cancelled: bool,

    // SendObjectInfo / SendObject bookkeeping.
    pub send_parent: u32,
    pub send_handle: u32,
    pub send_path: String,
    pub send_created: Option<i64>,
    pub send_modified: Option<i64>,
    pub send_expect: u32,
    pub send_received: u32,
    pub send_buf: Vec<u8>,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            id: 0,
            current_parent: 0,
            folder_cache_dirty: 0,
            params: [0; 5],
            response: ResponseStage::default(),
            prev_handle: u32::MAX,
            work_path: String::new(),
            work_dir_len: 0,
            cached_info: VfsInfo::default(),
            xfer: None,
            cancelled: false,
            send_parent: 0,
            send_handle: 0,
            send_path: String::new(),
            send_created: None,
            send_modified: None,
            send_expect: 0,
            send_received: 0,
            send_buf: Vec::new(),
        }
    }
}

impl Session {
    /// Fresh session state for `OpenSession`, keeping the staged response of
    /// the transaction doing the opening.
    pub fn open(&mut self, id: u32) {
        let response = std::mem::take(&mut self.response);
        *self = Session {
            id,
            response,
            ..Session::default()
        };
    }

    /// Releases every per-session resource; the response staging survives so
    /// `CloseSession` can still answer.
    pub fn close(&mut self) {
        self.open(0);
    }

    /// Resets the inbound accumulation counters before a data phase.
    pub fn begin_data_phase(&mut self) {
        self.send_expect = 0;
        self.send_received = 0;
        self.send_buf.clear();
    }
}
