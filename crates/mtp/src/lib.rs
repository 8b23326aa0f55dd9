//! Device-side PTP/MTP responder core.
//!
//! The engine is a transaction pump driven entirely by the transport: one
//! inbound bulk packet enters through [`PtpEngine::payload_in`], and the
//! transport then drains [`PtpEngine::payload_out`] one max-packet window at
//! a time until it returns `None`. There is no internal thread of control and
//! no blocking beyond the synchronous [`mtp_vfs::Vfs`] calls a handler makes.
//!
//! ```no_run
//! use mtp::{DeviceConfig, PtpEngine};
//! use mtp_vfs::MemFs;
//!
//! let mut fs = MemFs::new();
//! fs.add_volume("0:", "RAMDISK", 8 << 20);
//! let mut engine = PtpEngine::new(fs, DeviceConfig::default());
//!
//! // transport OUT-endpoint callback:
//! let packet: &[u8] = &[];
//! if !engine.payload_in(packet) {
//!     // stall the bulk OUT endpoint
//! }
//! // transport IN-endpoint callback:
//! while let Some(chunk) = engine.payload_out(64) {
//!     // transmit `chunk`
//! }
//! ```

mod engine;
mod handle;
mod ops;
mod props;
#[cfg_attr(feature = "flat-namespace", allow(dead_code, unused_imports))]
mod resolver;
mod session;

pub use engine::PtpEngine;
pub use handle::{dir_handle, item_hash, root_handle, storage_id, ObjectHandle};
pub use mtp_proto::{EventCode, ResponseCode};

/// Per-transfer hook, invoked with the path of a file that was fully
/// received and closed.
pub type SendObjectHook = Box<dyn FnMut(&str) + Send>;

/// Identity strings and hooks of the device.
pub struct DeviceConfig {
    pub manufacturer: String,
    /// Also reported as the DeviceFriendlyName property.
    pub model: String,
    pub serial: String,
    pub device_version: String,
    /// Runs after a successful `SendObject` close; firmware-update detection
    /// and similar post-transfer side effects hang off this.
    pub on_send_object: Option<SendObjectHook>,
    pub on_session_open: Option<Box<dyn FnMut(u32) + Send>>,
    pub on_session_close: Option<Box<dyn FnMut() + Send>>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            manufacturer: "White Bream".to_string(),
            model: "MTP Device".to_string(),
            serial: "0123456789".to_string(),
            device_version: "1.0".to_string(),
            on_send_object: None,
            on_session_open: None,
            on_session_close: None,
        }
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("manufacturer", &self.manufacturer)
            .field("model", &self.model)
            .field("serial", &self.serial)
            .field("device_version", &self.device_version)
            .finish_non_exhaustive()
    }
}
