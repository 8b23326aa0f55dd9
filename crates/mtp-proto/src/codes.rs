//! PTP/MTP code spaces: container types, response codes, operations,
//! object formats, property codes and dataset type codes.

use binrw::prelude::*;

/// The four container kinds defined by ISO 15740.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u16))]
pub enum ContainerType {
    Command = 1,
    Data = 2,
    Response = 3,
    Event = 4,
}

impl ContainerType {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(ContainerType::Command),
            2 => Some(ContainerType::Data),
            3 => Some(ContainerType::Response),
            4 => Some(ContainerType::Event),
            _ => None,
        }
    }
}

/// Standard response codes, plus the MTP extension range (0xA8xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseCode {
    Undefined = 0x2000,
    Ok = 0x2001,
    GeneralError = 0x2002,
    SessionNotOpen = 0x2003,
    InvalidTransactionId = 0x2004,
    OperationNotSupported = 0x2005,
    ParameterNotSupported = 0x2006,
    IncompleteTransfer = 0x2007,
    InvalidStorageId = 0x2008,
    InvalidObjectHandle = 0x2009,
    DevicePropNotSupported = 0x200A,
    InvalidObjectFormatCode = 0x200B,
    StoreFull = 0x200C,
    ObjectWriteProtected = 0x200D,
    StoreReadOnly = 0x200E,
    AccessDenied = 0x200F,
    NoThumbnailPresent = 0x2010,
    SelftestFailed = 0x2011,
    PartialDeletion = 0x2012,
    StoreNotAvailable = 0x2013,
    SpecificationByFormatUnsupported = 0x2014,
    NoValidObjectInfo = 0x2015,
    InvalidCodeFormat = 0x2016,
    UnknownVendorCode = 0x2017,
    CaptureAlreadyTerminated = 0x2018,
    DeviceBusy = 0x2019,
    InvalidParentObject = 0x201A,
    InvalidDevicePropFormat = 0x201B,
    InvalidDevicePropValue = 0x201C,
    InvalidParameter = 0x201D,
    SessionAlreadyOpen = 0x201E,
    TransactionCancelled = 0x201F,
    SpecificationOfDestinationUnsupported = 0x2020,
    InvalidObjectPropCode = 0xA801,
    InvalidObjectPropFormat = 0xA802,
    InvalidObjectPropValue = 0xA803,
    InvalidObjectReference = 0xA804,
    GroupNotSupported = 0xA805,
    InvalidDataset = 0xA806,
    SpecificationByGroupUnsupported = 0xA807,
    SpecificationByDepthUnsupported = 0xA808,
    ObjectTooLarge = 0xA809,
    ObjectPropNotSupported = 0xA80A,
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> u16 {
        code as u16
    }
}

/// Operation codes routed by the dispatch table.
pub mod op {
    pub const GET_DEVICE_INFO: u16 = 0x1001;
    pub const OPEN_SESSION: u16 = 0x1002;
    pub const CLOSE_SESSION: u16 = 0x1003;
    pub const GET_STORAGE_IDS: u16 = 0x1004;
    pub const GET_STORAGE_INFO: u16 = 0x1005;
    pub const GET_OBJECT_HANDLES: u16 = 0x1007;
    pub const GET_OBJECT_INFO: u16 = 0x1008;
    pub const GET_OBJECT: u16 = 0x1009;
    pub const DELETE_OBJECT: u16 = 0x100B;
    pub const SEND_OBJECT_INFO: u16 = 0x100C;
    pub const SEND_OBJECT: u16 = 0x100D;
    pub const FORMAT_STORE: u16 = 0x100F;
    pub const GET_DEVICE_PROP_DESC: u16 = 0x1014;
    pub const GET_DEVICE_PROP_VALUE: u16 = 0x1015;
    pub const SET_DEVICE_PROP_VALUE: u16 = 0x1016;
    pub const GET_OBJECT_PROPS_SUPPORTED: u16 = 0x9801;
    pub const GET_OBJECT_PROP_DESC: u16 = 0x9802;
    pub const GET_OBJECT_PROP_VALUE: u16 = 0x9803;
    pub const SET_OBJECT_PROP_VALUE: u16 = 0x9804;
    pub const GET_OBJECT_PROP_LIST: u16 = 0x9805;
}

/// Object format codes.
pub mod format {
    pub const UNDEFINED: u16 = 0x3000;
    pub const ASSOCIATION: u16 = 0x3001;
    pub const DEVICE_SCRIPT: u16 = 0x3002;
    pub const DEVICE_BINARY: u16 = 0x3003;
    pub const TEXT_FILE: u16 = 0x3004;
    pub const HTML: u16 = 0x3005;
    pub const AUDIO_WAV: u16 = 0x3008;
    pub const AUDIO_MP3: u16 = 0x3009;
    pub const UNKNOWN_IMAGE: u16 = 0x3800;
    pub const IMAGE_JPG: u16 = 0x3801;
    pub const IMAGE_BMP: u16 = 0x3804;
    pub const IMAGE_GIF: u16 = 0x3807;
    pub const IMAGE_PNG: u16 = 0x380B;
}

/// Dataset type codes used by property descriptors.
pub mod datatype {
    pub const INT8: u16 = 0x0001;
    pub const UINT8: u16 = 0x0002;
    pub const INT16: u16 = 0x0003;
    pub const UINT16: u16 = 0x0004;
    pub const INT32: u16 = 0x0005;
    pub const UINT32: u16 = 0x0006;
    pub const INT64: u16 = 0x0007;
    pub const UINT64: u16 = 0x0008;
    pub const INT128: u16 = 0x0009;
    pub const UINT128: u16 = 0x000A;
    pub const AUINT8: u16 = 0x4002;
    pub const STR: u16 = 0xFFFF;
}

/// Object property codes (MTP 0xDCxx space).
pub mod objprop {
    pub const STORAGE_ID: u16 = 0xDC01;
    pub const OBJECT_FORMAT: u16 = 0xDC02;
    pub const PROTECTION_STATUS: u16 = 0xDC03;
    pub const OBJECT_SIZE: u16 = 0xDC04;
    pub const ASSOCIATION_TYPE: u16 = 0xDC05;
    pub const OBJECT_FILE_NAME: u16 = 0xDC07;
    pub const DATE_CREATED: u16 = 0xDC08;
    pub const DATE_MODIFIED: u16 = 0xDC09;
    pub const PARENT_OBJECT: u16 = 0xDC0B;
    pub const PERSISTENT_UID: u16 = 0xDC41;
    pub const NAME: u16 = 0xDC44;
}

/// Device property codes.
pub mod devprop {
    pub const BATTERY_LEVEL: u16 = 0x5001;
    pub const DEVICE_FRIENDLY_NAME: u16 = 0xD402;
}

/// Form flags for property descriptors.
pub mod form {
    pub const NONE: u8 = 0;
    pub const RANGE: u8 = 1;
    pub const ENUM: u8 = 2;
}

/// Event codes carried on the interrupt pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EventCode {
    CancelTransaction = 0x4001,
    ObjectAdded = 0x4002,
    ObjectRemoved = 0x4003,
    StoreAdded = 0x4004,
    StoreRemoved = 0x4005,
    DevicePropChanged = 0x4006,
    ObjectInfoChanged = 0x4007,
    DeviceInfoChanged = 0x4008,
    StoreFull = 0x400A,
    ObjectRefsChanged = 0xC803,
}

/// Class request: cancel the transaction in flight.
pub const CLASS_REQ_CANCEL_CODE: u16 = 0x4001;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_type_rejects_unknown() {
        assert_eq!(ContainerType::from_u16(2), Some(ContainerType::Data));
        assert_eq!(ContainerType::from_u16(0), None);
        assert_eq!(ContainerType::from_u16(5), None);
    }

    #[test]
    fn response_codes_match_the_wire() {
        assert_eq!(u16::from(ResponseCode::Ok), 0x2001);
        assert_eq!(u16::from(ResponseCode::SessionAlreadyOpen), 0x201E);
        assert_eq!(u16::from(ResponseCode::ObjectPropNotSupported), 0xA80A);
    }
}
