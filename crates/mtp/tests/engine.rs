//! End-to-end transactions against an in-memory volume set, driven the way
//! the transport drives the engine: one packet into `payload_in`, then
//! `payload_out` drained one window at a time.

use mtp::{item_hash, root_handle, DeviceConfig, PtpEngine, ResponseCode};
use mtp_proto::writer::PayloadWriter;
use mtp_proto::{objprop, op};
use mtp_vfs::{MemFs, Vfs};

const EP_SIZE: usize = 64;

fn fresh_engine() -> PtpEngine<MemFs> {
    let mut fs = MemFs::new();
    fs.add_volume("0:", "RAMDISK", 1 << 20);
    PtpEngine::new(fs, DeviceConfig::default())
}

fn command(code: u16, id: u32, params: &[u32]) -> Vec<u8> {
    let mut pkt = Vec::new();
    pkt.extend_from_slice(&((12 + 4 * params.len()) as u32).to_le_bytes());
    pkt.extend_from_slice(&1u16.to_le_bytes());
    pkt.extend_from_slice(&code.to_le_bytes());
    pkt.extend_from_slice(&id.to_le_bytes());
    for p in params {
        pkt.extend_from_slice(&p.to_le_bytes());
    }
    pkt
}

/// Wraps `payload` in a data container and feeds it in `chunk`-sized packets.
fn send_data(engine: &mut PtpEngine<MemFs>, code: u16, id: u32, payload: &[u8], chunk: usize) {
    let mut container = Vec::new();
    container.extend_from_slice(&((12 + payload.len()) as u32).to_le_bytes());
    container.extend_from_slice(&2u16.to_le_bytes());
    container.extend_from_slice(&code.to_le_bytes());
    container.extend_from_slice(&id.to_le_bytes());
    container.extend_from_slice(payload);
    for pkt in container.chunks(chunk) {
        assert!(engine.payload_in(pkt), "data packet refused");
    }
}

fn drain(engine: &mut PtpEngine<MemFs>, window: usize) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = engine.payload_out(window) {
        out.extend_from_slice(chunk);
    }
    out
}

#[derive(Debug)]
struct Container {
    kind: u16,
    code: u16,
    tx_id: u32,
    payload: Vec<u8>,
}

fn parse_stream(bytes: &[u8]) -> Vec<Container> {
    let mut out = Vec::new();
    let mut off = 0;
    while off < bytes.len() {
        let len = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
        assert!(len >= 12, "container length below header size");
        assert!(off + len <= bytes.len(), "container extends past the stream");
        out.push(Container {
            kind: u16::from_le_bytes(bytes[off + 4..off + 6].try_into().unwrap()),
            code: u16::from_le_bytes(bytes[off + 6..off + 8].try_into().unwrap()),
            tx_id: u32::from_le_bytes(bytes[off + 8..off + 12].try_into().unwrap()),
            payload: bytes[off + 12..off + len].to_vec(),
        });
        off += len;
    }
    out
}

fn transact(engine: &mut PtpEngine<MemFs>, code: u16, id: u32, params: &[u32]) -> Vec<Container> {
    assert!(engine.payload_in(&command(code, id, params)), "command refused");
    parse_stream(&drain(engine, EP_SIZE))
}

fn response_code(containers: &[Container]) -> u16 {
    let rsp = containers.last().expect("no response container");
    assert_eq!(rsp.kind, 3, "last container is not a response");
    rsp.code
}

fn open_session(engine: &mut PtpEngine<MemFs>, session: u32) {
    let reply = transact(engine, op::OPEN_SESSION, 1, &[session]);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
}

/// ObjectInfo dataset as an initiator would send it, container header
/// included.
fn object_info_dataset(format: u16, size: u32, name: &str, id: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 512 + 2 * name.len()];
    let mut w = PayloadWriter::emit(0, &mut buf);
    let mut len = 0;
    len += w.u32(0); // patched below
    len += w.u16(2);
    len += w.u16(op::SEND_OBJECT_INFO);
    len += w.u32(id);
    len += w.u32(0x0001_0001); // StorageID
    len += w.u16(format);
    len += w.u16(0); // ProtectionStatus
    len += w.u32(size); // ObjectCompressedSize
    len += w.u16(0); // ThumbFormat
    len += w.u32(0); // ThumbCompressedSize
    len += w.u32(0); // ThumbPixWidth
    len += w.u32(0); // ThumbPixHeight
    len += w.u32(0); // ImagePixWidth
    len += w.u32(0); // ImagePixHeight
    len += w.u32(0); // ImageBitDepth
    len += w.u32(0); // ParentObject
    len += w.u16(if format == 0x3001 { 1 } else { 0 });
    len += w.u32(0); // AssociationDesc
    len += w.u32(0); // SequenceNumber
    assert_eq!(len, 64);
    len += w.string(Some(name));
    len += w.string(Some("20240215T120000"));
    len += w.string(Some("20240215T120000"));
    len += w.string(None); // Keywords
    buf.truncate(len as usize);
    let total = (len as u32).to_le_bytes();
    buf[..4].copy_from_slice(&total);
    buf
}

/// SendObjectInfo + data phase; returns the response containers. The data
/// phase here is the dataset container split into EP-size packets.
fn send_object_info(
    engine: &mut PtpEngine<MemFs>,
    id: u32,
    storage: u32,
    parent: u32,
    dataset: &[u8],
) -> Vec<Container> {
    assert!(engine.payload_in(&command(op::SEND_OBJECT_INFO, id, &[storage, parent])));
    assert!(drain(engine, EP_SIZE).is_empty(), "no reply before the data phase");
    for pkt in dataset.chunks(EP_SIZE) {
        assert!(engine.payload_in(pkt));
    }
    parse_stream(&drain(engine, EP_SIZE))
}

// --- Scenario 1: empty session ------------------------------------------

#[test]
fn empty_session() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_DEVICE_INFO, 2, &[]);
    assert_eq!(reply.len(), 2);
    assert_eq!(reply[0].kind, 2);
    assert_eq!(reply[0].code, op::GET_DEVICE_INFO);
    assert_eq!(reply[0].tx_id, 2);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);

    let reply = transact(&mut engine, op::CLOSE_SESSION, 3, &[]);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
}

// --- Scenario 2: enumerate an empty volume root -------------------------

#[test]
fn enumerate_empty_root() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_STORAGE_IDS, 2, &[]);
    assert_eq!(reply[0].payload, {
        let mut v = 1u32.to_le_bytes().to_vec();
        v.extend_from_slice(&0x0001_0001u32.to_le_bytes());
        v
    });

    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 3, &[0x0001_0001, 0, u32::MAX]);
    assert_eq!(reply[0].kind, 2);
    assert_eq!(reply[0].payload, 0u32.to_le_bytes());
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
}

// --- Scenario 3: create a file, read it back ----------------------------

#[test]
fn create_and_read_back() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3004, 5, "HI.TXT", 2);
    let reply = send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    let rsp = reply.last().unwrap();
    assert_eq!(rsp.payload.len(), 12);
    let storage = u32::from_le_bytes(rsp.payload[0..4].try_into().unwrap());
    let parent = u32::from_le_bytes(rsp.payload[4..8].try_into().unwrap());
    let handle = u32::from_le_bytes(rsp.payload[8..12].try_into().unwrap());
    assert_eq!(storage, 0x0001_0001);
    assert_eq!(parent, u32::MAX);
    assert_eq!(handle, root_handle(0) | item_hash("HI.TXT"));

    assert!(engine.payload_in(&command(op::SEND_OBJECT, 3, &[])));
    send_data(&mut engine, op::SEND_OBJECT, 3, b"HELLO", EP_SIZE);
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert_eq!(engine.vfs().read_file("0:/HI.TXT").unwrap(), b"HELLO");

    let reply = transact(&mut engine, op::GET_OBJECT, 4, &[handle]);
    assert_eq!(reply[0].code, op::GET_OBJECT);
    assert_eq!(reply[0].payload, b"HELLO");
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);

    let reply = transact(
        &mut engine,
        op::GET_OBJECT_PROP_VALUE,
        5,
        &[handle, objprop::OBJECT_SIZE as u32],
    );
    assert_eq!(reply[0].payload, 5u64.to_le_bytes());
}

// --- Scenario 4: write-protected volume ---------------------------------

#[test]
fn send_to_protected_volume_is_refused() {
    let mut fs = MemFs::new();
    fs.add_volume("0:", "ROMDISK", 1 << 20);
    fs.set_volume_attrs("0:", |a| a.with_writable(false));
    let mut engine = PtpEngine::new(fs, DeviceConfig::default());
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3004, 4, "NO.TXT", 2);
    let reply = send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::ObjectWriteProtected as u16);
    assert!(!engine.vfs().exists("0:/NO.TXT"));
}

// --- Scenario 5: paginated GetObject ------------------------------------

#[test]
fn paginated_get_object() {
    let mut engine = fresh_engine();
    let body: Vec<u8> = (0u8..200).collect();
    engine.vfs_mut().write_file("0:/PAGED.BIN", &body).unwrap();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let handles = &reply[0].payload;
    assert_eq!(handles[..4], 1u32.to_le_bytes());
    let handle = u32::from_le_bytes(handles[4..8].try_into().unwrap());

    assert!(engine.payload_in(&command(op::GET_OBJECT, 3, &[handle])));
    let mut chunks = Vec::new();
    while let Some(chunk) = engine.payload_out(64) {
        chunks.push(chunk.to_vec());
    }
    assert!(engine.payload_out(64).is_none());

    // 212 bytes of data phase (12-byte header + 200-byte body) in 64-byte
    // windows, then the response container: exactly five produced chunks.
    let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, [64, 64, 64, 20, 12]);

    let stream: Vec<u8> = chunks.concat();
    let containers = parse_stream(&stream);
    assert_eq!(containers.len(), 2);
    assert_eq!(containers[0].payload, body);
    assert_eq!(containers[1].kind, 3);
    assert_eq!(containers[1].code, ResponseCode::Ok as u16);
}

// --- Scenario 6: cancel mid-upload --------------------------------------

#[test]
fn cancel_mid_upload() {
    let mut fs = MemFs::new();
    fs.add_volume("0:", "RAMDISK", 8 << 20);
    let mut engine = PtpEngine::new(fs, DeviceConfig::default());
    open_session(&mut engine, 1);

    let total = 1 << 20;
    let dataset = object_info_dataset(0x3003, total, "BIG.BIN", 2);
    let reply = send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert!(engine.vfs().exists("0:/BIG.BIN"));

    assert!(engine.payload_in(&command(op::SEND_OBJECT, 3, &[])));
    let chunk = vec![0xA5u8; 512];
    let mut header = ((total + 12) as u32).to_le_bytes().to_vec();
    header.extend_from_slice(&2u16.to_le_bytes());
    header.extend_from_slice(&op::SEND_OBJECT.to_le_bytes());
    header.extend_from_slice(&3u32.to_le_bytes());
    header.extend_from_slice(&chunk[..512 - 12]);
    assert!(engine.payload_in(&header));
    for _ in 0..(128 * 1024 / 512 - 1) {
        assert!(engine.payload_in(&chunk));
    }

    let mut cancel = 0x4001u16.to_le_bytes().to_vec();
    cancel.extend_from_slice(&3u32.to_le_bytes());
    engine.cancel_request(&cancel);

    assert_eq!(engine.get_device_status()[2..4], (ResponseCode::TransactionCancelled as u16).to_le_bytes());
    assert_eq!(engine.get_device_status()[2..4], (ResponseCode::Ok as u16).to_le_bytes());
    assert!(!engine.vfs().exists("0:/BIG.BIN"));
}

// --- P1: container length fields match the bytes on the wire ------------

#[test]
fn container_lengths_are_exact() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/README.TXT", b"hello world").unwrap();
    open_session(&mut engine, 1);

    let mut id = 2;
    for (code, params) in [
        (op::GET_DEVICE_INFO, vec![]),
        (op::GET_STORAGE_IDS, vec![]),
        (op::GET_STORAGE_INFO, vec![0x0001_0001]),
        (op::GET_OBJECT_HANDLES, vec![0x0001_0001, 0, u32::MAX]),
        (op::GET_OBJECT_PROPS_SUPPORTED, vec![]),
        (op::GET_OBJECT_PROP_LIST, vec![0, 0, u32::MAX, 0, 0]),
    ] {
        assert!(engine.payload_in(&command(code, id, &params)));
        let stream = drain(&mut engine, EP_SIZE);
        // parse_stream asserts every length field walks the stream exactly;
        // the final container must also end flush with it.
        let containers = parse_stream(&stream);
        let total: usize = containers.iter().map(|c| c.payload.len() + 12).sum();
        assert_eq!(total, stream.len(), "opcode {code:04X}");
        id += 1;
    }
}

// --- P2: pagination equivalence -----------------------------------------

#[test]
fn pagination_is_window_invariant() {
    let mut engine = fresh_engine();
    let body: Vec<u8> = (0..997u32).map(|i| (i % 251) as u8).collect();
    engine.vfs_mut().mkdir("0:/DOCS").unwrap();
    engine.vfs_mut().write_file("0:/DATA.BIN", &body).unwrap();
    engine.vfs_mut().write_file("0:/README.TXT", b"hi").unwrap();
    open_session(&mut engine, 1);

    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let data_handle = item_hash("DATA.BIN") | root_handle(0);

    let mut id = 3;
    for (code, params) in [
        (op::GET_DEVICE_INFO, vec![]),
        (op::GET_OBJECT_HANDLES, vec![0x0001_0001, 0, u32::MAX]),
        (op::GET_OBJECT_INFO, vec![data_handle]),
        (op::GET_OBJECT, vec![data_handle]),
    ] {
        let mut outputs = Vec::new();
        for window in [1usize, 8, 64, 512] {
            assert!(engine.payload_in(&command(code, id, &params)));
            outputs.push(drain(&mut engine, window));
            id += 1;
        }
        assert!(
            outputs.windows(2).all(|p| p[0] == p[1]),
            "opcode {code:04X} diverges across windows"
        );
    }
}

// --- P3: handle stability across a session ------------------------------

#[test]
fn handles_stay_stable_within_a_session() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/README.TXT", b"stable content").unwrap();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let payload = &reply[0].payload;
    assert_eq!(payload[..4], 1u32.to_le_bytes());
    let handle = u32::from_le_bytes(payload[4..8].try_into().unwrap());

    for id in 3..6 {
        let reply = transact(&mut engine, op::GET_OBJECT_INFO, id, &[handle]);
        let name_field = &reply[0].payload[52..];
        assert_eq!(name_field[0], "README.TXT".len() as u8 + 1);
        let mut wire_name = Vec::new();
        for pair in name_field[1..1 + 2 * "README.TXT".len()].chunks(2) {
            wire_name.push(pair[0]);
            assert_eq!(pair[1], 0);
        }
        assert_eq!(wire_name, b"README.TXT");
    }

    let reply = transact(&mut engine, op::GET_OBJECT, 7, &[handle]);
    assert_eq!(reply[0].payload, b"stable content");
}

// --- P5: session exclusivity --------------------------------------------

#[test]
fn session_exclusivity() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 5);

    let reply = transact(&mut engine, op::OPEN_SESSION, 2, &[7]);
    assert_eq!(response_code(&reply), ResponseCode::DeviceBusy as u16);

    let reply = transact(&mut engine, op::OPEN_SESSION, 3, &[5]);
    assert_eq!(response_code(&reply), ResponseCode::SessionAlreadyOpen as u16);
}

// --- P6: reset is indistinguishable from a cold start -------------------

#[test]
fn reset_restores_cold_start() {
    let mut engine = fresh_engine();
    engine.vfs_mut().mkdir("0:/DOCS").unwrap();
    open_session(&mut engine, 1);
    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    assert!(engine.vfs().exists("0:/_.MTP"));

    engine.reset();
    assert!(!engine.vfs().exists("0:/_.MTP"), "folder cache survived reset");

    // The engine accepts a new session exactly as if freshly constructed.
    open_session(&mut engine, 1);
    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    assert_eq!(reply[0].payload[..4], 1u32.to_le_bytes());
}

// --- Folders: create, list into, delete ---------------------------------

#[test]
fn folder_round_trip() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    // Prime the root listing, then create a folder under it.
    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let dataset = object_info_dataset(0x3001, 0, "PHOTOS", 3);
    let reply = send_object_info(&mut engine, 3, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    let folder = u32::from_le_bytes(reply.last().unwrap().payload[8..12].try_into().unwrap());
    assert!(engine.vfs().exists("0:/PHOTOS"));
    assert_eq!(folder & 0x000F_FFFF, 0, "directory handles carry item 0");

    // Upload a file into the new folder.
    let dataset = object_info_dataset(0x3801, 3, "CAT.JPG", 4);
    let reply = send_object_info(&mut engine, 4, 0x0001_0001, folder, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    let file_handle = u32::from_le_bytes(reply.last().unwrap().payload[8..12].try_into().unwrap());

    assert!(engine.payload_in(&command(op::SEND_OBJECT, 5, &[])));
    send_data(&mut engine, op::SEND_OBJECT, 5, b"JPG", EP_SIZE);
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert_eq!(engine.vfs().read_file("0:/PHOTOS/CAT.JPG").unwrap(), b"JPG");

    // Listing the folder returns exactly the uploaded file's handle.
    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 6, &[0x0001_0001, 0, folder]);
    let payload = &reply[0].payload;
    assert_eq!(payload[..4], 1u32.to_le_bytes());
    assert_eq!(u32::from_le_bytes(payload[4..8].try_into().unwrap()), file_handle);

    // Deleting the folder takes its child with it.
    let reply = transact(&mut engine, op::DELETE_OBJECT, 7, &[folder]);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert!(!engine.vfs().exists("0:/PHOTOS"));
}

#[test]
fn deleting_a_directory_with_stubborn_children_is_partial() {
    let mut engine = fresh_engine();
    engine.vfs_mut().mkdir("0:/KEEP").unwrap();
    engine.vfs_mut().mkdir("0:/KEEP/DEEP").unwrap();
    engine.vfs_mut().write_file("0:/KEEP/DEEP/X.BIN", b"x").unwrap();
    engine.vfs_mut().write_file("0:/KEEP/A.TXT", b"a").unwrap();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let folder = u32::from_le_bytes(reply[0].payload[4..8].try_into().unwrap());

    // DEEP is non-empty and only one level is recursed into, so the delete
    // is partial: A.TXT goes, DEEP stays.
    let reply = transact(&mut engine, op::DELETE_OBJECT, 3, &[folder]);
    assert_eq!(response_code(&reply), ResponseCode::PartialDeletion as u16);
    assert!(engine.vfs().exists("0:/KEEP/DEEP/X.BIN"));
    assert!(!engine.vfs().exists("0:/KEEP/A.TXT"));
}

#[test]
fn deleting_a_protected_file_is_refused() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/LOCKED.TXT", b"ro").unwrap();
    engine
        .vfs_mut()
        .set_attrs("0:/LOCKED.TXT", |a| a.with_writable(false))
        .unwrap();
    open_session(&mut engine, 1);

    let handle = item_hash("LOCKED.TXT") | root_handle(0);
    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let reply = transact(&mut engine, op::DELETE_OBJECT, 3, &[handle]);
    assert_eq!(response_code(&reply), ResponseCode::ObjectWriteProtected as u16);
    assert!(engine.vfs().exists("0:/LOCKED.TXT"));
}

// --- Property operations -------------------------------------------------

#[test]
fn object_prop_list_wildcard_covers_the_table() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/README.TXT", b"hello").unwrap();
    open_session(&mut engine, 1);

    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let handle = item_hash("README.TXT") | root_handle(0);

    let supported = transact(&mut engine, op::GET_OBJECT_PROPS_SUPPORTED, 3, &[]);
    let count = u32::from_le_bytes(supported[0].payload[..4].try_into().unwrap());
    assert_eq!(supported[0].payload.len(), 4 + 2 * count as usize);

    let reply = transact(&mut engine, op::GET_OBJECT_PROP_LIST, 4, &[handle, 0, u32::MAX, 0, 0]);
    let quads = u32::from_le_bytes(reply[0].payload[..4].try_into().unwrap());
    assert_eq!(quads, count, "one quadruple per supported property");

    let reply = transact(&mut engine, op::GET_OBJECT_PROP_LIST, 5, &[handle, 0, 0xDC07, 0, 0]);
    let quads = u32::from_le_bytes(reply[0].payload[..4].try_into().unwrap());
    assert_eq!(quads, 1);

    let reply = transact(&mut engine, op::GET_OBJECT_PROP_LIST, 6, &[handle, 0, u32::MAX, 1, 0]);
    assert_eq!(
        response_code(&reply),
        ResponseCode::SpecificationByGroupUnsupported as u16
    );
    let reply = transact(&mut engine, op::GET_OBJECT_PROP_LIST, 7, &[handle, 0, u32::MAX, 0, 2]);
    assert_eq!(
        response_code(&reply),
        ResponseCode::SpecificationByDepthUnsupported as u16
    );
    let reply = transact(&mut engine, op::GET_OBJECT_PROP_LIST, 8, &[handle, 0x3004, u32::MAX, 0, 0]);
    assert_eq!(
        response_code(&reply),
        ResponseCode::SpecificationByFormatUnsupported as u16
    );
}

#[test]
fn set_object_prop_value_is_denied_after_draining() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/README.TXT", b"hello").unwrap();
    open_session(&mut engine, 1);
    transact(&mut engine, op::GET_OBJECT_HANDLES, 2, &[0x0001_0001, 0, u32::MAX]);
    let handle = item_hash("README.TXT") | root_handle(0);

    assert!(engine.payload_in(&command(
        op::SET_OBJECT_PROP_VALUE,
        3,
        &[handle, objprop::OBJECT_FILE_NAME as u32]
    )));
    send_data(&mut engine, op::SET_OBJECT_PROP_VALUE, 3, b"\x07N\0E\0W\0.\0T\0X\0T\0\0\0", EP_SIZE);
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::AccessDenied as u16);
}

#[test]
fn device_prop_desc_and_value() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_DEVICE_PROP_DESC, 2, &[0x5001]);
    let p = &reply[0].payload;
    assert_eq!(&p[0..2], &0x5001u16.to_le_bytes());
    assert_eq!(&p[2..4], &0x0004u16.to_le_bytes()); // UINT16
    assert_eq!(p[4], 0); // read-only
    // default, current, form flag, then the range triplet
    assert_eq!(p.len(), 5 + 2 + 2 + 1 + 6);
    assert_eq!(p[9], 1); // FORM_RANGE

    let reply = transact(&mut engine, op::GET_DEVICE_PROP_VALUE, 3, &[0xD402]);
    let p = &reply[0].payload;
    assert_eq!(p[0] as usize, "MTP Device".len() + 1);

    let reply = transact(&mut engine, op::GET_DEVICE_PROP_VALUE, 4, &[0x5011]);
    assert_eq!(
        response_code(&reply),
        ResponseCode::DevicePropNotSupported as u16
    );

    let reply = transact(&mut engine, op::SET_DEVICE_PROP_VALUE, 5, &[0xD402, 0, 0]);
    assert_eq!(response_code(&reply), ResponseCode::AccessDenied as u16);
}

// --- Storage corner cases ------------------------------------------------

#[test]
fn storage_info_and_errors() {
    let mut fs = MemFs::new();
    fs.add_volume("0:", "RAMDISK", 1 << 20);
    fs.write_file("0:/USED.BIN", &[0u8; 100]).unwrap();
    let mut engine = PtpEngine::new(fs, DeviceConfig::default());
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::GET_STORAGE_INFO, 2, &[0x0001_0001]);
    let p = &reply[0].payload;
    assert_eq!(&p[0..2], &3u16.to_le_bytes()); // fixed RAM
    assert_eq!(&p[2..4], &2u16.to_le_bytes()); // hierarchical
    assert_eq!(&p[4..6], &0u16.to_le_bytes()); // read-write
    assert_eq!(u64::from_le_bytes(p[6..14].try_into().unwrap()), 1 << 20);
    assert_eq!(u64::from_le_bytes(p[14..22].try_into().unwrap()), (1 << 20) - 100);

    let reply = transact(&mut engine, op::GET_STORAGE_INFO, 3, &[0x0009_0001]);
    assert_eq!(response_code(&reply), ResponseCode::InvalidStorageId as u16);

    engine.vfs_mut().set_online("0:", false);
    let reply = transact(&mut engine, op::GET_STORAGE_INFO, 4, &[0x0001_0001]);
    assert_eq!(response_code(&reply), ResponseCode::StoreNotAvailable as u16);

    // An offline volume also disappears from the id list.
    let reply = transact(&mut engine, op::GET_STORAGE_IDS, 5, &[]);
    assert_eq!(reply[0].payload, 0u32.to_le_bytes());
}

#[test]
fn format_store_wipes_the_volume() {
    let mut engine = fresh_engine();
    engine.vfs_mut().write_file("0:/JUNK.BIN", b"junk").unwrap();
    open_session(&mut engine, 1);

    let reply = transact(&mut engine, op::FORMAT_STORE, 2, &[0x0001_0001]);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert!(!engine.vfs().exists("0:/JUNK.BIN"));

    let reply = transact(&mut engine, op::FORMAT_STORE, 3, &[0x0005_0001]);
    assert_eq!(response_code(&reply), ResponseCode::InvalidStorageId as u16);
}

// --- Upload corner cases -------------------------------------------------

#[test]
fn send_object_without_info_is_rejected() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    assert!(engine.payload_in(&command(op::SEND_OBJECT, 2, &[])));
    send_data(&mut engine, op::SEND_OBJECT, 2, b"orphan", EP_SIZE);
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::NoValidObjectInfo as u16);
}

#[test]
fn oversized_object_is_refused_up_front() {
    let mut fs = MemFs::new();
    fs.add_volume("0:", "TINY", 4096);
    let mut engine = PtpEngine::new(fs, DeviceConfig::default());
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3003, 1 << 20, "HUGE.BIN", 2);
    let reply = send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::ObjectTooLarge as u16);
    assert!(!engine.vfs().exists("0:/HUGE.BIN"));
}

#[test]
fn send_object_info_to_bad_targets() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3004, 1, "A.TXT", 2);
    let reply = send_object_info(&mut engine, 2, 0x0009_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::InvalidStorageId as u16);

    // A parent handle that resolves to nothing.
    assert!(engine.payload_in(&command(op::SEND_OBJECT_INFO, 3, &[0x0001_0001, 0x0FF0_0007])));
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::InvalidParentObject as u16);
}

#[test]
fn zero_length_upload() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3004, 0, "EMPTY.TXT", 2);
    let reply = send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);

    assert!(engine.payload_in(&command(op::SEND_OBJECT, 3, &[])));
    send_data(&mut engine, op::SEND_OBJECT, 3, b"", EP_SIZE);
    let reply = parse_stream(&drain(&mut engine, EP_SIZE));
    assert_eq!(response_code(&reply), ResponseCode::Ok as u16);
    assert_eq!(engine.vfs().read_file("0:/EMPTY.TXT").unwrap(), b"");
}

#[test]
fn upload_applies_dataset_timestamps() {
    let mut engine = fresh_engine();
    open_session(&mut engine, 1);

    let dataset = object_info_dataset(0x3004, 2, "TS.TXT", 2);
    send_object_info(&mut engine, 2, 0x0001_0001, u32::MAX, &dataset);
    assert!(engine.payload_in(&command(op::SEND_OBJECT, 3, &[])));
    send_data(&mut engine, op::SEND_OBJECT, 3, b"ok", EP_SIZE);
    drain(&mut engine, EP_SIZE);

    let info = engine.vfs().stat("0:/TS.TXT").unwrap();
    let expected = mtp_proto::datetime::parse_timestamp("20240215T120000").unwrap();
    assert_eq!(info.created, expected);
    assert_eq!(info.modified, expected);
}
