//! The paginating payload writer.
//!
//! Response payloads are never buffered whole. A handler runs its encoding
//! logic twice with the same inputs: once in [`PayloadWriter::Measure`] mode
//! to learn the total byte count, and then once per outbound packet in
//! [`PayloadWriter::Emit`] mode, where the bytes already sent are skipped and
//! at most one window's worth is written. Every encoder returns the number of
//! bytes it contributes to the logical stream, regardless of how many landed
//! in the window, so both passes produce identical arithmetic.

/// Longest encodable string: the count prefix is a single byte and includes
/// the terminator.
const MAX_STRING_CHARS: usize = u8::MAX as usize - 1;

#[derive(Debug)]
pub enum PayloadWriter<'a> {
    /// Count bytes, write nothing.
    Measure,
    /// Discard the first `skip` bytes of the stream, then fill `out`.
    Emit {
        skip: u32,
        out: &'a mut [u8],
        pos: usize,
    },
}

impl<'a> PayloadWriter<'a> {
    pub fn emit(skip: u32, out: &'a mut [u8]) -> Self {
        PayloadWriter::Emit { skip, out, pos: 0 }
    }

    /// True on the measurement pass, which is also the first call a handler
    /// sees for a transaction. Parameter parsing, validation and resource
    /// acquisition belong behind this check.
    pub fn is_measure(&self) -> bool {
        matches!(self, PayloadWriter::Measure)
    }

    /// Bytes written into the window so far.
    pub fn written(&self) -> usize {
        match self {
            PayloadWriter::Measure => 0,
            PayloadWriter::Emit { pos, .. } => *pos,
        }
    }

    fn push(&mut self, byte: u8) {
        if let PayloadWriter::Emit { skip, out, pos } = self {
            if *skip > 0 {
                *skip -= 1;
            } else if *pos < out.len() {
                out[*pos] = byte;
                *pos += 1;
            }
        }
    }

    /// Consumes `n` bytes of pending skip in one step, if at least that many
    /// remain. Lets a handler bypass re-encoding a fixed-size prefix it knows
    /// has already been emitted.
    pub fn skip_block(&mut self, n: u32) -> bool {
        match self {
            PayloadWriter::Emit { skip, .. } if *skip >= n => {
                *skip -= n;
                true
            }
            _ => false,
        }
    }

    pub fn u8(&mut self, v: u8) -> u32 {
        self.push(v);
        1
    }

    pub fn u16(&mut self, v: u16) -> u32 {
        for b in v.to_le_bytes() {
            self.push(b);
        }
        2
    }

    pub fn u32(&mut self, v: u32) -> u32 {
        for b in v.to_le_bytes() {
            self.push(b);
        }
        4
    }

    pub fn u64(&mut self, v: u64) -> u32 {
        for b in v.to_le_bytes() {
            self.push(b);
        }
        8
    }

    /// PTP string from 8-bit input, widened to UTF-16LE on the wire:
    /// a count byte (characters including the terminator), the code units,
    /// and a NUL terminator. `None` and the empty string both encode as the
    /// single byte `0x00`.
    pub fn string(&mut self, s: Option<&str>) -> u32 {
        match s {
            Some(s) if !s.is_empty() => {
                let n = s.chars().take(MAX_STRING_CHARS).count();
                self.push(n as u8 + 1);
                let mut len = 1;
                for c in s.chars().take(MAX_STRING_CHARS) {
                    // Lossy narrowing for non-BMP input; filenames on the
                    // supported filesystems never reach it.
                    self.u16(c as u32 as u16);
                    len += 2;
                }
                self.u16(0);
                len + 2
            }
            _ => {
                self.push(0);
                1
            }
        }
    }

    /// PTP string from code units that are already UTF-16.
    pub fn wchar_string(&mut self, s: Option<&[u16]>) -> u32 {
        match s {
            Some(units) if !units.is_empty() => {
                let n = units.len().min(MAX_STRING_CHARS);
                self.push(n as u8 + 1);
                let mut len = 1;
                for &u in &units[..n] {
                    self.u16(u);
                    len += 2;
                }
                self.u16(0);
                len + 2
            }
            _ => {
                self.push(0);
                1
            }
        }
    }

    /// Hands out the unfilled tail of the emission window so bulk payloads
    /// (file contents) can be read straight into it. The closure returns how
    /// many bytes it produced. No-op under measurement.
    pub fn fill_with<F>(&mut self, f: F)
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if let PayloadWriter::Emit { out, pos, .. } = self {
            if *pos < out.len() {
                let n = f(&mut out[*pos..]);
                debug_assert!(*pos + n <= out.len());
                *pos += n;
            }
        }
    }
}
