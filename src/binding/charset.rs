//! Character encodings supported at the byte/char stream boundary

use std::io;

/// Text encoding of the flat data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8
    #[default]
    Utf8,
    /// ISO-8859-1 (every byte is one character)
    Latin1,
}

impl Charset {
    /// Decode as many complete characters as possible from `bytes`
    ///
    /// Returns the number of bytes consumed. Incomplete UTF-8 sequences at the
    /// end of `bytes` are left for the next call unless `last` is set.
    pub fn decode(&self, bytes: &[u8], out: &mut Vec<char>, last: bool) -> io::Result<usize> {
        match self {
            Charset::Latin1 => {
                out.extend(bytes.iter().map(|&b| b as char));
                Ok(bytes.len())
            }
            Charset::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.extend(text.chars());
                    Ok(bytes.len())
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to always lies on a char boundary
                    let text = std::str::from_utf8(&bytes[..valid])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    out.extend(text.chars());
                    match e.error_len() {
                        None if !last => Ok(valid),
                        _ => Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("invalid UTF-8 sequence at byte {}", valid),
                        )),
                    }
                }
            },
        }
    }

    /// Encode `text`, appending to `out`
    pub fn encode(&self, text: &str, out: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Charset::Utf8 => {
                out.extend_from_slice(text.as_bytes());
                Ok(())
            }
            Charset::Latin1 => {
                for ch in text.chars() {
                    let code = ch as u32;
                    if code > 0xFF {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("character '{}' can not be encoded as ISO-8859-1", ch),
                        ));
                    }
                    out.push(code as u8);
                }
                Ok(())
            }
        }
    }
}
