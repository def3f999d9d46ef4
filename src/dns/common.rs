use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

/// Compression pointers followed before a name is rejected as looping.
const MAX_POINTER_JUMPS: usize = 32;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    /// Read the component from `reader`. `packet_buf` is the whole message so
    /// compression pointers can be resolved; `offset` tracks the reader's
    /// absolute position in it.
    fn read_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
        offset: &mut usize,
    ) -> Result<(), ParseError>;

    fn read_labels_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
        offset: &mut usize,
    ) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            *offset += 1;
            if label_len == 0 {
                labels.push(String::new());
                break;
            }
            if label_len & 0xC0 == 0xC0 {
                let low = reader.read_var::<u8>(8)?;
                *offset += 1;
                let pointer = (((label_len & 0x3F) as usize) << 8) | low as usize;
                let (rest, _) = read_name_at(packet_buf, pointer)?;
                labels.extend(rest);
                break;
            }
            if label_len > 63 {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf)?;
            *offset += buf.len();
            let label = String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?;
            labels.push(label);
        }

        if name_wire_len(&labels) > 255 {
            return Err(ParseError::NameTooLong);
        }

        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        for label in labels.iter().filter(|l| !l.is_empty()) {
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;

        Ok(())
    }
}

/// Decode a possibly compressed name starting at `start` in `buf`.
///
/// Returns the labels (terminated by an empty label, like the section
/// readers produce) and the number of bytes the name occupies at `start`.
pub fn read_name_at(buf: &[u8], start: usize) -> Result<(Vec<String>, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut consumed = None;
    let mut jumps = 0;

    loop {
        let len = *buf.get(pos).ok_or(ParseError::InvalidLabel)? as usize;
        if len == 0 {
            labels.push(String::new());
            pos += 1;
            break;
        }
        if len & 0xC0 == 0xC0 {
            let low = *buf.get(pos + 1).ok_or(ParseError::InvalidLabel)? as usize;
            if consumed.is_none() {
                consumed = Some(pos + 2 - start);
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(ParseError::CompressionLoop);
            }
            pos = ((len & 0x3F) << 8) | low;
            continue;
        }
        if len > 63 {
            return Err(ParseError::InvalidLabel);
        }
        let label = buf
            .get(pos + 1..pos + 1 + len)
            .ok_or(ParseError::InvalidLabel)?;
        labels.push(String::from_utf8(label.to_vec()).map_err(|_| ParseError::InvalidLabel)?);
        pos += 1 + len;
    }

    if name_wire_len(&labels) > 255 {
        return Err(ParseError::NameTooLong);
    }

    Ok((labels, consumed.unwrap_or_else(|| pos - start)))
}

/// Uncompressed wire length of a label sequence.
pub fn name_wire_len(labels: &[String]) -> usize {
    labels
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() + 1)
        .sum::<usize>()
        + 1
}

/// Append `name` (presentation form) in uncompressed wire format.
pub fn write_name(buf: &mut Vec<u8>, name: &str, lowercase: bool) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        buf.push(label.len() as u8);
        if lowercase {
            buf.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        } else {
            buf.extend_from_slice(label.as_bytes());
        }
    }
    buf.push(0);
}

/// Labels to a fully qualified name with trailing dot; the root is ".".
pub fn labels_to_fqdn(labels: &[String]) -> String {
    let name = labels
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(".");
    if name.is_empty() {
        ".".to_string()
    } else {
        format!("{}.", name)
    }
}

/// Presentation name to the label form used by questions and resources.
pub fn fqdn_to_labels(name: &str) -> Vec<String> {
    let mut labels: Vec<String> = name
        .split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();
    labels.push(String::new());
    labels
}

/// Lowercase, fully qualified form used for every name comparison.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        format!("{}.", trimmed.to_ascii_lowercase())
    }
}

/// Number of labels in a name, not counting the root.
pub fn label_count(name: &str) -> usize {
    name.split('.').filter(|l| !l.is_empty()).count()
}
