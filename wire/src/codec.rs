//! Binary encoding of values
//!
//! Little-endian only. Every value is padded to its type's alignment, measured
//! from the start of the buffer the encoder writes into; message framing
//! starts the body on an 8-byte boundary so body-relative and
//! message-relative alignment agree.

use crate::error::WireError;
use crate::signature::{SigType, Signature};
use crate::value::Value;
use bus_types::ObjectPath;

/// Largest array the wire format permits (64 MiB)
pub const MAX_ARRAY_LENGTH: usize = 1 << 26;

const MAX_VARIANT_DEPTH: u8 = 64;

/// Appends encoded values to a byte buffer
pub struct Encoder<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn pad(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.pad(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_str(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    fn put_signature(&mut self, signature: &str) {
        self.buf.push(signature.len() as u8);
        self.buf.extend_from_slice(signature.as_bytes());
        self.buf.push(0);
    }

    /// Encodes one value at its natural alignment
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Byte(v) => self.put_u8(*v),
            Value::Boolean(v) => self.put_u32(u32::from(*v)),
            Value::Int16(v) => {
                self.pad(2);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::UInt16(v) => {
                self.pad(2);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Int32(v) => {
                self.pad(4);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::UInt32(v) => self.put_u32(*v),
            Value::Int64(v) => {
                self.pad(8);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::UInt64(v) => {
                self.pad(8);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Double(v) => {
                self.pad(8);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::String(s) => self.put_str(s),
            Value::ObjectPath(p) => self.put_str(p.as_str()),
            Value::Signature(sig) => self.put_signature(&sig.to_string()),
            Value::Variant(inner) => {
                self.put_signature(&inner.signature().to_string());
                self.encode(inner);
            }
            Value::Array(element, items) => {
                self.pad(4);
                let length_at = self.buf.len();
                self.buf.extend_from_slice(&[0; 4]);
                self.pad(element.alignment());
                let start = self.buf.len();
                for item in items {
                    self.encode(item);
                }
                let length = (self.buf.len() - start) as u32;
                self.buf[length_at..length_at + 4].copy_from_slice(&length.to_le_bytes());
            }
            Value::Struct(fields) => {
                self.pad(8);
                for field in fields {
                    self.encode(field);
                }
            }
            Value::DictEntry(key, value) => {
                self.pad(8);
                self.encode(key);
                self.encode(value);
            }
        }
    }
}

/// Reads values back out of an encoded buffer
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    variant_depth: u8,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::at(buf, 0)
    }

    /// Starts decoding at `pos`; alignment stays relative to `buf[0]`
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self {
            buf,
            pos,
            variant_depth: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn align(&mut self, alignment: usize) -> Result<(), WireError> {
        let rem = self.pos % alignment;
        if rem != 0 {
            let target = self.pos + alignment - rem;
            if target > self.buf.len() {
                return Err(truncated());
            }
            if self.buf[self.pos..target].iter().any(|&b| b != 0) {
                return Err(WireError::MalformedBody("non-zero padding".to_string()));
            }
            self.pos = target;
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or_else(truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or_else(truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        self.align(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.fixed::<4>()?))
    }

    fn get_str(&mut self) -> Result<String, WireError> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        if self.get_u8()? != 0 {
            return Err(WireError::MalformedBody("string not nul-terminated".to_string()));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| WireError::MalformedBody("string is not valid UTF-8".to_string()))?;
        if text.contains('\0') {
            return Err(WireError::MalformedBody("string contains nul".to_string()));
        }
        Ok(text.to_string())
    }

    fn get_signature(&mut self) -> Result<Signature, WireError> {
        let len = usize::from(self.get_u8()?);
        let bytes = self.take(len)?;
        if self.get_u8()? != 0 {
            return Err(WireError::MalformedBody(
                "signature not nul-terminated".to_string(),
            ));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| WireError::MalformedBody("signature is not ASCII".to_string()))?;
        Signature::parse(text)
    }

    /// Decodes one value of type `ty`
    pub fn decode(&mut self, ty: &SigType) -> Result<Value, WireError> {
        let value = match ty {
            SigType::Byte => Value::Byte(self.get_u8()?),
            SigType::Boolean => match self.get_u32()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                other => {
                    return Err(WireError::MalformedBody(format!(
                        "boolean encoded as {}",
                        other
                    )))
                }
            },
            SigType::Int16 => Value::Int16(i16::from_le_bytes(self.fixed::<2>()?)),
            SigType::UInt16 => Value::UInt16(u16::from_le_bytes(self.fixed::<2>()?)),
            SigType::Int32 => Value::Int32(i32::from_le_bytes(self.fixed::<4>()?)),
            SigType::UInt32 => Value::UInt32(self.get_u32()?),
            SigType::Int64 => Value::Int64(i64::from_le_bytes(self.fixed::<8>()?)),
            SigType::UInt64 => Value::UInt64(u64::from_le_bytes(self.fixed::<8>()?)),
            SigType::Double => Value::Double(f64::from_le_bytes(self.fixed::<8>()?)),
            SigType::String => Value::String(self.get_str()?),
            SigType::ObjectPath => {
                let text = self.get_str()?;
                let path = ObjectPath::new(text)
                    .map_err(|e| WireError::MalformedBody(e.to_string()))?;
                Value::ObjectPath(path)
            }
            SigType::Signature => Value::Signature(self.get_signature()?),
            SigType::Variant => {
                let signature = self.get_signature()?;
                let inner = match signature.types() {
                    [single] => single.clone(),
                    _ => {
                        return Err(WireError::MalformedBody(format!(
                            "variant signature '{}' is not a single complete type",
                            signature
                        )))
                    }
                };
                if self.variant_depth >= MAX_VARIANT_DEPTH {
                    return Err(WireError::MalformedBody(
                        "variants nested too deeply".to_string(),
                    ));
                }
                self.variant_depth += 1;
                let decoded = self.decode(&inner);
                self.variant_depth -= 1;
                Value::Variant(Box::new(decoded?))
            }
            SigType::Array(element) => {
                let length = self.get_u32()? as usize;
                if length > MAX_ARRAY_LENGTH {
                    return Err(WireError::MalformedBody(format!(
                        "array of {} bytes exceeds the limit",
                        length
                    )));
                }
                self.align(element.alignment())?;
                let end = self.pos + length;
                if end > self.buf.len() {
                    return Err(truncated());
                }
                let mut items = Vec::new();
                while self.pos < end {
                    items.push(self.decode(element)?);
                }
                if self.pos != end {
                    return Err(WireError::MalformedBody(
                        "array elements overrun the declared length".to_string(),
                    ));
                }
                Value::Array((**element).clone(), items)
            }
            SigType::Struct(fields) => {
                self.align(8)?;
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(self.decode(field)?);
                }
                Value::Struct(values)
            }
            SigType::DictEntry(key, value) => {
                self.align(8)?;
                let key = self.decode(key)?;
                let value = self.decode(value)?;
                Value::DictEntry(Box::new(key), Box::new(value))
            }
        };
        Ok(value)
    }
}

fn truncated() -> WireError {
    WireError::MalformedBody("unexpected end of data".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).encode(value);
        buf
    }

    #[test]
    fn test_alignment_padding() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.encode(&Value::Byte(7));
        enc.encode(&Value::Int64(-1));
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[1..8], &[0; 7]);

        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.decode(&SigType::Byte).unwrap(), Value::Byte(7));
        assert_eq!(dec.decode(&SigType::Int64).unwrap(), Value::Int64(-1));
        assert!(dec.is_at_end());
    }

    #[test]
    fn test_string_layout() {
        let buf = encode(&Value::String("hi".to_string()));
        assert_eq!(buf, vec![2, 0, 0, 0, b'h', b'i', 0]);
    }

    #[test]
    fn test_array_length_excludes_element_padding() {
        let value = Value::Array(SigType::Int64, vec![Value::Int64(1), Value::Int64(2)]);
        let buf = encode(&value);
        // length word, 4 bytes padding to the first 8-aligned element, 16 bytes of data
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[0..4], &16u32.to_le_bytes());
        assert_eq!(Decoder::new(&buf).decode(&value.signature()).unwrap(), value);
    }

    #[test]
    fn test_empty_array_keeps_element_type() {
        let value = Value::Array(SigType::String, vec![]);
        let buf = encode(&value);
        let decoded = Decoder::new(&buf).decode(&value.signature()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_variant_round_trip() {
        let value = Value::Variant(Box::new(Value::Struct(vec![
            Value::Int32(5),
            Value::String("x".to_string()),
        ])));
        let buf = encode(&value);
        assert_eq!(Decoder::new(&buf).decode(&SigType::Variant).unwrap(), value);
    }

    #[test]
    fn test_reject_bad_boolean_and_truncation() {
        let buf = 2u32.to_le_bytes().to_vec();
        assert!(matches!(
            Decoder::new(&buf).decode(&SigType::Boolean),
            Err(WireError::MalformedBody(_))
        ));
        let buf = vec![1, 0];
        assert!(Decoder::new(&buf).decode(&SigType::UInt32).is_err());
    }

    #[test]
    fn test_reject_invalid_object_path() {
        let buf = encode(&Value::String("not/a/path".to_string()));
        assert!(Decoder::new(&buf).decode(&SigType::ObjectPath).is_err());
    }
}
