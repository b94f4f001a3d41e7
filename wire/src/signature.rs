//! Type signatures
//!
//! A signature is a string of type codes describing the arguments of a
//! message body. Each complete type is one [`SigType`]; a body's signature
//! is the concatenation of its arguments' complete types.

use crate::error::WireError;
use std::fmt;
use std::str::FromStr;

/// Longest signature the wire format can carry
pub const MAX_SIGNATURE_LENGTH: usize = 255;

const MAX_ARRAY_DEPTH: u8 = 32;
const MAX_STRUCT_DEPTH: u8 = 32;

/// One complete type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigType {
    Byte,
    Boolean,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    ObjectPath,
    Signature,
    Variant,
    Array(Box<SigType>),
    Struct(Vec<SigType>),
    DictEntry(Box<SigType>, Box<SigType>),
}

impl SigType {
    /// Wire alignment in bytes, relative to the start of the body
    pub fn alignment(&self) -> usize {
        match self {
            Self::Byte | Self::Signature | Self::Variant => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Boolean | Self::Int32 | Self::UInt32 | Self::String | Self::ObjectPath => 4,
            Self::Array(_) => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
            Self::Struct(_) | Self::DictEntry(_, _) => 8,
        }
    }

    /// Basic types may key a dictionary
    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            Self::Variant | Self::Array(_) | Self::Struct(_) | Self::DictEntry(_, _)
        )
    }

    /// Dictionary type `a{KV}`
    pub fn dict(key: SigType, value: SigType) -> Self {
        Self::Array(Box::new(Self::DictEntry(Box::new(key), Box::new(value))))
    }

    /// Parses exactly one complete type
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut parser = Parser::new(text)?;
        let ty = parser.parse_one(0, 0)?;
        if !parser.at_end() {
            return Err(parser.error("more than one complete type"));
        }
        Ok(ty)
    }

    fn write_code(&self, out: &mut String) {
        match self {
            Self::Byte => out.push('y'),
            Self::Boolean => out.push('b'),
            Self::Int16 => out.push('n'),
            Self::UInt16 => out.push('q'),
            Self::Int32 => out.push('i'),
            Self::UInt32 => out.push('u'),
            Self::Int64 => out.push('x'),
            Self::UInt64 => out.push('t'),
            Self::Double => out.push('d'),
            Self::String => out.push('s'),
            Self::ObjectPath => out.push('o'),
            Self::Signature => out.push('g'),
            Self::Variant => out.push('v'),
            Self::Array(element) => {
                out.push('a');
                element.write_code(out);
            }
            Self::Struct(fields) => {
                out.push('(');
                for field in fields {
                    field.write_code(out);
                }
                out.push(')');
            }
            Self::DictEntry(key, value) => {
                out.push('{');
                key.write_code(out);
                value.write_code(out);
                out.push('}');
            }
        }
    }
}

impl fmt::Display for SigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_code(&mut out);
        f.write_str(&out)
    }
}

/// Ordered list of complete types describing a message body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    types: Vec<SigType>,
}

impl Signature {
    pub fn new(types: Vec<SigType>) -> Self {
        Self { types }
    }

    /// The empty signature of a body without arguments
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a signature string into its complete types
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut parser = Parser::new(text)?;
        let mut types = Vec::new();
        while !parser.at_end() {
            types.push(parser.parse_one(0, 0)?);
        }
        Ok(Self { types })
    }

    pub fn types(&self) -> &[SigType] {
        &self.types
    }

    pub fn push(&mut self, ty: SigType) {
        self.types.push(ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for ty in &self.types {
            ty.write_code(&mut out);
        }
        f.write_str(&out)
    }
}

impl FromStr for Signature {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, WireError> {
        let parser = Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        };
        if text.len() > MAX_SIGNATURE_LENGTH {
            return Err(parser.error("longer than 255 bytes"));
        }
        Ok(parser)
    }

    fn error(&self, reason: &'static str) -> WireError {
        WireError::InvalidSignature {
            signature: self.text.to_string(),
            reason,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    fn parse_one(&mut self, arrays: u8, structs: u8) -> Result<SigType, WireError> {
        let code = self.next().ok_or_else(|| self.error("incomplete type"))?;
        let ty = match code {
            b'y' => SigType::Byte,
            b'b' => SigType::Boolean,
            b'n' => SigType::Int16,
            b'q' => SigType::UInt16,
            b'i' => SigType::Int32,
            b'u' => SigType::UInt32,
            b'x' => SigType::Int64,
            b't' => SigType::UInt64,
            b'd' => SigType::Double,
            b's' => SigType::String,
            b'o' => SigType::ObjectPath,
            b'g' => SigType::Signature,
            b'v' => SigType::Variant,
            b'a' => {
                if arrays >= MAX_ARRAY_DEPTH {
                    return Err(self.error("arrays nested too deeply"));
                }
                if self.bytes.get(self.pos) == Some(&b'{') {
                    self.pos += 1;
                    self.parse_dict_entry(arrays + 1, structs)?
                } else {
                    SigType::Array(Box::new(self.parse_one(arrays + 1, structs)?))
                }
            }
            b'(' => {
                if structs >= MAX_STRUCT_DEPTH {
                    return Err(self.error("structs nested too deeply"));
                }
                let mut fields = Vec::new();
                loop {
                    match self.bytes.get(self.pos) {
                        Some(b')') => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => fields.push(self.parse_one(arrays, structs + 1)?),
                        None => return Err(self.error("unterminated struct")),
                    }
                }
                if fields.is_empty() {
                    return Err(self.error("empty struct"));
                }
                SigType::Struct(fields)
            }
            b'{' => return Err(self.error("dict entry outside of an array")),
            b')' | b'}' => return Err(self.error("unbalanced closing bracket")),
            _ => return Err(self.error("unknown type code")),
        };
        Ok(ty)
    }

    fn parse_dict_entry(&mut self, arrays: u8, structs: u8) -> Result<SigType, WireError> {
        if structs >= MAX_STRUCT_DEPTH {
            return Err(self.error("structs nested too deeply"));
        }
        let key = self.parse_one(arrays, structs + 1)?;
        if !key.is_basic() {
            return Err(self.error("dict key must be a basic type"));
        }
        let value = self.parse_one(arrays, structs + 1)?;
        match self.next() {
            Some(b'}') => Ok(SigType::dict(key, value)),
            _ => Err(self.error("dict entry must hold exactly two types")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_signature() {
        let sig = Signature::parse("yisx").unwrap();
        assert_eq!(
            sig.types(),
            &[SigType::Byte, SigType::Int32, SigType::String, SigType::Int64]
        );
        assert_eq!(sig.to_string(), "yisx");
    }

    #[test]
    fn test_parse_containers() {
        let ty = SigType::parse("a{sv}").unwrap();
        assert_eq!(ty, SigType::dict(SigType::String, SigType::Variant));

        let ty = SigType::parse("(ia(sb))").unwrap();
        assert_eq!(
            ty,
            SigType::Struct(vec![
                SigType::Int32,
                SigType::Array(Box::new(SigType::Struct(vec![
                    SigType::String,
                    SigType::Boolean
                ])))
            ])
        );
        assert_eq!(ty.to_string(), "(ia(sb))");
    }

    #[test]
    fn test_reject_invalid_signatures() {
        assert!(Signature::parse("a").is_err());
        assert!(Signature::parse("()").is_err());
        assert!(Signature::parse("(i").is_err());
        assert!(Signature::parse("{sv}").is_err());
        assert!(Signature::parse("a{vs}").is_err());
        assert!(Signature::parse("a{sii}").is_err());
        assert!(Signature::parse("z").is_err());
        assert!(Signature::parse(&"a".repeat(40).to_string()).is_err());
        assert!(SigType::parse("ii").is_err());
    }

    #[test]
    fn test_alignment() {
        assert_eq!(SigType::Byte.alignment(), 1);
        assert_eq!(SigType::Boolean.alignment(), 4);
        assert_eq!(SigType::Int64.alignment(), 8);
        assert_eq!(SigType::Struct(vec![SigType::Byte]).alignment(), 8);
        assert_eq!(SigType::Array(Box::new(SigType::Int64)).alignment(), 4);
    }

    #[test]
    fn test_empty_signature() {
        let sig = Signature::parse("").unwrap();
        assert!(sig.is_empty());
        assert_eq!(sig, Signature::empty());
    }
}
