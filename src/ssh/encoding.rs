//! Character encodings for text reads from channels and SFTP files.

use crate::errors::SshError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "iso-8859-1")]
    Latin1,
    #[serde(rename = "us-ascii")]
    Ascii,
}

impl TextEncoding {
    pub fn parse(label: &str) -> Result<Self, SshError> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(TextEncoding::Latin1),
            "us-ascii" | "ascii" => Ok(TextEncoding::Ascii),
            _ => Err(SshError::parameter(format!("unsupported encoding '{}'", label))
                .with_hint("Supported: utf-8, iso-8859-1, us-ascii.")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Ascii => "us-ascii",
        }
    }

    /// Never fails: bytes that do not map become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { '\u{FFFD}' })
                .collect(),
        }
    }

    /// Characters outside the encoding's range are a parameter error.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, SshError> {
        let limit = match self {
            TextEncoding::Utf8 => return Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => 0xFF,
            TextEncoding::Ascii => 0x7F,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or_else(|| {
                        SshError::parameter(format!(
                            "character {:?} cannot be encoded as {}",
                            c,
                            self.label()
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(TextEncoding::parse("UTF8").unwrap(), TextEncoding::Utf8);
        assert_eq!(TextEncoding::parse("latin1").unwrap(), TextEncoding::Latin1);
        assert_eq!(TextEncoding::parse("ISO_8859-1").unwrap(), TextEncoding::Latin1);
        assert_eq!(TextEncoding::parse("ascii").unwrap(), TextEncoding::Ascii);
        assert!(TextEncoding::parse("ebcdic").is_err());
    }

    #[test]
    fn decodes_each_encoding() {
        let bytes = [b'c', b'a', b'f', 0xE9];
        assert_eq!(TextEncoding::Latin1.decode(&bytes), "café");
        assert_eq!(TextEncoding::Ascii.decode(&bytes), "caf\u{FFFD}");
        assert_eq!(TextEncoding::Utf8.decode("café".as_bytes()), "café");
        assert_eq!(TextEncoding::Utf8.decode(&bytes), "caf\u{FFFD}");
    }

    #[test]
    fn encode_rejects_unmappable() {
        assert_eq!(TextEncoding::Latin1.encode("café").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
        assert!(TextEncoding::Ascii.encode("café").is_err());
        assert!(TextEncoding::Latin1.encode("€").is_err());
    }
}
