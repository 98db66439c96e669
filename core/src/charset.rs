// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Thin charset decoder for HTTP payloads.
//!
//! Maps the charset declared in a `Content-Type` header to UTF-8. Binary
//! content types bypass decoding entirely and are base64-wrapped by the row
//! representation instead.

use crate::error::Error;
use crate::error::Result;

/// Characters 0x80..=0x9F of Windows-1252, which deviate from Latin-1.
/// 0x81, 0x8D, 0x8F, 0x90 and 0x9D are unassigned and map to U+FFFD.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

/// Extract the charset parameter of a content type, lowercased.
pub fn charset_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
}

/// Content types whose payloads are not text.
pub fn is_binary_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("application/octet-stream")
        || ct.contains("application/pdf")
        || ct.starts_with("image/")
        || ct.starts_with("video/")
        || ct.starts_with("audio/")
        || ct.starts_with("font/")
}

/// Decode `body` to UTF-8 according to the declared charset.
///
/// Unknown charsets fail with `Error::Parse`; an absent charset means UTF-8.
/// Invalid UTF-8 sequences are replaced rather than rejected, since servers
/// routinely mislabel payloads.
pub fn decode(content_type: &str, body: &[u8]) -> Result<String> {
    match charset_of(content_type).as_deref() {
        None | Some("utf-8") | Some("utf8") | Some("us-ascii") | Some("ascii") => {
            Ok(String::from_utf8_lossy(body).into_owned())
        }
        Some("iso-8859-1") | Some("latin-1") | Some("latin1") => {
            Ok(body.iter().map(|&b| b as char).collect())
        }
        Some("windows-1252") | Some("cp1252") => Ok(body
            .iter()
            .map(|&b| match b {
                0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                other => other as char,
            })
            .collect()),
        Some(other) => Err(Error::parse(format!("unsupported charset: '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_parameter_extraction() {
        assert_eq!(
            charset_of("application/json; charset=UTF-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            charset_of("text/html;charset=\"ISO-8859-1\""),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(charset_of("application/json"), None);
    }

    #[test]
    fn utf8_passes_through() {
        let decoded = decode("application/json; charset=utf-8", "grün".as_bytes()).unwrap();
        assert_eq!(decoded, "grün");
    }

    #[test]
    fn latin1_maps_bytes_one_to_one() {
        let decoded = decode("text/plain; charset=iso-8859-1", &[0x67, 0x72, 0xFC, 0x6E]).unwrap();
        assert_eq!(decoded, "grün");
    }

    #[test]
    fn windows_1252_euro_sign() {
        let decoded = decode("text/plain; charset=windows-1252", &[0x80]).unwrap();
        assert_eq!(decoded, "€");
    }

    #[test]
    fn unknown_charset_is_an_error() {
        assert!(decode("text/plain; charset=shift_jis", b"x").is_err());
    }

    #[test]
    fn binary_detection() {
        assert!(is_binary_content_type("application/pdf"));
        assert!(is_binary_content_type("image/png"));
        assert!(!is_binary_content_type("application/json"));
        assert!(!is_binary_content_type("text/csv"));
    }
}
