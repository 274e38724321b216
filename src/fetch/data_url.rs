use base64::Engine;

use super::FetchedResource;
use crate::error::FetchError;

const DATA_URL_PREFIX: &str = "data:";
const DEFAULT_MEDIA_TYPE: &str = "text/plain;charset=US-ASCII";

/// Decode a `data:` URL into bytes and content type (RFC 2397).
pub fn decode_data_url(url: &str) -> Result<FetchedResource, FetchError> {
    let rest = url
        .get(..DATA_URL_PREFIX.len())
        .filter(|p| p.eq_ignore_ascii_case(DATA_URL_PREFIX))
        .map(|_| &url[DATA_URL_PREFIX.len()..])
        .ok_or_else(|| FetchError::InvalidDataUrl("URL does not start with 'data:'".into()))?;

    let (metadata, data) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUrl("missing comma".into()))?;

    let (media_type, is_base64) = match metadata.strip_suffix(";base64") {
        Some(media) => (media, true),
        None => (metadata, false),
    };
    let content_type = if media_type.trim().is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else {
        media_type.trim().to_string()
    };

    let bytes = if is_base64 {
        decode_base64(data)?
    } else {
        percent_decode(data)?
    };

    Ok(FetchedResource::new(bytes, Some(content_type)))
}

/// Decode base64 payloads, tolerating ASCII whitespace.
fn decode_base64(data: &str) -> Result<Vec<u8>, FetchError> {
    let cleaned: Vec<u8> = data
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| FetchError::InvalidDataUrl(format!("invalid base64: {e}")))
}

/// Percent-decode a payload without treating '+' specially.
fn percent_decode(input: &str) -> Result<Vec<u8>, FetchError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| FetchError::InvalidDataUrl("invalid percent-escape".into()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_payload() {
        let res = decode_data_url("data:image/gif;base64,R0lG ODlh").expect("valid");
        assert_eq!(res.bytes, b"GIF89a");
        assert_eq!(res.content_type.as_deref(), Some("image/gif"));
    }

    #[test]
    fn decodes_percent_payload_with_default_type() {
        let res = decode_data_url("data:,a%20b+c").expect("valid");
        assert_eq!(res.bytes, b"a b+c");
        assert_eq!(res.content_type.as_deref(), Some(DEFAULT_MEDIA_TYPE));
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(decode_data_url("data:text/plain").is_err());
        assert!(decode_data_url("https://example.com").is_err());
        assert!(decode_data_url("data:,%Z1").is_err());
        assert!(decode_data_url("data:,%4").is_err());
        assert!(decode_data_url("data:;base64,@@@").is_err());
    }
}
