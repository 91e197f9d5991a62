//! Encryption parameter extraction.
//!
//! Locates the trailer (a classic `trailer` dictionary or, failing that, a
//! cross-reference stream dictionary), follows its `/Encrypt` entry to the
//! encryption dictionary and reads the Standard Security Handler fields.
//! Only the objects involved are parsed; the cross-reference table is not
//! consulted, so damaged or incrementally updated files still work.
//!
//! PDF Spec: Section 7.5.5 (File Trailer), Section 7.6.1 (Table 20) and
//! Section 7.6.3.2 (Table 21)

use std::path::Path;

use nom::IResult;

use crate::encryption::EncryptionParameters;
use crate::error::{Error, Result};
use crate::lexer::{skip_ws, token, Token};

/// Deepest array/dictionary nesting accepted.
const MAX_DEPTH: usize = 32;

/// How far into the file the `%PDF-` signature may start.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Parsed PDF value, just enough of the object model for the dictionaries
/// read here.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Integer(i64),
    Real(f64),
    Bool(bool),
    Null,
    String(Vec<u8>),
    Name(String),
    Array(Vec<Value>),
    /// Entries in file order; lookups return the first match
    Dict(Vec<(String, Value)>),
    Ref(u32, u16),
}

impl Value {
    fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }
}

fn parse_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

fn parse_value(input: &[u8]) -> IResult<&[u8], Value> {
    parse_value_at(input, 0)
}

fn parse_value_at(input: &[u8], depth: usize) -> IResult<&[u8], Value> {
    if depth > MAX_DEPTH {
        return Err(parse_error(input));
    }

    let (rest, tok) = token(input)?;
    let value = match tok {
        Token::Integer(n) => {
            // "n g R" is a reference; anything else leaves the integer alone
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(num), Ok(gen)) = (u32::try_from(n), u16::try_from(gen)) {
                        return Ok((after_r, Value::Ref(num, gen)));
                    }
                }
            }
            Value::Integer(n)
        },
        Token::Real(r) => Value::Real(r),
        Token::True => Value::Bool(true),
        Token::False => Value::Bool(false),
        Token::Null => Value::Null,
        Token::Name(name) => Value::Name(name),
        Token::LiteralString(_) | Token::HexString(_) => {
            Value::String(tok.string_bytes().unwrap_or_default())
        },
        Token::ArrayStart => return parse_array(rest, depth),
        Token::DictStart => return parse_dict(rest, depth),
        _ => return Err(parse_error(input)),
    };
    Ok((rest, value))
}

fn parse_array(mut input: &[u8], depth: usize) -> IResult<&[u8], Value> {
    let mut items = Vec::new();
    loop {
        if let (rest, Token::ArrayEnd) = token(input)? {
            return Ok((rest, Value::Array(items)));
        }
        let (rest, item) = parse_value_at(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dict(mut input: &[u8], depth: usize) -> IResult<&[u8], Value> {
    let mut entries = Vec::new();
    loop {
        match token(input)? {
            (rest, Token::DictEnd) => return Ok((rest, Value::Dict(entries))),
            (rest, Token::Name(key)) => {
                let (rest, value) = parse_value_at(rest, depth + 1)?;
                entries.push((key, value));
                input = rest;
            },
            _ => return Err(parse_error(input)),
        }
    }
}

fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

#[inline]
fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Every `num gen obj` header in the file as (num, gen, offset after "obj").
fn object_headers(data: &[u8]) -> impl Iterator<Item = (u32, u16, usize)> + '_ {
    find_all(data, b"obj").filter_map(move |pos| {
        let end = pos + 3;
        // "obj" must stand alone: not "endobj", not "object"
        if data.get(end).is_some_and(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let before = &data[..pos];
        let before = trim_ws_end(before);
        let (before, gen) = take_digits_end(before)?;
        let before_gen = trim_ws_end(before);
        if before_gen.len() == before.len() {
            return None;
        }
        let (before, num) = take_digits_end(before_gen)?;
        if before.last().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some((u32::try_from(num).ok()?, u16::try_from(gen).ok()?, end))
    })
}

fn trim_ws_end(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().rposition(|&c| !is_pdf_whitespace(c)).map_or(0, |p| p + 1);
    &bytes[..len]
}

fn take_digits_end(bytes: &[u8]) -> Option<(&[u8], u64)> {
    let start = bytes.iter().rposition(|c| !c.is_ascii_digit()).map_or(0, |p| p + 1);
    let digits = &bytes[start..];
    if digits.is_empty() || digits.len() > 10 {
        return None;
    }
    let n = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some((&bytes[..start], n))
}

/// Value of object `num gen`. The last definition in the file wins, as an
/// incremental update would have it.
fn find_object(data: &[u8], num: u32, gen: u16) -> Option<Value> {
    object_headers(data)
        .filter(|&(n, g, _)| n == num && g == gen)
        .filter_map(|(_, _, offset)| parse_value(skip_ws(&data[offset..])).ok())
        .map(|(_, value)| value)
        .last()
}

fn resolve(data: &[u8], value: &Value) -> Option<Value> {
    match value {
        Value::Ref(num, gen) => find_object(data, *num, *gen),
        other => Some(other.clone()),
    }
}

/// Trailer dictionaries, newest first: classic trailers, then
/// cross-reference stream dictionaries.
fn trailer_dicts(data: &[u8]) -> Vec<Value> {
    let mut trailers: Vec<Value> = find_all(data, b"trailer")
        .filter(|&pos| pos == 0 || is_pdf_whitespace(data[pos - 1]))
        .filter_map(|pos| match parse_value(&data[pos + 7..]) {
            Ok((_, dict @ Value::Dict(_))) => Some(dict),
            _ => None,
        })
        .collect();
    trailers.reverse();

    let mut xref_streams: Vec<Value> = object_headers(data)
        .filter_map(|(_, _, offset)| parse_value(skip_ws(&data[offset..])).ok())
        .map(|(_, value)| value)
        .filter(|value| value.get("Type").and_then(Value::as_name) == Some("XRef"))
        .collect();
    xref_streams.reverse();

    trailers.extend(xref_streams);
    trailers
}

fn check_header(data: &[u8]) -> Result<()> {
    let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    match find_all(window, b"%PDF-").next() {
        Some(pos) => {
            let version: Vec<u8> = data[pos + 5..]
                .iter()
                .take_while(|c| c.is_ascii_digit() || **c == b'.')
                .copied()
                .collect();
            log::debug!("PDF header found, version {}", String::from_utf8_lossy(&version));
            Ok(())
        },
        None => {
            let found = String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned();
            Err(Error::InvalidHeader(found))
        },
    }
}

fn int_field(data: &[u8], dict: &Value, key: &'static str) -> Result<Option<i64>> {
    match dict.get(key).and_then(|v| resolve(data, v)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Integer(n)) => Ok(Some(n)),
        Some(Value::Real(r)) => Ok(Some(r as i64)),
        Some(_) => Err(Error::MissingField(key)),
    }
}

fn string_field(data: &[u8], dict: &Value, key: &'static str) -> Result<Vec<u8>> {
    match dict.get(key).and_then(|v| resolve(data, v)) {
        Some(Value::String(bytes)) => Ok(bytes),
        _ => Err(Error::MissingField(key)),
    }
}

/// Read the Standard Security Handler fields of an encryption dictionary.
fn read_encrypt_dict(data: &[u8], dict: &Value, file_id: Vec<u8>) -> Result<EncryptionParameters> {
    let filter = dict
        .get("Filter")
        .and_then(Value::as_name)
        .ok_or(Error::MissingField("Filter"))?;
    if filter != "Standard" {
        return Err(Error::UnsupportedHandler(filter.to_string()));
    }

    let revision = int_field(data, dict, "R")?.ok_or(Error::MissingField("R"))?;
    // P is a signed 32-bit field; some writers store it unsigned
    let permissions = int_field(data, dict, "P")?.ok_or(Error::MissingField("P"))? as i32;
    let version = int_field(data, dict, "V")?.unwrap_or(0);
    let key_length_bits = int_field(data, dict, "Length")?.unwrap_or(40);
    let encrypt_metadata = !matches!(dict.get("EncryptMetadata"), Some(Value::Bool(false)));

    let params = EncryptionParameters {
        revision: u32::try_from(revision).map_err(|_| Error::MissingField("R"))?,
        version: u32::try_from(version).unwrap_or(0),
        key_length_bits: u32::try_from(key_length_bits).unwrap_or(40),
        permissions,
        encrypt_metadata,
        owner_string: string_field(data, dict, "O")?,
        user_string: string_field(data, dict, "U")?,
        file_id,
    };
    log::debug!(
        "Standard handler: V={}, R={}, Length={}, P={}",
        params.version,
        params.revision,
        params.key_length_bits,
        params.permissions
    );
    Ok(params)
}

/// Extract the encryption parameters from the bytes of a PDF file.
///
/// # Errors
///
/// [`Error::InvalidHeader`] without a `%PDF-` signature,
/// [`Error::TrailerNotFound`] when no trailer dictionary exists,
/// [`Error::NotEncrypted`] when no trailer has an `/Encrypt` entry,
/// [`Error::EncryptRefNotFound`] when `/Encrypt` is neither a reference nor a
/// dictionary, [`Error::FileIdNotFound`] without an `/ID` string,
/// [`Error::EncryptObjectNotFound`] when the referenced object is missing,
/// and [`Error::UnsupportedHandler`] / [`Error::MissingField`] for
/// dictionaries that do not describe the Standard Security Handler.
pub fn extract_parameters(data: &[u8]) -> Result<EncryptionParameters> {
    check_header(data)?;

    let trailers = trailer_dicts(data);
    if trailers.is_empty() {
        return Err(Error::TrailerNotFound);
    }

    let encrypt = trailers
        .iter()
        .find_map(|t| t.get("Encrypt"))
        .ok_or(Error::NotEncrypted)?;

    let file_id = trailers
        .iter()
        .filter_map(|t| t.get("ID"))
        .find_map(|id| match id {
            Value::Array(items) => match items.first() {
                Some(Value::String(bytes)) => Some(bytes.clone()),
                _ => None,
            },
            _ => None,
        })
        .ok_or(Error::FileIdNotFound)?;

    let dict = match encrypt {
        Value::Ref(num, gen) => {
            log::debug!("Trailer references encryption object {} {}", num, gen);
            match find_object(data, *num, *gen) {
                Some(dict @ Value::Dict(_)) => dict,
                _ => return Err(Error::EncryptObjectNotFound(*num)),
            }
        },
        dict @ Value::Dict(_) => dict.clone(),
        _ => return Err(Error::EncryptRefNotFound),
    };

    read_encrypt_dict(data, &dict, file_id)
}

/// Read `path` and extract its encryption parameters.
pub fn extract_from_file(path: impl AsRef<Path>) -> Result<EncryptionParameters> {
    let data = std::fs::read(path.as_ref())?;
    extract_parameters(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_reference_and_integers() {
        let (_, v) = parse_value(b"[1 2 0 R 3]").unwrap();
        assert_eq!(v, Value::Array(vec![Value::Integer(1), Value::Ref(2, 0), Value::Integer(3)]));
    }

    #[test]
    fn test_parse_dict_keeps_first_entry() {
        let (_, v) = parse_value(b"<< /Length 128 /CF << /Length 16 >> /Length 40 >>").unwrap();
        assert_eq!(v.get("Length"), Some(&Value::Integer(128)));
    }

    #[test]
    fn test_parse_value_depth_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 5), "]".repeat(MAX_DEPTH + 5));
        assert!(parse_value(deep.as_bytes()).is_err());
    }

    #[test]
    fn test_object_headers() {
        let data = b"1 0 obj\n<<>>\nendobj\n12 3 obj<<>>endobj objective 4 0 objx";
        let headers: Vec<_> = object_headers(data).map(|(n, g, _)| (n, g)).collect();
        assert_eq!(headers, vec![(1, 0), (12, 3)]);
    }

    #[test]
    fn test_find_object_last_definition_wins() {
        let data = b"5 0 obj 1 endobj\n5 0 obj 2 endobj\n";
        assert_eq!(find_object(data, 5, 0), Some(Value::Integer(2)));
        assert_eq!(find_object(data, 6, 0), None);
    }

    #[test]
    fn test_check_header() {
        assert!(check_header(b"%PDF-1.4\n").is_ok());
        assert!(check_header(b"\xEF\xBB\xBF%PDF-1.7").is_ok());
        assert!(matches!(check_header(b"GIF89a"), Err(Error::InvalidHeader(s)) if s == "GIF89a"));
    }

    #[test]
    fn test_unsigned_permissions() {
        let dict = parse_value(b"<< /Filter /Standard /R 3 /P 4294963392 /O <00> /U <00> >>")
            .unwrap()
            .1;
        let params = read_encrypt_dict(b"", &dict, vec![1]).unwrap();
        assert_eq!(params.permissions, -3904);
        assert_eq!(params.key_length_bits, 40);
        assert_eq!(params.version, 0);
        assert!(params.encrypt_metadata);
    }

    #[test]
    fn test_encrypt_metadata_false() {
        let dict = parse_value(
            b"<< /Filter /Standard /R 4 /V 4 /P -4 /O () /U () /EncryptMetadata false >>",
        )
        .unwrap()
        .1;
        let params = read_encrypt_dict(b"", &dict, Vec::new()).unwrap();
        assert!(!params.encrypt_metadata);
        assert_eq!(params.revision, 4);
    }
}
