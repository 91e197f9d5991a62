//! PDF tokenizer.
//!
//! Tokenizes the subset of PDF syntax the parameter extractor walks through:
//! trailer dictionaries, cross-reference stream dictionaries and the
//! encryption dictionary. Stream bodies and content operators are never
//! tokenized; bare words come back as [`Token::Keyword`].
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped before every token.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.2 - Lexical Conventions

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),

    /// Real number (e.g., 3.14, -.5)
    Real(f64),

    /// Raw literal string content, escapes not yet decoded
    LiteralString(&'a [u8]),

    /// Raw hexadecimal string content, whitespace preserved
    HexString(&'a [u8]),

    /// Name with #XX escapes decoded (e.g., "Encrypt" from "/Encrypt")
    Name(String),

    /// Boolean true keyword
    True,

    /// Boolean false keyword
    False,

    /// Null keyword
    Null,

    /// Array start delimiter [
    ArrayStart,

    /// Array end delimiter ]
    ArrayEnd,

    /// Dictionary start delimiter <<
    DictStart,

    /// Dictionary end delimiter >>
    DictEnd,

    /// "obj"
    ObjStart,

    /// "endobj"
    ObjEnd,

    /// "stream"
    StreamStart,

    /// Reference marker "R" (as in "10 0 R")
    R,

    /// Any other bare word ("trailer", "xref", "startxref", ...)
    Keyword(&'a [u8]),
}

impl Token<'_> {
    /// Decoded bytes of a string token, `None` for other tokens.
    pub fn string_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Token::LiteralString(raw) => Some(decode_literal_string(raw)),
            Token::HexString(raw) => Some(decode_hex_string(raw)),
            _ => None,
        }
    }
}

#[inline]
fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

#[inline]
fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

#[inline]
fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip whitespace and comments.
pub fn skip_ws(mut input: &[u8]) -> &[u8] {
    loop {
        let (rest, ws) = match take_while::<_, _, nom::error::Error<&[u8]>>(is_whitespace)(input) {
            Ok(r) => r,
            Err(_) => return input,
        };
        input = rest;
        match comment(input) {
            Ok((rest, _)) => input = rest,
            Err(_) if ws.is_empty() => return input,
            Err(_) => {},
        }
    }
}

/// Integers and reals: 42, -123, +17, 3.14, .5, 5.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))), recognize(pair(char('.'), digit1)))),
    )))(input)?;

    // Digits glued to letters ("12abc") are not a number
    if rest.first().is_some_and(|&c| is_regular(c) && !c.is_ascii_digit()) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let text = std::str::from_utf8(text)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;

    if text.contains('.') {
        let normalized = if text.ends_with('.') {
            format!("{}0", text)
        } else {
            text.to_string()
        };
        let n: f64 = normalized.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
        })?;
        Ok((rest, Token::Real(n)))
    } else {
        let n: i64 = text.trim_start_matches('+').parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Token::Integer(n)))
    }
}

/// Literal string with balanced parentheses; escapes are skipped over but
/// left in the returned slice.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    let (rest, body) = preceded(
        char('<'),
        take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
    )(input)?;
    let (rest, _) = char('>')(rest)?;
    Ok((rest, Token::HexString(body)))
}

/// Decode #XX escape sequences in a name. Invalid sequences are kept as
/// written.
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.5 - Name Objects
///
/// ```
/// # use pdf_recover::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"Std#43F"), "StdCF");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(h), Some(l)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(preceded(char('/'), take_while(is_regular)), |raw| {
        Token::Name(decode_name_escapes(raw))
    })(input)
}

/// Delimiters, then bare words. Words are matched whole so "objective"
/// never lexes as "obj".
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        map(take_while1(is_regular), |word: &[u8]| match word {
            b"true" => Token::True,
            b"false" => Token::False,
            b"null" => Token::Null,
            b"obj" => Token::ObjStart,
            b"endobj" => Token::ObjEnd,
            b"stream" => Token::StreamStart,
            b"R" => Token::R,
            other => Token::Keyword(other),
        }),
    ))(input)
}

/// Parse a single token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((parse_number, parse_name, parse_literal_string, parse_hex_string, parse_keyword))(input)
}

/// Decode escape sequences of a literal string.
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.4.2 - Literal Strings
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 == raw.len() {
            out.push(c);
            i += 1;
            continue;
        }
        let e = raw[i + 1];
        i += 2;
        match e {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = u32::from(e - b'0');
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + u32::from(d - b'0');
                            i += 1;
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            // \( \) \\ and unknown escapes: the backslash is dropped
            other => out.push(other),
        }
    }

    out
}

/// Decode the digits of a hex string; whitespace is ignored and an odd
/// trailing digit is padded with 0.
///
/// PDF Spec: ISO 32000-1:2008, Section 7.3.4.3 - Hexadecimal Strings
pub fn decode_hex_string(raw: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = raw.iter().filter_map(|&c| hex_value(c)).collect();
    nibbles
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect()
}

#[inline]
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"  -3904 "), Ok((&b" "[..], Token::Integer(-3904))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"1.5"), Ok((&b""[..], Token::Real(1.5))));
        assert_eq!(token(b"-.25"), Ok((&b""[..], Token::Real(-0.25))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
    }

    #[test]
    fn test_reference_sequence() {
        let (rest, a) = token(b"12 0 R").unwrap();
        let (rest, b) = token(rest).unwrap();
        let (rest, c) = token(rest).unwrap();
        assert_eq!((a, b, c), (Token::Integer(12), Token::Integer(0), Token::R));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_names() {
        assert_eq!(token(b"/Encrypt 5"), Ok((&b" 5"[..], Token::Name("Encrypt".to_string()))));
        assert_eq!(token(b"/V/R"), Ok((&b"/R"[..], Token::Name("V".to_string()))));
        assert_eq!(token(b"/Std#43F"), Ok((&b""[..], Token::Name("StdCF".to_string()))));
    }

    #[test]
    fn test_decode_name_escapes() {
        assert_eq!(decode_name_escapes(b"A#20B"), "A B");
        assert_eq!(decode_name_escapes(b"A#"), "A#");
        assert_eq!(decode_name_escapes(b"A#2"), "A#2");
        assert_eq!(decode_name_escapes(b"A#ZZ"), "A#ZZ");
    }

    #[test]
    fn test_keywords_are_whole_words() {
        assert_eq!(token(b"obj"), Ok((&b""[..], Token::ObjStart)));
        assert_eq!(token(b"objective"), Ok((&b""[..], Token::Keyword(b"objective"))));
        assert_eq!(token(b"trailer\n<<"), Ok((&b"\n<<"[..], Token::Keyword(b"trailer"))));
        assert_eq!(token(b"true]"), Ok((&b"]"[..], Token::True)));
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
        assert_eq!(token(b"[<00>]"), Ok((&b"<00>]"[..], Token::ArrayStart)));
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(token(b"% comment\r\n  %another\n7"), Ok((&b""[..], Token::Integer(7))));
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(token(b"(a(b)c)x"), Ok((&b"x"[..], Token::LiteralString(b"a(b)c"))));
        assert_eq!(token(b"(a\\)b)"), Ok((&b""[..], Token::LiteralString(b"a\\)b"))));
        assert!(token(b"(unterminated").is_err());
    }

    #[test]
    fn test_decode_literal_string() {
        assert_eq!(decode_literal_string(b"a\\nb"), b"a\nb");
        assert_eq!(decode_literal_string(b"\\(x\\)"), b"(x)");
        assert_eq!(decode_literal_string(b"\\247\\0\\12"), vec![0xA7, 0x00, 0x0A]);
        assert_eq!(decode_literal_string(b"split\\\r\nline"), b"splitline");
        assert_eq!(decode_literal_string(b"\\q"), b"q");
        assert_eq!(decode_literal_string(b"end\\"), b"end\\");
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(token(b"<12 34>"), Ok((&b""[..], Token::HexString(b"12 34"))));
        assert_eq!(decode_hex_string(b"12 3a\nFF"), vec![0x12, 0x3A, 0xFF]);
        assert_eq!(decode_hex_string(b"ABC"), vec![0xAB, 0xC0]);
        assert_eq!(decode_hex_string(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_string_bytes() {
        assert_eq!(Token::HexString(b"4142").string_bytes(), Some(b"AB".to_vec()));
        assert_eq!(Token::LiteralString(b"\\101").string_bytes(), Some(b"A".to_vec()));
        assert_eq!(Token::Integer(1).string_bytes(), None);
    }
}
