//! Integration tests for encryption parameter extraction.
//!
//! Fixtures are small hand-built PDF files whose encryption dictionaries are
//! generated from known password pairs.

use pdf_recover::candidates::{CandidateSupplier, Wordlist};
use pdf_recover::driver;
use pdf_recover::extract::{extract_from_file, extract_parameters};
use pdf_recover::{CrackConfig, EncryptionParameters, Error};

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Escape bytes for a literal string.
fn literal(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            },
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

fn encrypt_dict(params: &EncryptionParameters) -> String {
    format!(
        "<< /Filter /Standard /V {} /R {} /Length {} /P {} /O <{}> /U <{}> >>",
        params.version,
        params.revision,
        params.key_length_bits,
        params.permissions,
        hex(&params.owner_string),
        hex(&params.user_string)
    )
}

/// A minimal PDF with the encryption dictionary in object 5.
fn build_pdf(encrypt_obj: &str, trailer: &str) -> Vec<u8> {
    let mut pdf = String::from("%PDF-1.4\n%\u{e2}\u{e3}\n");
    pdf.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    pdf.push_str("2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
    pdf.push_str(&format!("5 0 obj\n{}\nendobj\n", encrypt_obj));
    pdf.push_str("xref\n0 1\n0000000000 65535 f \n");
    pdf.push_str(&format!("trailer\n{}\nstartxref\n0\n%%EOF\n", trailer));
    pdf.into_bytes()
}

fn sample_params() -> EncryptionParameters {
    EncryptionParameters::synthesize(
        b"topsecret",
        b"reader",
        3,
        128,
        -3904,
        &[0x9A, 0x00, 0x28, 0x29, 0x5C, 0xFF, 0x0D, 0x0A],
    )
}

mod extraction_tests {
    use super::*;

    #[test]
    fn test_indirect_encrypt_with_hex_id() {
        let params = sample_params();
        let trailer = format!(
            "<< /Size 6 /Root 1 0 R /Encrypt 5 0 R /ID [<{}> <00112233>] >>",
            hex(&params.file_id)
        );
        let pdf = build_pdf(&encrypt_dict(&params), &trailer);

        assert_eq!(extract_parameters(&pdf).unwrap(), params);
    }

    #[test]
    fn test_literal_strings() {
        let params = sample_params();
        let dict = format!(
            "<< /Filter /Standard /V 2 /R 3 /Length 128 /P -3904 /O ({}) /U ({}) >>",
            literal(&params.owner_string),
            literal(&params.user_string)
        );
        let trailer =
            format!("<< /Root 1 0 R /Encrypt 5 0 R /ID [({}) ()] >>", literal(&params.file_id));
        let pdf = build_pdf(&dict, &trailer);

        let extracted = extract_parameters(&pdf).unwrap();
        assert_eq!(extracted.owner_string, params.owner_string);
        assert_eq!(extracted.user_string, params.user_string);
        assert_eq!(extracted.file_id, params.file_id);
    }

    #[test]
    fn test_direct_encrypt_dictionary() {
        let params = sample_params();
        let trailer = format!(
            "<< /Root 1 0 R /Encrypt {} /ID [<{}> <{}>] >>",
            encrypt_dict(&params),
            hex(&params.file_id),
            hex(&params.file_id)
        );
        let pdf = build_pdf("null", &trailer);
        assert_eq!(extract_parameters(&pdf).unwrap(), params);
    }

    #[test]
    fn test_defaults_for_missing_entries() {
        let dict = "<< /Filter /Standard /R 2 /P -64 /O <00> /U <00> >>";
        let pdf = build_pdf(dict, "<< /Encrypt 5 0 R /ID [<AB><AB>] >>");

        let params = extract_parameters(&pdf).unwrap();
        assert_eq!(params.version, 0);
        assert_eq!(params.key_length_bits, 40);
        assert!(params.encrypt_metadata);
        assert_eq!(params.file_id, vec![0xAB]);
    }

    #[test]
    fn test_incremental_update_uses_newest_trailer() {
        let old = EncryptionParameters::synthesize(b"old", b"", 2, 40, -4, b"first");
        let new = sample_params();

        let mut pdf = build_pdf(
            &encrypt_dict(&old),
            &format!("<< /Encrypt 5 0 R /ID [<{}><{}>] >>", hex(&old.file_id), hex(&old.file_id)),
        );
        let update = format!(
            "5 0 obj\n{}\nendobj\ntrailer\n<< /Prev 0 /Encrypt 5 0 R /ID [<{}><{}>] >>\n%%EOF\n",
            encrypt_dict(&new),
            hex(&new.file_id),
            hex(&new.file_id)
        );
        pdf.extend_from_slice(update.as_bytes());

        assert_eq!(extract_parameters(&pdf).unwrap(), new);
    }

    #[test]
    fn test_cross_reference_stream_trailer() {
        let params = sample_params();
        let mut pdf = String::from("%PDF-1.5\n");
        pdf.push_str("1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        pdf.push_str(&format!("5 0 obj\n{}\nendobj\n", encrypt_dict(&params)));
        pdf.push_str(&format!(
            "9 0 obj\n<< /Type /XRef /Size 10 /W [1 2 1] /Root 1 0 R /Encrypt 5 0 R /ID [<{}><{}>] /Length 0 >>\nstream\n\nendstream\nendobj\n",
            hex(&params.file_id),
            hex(&params.file_id)
        ));
        pdf.push_str("startxref\n0\n%%EOF\n");

        assert_eq!(extract_parameters(pdf.as_bytes()).unwrap(), params);
    }

    #[test]
    fn test_encrypt_metadata_false() {
        let dict = "<< /Filter /Standard /V 4 /R 4 /Length 128 /P -4 /O <00> /U <00> \
                    /EncryptMetadata false >>";
        let pdf = build_pdf(dict, "<< /Encrypt 5 0 R /ID [<01><01>] >>");
        assert!(!extract_parameters(&pdf).unwrap().encrypt_metadata);
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_invalid_header() {
        assert!(matches!(
            extract_parameters(b"PK\x03\x04 not a pdf"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_missing_trailer() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";
        assert!(matches!(extract_parameters(pdf), Err(Error::TrailerNotFound)));
    }

    #[test]
    fn test_not_encrypted() {
        let pdf = build_pdf("<< >>", "<< /Root 1 0 R /ID [<01><01>] >>");
        assert!(matches!(extract_parameters(&pdf), Err(Error::NotEncrypted)));
    }

    #[test]
    fn test_missing_id() {
        let pdf = build_pdf(&encrypt_dict(&sample_params()), "<< /Encrypt 5 0 R >>");
        assert!(matches!(extract_parameters(&pdf), Err(Error::FileIdNotFound)));
    }

    #[test]
    fn test_missing_encrypt_object() {
        let pdf = build_pdf("<< >>", "<< /Encrypt 7 0 R /ID [<01><01>] >>");
        assert!(matches!(extract_parameters(&pdf), Err(Error::EncryptObjectNotFound(7))));
    }

    #[test]
    fn test_encrypt_entry_of_wrong_type() {
        let pdf = build_pdf("<< >>", "<< /Encrypt 12 /ID [<01><01>] >>");
        assert!(matches!(extract_parameters(&pdf), Err(Error::EncryptRefNotFound)));
    }

    #[test]
    fn test_public_key_handler() {
        let dict = "<< /Filter /Adobe.PubSec /SubFilter /adbe.pkcs7.s5 /V 4 /R 4 >>";
        let pdf = build_pdf(dict, "<< /Encrypt 5 0 R /ID [<01><01>] >>");
        assert!(matches!(
            extract_parameters(&pdf),
            Err(Error::UnsupportedHandler(name)) if name == "Adobe.PubSec"
        ));
    }

    #[test]
    fn test_missing_owner_string() {
        let dict = "<< /Filter /Standard /R 3 /P -4 /U <00> >>";
        let pdf = build_pdf(dict, "<< /Encrypt 5 0 R /ID [<01><01>] >>");
        assert!(matches!(extract_parameters(&pdf), Err(Error::MissingField("O"))));
    }
}

mod end_to_end_tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_extract_file_then_recover_owner() {
        let params = sample_params();
        let trailer =
            format!("<< /Encrypt 5 0 R /ID [<{}><{}>] >>", hex(&params.file_id), hex(&params.file_id));

        let mut pdf_file = NamedTempFile::new().unwrap();
        pdf_file.write_all(&build_pdf(&encrypt_dict(&params), &trailer)).unwrap();
        let mut words = NamedTempFile::new().unwrap();
        words.write_all(b"password\r\nletmein\r\ntopsecret\r\n").unwrap();

        let extracted = extract_from_file(pdf_file.path()).unwrap();
        let report = driver::recover(&extracted, &CrackConfig::new(), || {
            let supplier: Box<dyn CandidateSupplier> = Box::new(Wordlist::open(words.path())?);
            Ok(supplier)
        })
        .unwrap();

        assert_eq!(report.owner_password(), Some(&b"topsecret"[..]));
        assert_eq!(report.user_password(), Some(&b"reader"[..]));
    }

    #[test]
    fn test_extract_missing_file() {
        assert!(matches!(
            extract_from_file("/nonexistent/locked.pdf"),
            Err(Error::Io(_))
        ));
    }
}
