//! Payload extraction from downloaded archives

use crate::archive::ArchiveFormat;
use crate::error::MalformedArchiveError;
use std::io::Read;
use std::path::Path;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Largest payload accepted from one archive; weekly issues are far below this
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 30;

/// Read the single PGN payload of an archive as normalised text
pub fn read_payload(path: &Path, format: ArchiveFormat) -> Result<String, MalformedArchiveError> {
    let bytes = match format {
        ArchiveFormat::Zip => read_zip_payload(path)?,
        ArchiveFormat::Pgn => std::fs::read(path).map_err(|e| MalformedArchiveError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?,
    };

    let text = decode_payload(&bytes);
    if text.is_empty() {
        return Err(MalformedArchiveError::NoPayload {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

fn read_zip_payload(path: &Path) -> Result<Vec<u8>, MalformedArchiveError> {
    let open_error = |reason: String| MalformedArchiveError::Open {
        path: path.to_path_buf(),
        reason,
    };

    let file = std::fs::File::open(path).map_err(|e| open_error(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| open_error(e.to_string()))?;

    let candidates: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/') && name.to_ascii_lowercase().ends_with(".pgn"))
        .map(String::from)
        .collect();

    let name = match candidates.as_slice() {
        [single] => single,
        [] => {
            return Err(MalformedArchiveError::NoPayload {
                path: path.to_path_buf(),
            });
        }
        many => {
            return Err(MalformedArchiveError::MultiplePayloads {
                path: path.to_path_buf(),
                count: many.len(),
            });
        }
    };

    let decompress_error = |reason: String| MalformedArchiveError::Decompress {
        path: path.to_path_buf(),
        reason,
    };
    let mut entry = archive
        .by_name(name)
        .map_err(|e| decompress_error(e.to_string()))?;

    // The declared size comes from the archive header and is untrusted
    let declared = entry.size();
    if declared > MAX_PAYLOAD_BYTES {
        return Err(decompress_error(format!(
            "{name} declares {declared} bytes, limit is {MAX_PAYLOAD_BYTES}"
        )));
    }

    let mut bytes = Vec::new();
    (&mut entry)
        .take(declared + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| decompress_error(e.to_string()))?;
    if bytes.len() as u64 != declared {
        return Err(decompress_error(format!(
            "{name} declares {declared} bytes, found {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Decode payload bytes into text ready for appending
///
/// UTF-8 is used when valid; older issues are Latin-1 and are mapped byte-for-char. Line
/// endings are normalised to `\n` and surrounding whitespace is removed so the block
/// separator alone decides the spacing between games of neighbouring issues.
pub fn decode_payload(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };
    text.replace("\r\n", "\n").trim().to_string()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{build_zip, build_zip_declaring_size};

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, build_zip(entries)).unwrap();
        path
    }

    #[test]
    fn test_single_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "twic0001.zip",
            &[("twic1.pgn", b"[Event \"A\"]\r\n\r\n1. e4 1-0\r\n\r\n")],
        );
        assert_eq!(
            read_payload(&path, ArchiveFormat::Zip).unwrap(),
            "[Event \"A\"]\n\n1. e4 1-0"
        );
    }

    #[test]
    fn test_directories_and_other_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "twic0002.zip",
            &[
                ("games/", b""),
                ("games/twic2.PGN", b"game2text"),
                ("readme.txt", b"not a game"),
            ],
        );
        assert_eq!(read_payload(&path, ArchiveFormat::Zip).unwrap(), "game2text");
    }

    #[test]
    fn test_no_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(dir.path(), "twic0003.zip", &[("readme.txt", b"x")]);
        assert!(matches!(
            read_payload(&path, ArchiveFormat::Zip),
            Err(MalformedArchiveError::NoPayload { .. })
        ));
    }

    #[test]
    fn test_multiple_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(
            dir.path(),
            "twic0004.zip",
            &[("a.pgn", b"game a"), ("b.pgn", b"game b")],
        );
        assert!(matches!(
            read_payload(&path, ArchiveFormat::Zip),
            Err(MalformedArchiveError::MultiplePayloads { count: 2, .. })
        ));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twic0005.zip");
        std::fs::write(&path, b"<html>Not Found</html>").unwrap();
        assert!(matches!(
            read_payload(&path, ArchiveFormat::Zip),
            Err(MalformedArchiveError::Open { .. })
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(dir.path(), "twic0006.zip", &[("twic6.pgn", b"\n\n  \n")]);
        assert!(matches!(
            read_payload(&path, ArchiveFormat::Zip),
            Err(MalformedArchiveError::NoPayload { .. })
        ));
    }

    #[test]
    fn test_oversized_declaration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twic0008.zip");
        std::fs::write(&path, build_zip_declaring_size("twic8.pgn", b"game", 1 << 40)).unwrap();

        let err = read_payload(&path, ArchiveFormat::Zip).unwrap_err();

        assert!(matches!(err, MalformedArchiveError::Decompress { .. }));
        assert!(err.to_string().contains("1099511627776"));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twic0009.zip");
        std::fs::write(&path, build_zip_declaring_size("twic9.pgn", b"game nine", 4)).unwrap();

        assert!(matches!(
            read_payload(&path, ArchiveFormat::Zip),
            Err(MalformedArchiveError::Decompress { .. })
        ));
    }

    #[test]
    fn test_plain_pgn_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twic0007.pgn");
        std::fs::write(&path, b"\xEF\xBB\xBF[Event \"B\"]\n\n1. d4 0-1\n").unwrap();
        assert_eq!(
            read_payload(&path, ArchiveFormat::Pgn).unwrap(),
            "[Event \"B\"]\n\n1. d4 0-1"
        );
    }

    #[test]
    fn test_latin1_fallback() {
        // "Réti" in Latin-1
        let text = decode_payload(b"[White \"R\xe9ti\"]");
        assert_eq!(text, "[White \"Réti\"]");
    }
}
