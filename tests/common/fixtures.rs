//! Index page and archive fixtures

use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Index page listing `issues` newest first, with archive links on `server_uri`
///
/// Each issue is `(ordinal, "dd/mm/yyyy")`. A header row and a footer spanning all columns
/// surround the issue rows, as on the real page.
pub fn index_page(server_uri: &str, issues: &[(u32, &str)]) -> String {
    let mut rows = String::new();
    for (ordinal, date) in issues {
        rows.push_str(&format!(
            r#"<tr><td>{ordinal}</td><td>{date}</td>
<td><a href="/html/twic{ordinal}.html">html</a></td>
<td><a href="{server_uri}/zips/twic{ordinal}g.zip">pgn</a></td>
<td><a href="/zips/twic{ordinal}c6.zip">cbv</a></td>
<td>{games}</td><td>10</td></tr>
"#,
            games = ordinal * 3
        ));
    }
    format!(
        r#"<!DOCTYPE html>
<html><body>
<table>
<tr><th>TWIC</th><th>Date</th><th>Read</th><th>PGN</th><th>CBV</th><th>Games</th><th>Stories</th></tr>
{rows}<tr><td colspan="7">Older issues</td></tr>
</table>
</body></html>
"#
    )
}

/// Zip archive holding one PGN file per entry
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        for (name, text) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(text.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Archive for one issue with a single game
pub fn issue_archive(ordinal: u32) -> Vec<u8> {
    zip_archive(&[(&format!("twic{ordinal}.pgn"), &issue_games(ordinal))])
}

/// Game text stored in [`issue_archive`]
pub fn issue_games(ordinal: u32) -> String {
    format!("[Event \"TWIC {ordinal}\"]\r\n[Result \"1-0\"]\r\n\r\n1. e4 e5 1-0\r\n")
}

/// Serve the index page at `/twic`
pub async fn mount_index(server: &MockServer, issues: &[(u32, &str)]) {
    Mock::given(method("GET"))
        .and(path("/twic"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(&server.uri(), issues)))
        .mount(server)
        .await;
}

/// Serve the archive of `ordinal`, expecting exactly `expected` requests
pub async fn mount_archive(server: &MockServer, ordinal: u32, body: Vec<u8>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/zips/twic{ordinal}g.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected)
        .mount(server)
        .await;
}
