//! End-to-end runs of extract, fetch and combine against a local HTTP server

mod common;

use common::{
    issue_archive, issue_games, mount_archive, mount_index, test_config, zip_archive,
};
use twic_dl::{Event, Harvester, MetadataStore, Ordinal, Stage, StageStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUES: &[(u32, &str)] = &[
    (1612, "22/09/2025"),
    (1611, "15/09/2025"),
    (1610, "08/09/2025"),
];

fn expected_master(ordinals: &[u32]) -> String {
    ordinals
        .iter()
        .map(|&o| format!("{}\n\n", issue_games(o).replace("\r\n", "\n").trim()))
        .collect()
}

#[tokio::test]
async fn test_full_pipeline() {
    let server = MockServer::start().await;
    mount_index(&server, ISSUES).await;
    for &(ordinal, _) in ISSUES {
        mount_archive(&server, ordinal, issue_archive(ordinal), 1).await;
    }
    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(test_config(dir.path(), &server.uri())).unwrap();
    let mut events = harvester.subscribe();

    let report = harvester.run().await.unwrap();

    assert_eq!(report.status(), StageStatus::Success);
    assert_eq!(report.index.records.len(), 3);
    assert_eq!(report.fetch.succeeded, 3);
    assert_eq!(report.combine.merged, 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("twic_master.pgn")).unwrap(),
        expected_master(&[1610, 1611, 1612])
    );

    let record = MetadataStore::new(dir.path().join("twic_data"))
        .load(&dir.path().join("twic_data/twic_1611.json"))
        .unwrap();
    assert_eq!(record.ordinal, Ordinal(1611));
    assert_eq!(record.games, Some(1611 * 3));
    assert_eq!(
        record.archive_link.as_deref(),
        Some(format!("{}/zips/twic1611g.zip", server.uri()).as_str())
    );
    assert_eq!(
        record.detail_link.as_deref(),
        Some(format!("{}/html/twic1611.html", server.uri()).as_str())
    );

    let mut stages = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::StageStarted { stage } = event {
            stages.push(stage);
        }
    }
    assert_eq!(stages, vec![Stage::Extract, Stage::Fetch, Stage::Combine]);
}

#[tokio::test]
async fn test_rerun_makes_no_archive_requests() {
    let server = MockServer::start().await;
    mount_index(&server, ISSUES).await;
    for &(ordinal, _) in ISSUES {
        // Verified when the server drops: one request across both runs
        mount_archive(&server, ordinal, issue_archive(ordinal), 1).await;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &server.uri());

    Harvester::new(config.clone()).unwrap().run().await.unwrap();
    let first = std::fs::read(dir.path().join("twic_master.pgn")).unwrap();

    let report = Harvester::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.fetch.skipped, 3);
    assert_eq!(report.fetch.succeeded, 0);
    assert_eq!(report.combine.already_merged, 3);
    assert_eq!(
        std::fs::read(dir.path().join("twic_master.pgn")).unwrap(),
        first
    );
}

#[tokio::test]
async fn test_failed_download_recovers_on_next_run() {
    let server = MockServer::start().await;
    mount_index(&server, ISSUES).await;
    mount_archive(&server, 1611, issue_archive(1611), 1).await;
    mount_archive(&server, 1612, issue_archive(1612), 1).await;

    // Three attempts in the first run all fail, the next run succeeds
    Mock::given(method("GET"))
        .and(path("/zips/twic1610g.zip"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_archive(&server, 1610, issue_archive(1610), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &server.uri());

    let first = Harvester::new(config.clone()).unwrap().run().await.unwrap();

    assert_eq!(first.status(), StageStatus::PartialFailure);
    assert_eq!(first.fetch.failed, 1);
    assert_eq!(first.fetch.failures[0].ordinal, Ordinal(1610));
    assert_eq!(first.fetch.failures[0].attempts, 3);
    assert!(!dir.path().join("twic_pgns/twic1610.zip").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("twic_master.pgn")).unwrap(),
        expected_master(&[1611, 1612])
    );

    let second = Harvester::new(config).unwrap().run().await.unwrap();

    assert_eq!(second.status(), StageStatus::Success);
    assert_eq!(second.fetch.succeeded, 1);
    assert_eq!(second.fetch.skipped, 2);
    // The late archive sorts first, so the master file is rebuilt in order
    assert_eq!(
        std::fs::read_to_string(dir.path().join("twic_master.pgn")).unwrap(),
        expected_master(&[1610, 1611, 1612])
    );
}

#[tokio::test]
async fn test_stages_run_separately() {
    let server = MockServer::start().await;
    mount_index(&server, ISSUES).await;
    for &(ordinal, _) in ISSUES {
        mount_archive(&server, ordinal, issue_archive(ordinal), 1).await;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), &server.uri());

    let index = Harvester::new(config.clone())
        .unwrap()
        .extract_index()
        .await
        .unwrap();
    assert_eq!(index.records.len(), 3);
    assert!(!dir.path().join("twic_pgns").exists());

    let fetch = Harvester::new(config.clone())
        .unwrap()
        .fetch_archives()
        .await
        .unwrap();
    assert_eq!(fetch.succeeded, 3);
    assert!(!dir.path().join("twic_master.pgn").exists());

    let combine = Harvester::new(config)
        .unwrap()
        .combine_archives()
        .await
        .unwrap();
    assert_eq!(combine.total_records, 3);
}

#[tokio::test]
async fn test_malformed_archive_is_reported() {
    let server = MockServer::start().await;
    mount_index(&server, ISSUES).await;
    mount_archive(&server, 1610, issue_archive(1610), 1).await;
    mount_archive(
        &server,
        1611,
        zip_archive(&[("part1.pgn", "game a"), ("part2.pgn", "game b")]),
        1,
    )
    .await;
    mount_archive(&server, 1612, issue_archive(1612), 1).await;
    let dir = tempfile::tempdir().unwrap();

    let report = Harvester::new(test_config(dir.path(), &server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.fetch.status(), StageStatus::Success);
    assert_eq!(report.combine.status(), StageStatus::PartialFailure);
    assert_eq!(report.combine.skipped.len(), 1);
    assert_eq!(
        report.combine.skipped[0].path,
        dir.path().join("twic_pgns/twic1611.zip")
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("twic_master.pgn")).unwrap(),
        expected_master(&[1610, 1612])
    );
}

#[tokio::test]
async fn test_index_page_without_table_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/twic"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><p>maintenance</p></html>"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let result = Harvester::new(test_config(dir.path(), &server.uri()))
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        result,
        Err(twic_dl::Error::Parse(twic_dl::ParseError::NoTable))
    ));
    assert!(!dir.path().join("twic_data/twic_1612.json").exists());
}
