mod common;

use std::time::Duration;

use chrono::Utc;
use common::{Canned, FlakySink, MemorySink, alert_entity, encode, serve, vehicle_entity, write_stops};
use gtfs_rt_denorm::denormalize::RecordKind;
use gtfs_rt_denorm::error::CycleError;
use gtfs_rt_denorm::fetch::{BasicClient, FeedFetcher};
use gtfs_rt_denorm::pipeline::{CycleReport, CycleSummary, Pipeline};
use gtfs_rt_denorm::sink::{JsonLinesSink, RecordSink};
use gtfs_rt_denorm::stops::StopIndex;
use reqwest::Url;

fn pipeline<S: RecordSink>(url: Url, stops: StopIndex, sink: S) -> Pipeline<BasicClient, S> {
    let client = BasicClient::with_timeout(Duration::from_secs(5)).unwrap();
    Pipeline::new(FeedFetcher::new(client, url), stops, sink)
}

#[tokio::test]
async fn test_vehicle_is_enriched_end_to_end() {
    let stops = StopIndex::load(write_stops("gtfs_rt_denorm_e2e_vehicle_stops.txt")).unwrap();
    let server = serve(vec![Canned::ok(encode(vec![vehicle_entity()]))]).await;
    let sink = MemorySink::default();
    let mut pipeline = pipeline(server.url.clone(), stops, sink.clone());

    let before = Utc::now();
    let report = pipeline.run_cycle().await.unwrap();
    let after = Utc::now();

    assert_eq!(
        report,
        CycleReport::Processed(CycleSummary {
            entities: 1,
            records: 1,
            skipped: 0
        })
    );

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.kind, RecordKind::Vehicle);
    assert_eq!(record.entity_id.as_deref(), Some("veh-1"));
    assert_eq!(record.get_str("trip.id"), Some("T1"));
    assert_eq!(record.get_str("stop.id"), Some("S1"));
    assert_eq!(record.get_str("stop.name"), Some("Transit Center"));
    assert_eq!(record.get_str("stop.timezone"), Some("America/Chicago"));
    assert_eq!(record.get("stop.wheelchair_boarding"), Some(&1.into()));
    let mph = record.get_f64("speed_mph").unwrap();
    assert!((mph - 22.369).abs() < 1e-3, "{mph}");
    // no vehicle timestamp in the feed, so the record is stamped at processing time
    assert!(record.timestamp >= before && record.timestamp <= after);
}

#[tokio::test]
async fn test_alert_fans_out_per_route() {
    let stops = StopIndex::from_reader(common::STOPS_TXT.as_bytes()).unwrap();
    let server = serve(vec![Canned::ok(encode(vec![alert_entity()]))]).await;
    let sink = MemorySink::default();
    let mut pipeline = pipeline(server.url.clone(), stops, sink.clone());

    pipeline.run_cycle().await.unwrap();
    let first = sink.records();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].get_str("route_id"), Some("R1"));
    assert_eq!(first[1].get_str("route_id"), Some("R2"));
    assert_eq!(first[0].get("active_period"), first[1].get("active_period"));
    assert!(first[0].get("active_period").is_some());
    assert_ne!(first[0].id, first[1].id);
    assert_eq!(first[0].get_str("alert_cause"), Some("CONSTRUCTION"));
    assert_eq!(first[0].get_str("alert_effect"), Some("DETOUR"));

    // the same alert on the next fetch keeps its identities
    pipeline.run_cycle().await.unwrap();
    let all = sink.records();
    assert_eq!(all.len(), 4);
    assert_eq!(all[2].id, first[0].id);
    assert_eq!(all[3].id, first[1].id);
}

#[tokio::test]
async fn test_malformed_feed_emits_nothing() {
    let stops = StopIndex::from_reader(common::STOPS_TXT.as_bytes()).unwrap();
    let server = serve(vec![Canned::ok(b"<html>not protobuf</html>".to_vec())]).await;
    let sink = MemorySink::default();
    let mut pipeline = pipeline(server.url.clone(), stops, sink.clone());

    let result = pipeline.run_cycle().await;

    assert!(matches!(result, Err(CycleError::Decode(_))), "{result:?}");
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test]
async fn test_json_lines_output() {
    let stops = StopIndex::from_reader(common::STOPS_TXT.as_bytes()).unwrap();
    let server = serve(vec![Canned::ok(encode(vec![vehicle_entity(), alert_entity()]))]).await;
    let path = std::env::temp_dir().join("gtfs_rt_denorm_e2e_output.jsonl");
    let _ = std::fs::remove_file(&path);
    let mut pipeline = pipeline(server.url.clone(), stops, JsonLinesSink::new(Some(path.clone())));

    pipeline.run_cycle().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["type"], "vehicle");
    assert_eq!(lines[0]["trip.id"], "T1");
    assert_eq!(lines[0]["position"], "29.42,-98.49");
    assert!(lines[0].get("id").is_none());
    assert_eq!(lines[1]["type"], "alert");
    assert_eq!(lines[2]["type"], "alert");
    assert!(lines[1]["id"].as_str().unwrap().starts_with("R1"));
    assert!(lines[2]["id"].as_str().unwrap().starts_with("R2"));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_failed_publish_is_delivered_on_next_cycle() {
    let stops = StopIndex::from_reader(common::STOPS_TXT.as_bytes()).unwrap();
    let server = serve(vec![
        Canned::ok(encode(vec![vehicle_entity()])).last_modified("Mon, 03 Jun 2024 10:00:00 GMT"),
    ])
    .await;
    let sink = FlakySink::failing(1);
    let mut pipeline = pipeline(server.url.clone(), stops, sink.clone());

    let first = pipeline.run_cycle().await;
    assert!(matches!(first, Err(CycleError::Publish(_))), "{first:?}");
    assert_eq!(pipeline.fetcher().last_updated(), None);

    let second = pipeline.run_cycle().await.unwrap();
    assert!(matches!(second, CycleReport::Processed(_)), "{second:?}");
    assert_eq!(sink.inner.records().len(), 1);
    assert!(pipeline.fetcher().last_updated().is_some());

    assert_eq!(pipeline.run_cycle().await.unwrap(), CycleReport::Unchanged);
    assert_eq!(sink.inner.batch_count(), 1);
}

#[tokio::test]
async fn test_undecodable_payload_is_not_marked_processed() {
    let stops = StopIndex::from_reader(common::STOPS_TXT.as_bytes()).unwrap();
    let server = serve(vec![
        Canned::ok(vec![0xFF, 0xFE, 0x00, 0x01]).last_modified("Mon, 03 Jun 2024 10:00:00 GMT"),
    ])
    .await;
    let mut pipeline = pipeline(server.url.clone(), stops, MemorySink::default());

    for _ in 0..2 {
        let result = pipeline.run_cycle().await;
        assert!(matches!(result, Err(CycleError::Decode(_))), "{result:?}");
    }
    assert_eq!(pipeline.fetcher().last_updated(), None);
    assert_eq!(server.hits(), 2);
}
