#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gtfs_rt_denorm::denormalize::OutputRecord;
use gtfs_rt_denorm::error::PublishError;
use gtfs_rt_denorm::gtfs_rt::{
    Alert, EntitySelector, FeedEntity, FeedHeader, FeedMessage, Position, TimeRange,
    TranslatedString, TripDescriptor, VehiclePosition, translated_string::Translation,
};
use gtfs_rt_denorm::sink::RecordSink;
use prost::Message;
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const STOPS_TXT: &str = "stop_id,stop_code,stop_name,stop_desc,stop_lat,stop_lon,zone_id,stop_url,location_type,parent_station,stop_timezone,wheelchair_boarding
S1,5001,Transit Center,Bay 3,29.4241,-98.4936,A,,0,,America/Chicago,1
S2,5002,Elm & 5th,,29.43,-98.5,A,,0,,,
";

/// One canned HTTP response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Overrides `Content-Length`, to fake a body cut off mid-transfer.
    pub content_length: Option<usize>,
}

impl Canned {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![],
            body,
            content_length: None,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![],
            body: body.as_bytes().to_vec(),
            content_length: None,
        }
    }

    pub fn last_modified(mut self, value: &str) -> Self {
        self.headers
            .push(("Last-Modified".to_string(), value.to_string()));
        self
    }

    pub fn truncated(mut self) -> Self {
        self.content_length = Some(self.body.len() + 100);
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n",
            self.status,
            self.content_length.unwrap_or(self.body.len())
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

pub struct TestServer {
    pub url: Url,
    pub hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `responses` in order, one per connection, repeating the last one
/// once they run out.
pub async fn serve(responses: Vec<Canned>) -> TestServer {
    assert!(!responses.is_empty());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let canned = responses[n.min(responses.len() - 1)].clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let _ = socket.write_all(&canned.to_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer {
        url: Url::parse(&format!("http://{addr}/gtfs-realtime/feed.pb")).unwrap(),
        hits,
    }
}

/// Accepts connections and never answers.
pub async fn serve_silent() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });

    Url::parse(&format!("http://{addr}/feed.pb")).unwrap()
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Sink that keeps every batch it receives.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub batches: Arc<Mutex<Vec<Vec<OutputRecord>>>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<OutputRecord> {
        self.batches.lock().unwrap().concat()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn publish(&self, batch: &[OutputRecord]) -> Result<(), PublishError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

/// Sink that rejects every batch.
pub struct FailingSink;

#[async_trait]
impl RecordSink for FailingSink {
    async fn publish(&self, _batch: &[OutputRecord]) -> Result<(), PublishError> {
        Err(PublishError::Io(std::io::Error::other("index unavailable")))
    }
}

/// Sink that rejects its first `failures` batches, then keeps the rest.
#[derive(Clone, Default)]
pub struct FlakySink {
    pub failures: Arc<AtomicUsize>,
    pub inner: MemorySink,
}

impl FlakySink {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(failures)),
            inner: MemorySink::default(),
        }
    }
}

#[async_trait]
impl RecordSink for FlakySink {
    async fn publish(&self, batch: &[OutputRecord]) -> Result<(), PublishError> {
        let remaining = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(PublishError::Io(std::io::Error::other("index unavailable")));
        }
        self.inner.publish(batch).await
    }
}

pub fn write_stops(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, STOPS_TXT).unwrap();
    path
}

pub fn header() -> FeedHeader {
    FeedHeader {
        gtfs_realtime_version: "2.0".to_string(),
        timestamp: Some(1_717_243_200),
        incrementality: None,
        feed_version: None,
    }
}

pub fn encode(entity: Vec<FeedEntity>) -> Vec<u8> {
    FeedMessage {
        header: header(),
        entity,
    }
    .encode_to_vec()
}

/// Vehicle on trip "T1" at stop "S1" doing 10 m/s, with no timestamp.
pub fn vehicle_entity() -> FeedEntity {
    FeedEntity {
        id: "veh-1".to_string(),
        vehicle: Some(VehiclePosition {
            trip: Some(TripDescriptor {
                trip_id: Some("T1".to_string()),
                route_id: Some("R1".to_string()),
                ..Default::default()
            }),
            position: Some(Position {
                latitude: 29.42,
                longitude: -98.49,
                bearing: None,
                odometer: None,
                speed: Some(10.0),
            }),
            stop_id: Some("S1".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Alert affecting routes "R1" and "R2" with one active period.
pub fn alert_entity() -> FeedEntity {
    let text = |value: &str| {
        Some(TranslatedString {
            translation: vec![Translation {
                text: value.to_string(),
                language: Some("en".to_string()),
            }],
        })
    };

    FeedEntity {
        id: "alert-1".to_string(),
        alert: Some(Alert {
            active_period: vec![TimeRange {
                start: Some(1_717_200_000),
                end: Some(1_717_286_400),
            }],
            informed_entity: vec![
                EntitySelector {
                    route_id: Some("R1".to_string()),
                    ..Default::default()
                },
                EntitySelector {
                    route_id: Some("R2".to_string()),
                    ..Default::default()
                },
            ],
            cause: Some(10),
            effect: Some(4),
            url: None,
            header_text: text("Detour"),
            description_text: text("Routes 1 and 2 detour around the fair."),
        }),
        ..Default::default()
    }
}
