//! Device-side half of the pipeline: turns a raw serial byte stream into
//! ingestion requests.
//!
//! Retry lives here, not in the service. A reading that still fails after
//! `max_attempts` is logged and dropped so one bad stretch of network does not
//! stall the serial reader.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use crate::{
    api::dto::IngestRequest,
    config::{optional, parsed, required},
    frame::{DecodedFrame, FrameDecoder, SyncPolicy},
};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Full URL of `POST /telemetry`.
    pub ingest_url: String,
    pub owner_id: String,
    pub device_serial: String,
    pub sensor_kind: String,
    /// Serial device or capture file. Reads stdin when unset.
    pub input: Option<PathBuf>,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub sync_policy: SyncPolicy,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let input = optional("BRIDGE_INPUT", "");
        let resync: bool = parsed("BRIDGE_RESYNC", "false", "true or false")?;
        Ok(Self {
            ingest_url: required("BRIDGE_INGEST_URL")?,
            owner_id: required("BRIDGE_OWNER_ID")?,
            device_serial: required("BRIDGE_DEVICE_SERIAL")?,
            sensor_kind: required("BRIDGE_SENSOR_KIND")?,
            input: (!input.is_empty()).then(|| PathBuf::from(input)),
            max_attempts: parsed("BRIDGE_MAX_ATTEMPTS", "3", "a positive integer")?,
            retry_backoff: Duration::from_millis(parsed(
                "BRIDGE_RETRY_BACKOFF_MS",
                "500",
                "a positive integer",
            )?),
            sync_policy: if resync {
                SyncPolicy::ScanForStart
            } else {
                SyncPolicy::DiscardWindow
            },
        })
    }

    pub fn request_for(&self, frame: &DecodedFrame) -> IngestRequest {
        IngestRequest {
            owner_id: self.owner_id.clone(),
            device_serial: self.device_serial.clone(),
            location_label: frame.location_label.to_owned(),
            sensor_kind: self.sensor_kind.clone(),
            value: i64::from(frame.value),
        }
    }
}

/// Destination for decoded readings.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn send(&self, request: &IngestRequest) -> Result<()>;
}

/// HTTP sink with bounded linear backoff.
#[derive(Debug, Clone)]
pub struct IngestClient {
    http: Client,
    url: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl IngestClient {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            http: Client::new(),
            url: config.ingest_url.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff * attempt
    }

    async fn post_once(&self, request: &IngestRequest) -> Result<()> {
        self.http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("ingest request failed")?
            .error_for_status()
            .context("ingest endpoint returned error status")?;
        Ok(())
    }
}

#[async_trait]
impl ReadingSink for IngestClient {
    async fn send(&self, request: &IngestRequest) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.post_once(request).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Ingest failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub bytes_read: u64,
    pub frames_decoded: u64,
    pub windows_discarded: u64,
    pub readings_sent: u64,
    pub readings_dropped: u64,
}

/// Pump `reader` until EOF, forwarding every decoded reading to `sink`.
pub async fn pump<R, S>(config: &BridgeConfig, mut reader: R, sink: &S) -> Result<BridgeStats>
where
    R: AsyncRead + Unpin,
    S: ReadingSink + ?Sized,
{
    let mut decoder = FrameDecoder::new(config.sync_policy);
    let mut stats = BridgeStats::default();
    let mut buf = [0u8; 64];

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .context("failed to read from serial input")?;
        if n == 0 {
            break;
        }
        stats.bytes_read += n as u64;

        for frame in decoder.feed_all(&buf[..n]) {
            debug!(location = frame.location_label, value = frame.value, "Frame decoded");
            let request = config.request_for(&frame);
            match sink.send(&request).await {
                Ok(()) => stats.readings_sent += 1,
                Err(e) => {
                    stats.readings_dropped += 1;
                    error!(
                        location = frame.location_label,
                        value = frame.value,
                        error = %e,
                        "Dropping reading after failed ingest"
                    );
                }
            }
        }
    }

    stats.frames_decoded = decoder.decoded_count();
    stats.windows_discarded = decoder.discarded_count();
    info!(?stats, pending = decoder.pending(), "Serial input closed");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use tokio::sync::Mutex;

    use super::*;
    use crate::frame::encode_frame;

    fn config() -> BridgeConfig {
        BridgeConfig {
            ingest_url: "http://localhost:8080/telemetry".to_owned(),
            owner_id: "o1".to_owned(),
            device_serial: "SN-1".to_owned(),
            sensor_kind: "co2".to_owned(),
            input: None,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            sync_policy: SyncPolicy::DiscardWindow,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<IngestRequest>>,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl ReadingSink for RecordingSink {
        async fn send(&self, request: &IngestRequest) -> Result<()> {
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(anyhow!("connection refused"));
            }
            self.sent.lock().await.push(request.clone());
            Ok(())
        }
    }

    #[test]
    fn request_carries_device_identity_and_decoded_value() {
        let frame = crate::frame::decode_frame(&encode_frame(b'A', 1024)).unwrap();
        let req = config().request_for(&frame);
        assert_eq!(req.owner_id, "o1");
        assert_eq!(req.device_serial, "SN-1");
        assert_eq!(req.location_label, "Qwave");
        assert_eq!(req.value, 1024);
    }

    #[test]
    fn backoff_grows_linearly() {
        let client = IngestClient::new(&config());
        assert_eq!(client.backoff_for(1), Duration::from_millis(500));
        assert_eq!(client.backoff_for(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn pump_forwards_every_decoded_frame() {
        let mut stream = encode_frame(b'A', 1).to_vec();
        stream.extend_from_slice(&[0x00, 0x01, 0x02, 0x03, 0x04]);
        stream.extend_from_slice(&encode_frame(b'D', 300));
        stream.extend_from_slice(&[0x02, b'A']);

        let sink = RecordingSink::default();
        let stats = pump(&config(), stream.as_slice(), &sink).await.unwrap();

        assert_eq!(stats.bytes_read, 17);
        assert_eq!(stats.frames_decoded, 2);
        assert_eq!(stats.windows_discarded, 1);
        assert_eq!(stats.readings_sent, 2);

        let sent = sink.sent.lock().await;
        assert_eq!(sent[0].location_label, "Qwave");
        assert_eq!(sent[1].location_label, "Office");
        assert_eq!(sent[1].value, 300);
    }

    #[tokio::test]
    async fn pump_drops_reading_when_sink_fails_and_keeps_going() {
        let mut stream = encode_frame(b'A', 1).to_vec();
        stream.extend_from_slice(&encode_frame(b'A', 2));

        let sink = RecordingSink {
            fail_first: AtomicUsize::new(1),
            ..Default::default()
        };
        let stats = pump(&config(), stream.as_slice(), &sink).await.unwrap();

        assert_eq!(stats.readings_dropped, 1);
        assert_eq!(stats.readings_sent, 1);
        assert_eq!(sink.sent.lock().await[0].value, 2);
    }
}
