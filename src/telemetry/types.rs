//! Telemetry record types

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::decoder::ReceivedFrame;

/// One accepted frame, summarized per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Receive time, RFC 3339 UTC with milliseconds
    pub timestamp: String,
    pub sequence: u8,
    /// Frames missing between this one and the previous accepted frame
    pub lost_frames: u8,
    pub checksum: u16,
    pub channel_min: Vec<i16>,
    pub channel_max: Vec<i16>,
    pub channel_mean: Vec<f64>,
}

impl FrameRecord {
    /// Summarize a received frame, stamped with the current time
    pub fn from_received(received: &ReceivedFrame) -> Self {
        let frame = &received.frame;
        let channels = frame.channels();

        let mut min = vec![i16::MAX; channels];
        let mut max = vec![i16::MIN; channels];
        let mut sum = vec![0i64; channels];

        for row in frame.rows() {
            for (c, &sample) in row.iter().enumerate() {
                min[c] = min[c].min(sample);
                max[c] = max[c].max(sample);
                sum[c] += sample as i64;
            }
        }

        let rows = frame.len().max(1) as f64;

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            sequence: frame.sequence,
            lost_frames: received.lost_frames,
            checksum: frame.checksum,
            channel_min: min,
            channel_max: max,
            channel_mean: sum.into_iter().map(|s| s as f64 / rows).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decoder::decode_frame;
    use crate::frame::encoder::encode_frame;
    use crate::frame::layout::FrameLayout;

    fn received(samples: &[i16], layout: FrameLayout, lost: u8) -> ReceivedFrame {
        let bytes = encode_frame(&layout, 42, samples).unwrap();
        ReceivedFrame {
            frame: decode_frame(&layout, &bytes).unwrap(),
            lost_frames: lost,
        }
    }

    #[test]
    fn test_per_channel_summary() {
        // 2 channels x 3 rows, row-major
        let layout = FrameLayout::new(2, 3);
        let record = FrameRecord::from_received(&received(&[1, -10, 5, 20, 3, 0], layout, 2));

        assert_eq!(record.sequence, 42);
        assert_eq!(record.lost_frames, 2);
        assert_eq!(record.channel_min, vec![1, -10]);
        assert_eq!(record.channel_max, vec![5, 20]);
        assert_eq!(record.channel_mean, vec![3.0, 10.0 / 3.0]);
    }

    #[test]
    fn test_serializes_to_single_json_line() {
        let layout = FrameLayout::new(1, 2);
        let record = FrameRecord::from_received(&received(&[100, -100], layout, 0));

        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"sequence\":42"));
        assert!(line.contains("\"channel_mean\":[0.0]"));

        let parsed: FrameRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_timestamp_is_utc() {
        let layout = FrameLayout::new(1, 1);
        let record = FrameRecord::from_received(&received(&[0], layout, 0));
        assert!(record.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }
}
