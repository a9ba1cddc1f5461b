//! Payload decoding
//!
//! Turns a raw store entry into a typed `Reading` for its source kind
//! before any adapter sees it. Malformed shapes fail with `Error::Decode`.
//!
//! Sensor payload: `{ph_value, tds_value, timestamp}`
//! Camera payload: `{image_base64 | image_data, ts | timestamp}`

use crate::ai_client::WaterFeatures;
use crate::error::{Error, Result};
use crate::source_registry::SourceKind;
use base64::Engine;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PH_FIELD: &str = "ph_value";
const TDS_FIELD: &str = "tds_value";
const SENSOR_TS_FIELDS: &[&str] = &["timestamp"];
const IMAGE_FIELDS: &[&str] = &["image_base64", "image_data"];
const FRAME_TS_FIELDS: &[&str] = &["ts", "timestamp"];

/// What to do when a sensor field is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Substitute 0.0
    #[default]
    ZeroDefault,
    /// Fail with a decode error
    Strict,
}

impl std::str::FromStr for MissingFieldPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "zero_default" => Ok(Self::ZeroDefault),
            "strict" | "reject" => Ok(Self::Strict),
            other => Err(Error::Config(format!("Unknown missing-field policy: {}", other))),
        }
    }
}

/// Producer timestamp, kept exactly as the producer wrote it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservedAt(pub Value);

impl ObservedAt {
    /// Wall-clock fallback (unix seconds)
    pub fn now() -> Self {
        Self(Value::from(chrono::Utc::now().timestamp()))
    }

    /// First usable timestamp among `fields`; `None` when all are absent
    fn from_payload(payload: &Value, fields: &[&str]) -> Result<Option<Self>> {
        for field in fields {
            match payload.get(*field) {
                None | Some(Value::Null) => continue,
                Some(Value::Number(n)) => return Ok(Some(Self(Value::Number(n.clone())))),
                Some(Value::String(s)) if s.trim().is_empty() => continue,
                Some(Value::String(s)) => return Ok(Some(Self(Value::String(s.clone())))),
                Some(other) => {
                    return Err(Error::Decode(format!(
                        "Field {} is not a timestamp: {}",
                        field, other
                    )))
                }
            }
        }
        Ok(None)
    }
}

/// Validated image bytes
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Validate raw image bytes (format sniffing + full decode)
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Decode("Image is empty".to_string()));
        }
        let format = image::guess_format(&bytes)
            .map_err(|e| Error::Decode(format!("Unrecognised image format: {}", e)))?;
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| Error::Decode(format!("Corrupt {:?} image: {}", format, e)))?;

        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            format,
        })
    }

    /// Decode a base64 string, tolerating a `data:` URI prefix and line breaks
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let body = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let compact: String = body.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| Error::Decode(format!("Invalid base64 image: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

/// Typed sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub features: WaterFeatures,
    pub observed_at: Option<ObservedAt>,
}

/// Typed camera frame
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    pub image: DecodedImage,
    pub observed_at: Option<ObservedAt>,
}

/// Decoded payload, one variant per `SourceKind`
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Sensor(SensorReading),
    Frame(CameraFrame),
}

/// Decode a raw payload for a source of `kind`
pub fn decode(kind: SourceKind, payload: &Value, policy: MissingFieldPolicy) -> Result<Reading> {
    if !payload.is_object() {
        return Err(Error::Decode(format!("Payload is not an object: {}", payload)));
    }

    match kind {
        SourceKind::ScalarSensor => {
            let ph = numeric_field(payload, PH_FIELD, policy)?;
            let tds = numeric_field(payload, TDS_FIELD, policy)?;
            Ok(Reading::Sensor(SensorReading {
                features: WaterFeatures { ph, tds },
                observed_at: ObservedAt::from_payload(payload, SENSOR_TS_FIELDS)?,
            }))
        }
        SourceKind::ImageFrame => {
            let encoded = IMAGE_FIELDS
                .iter()
                .find_map(|f| payload.get(*f).and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::Decode("Frame has no image data".to_string()))?;
            Ok(Reading::Frame(CameraFrame {
                image: DecodedImage::from_base64(encoded)?,
                observed_at: ObservedAt::from_payload(payload, FRAME_TS_FIELDS)?,
            }))
        }
    }
}

/// Numbers or numeric strings; absence handled per `policy`
fn numeric_field(payload: &Value, field: &str, policy: MissingFieldPolicy) -> Result<f64> {
    let value = match payload.get(field) {
        None | Some(Value::Null) => {
            return match policy {
                MissingFieldPolicy::ZeroDefault => {
                    tracing::debug!(field = %field, "Sensor field missing, using 0.0");
                    Ok(0.0)
                }
                MissingFieldPolicy::Strict => {
                    Err(Error::Decode(format!("Missing sensor field {}", field)))
                }
            };
        }
        Some(v) => v,
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(Error::Decode(format!("Field {} is not numeric: {}", field, value))),
    }
}
