//! Envelope codec.
//!
//! Frames are UTF-8 JSON objects of the form `{"type": <kind>, "payload": ...}`.
//! `type` must be one of `detection | gesture | voice | info`.
//!
//! | Kind | Payload |
//! |---|---|
//! | `detection` | one detection object, or an array of them |
//! | `gesture` | `{"type": "thumbs_up" \| "peace" \| "none" \| ...}` |
//! | `voice` | a transcript string |
//! | `info` | anything; non-strings are kept as their JSON text |
//!
//! Decoding never panics: every problem surfaces as
//! [`PulseError::Decode`] so the caller can log and drop the frame.

use scenepulse_types::{
    Detection, Envelope, Event, EventKind, Gesture, PulseError, Vec3, VoiceCommand,
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct RawDetection {
    class: String,
    confidence: f32,
    x: Option<f32>,
    y: Option<f32>,
    z: Option<f32>,
}

impl RawDetection {
    fn into_detection(self) -> Detection {
        let fallback = Detection::DEFAULT_POSITION;
        let position_estimated = self.x.is_none() || self.y.is_none() || self.z.is_none();
        Detection {
            class: self.class,
            confidence: self.confidence.clamp(0.0, 1.0),
            position: Vec3::new(
                self.x.unwrap_or(fallback.x),
                self.y.unwrap_or(fallback.y),
                self.z.unwrap_or(fallback.z),
            ),
            position_estimated,
        }
    }
}

/// Decode one text frame into a stamped [`Envelope`].
pub fn decode_frame(text: &str) -> Result<Envelope, PulseError> {
    let raw: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| PulseError::Decode(format!("invalid envelope: {e}")))?;
    let kind: EventKind = raw.kind.parse()?;
    let event = decode_payload(kind, raw.payload)?;
    Ok(Envelope::new(event))
}

fn decode_payload(kind: EventKind, payload: Value) -> Result<Event, PulseError> {
    match kind {
        EventKind::Detection => decode_detections(payload).map(Event::Detection),
        EventKind::Gesture => serde_json::from_value::<Gesture>(payload)
            .map(Event::Gesture)
            .map_err(|e| PulseError::Decode(format!("invalid gesture payload: {e}"))),
        EventKind::Voice => match payload {
            Value::String(text) => Ok(Event::Voice(VoiceCommand(text))),
            other => Err(PulseError::Decode(format!(
                "voice payload must be a string, got {other}"
            ))),
        },
        EventKind::Info => Ok(Event::Info(match payload {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })),
    }
}

/// Normalise a detection payload to a sequence.
fn decode_detections(payload: Value) -> Result<Vec<Detection>, PulseError> {
    let items = match payload {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        other => {
            return Err(PulseError::Decode(format!(
                "detection payload must be an object or array, got {other}"
            )));
        }
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<RawDetection>(item)
                .map(RawDetection::into_detection)
                .map_err(|e| PulseError::Decode(format!("invalid detection: {e}")))
        })
        .collect()
}

/// Build the wire frame for an outbound message.
pub fn encode_frame(kind: EventKind, payload: &Value) -> String {
    json!({
        "type": kind.as_str(),
        "payload": payload,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepulse_types::GestureKind;

    #[test]
    fn single_detection_is_normalised_to_sequence() {
        let frame = r#"{"type":"detection","payload":{"class":"person","confidence":0.9,"x":1,"y":2,"z":3}}"#;
        let env = decode_frame(frame).unwrap();
        match env.event {
            Event::Detection(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].class, "person");
                assert_eq!(list[0].position, Vec3::new(1.0, 2.0, 3.0));
                assert!(!list[0].position_estimated);
            }
            other => panic!("expected detection, got {other:?}"),
        }
    }

    #[test]
    fn detection_array_keeps_order() {
        let frame = r#"{"type":"detection","payload":[
            {"class":"person","confidence":0.5,"x":0,"y":1,"z":0},
            {"class":"chair","confidence":0.7,"x":2,"y":1,"z":2}
        ]}"#;
        let env = decode_frame(frame).unwrap();
        let Event::Detection(list) = env.event else {
            panic!("expected detection");
        };
        let classes: Vec<_> = list.iter().map(|d| d.class.as_str()).collect();
        assert_eq!(classes, ["person", "chair"]);
    }

    #[test]
    fn missing_coordinates_use_documented_fallback() {
        let frame = r#"{"type":"detection","payload":[{"class":"cup","confidence":1.4,"x":2.5}]}"#;
        let Event::Detection(list) = decode_frame(frame).unwrap().event else {
            panic!("expected detection");
        };
        assert_eq!(list[0].position, Vec3::new(2.5, 1.0, 0.0));
        assert!(list[0].position_estimated);
        assert_eq!(list[0].confidence, 1.0);
    }

    #[test]
    fn gesture_voice_and_info_decode() {
        let g = decode_frame(r#"{"type":"gesture","payload":{"type":"peace"}}"#).unwrap();
        assert_eq!(
            g.event,
            Event::Gesture(Gesture {
                kind: GestureKind::Peace
            })
        );

        let v = decode_frame(r#"{"type":"voice","payload":"Turn red"}"#).unwrap();
        assert_eq!(v.event, Event::Voice(VoiceCommand("Turn red".to_string())));

        let i = decode_frame(r#"{"type":"info","payload":"Connected to mock WS server"}"#).unwrap();
        assert_eq!(i.event, Event::Info("Connected to mock WS server".to_string()));

        let i = decode_frame(r#"{"type":"info","payload":{"clients":2}}"#).unwrap();
        assert_eq!(i.event, Event::Info(r#"{"clients":2}"#.to_string()));
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        for frame in [
            "not json at all",
            r#"{"payload":"no type"}"#,
            r#"{"type":"telemetry","payload":{}}"#,
            r#"{"type":"voice","payload":42}"#,
            r#"{"type":"detection","payload":"person"}"#,
            r#"{"type":"detection","payload":[{"confidence":0.3}]}"#,
        ] {
            assert!(
                matches!(decode_frame(frame), Err(PulseError::Decode(_))),
                "frame should be rejected: {frame}"
            );
        }
    }

    #[test]
    fn encode_frame_wraps_kind_and_payload() {
        let frame = encode_frame(EventKind::Voice, &json!("spin"));
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "voice");
        assert_eq!(value["payload"], "spin");
    }
}
