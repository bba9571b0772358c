//! Line codec for the IVA protocol.
//!
//! Outbound messages are flat JSON objects, one per `\n`-terminated line.
//! Inbound replies are plain text: the literal `OK`, a payload whose shape
//! depends on the instruction that was sent, or an error message.

use serde::{Deserialize, Serialize};

use crate::geometry::{JointCoord, Transform};
use crate::packets::{FieldMap, FieldValue};
use crate::ProtocolError;

pub const ACK: &str = "OK";

/// Encodes one field map as one wire line, including the trailing newline.
pub fn encode(fields: &FieldMap) -> Result<String, ProtocolError> {
    for (key, value) in fields.iter() {
        if has_line_break(key) {
            return Err(unencodable(key, "key contains a line break"));
        }
        match value {
            FieldValue::Text(text) if has_line_break(text) => {
                return Err(unencodable(key, "value contains a line break"));
            }
            FieldValue::Number(n) if !n.is_finite() => {
                return Err(unencodable(key, "value is not a finite number"));
            }
            _ => {}
        }
    }

    let mut line = serde_json::to_string(fields).map_err(|e| unencodable("<map>", &e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Parses a line produced by [`encode`] back into its field map.
pub fn decode(line: &str) -> Result<FieldMap, ProtocolError> {
    serde_json::from_str(line.trim_end_matches(['\r', '\n']))
        .map_err(|e| ProtocolError::MalformedResponse(format!("{}: `{}`", e, line.trim_end())))
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

fn unencodable(field: &str, reason: &str) -> ProtocolError {
    ProtocolError::UnencodableValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Reply shape the caller expects for the instruction it just sent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ack,
    Transform,
    JointCoord,
    Digital,
    Gripper,
    Data,
}

/// A decoded controller reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    /// Anything other than the expected reply, verbatim.
    Rejected(String),
    Transform(Transform),
    JointCoord(JointCoord),
    Digital(bool),
    /// Gripper opening in percent.
    Gripper(f64),
    Data(String),
}

impl_extract_inner!(Response, Transform, Transform);
impl_extract_inner!(Response, JointCoord, JointCoord);
impl_extract_inner!(Response, Digital, bool);
impl_extract_inner!(Response, Gripper, f64);
impl_extract_inner!(Response, Data, String);

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    pub fn rejection(&self) -> Option<&str> {
        match self {
            Response::Rejected(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Decodes a reply line according to what the sent instruction expects.
///
/// An exact `OK` is always [`Response::Ok`]. A reply that looks like the
/// expected payload but cannot be parsed is a [`ProtocolError`]; anything
/// else is handed back as [`Response::Rejected`] for the caller to judge.
pub fn decode_response(line: &str, kind: ResponseKind) -> Result<Response, ProtocolError> {
    let text = line.trim();
    if text.is_empty() {
        return Err(ProtocolError::MalformedResponse("empty reply".to_string()));
    }
    if text == ACK {
        return Ok(Response::Ok);
    }

    let rejected = || Ok(Response::Rejected(text.to_string()));
    match kind {
        ResponseKind::Ack => rejected(),
        ResponseKind::Transform => {
            if text.starts_with('{') && text.contains("rx") {
                Transform::from_robot(text).map(Response::Transform)
            } else {
                rejected()
            }
        }
        ResponseKind::JointCoord => {
            if text.contains("joints") {
                JointCoord::from_robot(text).map(Response::JointCoord)
            } else {
                rejected()
            }
        }
        ResponseKind::Digital => match text {
            "True" => Ok(Response::Digital(true)),
            "False" => Ok(Response::Digital(false)),
            _ => rejected(),
        },
        ResponseKind::Gripper => match text.parse::<f64>() {
            Ok(fraction) if fraction.is_finite() => Ok(Response::Gripper(fraction * 100.0)),
            _ => rejected(),
        },
        ResponseKind::Data => {
            if text.starts_with("Error") {
                rejected()
            } else {
                Ok(Response::Data(text.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtractInner;

    #[test]
    fn encode_is_one_terminated_line() {
        let map = FieldMap::new().with("type", "pop");
        assert_eq!(encode(&map).unwrap(), "{\"type\":\"pop\"}\n");
    }

    #[test]
    fn encode_rejects_line_breaks_and_nan() {
        let newline = FieldMap::new().with("label", "open\nclose");
        assert!(matches!(
            encode(&newline),
            Err(ProtocolError::UnencodableValue { field, .. }) if field == "label"
        ));

        let cr_key = FieldMap::new().with("a\r", 1);
        assert!(encode(&cr_key).is_err());

        let nan = FieldMap::new().with("x", f64::NAN);
        assert!(matches!(encode(&nan), Err(ProtocolError::UnencodableValue { .. })));
    }

    #[test]
    fn ok_is_success_for_every_kind() {
        for kind in [ResponseKind::Ack, ResponseKind::Transform, ResponseKind::Data] {
            assert_eq!(decode_response("OK\r\n", kind).unwrap(), Response::Ok);
        }
    }

    #[test]
    fn anything_else_is_rejected_with_text() {
        let resp = decode_response("Error: motion blocked", ResponseKind::Ack).unwrap();
        assert_eq!(resp.rejection(), Some("Error: motion blocked"));
        assert!(matches!(
            decode_response("", ResponseKind::Ack),
            Err(ProtocolError::MalformedResponse(_))
        ));
    }

    #[test]
    fn typed_payloads() {
        let pose = decode_response(
            "{x : 0.1, y : 0.0, z : 0.25, rx : 0.0, ry : 0.0, rz : 3.14159265, }",
            ResponseKind::Transform,
        )
        .unwrap();
        let pose: Transform = pose.into_inner().unwrap();
        assert!((pose.x() - 100.0).abs() < 1e-9);
        assert!((pose.rz() - 180.0).abs() < 1e-6);

        let grip = decode_response("0.42", ResponseKind::Gripper).unwrap();
        let width: &f64 = grip.as_inner().unwrap();
        assert!((width - 42.0).abs() < 1e-9);

        let digital = |line| decode_response(line, ResponseKind::Digital).unwrap();
        assert_eq!(digital("True"), Response::Digital(true));
        assert_eq!(digital("False"), Response::Digital(false));

        let missing = decode_response("Error key not found", ResponseKind::Data).unwrap();
        assert!(missing.rejection().is_some());
    }

    #[test]
    fn incomplete_pose_is_malformed() {
        let err =
            decode_response("{x : 0.1, y : 0.0, rx : 0.0}", ResponseKind::Transform).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedResponse(_)));
    }
}
