//! Wire types for the Reolink CGI JSON API.
//!
//! Requests are a batch (JSON array) of commands; the camera answers with an
//! array holding one result per command, in order.

use crate::error::{BridgeError, Result};
use crate::motion::MotionState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command name for the motion-detection state query.
pub const CMD_GET_MD_STATE: &str = "GetMdState";

/// One entry of a command batch.
#[derive(Debug, Clone, Serialize)]
pub struct Command<P> {
    pub cmd: &'static str,
    pub action: u8,
    pub param: P,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelParam {
    pub channel: u8,
}

/// Build the one-element batch asking for the motion state of a channel.
pub fn get_md_state(channel: u8) -> [Command<ChannelParam>; 1] {
    [Command {
        cmd: CMD_GET_MD_STATE,
        action: 0,
        param: ChannelParam { channel },
    }]
}

/// One entry of the camera's response batch.
#[derive(Debug, Deserialize)]
struct CommandResult {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<CommandError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandError {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    rsp_code: Option<i64>,
}

/// Parse a `GetMdState` response body.
///
/// `[0].value.state == 1` means motion; any other integer means quiet.
/// Every other shape is an error so the caller can skip the cycle.
pub fn parse_md_state(body: &[u8]) -> Result<MotionState> {
    let results: Vec<CommandResult> = serde_json::from_slice(body)
        .map_err(|e| BridgeError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let first = results
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::MalformedResponse("empty response array".to_string()))?;

    if let Some(error) = first.error {
        return Err(BridgeError::DeviceError {
            code: error.rsp_code.unwrap_or(first.code),
            detail: error.detail.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    if first.code != 0 {
        return Err(BridgeError::DeviceError {
            code: first.code,
            detail: "command failed".to_string(),
        });
    }

    let state = first
        .value
        .as_ref()
        .and_then(|value| value.get("state"))
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::MalformedResponse("missing value.state".to_string()))?;

    Ok(MotionState::from_detected(state == 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(get_md_state(1)).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{"cmd": "GetMdState", "action": 0, "param": {"channel": 1}}])
        );
    }

    #[test]
    fn test_parse_motion_and_quiet() {
        let motion = br#"[{"cmd":"GetMdState","code":0,"value":{"state":1}}]"#;
        let quiet = br#"[{"cmd":"GetMdState","code":0,"value":{"state":0}}]"#;

        assert_eq!(parse_md_state(motion).unwrap(), MotionState::Motion);
        assert_eq!(parse_md_state(quiet).unwrap(), MotionState::Quiet);
    }

    #[test]
    fn test_parse_only_one_means_motion() {
        let body = br#"[{"cmd":"GetMdState","code":0,"value":{"state":2}}]"#;
        assert_eq!(parse_md_state(body).unwrap(), MotionState::Quiet);
    }

    #[test]
    fn test_parse_device_error() {
        let body = br#"[{"cmd":"GetMdState","code":1,"error":{"detail":"please login first","rspCode":-6}}]"#;
        match parse_md_state(body) {
            Err(BridgeError::DeviceError { code, detail }) => {
                assert_eq!(code, -6);
                assert_eq!(detail, "please login first");
            }
            other => panic!("expected device error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_malformed_shapes() {
        let cases: [&[u8]; 5] = [
            b"not json",
            b"{}",
            b"[]",
            br#"[{"cmd":"GetMdState","code":0}]"#,
            br#"[{"cmd":"GetMdState","code":0,"value":{"state":"1"}}]"#,
        ];
        for body in cases {
            let err = parse_md_state(body).unwrap_err();
            assert!(err.is_malformed(), "{:?} -> {:?}", String::from_utf8_lossy(body), err);
        }
    }
}
