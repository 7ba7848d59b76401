//! Wire-format DTOs and framing for the `Compile`/`List` RPC surface.
//!
//! This crate is intentionally thin: it defines the serializable request and
//! reply shapes plus a length-prefixed JSON-lines codec, and nothing about
//! compiling or running code. The service logic lives in `sandbox_core` and
//! `lang_adapters`; `playground-cli` wires this crate's codec to a TCP
//! listener.

mod codec;

pub use codec::{read_frame, write_frame, FrameError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use sandbox_core::{CompilerInfo, RunResult};

/// One `Compile` call's arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileArgs {
    pub code: String,
    pub lang: String,
}

/// One `Compile` call's reply — the externally visible shape of a
/// [`sandbox_core::RunResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileReply {
    pub cmd: String,
    pub error: String,
    #[serde(with = "duration_millis")]
    pub time: Duration,
    pub c_output: String,
    pub c_error: String,
    pub p_output: String,
    pub p_error: String,
}

impl From<RunResult> for CompileReply {
    fn from(result: RunResult) -> Self {
        Self {
            cmd: result.cmd.join(" "),
            error: result.error,
            time: result.time,
            c_output: result.compile_output,
            c_error: result.compile_error,
            p_output: result.program_output,
            p_error: result.program_error,
        }
    }
}

/// The full `List` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReply {
    pub compilers: Vec<CompilerInfo>,
}

impl From<Vec<CompilerInfo>> for ListReply {
    fn from(compilers: Vec<CompilerInfo>) -> Self {
        Self { compilers }
    }
}

/// One request envelope read off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    Compile(CompileArgs),
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcReply {
    Compile(CompileReply),
    List(ListReply),
    Error { message: String },
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reply_round_trips_through_json() {
        let reply = CompileReply {
            cmd: "gcc -o prog -".into(),
            error: String::new(),
            time: Duration::from_millis(42),
            c_output: String::new(),
            c_error: String::new(),
            p_output: "hello\n".into(),
            p_error: String::new(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let back: CompileReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back.p_output, "hello\n");
        assert_eq!(back.time, Duration::from_millis(42));
    }

    #[test]
    fn request_envelope_tags_compile_vs_list() {
        let req = RpcRequest::Compile(CompileArgs {
            code: "int main(){}".into(),
            lang: "c11".into(),
        });
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"op\":\"compile\""));
    }
}
