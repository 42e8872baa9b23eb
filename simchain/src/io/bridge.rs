//! Engine backed by an external adapter process.
//!
//! Each session spawns a fresh adapter (`engine.command`), so no state can
//! leak from one case into the next. The adapter owns the real simulation
//! engine and answers one JSON object per line on stdout for every JSON
//! request line it reads on stdin:
//!
//! ```text
//! > {"op":"open","model":"/abs/power.apw","visible":false}
//! < {"ok":true}
//! > {"op":"find","address":"\\Data\\Streams\\FUEL\\Input\\TOTFLOW\\MIXED"}
//! < {"ok":true,"found":true}
//! > {"op":"set","address":"...","value":50.0}
//! > {"op":"run"}
//! > {"op":"get","address":"..."}
//! < {"ok":true,"value":250}
//! > {"op":"close","save":false}
//! ```
//!
//! Any reply may carry `"ok":false,"error":"..."`.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::{Value, Visibility};
use crate::error::{Result, SimError};
use crate::io::config::EngineConfig;
use crate::io::engine::Engine;

/// One request line.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request<'a> {
    Open { model: &'a Path, visible: bool },
    Find { address: &'a str },
    Set { address: &'a str, value: &'a Value },
    Get { address: &'a str },
    Run,
    Close { save: bool },
}

/// One reply line.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default)]
    pub found: Option<bool>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    fn reason(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "bridge reported failure without a message".to_string())
    }

    /// Decode `value`; a missing or null value is [`Value::Empty`].
    fn decoded_value(&self) -> anyhow::Result<Value> {
        match &self.value {
            None | Some(serde_json::Value::Null) => Ok(Value::Empty),
            Some(raw) => serde_json::from_value(raw.clone())
                .with_context(|| format!("unsupported value {raw}")),
        }
    }
}

/// Line-oriented request/response channel.
pub struct Channel<W, R> {
    writer: W,
    reader: R,
}

impl<W: Write, R: BufRead> Channel<W, R> {
    pub fn new(writer: W, reader: R) -> Self {
        Self { writer, reader }
    }

    /// Send one request and wait for its reply.
    pub fn call(&mut self, request: &Request<'_>) -> anyhow::Result<Response> {
        self.send(request)?;
        read_reply(&mut self.reader)
    }

    /// Write one request line without waiting for a reply.
    pub fn send(&mut self, request: &Request<'_>) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(request).context("encode request")?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .context("write request")?;
        self.writer.flush().context("flush request")
    }

    pub fn into_parts(self) -> (W, R) {
        (self.writer, self.reader)
    }
}

fn read_reply<R: BufRead>(reader: &mut R) -> anyhow::Result<Response> {
    let mut reply = String::new();
    let read = reader.read_line(&mut reply).context("read reply")?;
    if read == 0 {
        return Err(anyhow!("bridge closed its output"));
    }
    let reply = reply.trim_end();
    serde_json::from_str(reply).with_context(|| format!("parse reply {reply:?}"))
}

/// Open adapter process bound to one model.
pub struct BridgeHandle {
    child: Child,
    channel: Channel<ChildStdin, BufReader<ChildStdout>>,
}

/// [`Engine`] that drives an adapter process per session.
#[derive(Debug, Clone)]
pub struct BridgeEngine {
    command: Vec<String>,
    close_timeout: Duration,
}

impl BridgeEngine {
    pub fn new(command: Vec<String>, close_timeout: Duration) -> Self {
        Self {
            command,
            close_timeout,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(
            cfg.command.clone(),
            Duration::from_secs(cfg.close_timeout_secs),
        )
    }

    fn spawn(&self) -> Result<BridgeHandle> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SimError::EngineUnavailable {
                reason: "engine command is empty".to_string(),
            })?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| SimError::EngineUnavailable {
                reason: format!("spawn {program}: {err}"),
            })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            kill_quietly(&mut child);
            return Err(SimError::EngineUnavailable {
                reason: "bridge pipes were not captured".to_string(),
            });
        };
        debug!(program = %program, pid = child.id(), "bridge spawned");
        Ok(BridgeHandle {
            child,
            channel: Channel::new(stdin, BufReader::new(stdout)),
        })
    }
}

impl Engine for BridgeEngine {
    type Handle = BridgeHandle;
    type Node = String;

    #[instrument(skip_all, fields(model = %model.display()))]
    fn open(&self, model: &Path, visibility: Visibility) -> Result<BridgeHandle> {
        if !model.is_file() {
            return Err(SimError::ModelNotFound {
                path: model.to_path_buf(),
            });
        }
        let model = std::path::absolute(model).unwrap_or_else(|_| model.to_path_buf());
        let mut handle = self.spawn()?;
        let reply = handle.channel.call(&Request::Open {
            model: &model,
            visible: visibility.is_visible(),
        });
        match reply {
            Ok(reply) if reply.ok => Ok(handle),
            Ok(reply) => {
                kill_quietly(&mut handle.child);
                Err(SimError::EngineUnavailable {
                    reason: reply.reason(),
                })
            }
            Err(err) => {
                kill_quietly(&mut handle.child);
                Err(SimError::EngineUnavailable {
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    fn find(&self, handle: &mut BridgeHandle, address: &str) -> Result<Option<String>> {
        let reply = handle
            .channel
            .call(&Request::Find { address })
            .map_err(|err| transport("find", &err))?;
        if !reply.ok {
            return Err(SimError::EngineFault {
                operation: "find",
                reason: reply.reason(),
            });
        }
        Ok(reply
            .found
            .unwrap_or(false)
            .then(|| address.to_string()))
    }

    fn set_value(&self, handle: &mut BridgeHandle, node: &String, value: &Value) -> Result<()> {
        let reply = handle
            .channel
            .call(&Request::Set {
                address: node,
                value,
            })
            .map_err(|err| transport("set", &err))?;
        if !reply.ok {
            return Err(SimError::EngineFault {
                operation: "set",
                reason: reply.reason(),
            });
        }
        Ok(())
    }

    fn get_value(&self, handle: &mut BridgeHandle, node: &String) -> Result<Value> {
        let reply = handle
            .channel
            .call(&Request::Get { address: node })
            .map_err(|err| transport("get", &err))?;
        if !reply.ok {
            return Err(SimError::EngineFault {
                operation: "get",
                reason: reply.reason(),
            });
        }
        reply.decoded_value().map_err(|err| transport("get", &err))
    }

    #[instrument(skip_all)]
    fn execute(&self, handle: &mut BridgeHandle) -> Result<()> {
        let reply = handle
            .channel
            .call(&Request::Run)
            .map_err(|err| SimError::EngineExecutionFailed {
                reason: format!("{err:#}"),
            })?;
        if !reply.ok {
            return Err(SimError::EngineExecutionFailed {
                reason: reply.reason(),
            });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(timeout_secs = self.close_timeout.as_secs()))]
    fn close(&self, handle: BridgeHandle) -> Result<()> {
        let deadline = Instant::now() + self.close_timeout;
        let BridgeHandle {
            mut child,
            mut channel,
        } = handle;
        let sent = channel.send(&Request::Close { save: false });
        let (stdin, mut reader) = channel.into_parts();
        // Closing stdin lets an adapter that ignored the request see EOF.
        drop(stdin);

        // The reply is read off-thread so a silent adapter cannot outlast the deadline.
        let (reply_tx, reply_rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = reply_tx.send(read_reply(&mut reader));
        });

        let status = child
            .wait_timeout(self.close_timeout)
            .map_err(|err| SimError::EngineFault {
                operation: "close",
                reason: format!("wait for bridge: {err}"),
            })?;
        let Some(status) = status else {
            warn!("bridge did not exit after close, killing");
            kill_quietly(&mut child);
            return Err(SimError::EngineFault {
                operation: "close",
                reason: format!("bridge did not exit within {:?}", self.close_timeout),
            });
        };

        if let Err(err) = sent {
            return Err(transport("close", &err));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        let reply = reply_rx
            .recv_timeout(remaining)
            .map_err(|_| SimError::EngineFault {
                operation: "close",
                reason: format!("no reply to close within {:?}", self.close_timeout),
            })?;

        match reply {
            Ok(reply) if !reply.ok => Err(SimError::EngineFault {
                operation: "close",
                reason: reply.reason(),
            }),
            Err(err) => Err(transport("close", &err)),
            Ok(_) if !status.success() => Err(SimError::EngineFault {
                operation: "close",
                reason: format!("bridge exited with status {:?}", status.code()),
            }),
            Ok(_) => Ok(()),
        }
    }
}

fn transport(operation: &'static str, err: &anyhow::Error) -> SimError {
    SimError::EngineFault {
        operation,
        reason: format!("{err:#}"),
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill bridge");
    }
    if let Err(err) = child.wait() {
        debug!(err = %err, "reap bridge");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;
    use std::io::Cursor;

    #[test]
    fn requests_are_tagged_json_lines() {
        let mut written = Vec::new();
        let replies = Cursor::new(b"{\"ok\":true}\n{\"ok\":true,\"found\":false}\n".to_vec());
        let mut channel = Channel::new(&mut written, replies);

        channel
            .call(&Request::Set {
                address: "B1",
                value: &Value::Real(50.0),
            })
            .expect("set");
        let reply = channel
            .call(&Request::Find { address: "B2" })
            .expect("find");
        assert_eq!(reply.found, Some(false));

        let text = String::from_utf8(written).expect("utf8");
        assert_eq!(
            text,
            "{\"op\":\"set\",\"address\":\"B1\",\"value\":50.0}\n{\"op\":\"find\",\"address\":\"B2\"}\n"
        );
    }

    #[test]
    fn run_and_close_encode_without_payload() {
        let run = serde_json::to_string(&Request::Run).expect("encode");
        assert_eq!(run, "{\"op\":\"run\"}");
        let close = serde_json::to_string(&Request::Close { save: false }).expect("encode");
        assert_eq!(close, "{\"op\":\"close\",\"save\":false}");
    }

    #[test]
    fn eof_is_a_transport_error() {
        let mut channel = Channel::new(Vec::new(), Cursor::new(Vec::new()));
        let err = channel.call(&Request::Run).unwrap_err();
        assert!(err.to_string().contains("closed its output"));
    }

    #[test]
    fn reply_values_decode_by_shape() {
        let reply: Response = serde_json::from_str("{\"ok\":true,\"value\":250}").expect("parse");
        assert_eq!(reply.decoded_value().expect("value"), Value::Integer(250));
        let reply: Response = serde_json::from_str("{\"ok\":true,\"value\":null}").expect("parse");
        assert_eq!(reply.decoded_value().expect("value"), Value::Empty);
        let reply: Response = serde_json::from_str("{\"ok\":true,\"value\":[1]}").expect("parse");
        assert!(reply.decoded_value().is_err());
    }

    #[test]
    fn missing_model_fails_before_spawning() {
        let engine = BridgeEngine::new(vec!["unused".to_string()], Duration::from_secs(1));
        let err = engine
            .open(Path::new("/nonexistent/power.apw"), Visibility::Hidden)
            .err()
            .expect("error");
        assert!(matches!(err, SimError::ModelNotFound { .. }));
    }

    #[test]
    fn unknown_command_is_unavailable() {
        let ws = TestWorkspace::new().expect("workspace");
        let model = ws.write("power.apw", "").expect("model");
        let engine = BridgeEngine::new(
            vec!["simchain-bridge-that-does-not-exist".to_string()],
            Duration::from_secs(1),
        );
        let err = engine
            .open(&model, Visibility::Hidden)
            .err()
            .expect("error");
        assert!(matches!(err, SimError::EngineUnavailable { .. }));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::fs;

        use crate::case::CaseRunner;
        use crate::core::io_map::IoMap;
        use crate::core::types::Reading;
        use crate::test_support::named;

        const RUN_OK: &str = r#"echo '{"ok":true}'"#;
        const CLOSE_OK: &str = r#"echo '{"ok":true}'; exit 0"#;

        const MAP: &str = "
input_paths:
  fuelfeed: IN.FUEL
output_paths:
  work: OUT.WORK
  qloss: OUT.MISSING
";

        /// Shell adapter answering every op; `run` and `close` are scripted.
        fn adapter(ws: &TestWorkspace, on_run: &str, on_close: &str, timeout: Duration) -> BridgeEngine {
            let marker = ws.path().join("closed.log");
            let script = format!(
                r#"while IFS= read -r line; do
  case "$line" in
    *'"op":"open"'*) echo '{{"ok":true}}' ;;
    *'"op":"find"'*MISSING*) echo '{{"ok":true,"found":false}}' ;;
    *'"op":"find"'*) echo '{{"ok":true,"found":true}}' ;;
    *'"op":"set"'*) echo '{{"ok":true}}' ;;
    *'"op":"run"'*) {on_run} ;;
    *'"op":"get"'*) echo '{{"ok":true,"value":250}}' ;;
    *'"op":"close"'*) echo closed >> '{marker}'; {on_close} ;;
  esac
done
"#,
                marker = marker.display()
            );
            let path = ws.write("adapter.sh", &script).expect("adapter");
            BridgeEngine::new(
                vec!["sh".to_string(), path.display().to_string()],
                timeout,
            )
        }

        fn closes(ws: &TestWorkspace) -> usize {
            fs::read_to_string(ws.path().join("closed.log"))
                .map(|log| log.lines().count())
                .unwrap_or(0)
        }

        fn io_map() -> IoMap {
            IoMap::from_yaml_str(MAP, "power_paths.yaml").expect("map")
        }

        #[test]
        fn case_runs_over_adapter_process() {
            let ws = TestWorkspace::new().expect("workspace");
            let model = ws.write("power.apw", "").expect("model");
            let engine = adapter(&ws, RUN_OK, CLOSE_OK, Duration::from_secs(5));
            let runner = CaseRunner::new(&engine, Visibility::Hidden);

            let result = runner
                .run_case(&model, &io_map(), &named(&[("fuelfeed", 50.0)]))
                .expect("run");

            assert_eq!(result.output("work"), Some(&Value::Integer(250)));
            assert_eq!(result.outputs["qloss"], Reading::Absent);
            assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
            assert_eq!(closes(&ws), 1);
        }

        #[test]
        fn failed_run_is_execution_error_and_still_closes() {
            let ws = TestWorkspace::new().expect("workspace");
            let model = ws.write("power.apw", "").expect("model");
            let engine = adapter(
                &ws,
                r#"echo '{"ok":false,"error":"did not converge"}'"#,
                CLOSE_OK,
                Duration::from_secs(5),
            );
            let runner = CaseRunner::new(&engine, Visibility::Hidden);

            let err = runner
                .run_case(&model, &io_map(), &named(&[("fuelfeed", 50.0)]))
                .unwrap_err();

            assert!(
                matches!(&err, SimError::EngineExecutionFailed { reason } if reason == "did not converge"),
                "{err}"
            );
            assert_eq!(closes(&ws), 1);
        }

        #[test]
        fn silent_close_is_bounded_by_timeout() {
            let ws = TestWorkspace::new().expect("workspace");
            let model = ws.write("power.apw", "").expect("model");
            let engine = adapter(&ws, RUN_OK, "sleep 8", Duration::from_secs(1));
            let handle = engine
                .open(&model, Visibility::Hidden)
                .map_err(|err| err.to_string())
                .expect("open");

            let started = Instant::now();
            let err = engine.close(handle).unwrap_err();

            assert!(
                started.elapsed() < Duration::from_secs(4),
                "close took {:?}",
                started.elapsed()
            );
            assert!(
                matches!(err, SimError::EngineFault { operation: "close", .. }),
                "{err}"
            );
        }

        #[test]
        fn slow_close_becomes_a_diagnostic() {
            let ws = TestWorkspace::new().expect("workspace");
            let model = ws.write("power.apw", "").expect("model");
            let engine = adapter(&ws, RUN_OK, "sleep 8", Duration::from_secs(1));
            let runner = CaseRunner::new(&engine, Visibility::Hidden);

            let started = Instant::now();
            let result = runner
                .run_case(&model, &io_map(), &named(&[("fuelfeed", 50.0)]))
                .expect("run");

            assert!(started.elapsed() < Duration::from_secs(4));
            assert_eq!(result.output("work"), Some(&Value::Integer(250)));
            assert_eq!(result.diagnostics.len(), 1);
            assert!(result.diagnostics[0].message.contains("did not exit"));
        }
    }
}
