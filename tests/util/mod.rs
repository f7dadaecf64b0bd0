use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use uitest_report::driver::{DriverError, UiDriver};
use uitest_report::hierarchy::traversal::UiElement;
use uitest_report::upload::{RawResponse, Transport, TransportError, UploadRequest};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// A test source file on disk with numbered statements.
#[allow(dead_code)]
pub struct SourceFixture {
    _dir: TempDir,
    pub path: PathBuf,
}

#[allow(dead_code)]
impl SourceFixture {
    /// `LoginTests.swift` with `count` lines of the form `step_N()`.
    pub fn numbered(count: u32) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("LoginTests.swift");
        let body: String = (1..=count).map(|i| format!("        step_{i}()\n")).collect();
        std::fs::write(&path, body).expect("write fixture");
        Self { _dir: dir, path }
    }
}

/// One request received by a [`CannedServer`].
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request line and headers.
    pub head: String,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl CapturedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head
            .lines()
            .find(|l| l.to_ascii_lowercase().starts_with(&prefix))
            .map(|l| l[prefix.len()..].trim().to_string())
    }
}

/// Loopback HTTP server answering every request with the same status and body.
#[allow(dead_code)]
pub struct CannedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

#[allow(dead_code)]
impl CannedServer {
    pub fn start(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = serve(stream, status, body, &seen);
            }
        });
        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}/api/v1/session/upload", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Read one request and record it before answering.
fn serve(
    stream: TcpStream,
    status: u16,
    body: &str,
    seen: &Mutex<Vec<CapturedRequest>>,
) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        if line == "\r\n" {
            break;
        }
        let lowered = line.to_ascii_lowercase();
        if let Some(len) = lowered.strip_prefix("content-length:") {
            content_length = len.trim().parse().unwrap_or(0);
        }
        head.push_str(line.trim_end());
        head.push('\n');
    }
    let mut request_body = vec![0u8; content_length];
    reader.read_exact(&mut request_body).ok()?;
    seen.lock().unwrap().push(CapturedRequest {
        head,
        body: request_body,
    });

    let response = format!(
        "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = stream;
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()
}

/// URL of a loopback port with nothing listening.
#[allow(dead_code)]
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/api/v1/session/upload")
}

/// In-memory transport that records payloads and answers with one status.
#[allow(dead_code)]
pub struct RecordingTransport {
    status: u16,
    bodies: Mutex<Vec<Vec<u8>>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            bodies: Mutex::new(Vec::new()),
        })
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_slice(b).expect("payload is JSON"))
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn post(&self, request: &UploadRequest<'_>) -> Result<RawResponse, TransportError> {
        self.bodies.lock().unwrap().push(request.body.to_vec());
        Ok(RawResponse {
            status: self.status,
            body: Some(b"{}".to_vec()),
        })
    }
}

/// Driver with no live tree, answering with a fixed screenshot and dump.
#[allow(dead_code)]
pub struct DumpDriver {
    pub png: Vec<u8>,
    pub dump: String,
}

#[allow(dead_code)]
impl DumpDriver {
    pub fn new(dump: impl Into<String>) -> Self {
        Self {
            png: vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
            dump: dump.into(),
        }
    }
}

impl UiDriver for DumpDriver {
    fn screenshot_png(&self) -> Result<Vec<u8>, DriverError> {
        Ok(self.png.clone())
    }

    fn root_element(&self) -> Option<Box<dyn UiElement + '_>> {
        None
    }

    fn debug_dump(&self) -> Result<String, DriverError> {
        Ok(self.dump.clone())
    }
}

/// Debug description of a small login screen.
#[allow(dead_code)]
pub const LOGIN_SCREEN_DUMP: &str = "\
Attributes: Application, 0x600000c1c000, pid: 4242, label: 'Demo'
Element subtree:
 →Application, 0x600000c1c000, pid: 4242, label: 'Demo'
    Window (Main), 0x600000c1c1c0, {{0.0, 0.0}, {390.0, 844.0}}
      Other, 0x600000c1c2a0, {{0.0, 0.0}, {390.0, 844.0}}
        NavigationBar, 0x600000c1c310, {{0.0, 47.0}, {390.0, 44.0}}, identifier: 'Sign In'
          StaticText, 0x600000c1c320, {{160.0, 58.0}, {70.0, 22.0}}, label: 'Sign In'
        TextField, 0x600000c1c380, {{16.0, 140.0}, {358.0, 44.0}}, identifier: 'email', placeholderValue: 'Email'
        SecureTextField, 0x600000c1c460, {{16.0, 200.0}, {358.0, 44.0}}, identifier: 'password', placeholderValue: 'Password'
        Button, 0x600000c1c540, {{16.0, 260.0}, {358.0, 50.0}}, identifier: 'login', label: 'Log In', Disabled
    Window, 0x600000c1c600, {{0.0, 0.0}, {390.0, 844.0}}
Path to element:
 →Application, 0x600000c1c000, pid: 4242, label: 'Demo'
Query chain:
 →Find: Target Application 'com.example.demo'
";
