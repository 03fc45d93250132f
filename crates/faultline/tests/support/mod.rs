//! Shared collector stub for integration tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::time::Duration;

/// Minimal one-request-per-connection HTTP collector: answers 200 and
/// forwards each request body on a channel.
pub fn spawn_collector_stub() -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub collector");
    let addr = listener.local_addr().expect("stub collector addr");
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let tx = tx.clone();
            std::thread::spawn(move || {
                let _ = serve_one(&mut stream, &tx);
            });
        }
    });
    (format!("http://{addr}/error-report"), rx)
}

fn serve_one(stream: &mut TcpStream, tx: &mpsc::Sender<String>) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(body) = extract_body(&raw) {
            let _ = tx.send(body);
            stream.write_all(
                b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            )?;
            return Ok(());
        }
    }
}

/// Extract the request body once the headers and `content-length` bytes
/// have fully arrived.
fn extract_body(raw: &[u8]) -> Option<String> {
    let header_end = raw.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = String::from_utf8_lossy(&raw[..header_end]);
    let content_length: usize = headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })?;
    let body = &raw[header_end + 4..];
    if body.len() >= content_length {
        Some(String::from_utf8_lossy(&body[..content_length]).into_owned())
    } else {
        None
    }
}

pub fn recv_report(rx: &mpsc::Receiver<String>) -> String {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("a report should reach the collector")
}
