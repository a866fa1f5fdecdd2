//! End-to-end tests against a local `TcpListener`, exercising the
//! engine without any real network access.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpclient::{Engine, HttpMethod, RequestInfo, ResponseHandler};

/// Spawn a one-shot server that accepts a single connection, reads
/// the full request, then writes `response` and closes.
fn serve_once(response: &'static [u8]) -> (String, std::thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local listener");
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let request = read_request(&mut stream);
        stream.write_all(response).unwrap();
        stream.flush().unwrap();
        request
    });
    (format!("http://{addr}"), handle)
}

fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    buf
}

struct Collected {
    status: Option<u16>,
    headers: std::collections::HashMap<String, String>,
    body: Vec<u8>,
    errored: bool,
}

fn run_request(info: RequestInfo) -> (Collected, Receiver<()>) {
    let (tx, rx) = channel();
    let collected = Arc::new(Mutex::new(Collected {
        status: None,
        headers: std::collections::HashMap::new(),
        body: Vec::new(),
        errored: false,
    }));

    let mut handler = ResponseHandler::default();
    let c1 = collected.clone();
    handler.on_parse_header_done = Some(Arc::new(move |_id, header| {
        let mut c = c1.lock().unwrap();
        c.status = Some(header.status_code);
        c.headers = header.headers.clone();
    }));
    let c2 = collected.clone();
    handler.on_data = Some(Arc::new(move |_id, data| {
        c2.lock().unwrap().body.extend_from_slice(data.view());
    }));
    let tx1 = tx.clone();
    handler.on_disconnected = Some(Arc::new(move |_id| {
        let _ = tx1.send(());
    }));
    let c3 = collected.clone();
    let tx2 = tx.clone();
    handler.on_error = Some(Arc::new(move |_id, _err| {
        c3.lock().unwrap().errored = true;
        let _ = tx2.send(());
    }));

    let engine = Engine::new(info, handler);
    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        Err(RecvTimeoutError::Timeout) => panic!("request did not complete in time"),
    }
    drop(engine);

    let guard = Arc::try_unwrap(collected).unwrap_or_else(|_| panic!("callback still holds a reference"));
    (guard.into_inner().unwrap(), rx)
}

#[test]
fn plain_get_receives_status_and_body() {
    let (url, server) = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain\r\n\r\nhello",
    );
    let info = RequestInfo {
        url,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (collected, _rx) = run_request(info);
    assert_eq!(collected.status, Some(200));
    assert_eq!(collected.body, b"hello");

    let request = server.join().unwrap();
    let text = String::from_utf8_lossy(&request);
    assert!(text.starts_with("GET / HTTP/1.1\r\n"));
    assert!(text.contains("Host: 127.0.0.1\r\n"));
}

#[test]
fn chunked_body_is_reassembled() {
    let (url, _server) = serve_once(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
    );
    let info = RequestInfo {
        url,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (collected, _rx) = run_request(info);
    assert_eq!(collected.status, Some(200));
    assert_eq!(collected.body, b"Wikipedia");
}

#[test]
fn basic_auth_header_is_synthesized() {
    let (url, server) = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    let base_url = url.replacen("http://", "http://user:pass@", 1);
    let info = RequestInfo {
        url: base_url,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (collected, _rx) = run_request(info);
    assert_eq!(collected.status, Some(200));

    let request = server.join().unwrap();
    let text = String::from_utf8_lossy(&request);
    let expected = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, "user:pass");
    assert!(text.contains(&format!("Authorization: Basic {expected}\r\n")));
}

#[test]
fn unknown_method_reports_method_error() {
    let info = RequestInfo {
        url: "http://127.0.0.1:1".to_string(),
        method: HttpMethod::Unknown,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (collected, _rx) = run_request(info);
    assert!(collected.errored);
    assert!(collected.status.is_none());
}

#[test]
fn invalid_url_reports_error_without_connecting() {
    let info = RequestInfo {
        url: "not-a-url".to_string(),
        method: HttpMethod::Get,
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let (collected, _rx) = run_request(info);
    assert!(collected.errored);
}
