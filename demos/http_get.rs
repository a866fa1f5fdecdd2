//! Console demo: issue one GET request and print status, headers, and
//! body as they stream in.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use httpclient::{Engine, HttpMethod, RequestInfo, ResponseHandler};

fn main() {
    let url = std::env::args().nth(1).unwrap_or_else(|| "http://example.com".to_string());

    httpclient::init::init();

    let info = RequestInfo {
        url,
        method: HttpMethod::Get,
        timeout: Duration::from_secs(30),
        ..Default::default()
    };

    let done = Arc::new((Mutex::new(false), Condvar::new()));
    let done_connected = done.clone();
    let done_header = done.clone();
    let done_data = done.clone();
    let done_disconnected = done.clone();
    let done_error = done.clone();

    let mut handler = ResponseHandler::default();
    handler.on_connected = Some(Arc::new(move |req_id| {
        eprintln!("connected: {req_id}");
        let _ = &done_connected;
    }));
    handler.on_parse_header_done = Some(Arc::new(move |_req_id, header| {
        println!("HTTP {} {}", header.status_code, header.reason_phrase);
        for (name, value) in &header.headers {
            println!("{name}: {value}");
        }
        println!();
        let _ = &done_header;
    }));
    handler.on_data = Some(Arc::new(move |_req_id, data| {
        print!("{}", String::from_utf8_lossy(data.view()));
        let _ = &done_data;
    }));
    handler.on_disconnected = Some(Arc::new(move |_req_id| {
        let (lock, cvar) = &*done_disconnected;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }));
    handler.on_error = Some(Arc::new(move |req_id, error| {
        eprintln!("error: reqId={req_id}, {error}");
        let (lock, cvar) = &*done_error;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }));

    let engine = Engine::new(info, handler);
    eprintln!("reqId: {}", engine.req_id());

    let (lock, cvar) = &*done;
    let mut finished = lock.lock().unwrap();
    while !*finished {
        finished = cvar.wait(finished).unwrap();
    }

    httpclient::init::clear();
}
