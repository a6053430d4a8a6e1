#![allow(dead_code)]

use once_cell::sync::Lazy;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tokio::sync::Mutex;

use sshlink::services::logger::{LogLevel, Logger};
use sshlink::{ClientConfig, SshSession};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// A port on loopback that nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

/// Accepts one connection and never sends a byte. The socket stays open
/// for `hold`.
pub fn silent_server(hold: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            thread::sleep(hold);
            drop(stream);
        }
    });
    port
}

/// Accepts one connection, answers with something that is not SSH, then
/// hangs up.
pub fn garbage_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n");
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(50));
            let _ = stream.shutdown(std::net::Shutdown::Both);
            drop::<TcpStream>(stream);
        }
    });
    port
}

pub fn quiet_logger(context: &str) -> Logger {
    Logger::capturing(context, LogLevel::Debug)
}

pub fn local_session(port: u16) -> SshSession {
    let session = SshSession::with_config(
        "127.0.0.1",
        port,
        ClientConfig::default(),
        quiet_logger("test"),
    );
    session.set_user("tester").expect("set user");
    session
}
