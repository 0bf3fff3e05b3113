#![cfg(all(unix, feature = "cli"))]

use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/skylink-loop-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("ephemeral bind should succeed");
    socket.local_addr().expect("bound socket has address").port()
}

fn spawn_receiver(addr: &str, header: &str, output: &PathBuf) -> Child {
    Command::new(env!("CARGO_BIN_EXE_skylink"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("receive")
        .arg("--bind")
        .arg(addr)
        .arg("--header")
        .arg(header)
        .arg("--count")
        .arg("1")
        .arg("--timeout")
        .arg("15s")
        .arg("--output")
        .arg(output)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("receive command should start")
}

/// Re-send until the receiver exits, since the first datagrams may arrive
/// before it has bound.
fn send_until_received(child: &mut Child, args: &[&str]) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        let status = Command::new(env!("CARGO_BIN_EXE_skylink"))
            .arg("--log-level")
            .arg("error")
            .args(args)
            .stdout(Stdio::null())
            .status()
            .expect("send should run");
        assert!(status.success(), "send failed: {status}");

        thread::sleep(Duration::from_millis(100));
        if let Some(status) = child.try_wait().expect("receiver should be waitable") {
            return status;
        }
        if start.elapsed() >= Duration::from_secs(10) {
            let _ = child.kill();
            let _ = child.wait();
            panic!("receiver never completed a frame");
        }
    }
}

#[test]
fn send_and_receive_frame_over_loopback() {
    let dir = unique_temp_dir("frame");
    let input = dir.join("payload.bin");
    let output = dir.join("received.bin");
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&input, &payload).expect("write should succeed");

    let addr = format!("127.0.0.1:{}", free_udp_port());
    let mut child = spawn_receiver(&addr, "frame", &output);
    thread::sleep(Duration::from_millis(200));

    let input_arg = input.to_string_lossy().to_string();
    let status = send_until_received(
        &mut child,
        &["send", &input_arg, "--to", &addr, "--mtu", "1400"],
    );
    assert!(status.success());

    let received = std::fs::read(&output).expect("output should exist");
    assert_eq!(received, payload);

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        use std::io::Read;
        let _ = pipe.read_to_string(&mut stdout);
    }
    assert!(stdout.contains("receive-report.schema.json"));
    assert!(stdout.contains("\"frames_completed\":1"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_and_receive_stream_chunk_over_loopback() {
    let dir = unique_temp_dir("stream");
    let input = dir.join("payload.bin");
    let output = dir.join("received.bin");
    std::fs::write(&input, b"stream payload").expect("write should succeed");

    let addr = format!("127.0.0.1:{}", free_udp_port());
    let mut child = spawn_receiver(&addr, "stream", &output);
    thread::sleep(Duration::from_millis(200));

    let input_arg = input.to_string_lossy().to_string();
    let status = send_until_received(
        &mut child,
        &["send", &input_arg, "--to", &addr, "--header", "stream"],
    );
    assert!(status.success());
    assert_eq!(
        std::fs::read(&output).expect("output should exist"),
        b"stream payload"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn receive_timeout_without_data_returns_124() {
    let dir = unique_temp_dir("timeout");
    let output = dir.join("received.bin");
    let addr = format!("127.0.0.1:{}", free_udp_port());

    let status = Command::new(env!("CARGO_BIN_EXE_skylink"))
        .arg("--log-level")
        .arg("error")
        .arg("receive")
        .arg("--bind")
        .arg(&addr)
        .arg("--count")
        .arg("1")
        .arg("--timeout")
        .arg("300ms")
        .arg("--output")
        .arg(&output)
        .stdout(Stdio::null())
        .status()
        .expect("receive should run");
    assert_eq!(status.code(), Some(124));

    let _ = std::fs::remove_dir_all(&dir);
}
