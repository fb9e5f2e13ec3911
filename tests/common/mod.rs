//! Common fixtures for launchkit integration tests
//!
//! Both binaries locate their install directory from their own path, so every
//! test works on copies of them inside a fresh temporary directory.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const LAUNCHER: &str = env!("CARGO_BIN_EXE_launchkit");
pub const UPDATER: &str = env!("CARGO_BIN_EXE_launchkit-updater");

/// A throwaway install directory holding copies of both binaries.
pub struct InstallDir {
    pub temp: TempDir,
}

impl InstallDir {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let suffix = std::env::consts::EXE_SUFFIX;
        std::fs::copy(LAUNCHER, temp.path().join(format!("launchkit{suffix}")))
            .context("Failed to copy launcher binary")?;
        std::fs::copy(UPDATER, temp.path().join(format!("launchkit-updater{suffix}")))
            .context("Failed to copy updater binary")?;
        Ok(Self {
            temp,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn launcher(&self) -> PathBuf {
        self.path().join(format!("launchkit{}", std::env::consts::EXE_SUFFIX))
    }

    pub fn updater(&self) -> PathBuf {
        self.path().join(format!("launchkit-updater{}", std::env::consts::EXE_SUFFIX))
    }

    /// `launchkit` from this directory, isolated from the caller's environment.
    pub fn launchkit_cmd(&self) -> Command {
        let mut cmd = Command::new(self.launcher());
        cmd.current_dir(self.path())
            .env_remove("LAUNCHKIT_CONFIG_PATH")
            .env_remove("RUST_LOG")
            .env("LAUNCHKIT_NO_PROGRESS", "1");
        cmd
    }

    /// Write `launchkit.toml` with an `[upgrade]` section.
    pub fn write_config(&self, update_url: &str, check_on_startup: bool) -> Result<()> {
        let downloads = self.path().join("downloads");
        let config = format!(
            "[upgrade]\nupdate_url = \"{update_url}\"\ncheck_on_startup = {check_on_startup}\n\
             request_timeout_secs = 3\ndownload_dir = {:?}\n",
            downloads.display().to_string()
        );
        std::fs::write(self.path().join("launchkit.toml"), config)?;
        Ok(())
    }

    pub fn write_version(&self, version: &str) -> Result<()> {
        let record = serde_json::json!({
            "version": version,
            "updated_at": "2024-01-01 00:00:00",
        });
        std::fs::write(
            self.path().join("version_local.json"),
            serde_json::to_string_pretty(&record)?,
        )?;
        Ok(())
    }

    /// The `version` field of `version_local.json`, if readable.
    pub fn recorded_version(&self) -> Option<String> {
        let content = std::fs::read_to_string(self.path().join("version_local.json")).ok()?;
        let value: serde_json::Value = serde_json::from_str(&content).ok()?;
        value.get("version")?.as_str().map(ToString::to_string)
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    check()
}

/// Kill `pid` if it is running. Returns whether a signal was delivered.
pub fn kill_process(pid: u32) -> bool {
    let pid = sysinfo::Pid::from_u32(pid);
    let mut system = sysinfo::System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some_and(sysinfo::Process::kill)
}

/// Minimal HTTP/1.1 responder for version descriptors and downloads.
///
/// Runs on its own thread and runtime so tests can block on child processes.
pub struct TestServer {
    addr: std::net::SocketAddr,
    routes: Routes,
}

type Routes = Arc<Mutex<HashMap<String, Vec<u8>>>>;

impl TestServer {
    /// Listen on an ephemeral port until the test process exits. Unknown
    /// paths get a 404.
    pub fn start() -> Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let routes: Routes = Arc::default();

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let shared = Arc::clone(&routes);
        std::thread::spawn(move || {
            runtime.block_on(async move {
                let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                    return;
                };
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(stream, Arc::clone(&shared)));
                }
            });
        });

        Ok(Self {
            addr,
            routes,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn route(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(path.to_string(), body.into());
    }

    /// Publish `version` with `binary` as its executable.
    pub fn publish(&self, version: &str, binary: &[u8]) {
        let file = format!("/releases/download/{version}/launchkit{}", std::env::consts::EXE_SUFFIX);
        let descriptor = serde_json::json!({
            "version": version,
            "download_url": self.url(&file),
            "changelog": "Faster startup",
        });
        self.route("/version.json", descriptor.to_string());
        self.route(&file, binary);
    }
}

async fn serve(mut stream: tokio::net::TcpStream, routes: Routes) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let body = routes.lock().unwrap().get(&path).cloned();

    let response = match body {
        Some(body) => {
            let mut response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .into_bytes();
            response.extend_from_slice(&body);
            response
        }
        None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_vec(),
    };

    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
}
