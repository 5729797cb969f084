//! Integration tests for the install pipeline.
//!
//! These drive `Installer` through the library with a local HTTP server
//! serving synthetic Boost archives, or with a stubbed fetcher. External
//! build tools are never spawned: a recording runner stands in for them.

use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use boost_installer::config::Settings;
use boost_installer::error::InstallError;
use boost_installer::fetch::{Fetcher, HttpFetcher};
use boost_installer::installer::{Installer, Stage};
use boost_installer::output::{Event, RecordingReporter};
use boost_installer::plan::InstallRequest;
use boost_installer::platform::{CommandRunner, CommandSpec, ToolExit, UnixOps, WindowsOps};

/// Serve `body` once with the given status, then close.
fn spawn_one_shot_server(status: u16, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{addr}");

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("failed to accept");
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);

        let header = format!(
            "HTTP/1.1 {status} OK\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
    });

    url
}

/// Build a gzip'd tar in memory. Entry names are written raw into the
/// header so hostile names survive.
fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        let bytes = name.as_bytes();
        header.as_gnu_mut().unwrap().name[..bytes.len()].copy_from_slice(bytes);
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn boost_tree() -> Vec<u8> {
    tar_gz(&[
        ("boost_1_75_0/bootstrap.sh", b"#!/bin/sh\n"),
        ("boost_1_75_0/boost/version.hpp", b"#define BOOST_LIB_VERSION \"1_75\"\n"),
    ])
}

#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.program.clone())
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec, _cwd: &Path) -> io::Result<ToolExit> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(ToolExit { code: Some(0) })
    }
}

/// Records URLs and archive paths without touching the network.
#[derive(Default)]
struct StubFetcher {
    urls: Mutex<Vec<String>>,
    archives: Mutex<Vec<PathBuf>>,
}

impl Fetcher for StubFetcher {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, InstallError> {
        self.urls.lock().unwrap().push(url.to_string());
        std::fs::write(dest, b"stub").unwrap();
        Ok(4)
    }

    fn extract(&self, archive: &Path, target_dir: &Path) -> Result<PathBuf, InstallError> {
        self.archives.lock().unwrap().push(archive.to_path_buf());
        let dir = target_dir.join("boost_1_75_0");
        std::fs::create_dir_all(&dir).unwrap();
        Ok(dir)
    }
}

fn settings(mirror_url: &str, temp_dir: &Path) -> Settings {
    Settings {
        mirror_url: mirror_url.to_string(),
        temp_dir: temp_dir.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Stubbed download/extract layer
// ---------------------------------------------------------------------------

#[test]
fn download_only_with_stubbed_fetcher() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = StubFetcher::default();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    let installer = Installer::new(&UnixOps, &fetcher, &runner, &reporter);

    let request = InstallRequest {
        download_only: true,
        ..InstallRequest::new("1.75")
    };
    let outcome = installer
        .run(
            &request,
            &settings("https://archives.boost.io/release", tmp.path()),
        )
        .unwrap();

    assert_eq!(outcome.plan.archive_name, "boost_1_75_0.tar.gz");
    let urls = fetcher.urls.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("/1.75.0/source/boost_1_75_0.tar.gz"));
    assert_eq!(
        fetcher.archives.lock().unwrap().clone(),
        vec![tmp.path().join("boost_1_75_0.tar.gz")]
    );
    assert!(runner.programs().is_empty());
    assert!(!reporter.events().iter().any(|e| matches!(
        e,
        Event::BootstrapCommand(_) | Event::BuildCommand(_)
    )));
}

// ---------------------------------------------------------------------------
// Real HTTP download and extraction
// ---------------------------------------------------------------------------

#[test]
fn download_only_fetches_and_extracts_real_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let mirror = spawn_one_shot_server(200, boost_tree());
    let fetcher = HttpFetcher::new();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    let installer = Installer::new(&UnixOps, &fetcher, &runner, &reporter);

    let request = InstallRequest {
        download_only: true,
        ..InstallRequest::new("1.75")
    };
    let outcome = installer
        .run(&request, &settings(&format!("{mirror}/release"), tmp.path()))
        .unwrap();

    assert_eq!(outcome.extract_dir, tmp.path().join("boost_1_75_0"));
    assert!(outcome.extract_dir.join("bootstrap.sh").is_file());
    assert!(outcome.extract_dir.join("boost/version.hpp").is_file());
    assert!(tmp.path().join("boost_1_75_0.tar.gz").is_file());
    assert!(runner.programs().is_empty());
}

#[test]
fn full_install_runs_tools_then_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    let mirror = spawn_one_shot_server(200, boost_tree());
    let fetcher = HttpFetcher::new();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    // In-process directory removal keeps the runner free of `rm`.
    let installer = Installer::new(&WindowsOps, &fetcher, &runner, &reporter);

    let request = InstallRequest {
        toolset: Some("clang-win".into()),
        path: Some(tmp.path().join("prefix")),
        ..InstallRequest::new("1.75")
    };
    let outcome = installer.run(&request, &settings(&mirror, tmp.path())).unwrap();

    assert_eq!(runner.programs(), vec!["bootstrap.bat", "b2.exe"]);
    let build = runner.calls.lock().unwrap()[1].clone();
    assert_eq!(build.args[0], "toolset=clang-win");
    assert_eq!(build.args[1], "install");
    assert_eq!(
        build.args[2],
        format!("--prefix={}", tmp.path().join("prefix").display())
    );
    assert_eq!(build.args[3], "-j8");

    assert!(outcome.cleaned_up);
    assert!(!tmp.path().join("boost_1_75_0.tar.gz").exists());
    assert!(!tmp.path().join("boost_1_75_0").exists());
    assert_eq!(reporter.stages().last(), Some(&Stage::Done));
}

#[test]
fn keep_download_survives_full_install() {
    let tmp = tempfile::tempdir().unwrap();
    let mirror = spawn_one_shot_server(200, boost_tree());
    let fetcher = HttpFetcher::new();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    let installer = Installer::new(&WindowsOps, &fetcher, &runner, &reporter);

    let request = InstallRequest {
        keep_download: true,
        path: Some(tmp.path().join("prefix")),
        ..InstallRequest::new("1.75")
    };
    let outcome = installer.run(&request, &settings(&mirror, tmp.path())).unwrap();

    assert!(!outcome.cleaned_up);
    assert!(tmp.path().join("boost_1_75_0.tar.gz").is_file());
    assert!(tmp.path().join("boost_1_75_0/bootstrap.sh").is_file());
}

#[test]
fn hostile_archive_is_rejected_and_nothing_is_built() {
    let tmp = tempfile::tempdir().unwrap();
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    let mirror = spawn_one_shot_server(
        200,
        tar_gz(&[("boost_1_75_0/README", b"ok"), ("../../evil", b"pwned")]),
    );
    let fetcher = HttpFetcher::new();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    let installer = Installer::new(&UnixOps, &fetcher, &runner, &reporter);

    let request = InstallRequest {
        path: Some(tmp.path().join("prefix")),
        ..InstallRequest::new("1.75")
    };
    let err = installer.run(&request, &settings(&mirror, &work)).unwrap_err();

    assert!(matches!(err, InstallError::PathTraversal { .. }), "{err}");
    assert_eq!(err.exit_code(), 5);
    assert!(!work.join("boost_1_75_0").exists());
    assert!(!tmp.path().join("evil").exists());
    assert!(runner.programs().is_empty());
}

#[test]
fn missing_release_is_network_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mirror = spawn_one_shot_server(404, b"Not Found".to_vec());
    let fetcher = HttpFetcher::new();
    let runner = RecordingRunner::default();
    let reporter = RecordingReporter::new();
    let installer = Installer::new(&UnixOps, &fetcher, &runner, &reporter);

    let err = installer
        .run(&InstallRequest::new("0.1"), &settings(&mirror, tmp.path()))
        .unwrap_err();

    assert!(matches!(err, InstallError::Network { .. }));
    assert!(err.to_string().contains("HTTP 404"));
    assert!(err.to_string().contains("/0.1.0/source/boost_0_1_0.tar.gz"));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn download_overwrites_existing_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("boost_1_75_0.tar.gz");
    std::fs::write(&dest, vec![0u8; 10_000]).unwrap();

    let body = b"fresh archive bytes".to_vec();
    let mirror = spawn_one_shot_server(200, body.clone());
    let written = HttpFetcher::new()
        .download(&format!("{mirror}/boost_1_75_0.tar.gz"), &dest)
        .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}
