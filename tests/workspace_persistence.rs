use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env_remove("RESULTSD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn spawn_with_config(config: &std::path::Path) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env("RESULTSD_CONFIG", config)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn login(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, username: &str) {
    let resp = request(
        stdin,
        reader,
        &format!("login-{username}"),
        "auth.login",
        json!({ "username": username, "password": "123" }),
    );
    assert_eq!(resp["ok"], true, "login {username}");
}

/// Records a mark, adds a user and publishes results in the selected workspace.
fn populate(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    login(stdin, reader, "t1");
    let dash = request(stdin, reader, "p1", "teacher.dashboard", json!({}));
    let maths = dash["result"]["subjects"][0]["id"]
        .as_str()
        .expect("subject id")
        .to_string();
    let mark = request(
        stdin,
        reader,
        "p2",
        "teacher.marks.update",
        json!({ "student_id": "s2", "subject_id": maths, "marks": "77" }),
    );
    assert_eq!(mark["ok"], true);

    login(stdin, reader, "admin");
    let user = request(
        stdin,
        reader,
        "p3",
        "admin.users.create",
        json!({ "username": "s7", "password": "pw", "name": "Seventh, Student", "role": "student" }),
    );
    assert_eq!(user["ok"], true);
    request(stdin, reader, "p4", "admin.results.toggle", json!({}));
}

fn assert_populated(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    login(stdin, reader, "admin");
    let dash = request(stdin, reader, "a1", "admin.dashboard", json!({}));
    let r = &dash["result"];
    assert_eq!(r["resultsPublished"], true);
    assert_eq!(r["stats"]["students"], 3);
    let rows = r["allResults"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["marks"], 77);
    assert_eq!(rows[0]["grade"], "B");

    let s7 = request(
        stdin,
        reader,
        "a2",
        "auth.login",
        json!({ "username": "s7", "password": "pw" }),
    );
    assert_eq!(s7["result"]["user"]["name"], "Seventh, Student");
}

fn reload_round_trip(backend: &str) {
    let workspace = temp_dir(&format!("resultsd-persist-{backend}"));

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let sel = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy(), "backend": backend }),
    );
    assert_eq!(sel["ok"], true);
    assert_eq!(sel["result"]["backend"], backend);
    populate(&mut stdin, &mut reader);
    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy(), "backend": backend }),
    );
    assert_populated(&mut stdin, &mut reader);
    drop(stdin);
    let _ = child.wait();
}

#[test]
fn csv_workspace_survives_restart() {
    reload_round_trip("csv");
}

#[test]
fn sqlite_workspace_survives_restart() {
    reload_round_trip("sqlite");
}

#[test]
fn csv_files_have_fixed_headers() {
    let workspace = temp_dir("resultsd-persist-headers");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    drop(stdin);
    let _ = child.wait();

    let first_line = |name: &str| {
        std::fs::read_to_string(workspace.join(name))
            .expect("read csv")
            .lines()
            .next()
            .unwrap_or("")
            .to_string()
    };
    assert_eq!(first_line("users.csv"), "username,password,role,name");
    assert_eq!(first_line("subjects.csv"), "id,name,teacher_id");
    assert_eq!(first_line("marks.csv"), "student_id,subject_id,marks");
    assert_eq!(first_line("config.csv"), "key,value");
}

#[test]
fn config_file_opens_workspace_at_startup() {
    let dir = temp_dir("resultsd-persist-config");
    let workspace = dir.join("ws");
    let config = dir.join("resultsd.toml");
    std::fs::write(
        &config,
        format!(
            "workspace = {:?}\nbackend = \"sqlite\"\n",
            workspace.to_string_lossy()
        ),
    )
    .expect("write config");

    let (mut child, mut stdin, mut reader) = spawn_with_config(&config);
    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["result"]["backend"], "sqlite");
    let expected = workspace.to_string_lossy().to_string();
    assert_eq!(
        health["result"]["workspacePath"].as_str(),
        Some(expected.as_str())
    );
    drop(stdin);
    let _ = child.wait();
    assert!(workspace.join("results.sqlite3").is_file());
}

#[test]
fn backup_bundle_restores_workspace() {
    let dir = temp_dir("resultsd-persist-backup");
    let source = dir.join("source");
    let target = dir.join("target");
    let bundle = dir.join("out/backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    populate(&mut stdin, &mut reader);
    let exported = request(
        &mut stdin,
        &mut reader,
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["result"]["bundleFormat"], "resultsd-workspace-v1");
    assert_eq!(exported["result"]["entryCount"], 5);

    request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": target.to_string_lossy(), "backend": "sqlite" }),
    );
    login(&mut stdin, &mut reader, "admin");
    let imported = request(
        &mut stdin,
        &mut reader,
        "4",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["ok"], true);
    assert_eq!(imported["result"]["sessionCleared"], false);
    assert_populated(&mut stdin, &mut reader);

    // assert_populated leaves s7 logged in.
    let denied = request(
        &mut stdin,
        &mut reader,
        "5",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(error_code(&denied), Some("unauthorized"));

    login(&mut stdin, &mut reader, "admin");
    let bogus = request(
        &mut stdin,
        &mut reader,
        "6",
        "backup.import",
        json!({ "inPath": target.join("results.sqlite3").to_string_lossy() }),
    );
    assert_eq!(error_code(&bogus), Some("import_failed"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn backup_requires_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    login(&mut stdin, &mut reader, "admin");
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "backup.export",
        json!({ "outPath": "/tmp/never.zip" }),
    );
    assert_eq!(error_code(&resp), Some("no_workspace"));
    drop(stdin);
    let _ = child.wait();
}
