use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn exec_create_and_select_round_trips_through_an_edb_file() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("essadb")
        .unwrap()
        .arg("exec")
        .arg("--db")
        .arg(dir.path())
        .arg("CREATE TABLE t (id INT, name VARCHAR) ENGINE = EDB;")
        .assert()
        .success();

    Command::cargo_bin("essadb")
        .unwrap()
        .arg("exec")
        .arg("--db")
        .arg(dir.path())
        .arg("INSERT INTO t (id, name) VALUES (1, 'alice');")
        .assert()
        .success();

    Command::cargo_bin("essadb")
        .unwrap()
        .arg("exec")
        .arg("--db")
        .arg(dir.path())
        .arg("SELECT * FROM t;")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));

    assert!(dir.path().join("t.edb").exists());
}

#[test]
fn exec_reports_parse_errors_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("essadb")
        .unwrap()
        .arg("exec")
        .arg("--db")
        .arg(dir.path())
        .arg("SELEKT * FROM t;")
        .assert()
        .failure();
}

#[test]
fn script_runs_every_statement_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let script_path = dir.path().join("seed.sql");
    std::fs::write(
        &script_path,
        "CREATE TABLE t (id INT);\nINSERT INTO t (id) VALUES (1);\nINSERT INTO t (id) VALUES (2);\nSELECT COUNT(id) FROM t;\n",
    )
    .unwrap();

    Command::cargo_bin("essadb")
        .unwrap()
        .arg("script")
        .arg("--db")
        .arg(dir.path())
        .arg(&script_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
}
