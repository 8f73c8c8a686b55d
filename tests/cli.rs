use std::{fs, path::PathBuf};

use assert_cmd::Command;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rasm16-cli-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn builds_and_runs_an_image() {
    let source = scratch("load.s");
    let image = scratch("load.bin");
    fs::write(&source, "LR0 82\nLR1 82\nHLT\n").unwrap();

    Command::cargo_bin("rasm16")
        .unwrap()
        .args(["--log-level", "off", "build"])
        .arg(&source)
        .arg("-o")
        .arg(&image)
        .assert()
        .success();
    assert_eq!(
        fs::read(&image).unwrap(),
        vec![0xA0, 0x00, 0x52, 0xA1, 0x00, 0x52, 0xFF]
    );

    let stdout = stdout_of(
        Command::cargo_bin("rasm16")
            .unwrap()
            .args(["--log-level", "off", "run"])
            .arg(&image),
    );
    assert!(stdout.contains("R0=0052 R1=0052"), "{stdout}");
    assert!(stdout.contains("PC=D007"), "{stdout}");
    assert!(stdout.contains("Halted"), "{stdout}");
}

#[test]
fn exec_honours_cycle_budget() {
    let source = scratch("budget.s");
    fs::write(&source, "LR0 1 LR1 2 HLT").unwrap();

    let stdout = stdout_of(
        Command::cargo_bin("rasm16")
            .unwrap()
            .args(["exec", "--log-level", "off", "--cycles", "2"])
            .arg(&source),
    );
    assert!(stdout.contains("R0=0001 R1=0000"), "{stdout}");
    assert!(stdout.contains("Cycle budget exhausted"), "{stdout}");
}

#[test]
fn exec_two_pass_resolves_forward_labels() {
    let source = scratch("forward.s");
    fs::write(&source, "JMP end LR0 1 end: HLT").unwrap();

    Command::cargo_bin("rasm16")
        .unwrap()
        .args(["--log-level", "off", "exec"])
        .arg(&source)
        .assert()
        .failure();

    let stdout = stdout_of(
        Command::cargo_bin("rasm16")
            .unwrap()
            .args(["--log-level", "off", "exec", "--two-pass", "--byte-addresses"])
            .arg(&source),
    );
    assert!(stdout.contains("R0=0000"), "{stdout}");
    assert!(stdout.contains("Halted"), "{stdout}");
}

#[test]
fn reports_assembly_errors() {
    let source = scratch("bad.s");
    fs::write(&source, "LR0 1\nstray\n").unwrap();

    let output = Command::cargo_bin("rasm16")
        .unwrap()
        .args(["--log-level", "off", "build"])
        .arg(&source)
        .arg("-o")
        .arg(scratch("bad.bin"))
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("failed to assemble"), "{stderr}");
}

#[test]
fn reports_execution_faults() {
    let image = scratch("fault.bin");
    // ADD R0 R0 with an 8-bit register as the last operand
    fs::write(&image, [0xB1, 0xA0, 0xA0, 0xB5]).unwrap();

    Command::cargo_bin("rasm16")
        .unwrap()
        .args(["--log-level", "off", "run"])
        .arg(&image)
        .assert()
        .failure();
}
