use std::process::{Command, Output};

fn matter(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_matter"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch the matter binary")
}

#[test]
fn algorithms_command_lists_every_strategy() {
    let output = matter(&["algorithms"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    for name in ["astar", "bfs", "greedy", "minimax", "expectimax"] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
}

#[test]
fn transform_prints_a_json_report() {
    let output = matter(&[
        "--seed",
        "3",
        "--width",
        "8",
        "--height",
        "8",
        "transform",
        "--shape",
        "square",
        "--elements",
        "4",
        "--movement",
        "sequential",
        "--control",
        "centralized",
        "--json",
    ]);
    assert!(output.status.success(), "{output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["success"], true);
    assert_eq!(report["success_rate"], 1.0);
    let moves = report["moves"].as_array().expect("moves");
    assert!(!moves.is_empty());
    assert!(moves[0].get("agent_id").is_some());
}

#[test]
fn unknown_algorithm_is_rejected_before_running() {
    let output = matter(&["transform", "--algorithm", "dijkstra"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf-8 output");
    assert!(stderr.contains("dijkstra"), "{stderr}");
}

#[test]
fn missing_config_file_is_reported_with_its_path() {
    let output = matter(&["--config", "does/not/exist.toml", "shapes"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf-8 output");
    assert!(stderr.contains("does/not/exist.toml"), "{stderr}");
}
