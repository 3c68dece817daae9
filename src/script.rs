//! Generation of the `/bin/bash` entrypoint scripts executed inside the
//! sandboxes. The scripts carry the whole wire contract with the output
//! parser and the classifier: `sample: N` markers, the
//! `mem: %M;time: %e` resource probe, `debug: ` tracing of every real
//! command, and the reserved exit codes (124 testee timeout, 200/224
//! checker failure/timeout, 300/301 build failures).

/// 1-based, zero-padded sample input file name (`input001.txt`).
pub fn input_file(sample: usize) -> String {
    format!("input{sample:03}.txt")
}

/// 1-based, zero-padded sample output file name (`output001.txt`).
pub fn output_file(sample: usize) -> String {
    format!("output{sample:03}.txt")
}

/// Runs the testee once per sample. Each invocation is wrapped in a
/// wall-clock `timeout` and a GNU time probe that reports peak memory
/// and elapsed seconds on the sandbox's own stdout; a non-zero testee
/// exit aborts the loop immediately with that exit code.
pub fn testee_script(cmd: &str, timeout_secs: u64, samples: usize) -> String {
    let mut lines = vec!["#!/bin/bash".to_string()];
    for i in 1..=samples {
        lines.push(format!("echo \"sample: {i}\""));
        traced(&mut lines, &format!("ln -sf {} input.txt", input_file(i)));
        traced(
            &mut lines,
            &format!(
                "cat input.txt | time --format=\"mem: %M;time: %e\" --output=stats.txt -q \
                 timeout {timeout_secs} {cmd} >> output.txt"
            ),
        );
        lines.push("retVal=$?".to_string());
        lines.push("cat stats.txt".to_string());
        lines.push("if [ $retVal -ne 0 ]; then".to_string());
        lines.push("  echo \"testee error\"".to_string());
        lines.push("  exit $retVal".to_string());
        lines.push("fi".to_string());
        traced(&mut lines, &format!("mv output.txt {}", output_file(i)));
    }
    lines.join("\n")
}

/// Runs the checker once per sample against the testee's recorded
/// output. Checker timeout and failure are translated to the reserved
/// exit codes before the sandbox process exits, so classification never
/// needs to look inside the sandbox.
pub fn checker_script(cmd: &str, timeout_secs: u64, samples: usize) -> String {
    let mut lines = vec!["#!/bin/bash".to_string()];
    for i in 1..=samples {
        lines.push(format!("echo \"sample: {i}\""));
        traced(&mut lines, &format!("ln -sf {} input.txt", input_file(i)));
        traced(&mut lines, &format!("ln -sf {} output.txt", output_file(i)));
        traced(&mut lines, &format!("timeout {timeout_secs} {cmd}"));
        lines.push("retVal=$?".to_string());
        lines.push("if [ $retVal -eq 124 ]; then".to_string());
        lines.push("  echo \"checker timeout\"".to_string());
        lines.push("  exit 224".to_string());
        lines.push("fi".to_string());
        lines.push("if [ $retVal -ne 0 ]; then".to_string());
        lines.push("  echo \"checker error\"".to_string());
        lines.push("  exit 200".to_string());
        lines.push("fi".to_string());
    }
    lines.join("\n")
}

/// Wraps a build command sequence; a non-zero exit of the final command
/// becomes the phase's reserved build-failure code.
pub fn build_script(commands: &[String], failure_exit: i64) -> String {
    let mut lines = vec!["#!/bin/bash".to_string()];
    for command in commands {
        traced(&mut lines, command);
    }
    lines.push("retVal=$?".to_string());
    lines.push("if [ $retVal -ne 0 ]; then".to_string());
    lines.push(format!("  exit {failure_exit}"));
    lines.push("fi".to_string());
    lines.push("echo \"debug: build success\"".to_string());
    lines.join("\n")
}

// Echoes the command with the debug marker before running it, so the
// transcript shows what ran without polluting the error buffer.
fn traced(lines: &mut Vec<String>, command: &str) {
    lines.push(format!("echo \"debug: {}\"", command.replace('"', "\\\"")));
    lines.push(command.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sample_file_names_are_zero_padded() {
        assert_eq!(input_file(1), "input001.txt");
        assert_eq!(input_file(42), "input042.txt");
        assert_eq!(output_file(3), "output003.txt");
    }

    #[test]
    fn testee_script_wraps_each_sample() {
        let script = testee_script("python bin/main.py", 10, 2);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("echo \"sample: 1\""));
        assert!(script.contains("echo \"sample: 2\""));
        assert!(!script.contains("sample: 3"));
        assert!(script.contains("timeout 10 python bin/main.py >> output.txt"));
        assert!(script.contains("time --format=\\\"mem: %M;time: %e\\\""));
        assert!(script.contains("exit $retVal"));
        assert!(script.contains("mv output.txt output002.txt"));
    }

    #[test]
    fn checker_script_translates_reserved_codes() {
        let script = checker_script("./bin/checker", 360, 1);
        assert!(script.contains("timeout 360 ./bin/checker"));
        assert!(script.contains("if [ $retVal -eq 124 ]; then"));
        assert!(script.contains("exit 224"));
        assert!(script.contains("exit 200"));
        assert!(script.contains("ln -sf output001.txt output.txt"));
    }

    #[test]
    fn build_script_uses_reserved_failure_code() {
        let script = build_script(&["gcc -o testee/testee testee/main.c".to_string()], 300);
        assert!(script.contains("echo \"debug: gcc -o testee/testee testee/main.c\""));
        assert!(script.contains("exit 300"));
        assert!(script.ends_with("echo \"debug: build success\""));
    }
}
