use serde::Serialize;

// Line markers emitted by the generated sandbox scripts. Longest prefix wins.
const SAMPLE_MARKER: &str = "sample: ";
const MEM_MARKER: &str = "mem: ";
const TIME_MARKER: &str = "time: ";
const DEBUG_MARKER: &str = "debug: ";

// Exit codes reserved by the script <-> classifier contract.
const EXIT_TIMEOUT: i64 = 124;
const EXIT_CHECK_ERROR: i64 = 200;
const EXIT_CHECK_TIMEOUT: i64 = 224;
const EXIT_BUILD_TESTEE: i64 = 300;
const EXIT_BUILD_CHECKER: i64 = 301;

/// Which grammar the sandbox output of the current phase follows.
///
/// Build phases only produce a raw transcript; run phases produce the
/// full sample/metric grammar; the checker run reuses the sample grammar
/// but augments the statistics the testee run already produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Build,
    Run,
    Check,
}

/// Statistics accumulated over one run phase.
///
/// The parser is re-invoked over the *cumulative* line sequence every
/// time a new line arrives, so every field is recomputed from scratch on
/// each call. That keeps the parse idempotent, but it also means the
/// averages visible mid-stream are provisional: they are sums divided by
/// the sample count so far and may move non-monotonically until the
/// phase finishes. Only final values are contractual.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub run_samples: u32,
    pub last_sample: u32,
    pub output: String,
    pub errors: String,
    pub time_max: f64,
    pub time_min: f64,
    pub time_avg: f64,
    pub mem_max: u64,
    pub mem_min: u64,
    pub mem_avg: f64,
}

/// Parses the cumulative output of a testee run phase.
///
/// `sample: N` starts a new sample group and resets the error buffer;
/// `mem: M;time: T` fields update the running min/max/sum; `debug: `
/// lines are kept in the transcript (marker stripped) but never reach
/// the error buffer; anything else is an error line of the current
/// sample group.
pub fn parse_run(lines: &[String]) -> RunStatistics {
    let mut result = RunStatistics::default();
    let mut time_sum = 0.0f64;
    let mut mem_sum = 0u64;
    let mut errors: Vec<&str> = Vec::new();

    for line in lines {
        if let Some(rest) = line.strip_prefix(SAMPLE_MARKER) {
            result.run_samples += 1;
            result.last_sample = rest.trim().parse().unwrap_or(0);
            errors.clear();
        } else if line.starts_with(MEM_MARKER) {
            for part in line.split(';') {
                if let Some(rest) = part.strip_prefix(MEM_MARKER) {
                    if let Ok(mem) = rest.trim().parse::<u64>() {
                        result.mem_max = result.mem_max.max(mem);
                        result.mem_min = if result.mem_min == 0 {
                            mem
                        } else {
                            result.mem_min.min(mem)
                        };
                        mem_sum += mem;
                    }
                } else if let Some(rest) = part.strip_prefix(TIME_MARKER)
                    && let Ok(time) = rest.trim().parse::<f64>()
                {
                    result.time_max = result.time_max.max(time);
                    result.time_min = if result.time_min == 0.0 {
                        time
                    } else {
                        result.time_min.min(time)
                    };
                    time_sum += time;
                }
            }
        } else if !line.starts_with(DEBUG_MARKER) {
            errors.push(line);
        }
    }

    result.output = join_output(lines);
    result.errors = errors.join("\n");
    if result.run_samples > 0 {
        result.mem_avg = mem_sum as f64 / result.run_samples as f64;
        result.time_avg = time_sum / result.run_samples as f64;
    }

    result
}

/// Parses the cumulative output of the checker run phase.
///
/// The checker reuses the sample/debug grammar but tracks no metrics;
/// its transcript and error buffer *replace* the testee's while the
/// timing and memory statistics carry over untouched.
pub fn parse_check(lines: &[String], base: &RunStatistics) -> RunStatistics {
    let mut result = base.clone();
    let mut errors: Vec<&str> = Vec::new();

    for line in lines {
        if let Some(rest) = line.strip_prefix(SAMPLE_MARKER) {
            result.last_sample = rest.trim().parse().unwrap_or(0);
            errors.clear();
        } else if !line.starts_with(DEBUG_MARKER) {
            errors.push(line);
        }
    }

    result.output = join_output(lines);
    result.errors = errors.join("\n");

    result
}

/// Build phases publish the raw transcript only.
pub fn parse_build(lines: &[String]) -> String {
    lines.join("\n")
}

fn join_output(lines: &[String]) -> String {
    lines.join("\n").replace(DEBUG_MARKER, "")
}

/// Terminal outcome of one sandbox phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Success,
    Timeout,
    CheckError,
    CheckTimeout,
    BuildTesteeError,
    BuildCheckerError,
    OutOfMemory,
    Error,
}

impl Classification {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// The status word composed after the phase's status prefix. Build
    /// failures collapse to plain "error" because the prefix already
    /// carries the phase (`testee_build_error`, `checker_build_error`).
    pub fn status_word(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::CheckError => "check_error",
            Self::CheckTimeout => "check_timeout",
            Self::BuildTesteeError | Self::BuildCheckerError | Self::Error => "error",
            Self::OutOfMemory => "out_of_memory",
        }
    }
}

/// Maps a sandbox's terminal state to its classification.
///
/// The OOM kill flag always wins over the exit code; every non-reserved
/// non-zero code is a generic error.
pub fn classify(oom_killed: bool, exit_code: i64) -> Classification {
    if oom_killed {
        return Classification::OutOfMemory;
    }
    match exit_code {
        0 => Classification::Success,
        EXIT_TIMEOUT => Classification::Timeout,
        EXIT_CHECK_ERROR => Classification::CheckError,
        EXIT_CHECK_TIMEOUT => Classification::CheckTimeout,
        EXIT_BUILD_TESTEE => Classification::BuildTesteeError,
        EXIT_BUILD_CHECKER => Classification::BuildCheckerError,
        _ => Classification::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_sample_min_equals_max() {
        let input = lines(&["sample: 1", "mem: 2048;time: 0.15"]);
        let stats = parse_run(&input);
        assert_eq!(stats.run_samples, 1);
        assert_eq!(stats.last_sample, 1);
        assert_eq!(stats.mem_min, 2048);
        assert_eq!(stats.mem_max, 2048);
        assert_eq!(stats.mem_avg, 2048.0);
        assert_eq!(stats.time_min, 0.15);
        assert_eq!(stats.time_max, 0.15);
        assert_eq!(stats.time_avg, 0.15);
    }

    #[test]
    fn aggregates_over_multiple_samples() {
        let input = lines(&[
            "sample: 1",
            "mem: 1000;time: 0.5",
            "sample: 2",
            "mem: 3000;time: 0.1",
            "sample: 3",
            "mem: 2000;time: 0.3",
        ]);
        let stats = parse_run(&input);
        assert_eq!(stats.run_samples, 3);
        assert_eq!(stats.last_sample, 3);
        assert_eq!(stats.mem_min, 1000);
        assert_eq!(stats.mem_max, 3000);
        assert_eq!(stats.mem_avg, 2000.0);
        assert_eq!(stats.time_min, 0.1);
        assert_eq!(stats.time_max, 0.5);
        assert!((stats.time_avg - 0.3).abs() < 1e-9);
    }

    #[test]
    fn reparse_is_idempotent() {
        let input = lines(&[
            "sample: 1",
            "debug: ln -sf input001.txt input.txt",
            "mem: 512;time: 0.01",
            "something went wrong",
        ]);
        assert_eq!(parse_run(&input), parse_run(&input));
    }

    #[test]
    fn sample_marker_resets_error_buffer() {
        let input = lines(&[
            "sample: 1",
            "stray stderr line",
            "sample: 2",
            "mem: 100;time: 0.1",
        ]);
        let stats = parse_run(&input);
        assert_eq!(stats.errors, "");

        let input = lines(&["sample: 1", "sample: 2", "late failure"]);
        assert_eq!(parse_run(&input).errors, "late failure");
    }

    #[test]
    fn debug_lines_stripped_from_errors_but_kept_in_output() {
        let input = lines(&["sample: 1", "debug: gcc -o main main.c", "boom"]);
        let stats = parse_run(&input);
        assert_eq!(stats.errors, "boom");
        assert!(stats.output.contains("gcc -o main main.c"));
        assert!(!stats.output.contains("debug: "));
    }

    #[test]
    fn metric_fields_may_arrive_separately() {
        let input = lines(&["sample: 1", "mem: 640", "sample: 2", "mem: 320;time: 0.25"]);
        let stats = parse_run(&input);
        assert_eq!(stats.mem_max, 640);
        assert_eq!(stats.mem_min, 320);
        assert_eq!(stats.time_max, 0.25);
        assert_eq!(stats.mem_avg, 480.0);
    }

    #[test]
    fn no_samples_no_division() {
        let stats = parse_run(&lines(&["garbage before any marker"]));
        assert_eq!(stats.run_samples, 0);
        assert_eq!(stats.mem_avg, 0.0);
        assert_eq!(stats.time_avg, 0.0);
        assert_eq!(stats.errors, "garbage before any marker");
    }

    #[test]
    fn check_parse_augments_run_statistics() {
        let run = parse_run(&lines(&["sample: 1", "mem: 100;time: 0.5"]));
        let checked = parse_check(&lines(&["sample: 1", "wrong answer on 7"]), &run);
        assert_eq!(checked.run_samples, 1);
        assert_eq!(checked.mem_max, 100);
        assert_eq!(checked.time_avg, 0.5);
        assert_eq!(checked.last_sample, 1);
        assert_eq!(checked.errors, "wrong answer on 7");
        assert_eq!(checked.output, "sample: 1\nwrong answer on 7");
    }

    #[test]
    fn classification_is_total_and_deterministic() {
        assert_eq!(classify(false, 0), Classification::Success);
        assert_eq!(classify(false, 124), Classification::Timeout);
        assert_eq!(classify(false, 200), Classification::CheckError);
        assert_eq!(classify(false, 224), Classification::CheckTimeout);
        assert_eq!(classify(false, 300), Classification::BuildTesteeError);
        assert_eq!(classify(false, 301), Classification::BuildCheckerError);
        assert_eq!(classify(false, 1), Classification::Error);
        assert_eq!(classify(false, 139), Classification::Error);
        assert_eq!(classify(false, -1), Classification::Error);
    }

    #[test]
    fn oom_flag_overrides_exit_code() {
        assert_eq!(classify(true, 0), Classification::OutOfMemory);
        assert_eq!(classify(true, 124), Classification::OutOfMemory);
        assert_eq!(classify(true, 137), Classification::OutOfMemory);
    }
}
