//! Shared helpers: fake sampler processes written as shell scripts
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hue_hunter::sampler::SamplerSettings;
use tempfile::TempDir;

/// A valid sample frame centered on #FF8040
pub const FRAME: &str = r##"{"cursor":{"x":640,"y":360},"center":{"r":255,"g":128,"b":64,"hex":"#FF8040"},"grid":[[{"r":0,"g":0,"b":0,"hex":"#000000"},{"r":255,"g":128,"b":64,"hex":"#FF8040"},{"r":255,"g":255,"b":255,"hex":"#FFFFFF"}]],"timestamp":1700000000000}"##;

/// Logs every command to `$1` until stdin closes
pub const LOG_COMMANDS: &str = r#"
while read -r line; do
  printf '%s\n' "$line" >> "$1"
done
"#;

/// Logs commands like [`LOG_COMMANDS`] while streaming frames every 100ms
pub const STREAM_FRAMES: &str = r#"
read -r first
printf '%s\n' "$first" >> "$1"
(
  i=0
  while [ $i -lt 100 ]; do
    printf '%s\n' '__FRAME__'
    sleep 0.1
    i=$((i+1))
  done
) &
frames=$!
while read -r line; do
  printf '%s\n' "$line" >> "$1"
done
kill $frames 2>/dev/null
"#;

/// Never writes anything and exits once stdin closes
pub const SILENT: &str = "cat > /dev/null\n";

/// Ignores stdin entirely and never exits on its own
pub const STUBBORN: &str = "exec sleep 30\n";

/// A shell script standing in for the sampler binary
pub struct FakeSampler {
    _dir: TempDir,
    pub settings: SamplerSettings,
    pub log: PathBuf,
}

impl FakeSampler {
    /// Write `body` to a script; `__FRAME__` is replaced with [`FRAME`]
    pub fn new(body: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let script = dir.path().join("sampler.sh");
        let log = dir.path().join("commands.log");

        std::fs::write(&script, body.replace("__FRAME__", FRAME)).expect("Failed to write script");
        std::fs::write(&log, "").expect("Failed to create log");

        let settings = SamplerSettings::new("sh").with_args([
            script.to_string_lossy().to_string(),
            log.to_string_lossy().to_string(),
        ]);

        Self {
            _dir: dir,
            settings,
            log,
        }
    }

    /// Commands the script logged, one JSON value per line
    pub fn commands(&self) -> Vec<serde_json::Value> {
        read_log(&self.log)
    }
}

pub fn read_log(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Logged command is not JSON"))
        .collect()
}

/// Whether a process with `pid` still exists
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Whether `pid` is gone or only a zombie waiting to be reaped
pub fn process_exited(pid: u32) -> bool {
    let output = std::process::Command::new("ps")
        .args(["-o", "stat=", "-p", &pid.to_string()])
        .output();

    match output {
        Ok(output) => {
            let stat = String::from_utf8_lossy(&output.stdout);
            let stat = stat.trim();
            stat.is_empty() || stat.starts_with('Z')
        }
        Err(_) => !process_alive(pid),
    }
}

/// Poll until `pid` has exited; false if it is still running after `timeout`
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !process_exited(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

/// Read the pid a script wrote with `echo $$ > "$1.pid"`
pub fn read_pid(log: &Path) -> Option<u32> {
    let mut path = log.as_os_str().to_owned();
    path.push(".pid");
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
