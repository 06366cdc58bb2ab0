use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in Lighthouse CLI.
///
/// Logs each call to `calls.log`, fails for `fail.com` from run 1 onward,
/// and otherwise writes a report whose scores depend on the run index
/// (run 0: 1.0, run 1: 0.5, later runs: 0.0).
fn fake_script(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
url="$1"
out=""
html=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output-path) out="$2"; shift ;;
    html) html="yes" ;;
  esac
  shift
done
echo "$url $out" >> "{log}"
case "$out" in
  */[1-9]/fail_com*) echo "Runtime error encountered" >&2; exit 1 ;;
esac
case "$out" in
  */0/*) score=1 ;;
  */1/*) score=0.5 ;;
  *) score=0 ;;
esac
json="$out"
if [ -n "$html" ]; then
  json="$out.report.json"
  echo "<html></html>" > "$out.report.html"
fi
printf '{{"requestedUrl":"%s","finalUrl":"%s/","categories":{{"performance":{{"score":%s}},"accessibility":{{"score":%s}},"best-practices":{{"score":%s}},"seo":{{"score":%s}}}},"audits":{{"first-meaningful-paint":{{"numericValue":1000}},"interactive":{{"numericValue":2000}}}}}}' "$url" "$url" $score $score $score $score > "$json"
"#,
        log = log.display()
    )
}

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub lighthouse: PathBuf,
    pub calls_log: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("work");
        fs::create_dir_all(&root).expect("create work dir");

        let calls_log = tmp.path().join("calls.log");
        let lighthouse = tmp.path().join("fake-lighthouse");
        fs::write(&lighthouse, fake_script(&calls_log)).expect("write fake lighthouse");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&lighthouse, fs::Permissions::from_mode(0o755))
                .expect("make fake lighthouse executable");
        }

        Self {
            _tmp: tmp,
            root,
            lighthouse,
            calls_log,
        }
    }

    /// The binary, run inside the work dir with no Lighthouse configured.
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lighthouse-batch").expect("binary built");
        cmd.current_dir(&self.root)
            .env_remove("LIGHTHOUSE_BATCH_NAME")
            .env_remove("LIGHTHOUSE_PATH");
        cmd
    }

    /// The binary, run inside the work dir against the fake Lighthouse.
    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--lighthouse-path").arg(&self.lighthouse);
        cmd
    }

    pub fn batch_dir(&self, name: &str) -> PathBuf {
        self.root.join("report/lighthouse").join(name)
    }

    pub fn summary(&self, name: &str) -> Vec<Value> {
        let path = self.batch_dir(name).join("summary.json");
        let content = fs::read_to_string(&path).expect("read summary.json");
        serde_json::from_str(&content).expect("summary is a JSON array")
    }

    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls_log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write file");
        path
    }
}
