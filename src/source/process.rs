// Server process status via sysinfo, shaped like a server-status document.

use chrono::Utc;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, Process, ProcessesToUpdate, System};
use tracing::instrument;

use super::SnapshotSource;
use crate::error::CaptureError;
use crate::models::{Snapshot, mapping};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub enum ProcessTarget {
    Pid(u32),
    /// Exact process name; the lowest pid wins when several match.
    Name(String),
}

impl std::fmt::Display for ProcessTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessTarget::Pid(pid) => write!(f, "pid {}", pid),
            ProcessTarget::Name(name) => write!(f, "process {}", name),
        }
    }
}

pub struct ProcessSource {
    target: ProcessTarget,
    sys: Arc<Mutex<System>>,
}

impl ProcessSource {
    pub fn new(target: ProcessTarget) -> Self {
        Self {
            target,
            sys: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl SnapshotSource for ProcessSource {
    #[instrument(skip(self), fields(source = "process", operation = "capture", process = %self.target))]
    async fn capture(&self) -> Result<Snapshot, CaptureError> {
        let sys = self.sys.clone();
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| CaptureError::Join(format!("sysinfo lock poisoned: {}", e)))?;
            match &target {
                ProcessTarget::Pid(pid) => {
                    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(*pid)]), true);
                }
                ProcessTarget::Name(_) => {
                    sys.refresh_processes(ProcessesToUpdate::All, true);
                }
            }
            sys.refresh_memory();

            let process = find(&sys, &target)
                .ok_or_else(|| CaptureError::ProcessNotFound(target.to_string()))?;
            Ok(process_snapshot(&sys, process))
        })
        .await
        .map_err(|e| CaptureError::Join(e.to_string()))?
    }

    fn describe(&self) -> String {
        self.target.to_string()
    }
}

fn find<'a>(sys: &'a System, target: &ProcessTarget) -> Option<&'a Process> {
    match target {
        ProcessTarget::Pid(pid) => sys.process(Pid::from_u32(*pid)),
        ProcessTarget::Name(name) => sys
            .processes_by_exact_name(OsStr::new(name))
            .min_by_key(|p| p.pid().as_u32()),
    }
}

fn process_snapshot(sys: &System, p: &Process) -> Snapshot {
    let disk = p.disk_usage();
    let load = System::load_average();
    let threads = p.tasks().map(|t| t.len()).unwrap_or(0) as i64;

    let mut s = Snapshot::new();
    s.insert(
        "host".into(),
        System::host_name().unwrap_or_default().into(),
    );
    s.insert(
        "process".into(),
        p.name().to_string_lossy().into_owned().into(),
    );
    s.insert("pid".into(), i64::from(p.pid().as_u32()).into());
    s.insert("uptime".into(), saturating_i64(p.run_time()).into());
    s.insert("localTime".into(), Utc::now().into());
    s.insert(
        "mem".into(),
        mapping([
            ("resident", saturating_i64(p.memory() / MIB)),
            ("virtual", saturating_i64(p.virtual_memory() / MIB)),
        ]),
    );
    s.insert("cpu".into(), mapping([("usage", f64::from(p.cpu_usage()))]));
    s.insert(
        "disk".into(),
        mapping([
            ("readBytes", saturating_i64(disk.read_bytes)),
            ("writtenBytes", saturating_i64(disk.written_bytes)),
            ("totalReadBytes", saturating_i64(disk.total_read_bytes)),
            ("totalWrittenBytes", saturating_i64(disk.total_written_bytes)),
        ]),
    );
    s.insert("threads".into(), mapping([("count", threads)]));
    let total = sys.total_memory();
    let available = sys.available_memory();
    s.insert(
        "system".into(),
        mapping([
            (
                "memory",
                mapping([
                    ("total", saturating_i64(total / MIB)),
                    ("used", saturating_i64(total.saturating_sub(available) / MIB)),
                    ("available", saturating_i64(available / MIB)),
                ]),
            ),
            (
                "load",
                mapping([
                    ("one", load.one),
                    ("five", load.five),
                    ("fifteen", load.fifteen),
                ]),
            ),
        ]),
    );
    s
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
