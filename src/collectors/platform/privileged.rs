//! Kernel counter table source
//!
//! Reads `/proc/net/dev` directly instead of going through the portable
//! interface list. This is the fast path: one file read per tick and no
//! refresh of unrelated interface metadata. It is only available where the
//! table exists and is readable, so it is normally wrapped in a
//! `FallbackSource`.

use async_trait::async_trait;
use log::trace;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::interface_manager::InterfaceManager;
use crate::collectors::source::{SourceError, TrafficCounters, TrafficSource};

pub const DEFAULT_PROC_NET_DEV: &str = "/proc/net/dev";

/// One interface row of the kernel counter table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

pub struct PrivilegedSource {
    path: PathBuf,
    interfaces: Mutex<InterfaceManager>,
}

impl PrivilegedSource {
    pub fn new(path: impl Into<PathBuf>, interfaces: InterfaceManager) -> Self {
        Self {
            path: path.into(),
            interfaces: Mutex::new(interfaces),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sum_counted(&self, rows: &[DeviceRow]) -> Result<TrafficCounters, SourceError> {
        let mut interfaces = self
            .interfaces
            .lock()
            .map_err(|_| SourceError::Task("interface manager lock poisoned".to_string()))?;

        let mut totals = TrafficCounters::default();
        for row in rows {
            if interfaces.should_count(&row.name) {
                totals.accumulate(row.rx_bytes, row.tx_bytes);
            }
        }
        interfaces.retain_present(rows.iter().map(|row| row.name.as_str()));
        Ok(totals)
    }
}

/// Parses the contents of `/proc/net/dev`
///
/// The first two lines are column headers. Every following line has the form
/// `name: rx_bytes rx_packets ... (8 receive columns) tx_bytes ...`.
pub fn parse_proc_net_dev(content: &str, path: &Path) -> Result<Vec<DeviceRow>, SourceError> {
    let mut rows = Vec::new();

    for (index, line) in content.lines().enumerate().skip(2) {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parse_error = |detail: String| SourceError::Parse {
            path: path.to_path_buf(),
            line_number,
            detail,
        };

        let (name, columns) = line
            .split_once(':')
            .ok_or_else(|| parse_error("missing ':' after interface name".to_string()))?;

        let columns: Vec<&str> = columns.split_whitespace().collect();
        if columns.len() < 9 {
            return Err(parse_error(format!(
                "expected at least 9 columns, found {}",
                columns.len()
            )));
        }

        let parse_column = |column: usize| {
            columns[column]
                .parse::<u64>()
                .map_err(|e| parse_error(format!("column {}: {}", column, e)))
        };

        rows.push(DeviceRow {
            name: name.trim().to_string(),
            rx_bytes: parse_column(0)?,
            tx_bytes: parse_column(8)?,
        });
    }

    Ok(rows)
}

#[async_trait]
impl TrafficSource for PrivilegedSource {
    fn name(&self) -> &'static str {
        "privileged"
    }

    async fn read_counters(&self) -> Result<TrafficCounters, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => SourceError::Unavailable {
                    source_name: "privileged",
                    reason: format!("{}: {}", self.path.display(), e),
                },
                _ => SourceError::Io {
                    path: self.path.clone(),
                    source: e,
                },
            })?;

        let rows = parse_proc_net_dev(&content, &self.path)?;
        let totals = self.sum_counted(&rows)?;
        trace!(
            "Privileged source totals: rx={} tx={} from {} rows",
            totals.rx_bytes,
            totals.tx_bytes,
            rows.len()
        );
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::platform::interface_manager::Platform;
    use std::io::Write;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  500000    4000    0    0    0     0          0         0   500000    4000    0    0    0     0       0          0
  eth0: 1000000    9000    0    0    0     0          0         0   250000    3000    0    0    0     0       0          0
 wlan0:    2000      20    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  tun0:  800000    7000    0    0    0     0          0         0   200000    2000    0    0    0     0       0          0
";

    fn linux_manager() -> InterfaceManager {
        InterfaceManager::for_platform(Platform::Linux)
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_proc_net_dev(SAMPLE, Path::new("/proc/net/dev")).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[1],
            DeviceRow {
                name: "eth0".to_string(),
                rx_bytes: 1_000_000,
                tx_bytes: 250_000,
            }
        );
    }

    #[test]
    fn test_parse_rejects_short_line() {
        let content = "header\nheader\n  eth0: 1 2 3\n";
        let err = parse_proc_net_dev(content, Path::new("dev")).unwrap_err();
        match err {
            SourceError::Parse { line_number, .. } => assert_eq!(line_number, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_non_numeric_column() {
        let content = "h\nh\n eth0: x 0 0 0 0 0 0 0 5 0 0 0 0 0 0 0\n";
        assert!(matches!(
            parse_proc_net_dev(content, Path::new("dev")),
            Err(SourceError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_sums_physical_interfaces_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = PrivilegedSource::new(file.path(), linux_manager());
        let counters = source.read_counters().await.unwrap();
        // eth0 + wlan0; loopback and the tunnel are excluded
        assert_eq!(counters, TrafficCounters::new(1_002_000, 251_000));
    }

    #[tokio::test]
    async fn test_vlan_bytes_are_not_added_to_parent() {
        let table = "\
h
h
  eth0: 1000 1 0 0 0 0 0 0 400 1 0 0 0 0 0 0
eth0.100: 1000 1 0 0 0 0 0 0 400 1 0 0 0 0 0 0
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(table.as_bytes()).unwrap();

        let source = PrivilegedSource::new(file.path(), linux_manager());
        let counters = source.read_counters().await.unwrap();
        assert_eq!(counters, TrafficCounters::new(1000, 400));
    }

    #[tokio::test]
    async fn test_missing_table_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = PrivilegedSource::new(dir.path().join("absent"), linux_manager());
        let err = source.read_counters().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }
}
