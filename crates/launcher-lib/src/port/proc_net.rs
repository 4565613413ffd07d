//! Listening-socket enumeration via procfs
//!
//! Parses `/proc/net/tcp` and `/proc/net/tcp6` to find the socket listening
//! on a local port, then resolves the owning process by matching the socket
//! inode against `/proc/<pid>/fd` symlinks.

use std::fs;
use std::path::Path;
use tracing::debug;

/// Kernel state code for a listening TCP socket
const TCP_LISTEN: &str = "0A";

/// A listening socket parsed out of a procfs net table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningSocket {
    pub port: u16,
    pub inode: u64,
}

/// Parse the contents of a `/proc/net/tcp`-format table, keeping only
/// sockets in the LISTEN state.
///
/// Each entry line looks like:
/// `0: 0100007F:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000 1000 0 12345 ...`
/// where field 1 is `local_address:port` (hex), field 3 the state, and
/// field 9 the socket inode.
pub fn parse_listeners(content: &str) -> Vec<ListeningSocket> {
    let mut sockets = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || fields[3] != TCP_LISTEN {
            continue;
        }

        let Some(port_hex) = fields[1].rsplit(':').next() else {
            continue;
        };
        let Ok(port) = u16::from_str_radix(port_hex, 16) else {
            continue;
        };
        let Ok(inode) = fields[9].parse::<u64>() else {
            continue;
        };

        sockets.push(ListeningSocket { port, inode });
    }

    sockets
}

/// Find the inode of the socket listening on `port`, if any.
pub fn listener_inode(port: u16) -> Option<u64> {
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let Ok(content) = fs::read_to_string(table) else {
            continue;
        };
        if let Some(socket) = parse_listeners(&content).iter().find(|s| s.port == port) {
            return Some(socket.inode);
        }
    }
    None
}

/// Resolve the pid owning a socket inode by scanning `/proc/<pid>/fd`.
///
/// Processes that vanish mid-scan or whose fd table is unreadable are
/// skipped; port ownership is racy by nature and callers treat a missing
/// owner as "already gone".
pub fn pid_for_inode(inode: u64) -> Option<u32> {
    let target = format!("socket:[{inode}]");

    let entries = fs::read_dir("/proc").ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };

        let fd_dir = Path::new("/proc").join(name).join("fd");
        let Ok(fds) = fs::read_dir(&fd_dir) else {
            continue;
        };

        for fd in fds.flatten() {
            if let Ok(link) = fs::read_link(fd.path()) {
                if link.to_string_lossy() == target {
                    return Some(pid);
                }
            }
        }
    }

    debug!(inode, "no process found owning socket inode");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TCP: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 43211 1 0000000000000000 100 0 0 10 0
   1: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 43212 1 0000000000000000 100 0 0 10 0
   2: 0100007F:A21C 0100007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 43213 1 0000000000000000 100 0 0 10 0
";

    #[test]
    fn test_parse_keeps_only_listeners() {
        let sockets = parse_listeners(SAMPLE_TCP);

        assert_eq!(sockets.len(), 2);
        assert_eq!(
            sockets[0],
            ListeningSocket {
                port: 0x1F40,
                inode: 43211
            }
        );
        assert_eq!(sockets[1].port, 0x1F90); // 8080
        assert_eq!(sockets[1].inode, 43212);
    }

    #[test]
    fn test_parse_hex_port_decoding() {
        let sockets = parse_listeners(SAMPLE_TCP);
        // 0x1F40 is 8000, the default application port.
        assert_eq!(sockets[0].port, 8000);
    }

    #[test]
    fn test_parse_empty_and_malformed_input() {
        assert!(parse_listeners("").is_empty());
        assert!(parse_listeners("header only\n").is_empty());
        assert!(parse_listeners("header\n 0: garbage\n").is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_live_listener_resolves_to_own_pid() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let inode = listener_inode(port).expect("listening socket should appear in procfs");
        let pid = pid_for_inode(inode).expect("inode should map back to a pid");

        assert_eq!(pid, std::process::id());
    }
}
