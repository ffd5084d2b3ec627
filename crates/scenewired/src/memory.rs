//! Resident-memory reporting for render frames.
//!
//! Each `RenderFrame` carries the daemon's resident set size so the host
//! application can surface server memory pressure next to the image.
//! Linux-only; other platforms report zero.

/// Current resident set size in MB, from `/proc/self/statm`.
#[cfg(target_os = "linux")]
pub fn resident_mb() -> f32 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0.0;
    };
    // Second field is resident pages.
    let Some(pages) = statm
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
    else {
        return 0.0;
    };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as u64;
    (pages * page_size) as f32 / (1024.0 * 1024.0)
}

/// Peak resident set size in MB, from `VmHWM` in `/proc/self/status`.
#[cfg(target_os = "linux")]
pub fn peak_resident_mb() -> f32 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0.0;
    };
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmHWM:") {
            // "VmHWM:     12345 kB"
            if let Some(kb) = rest
                .split_whitespace()
                .next()
                .and_then(|s| s.parse::<u64>().ok())
            {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}

#[cfg(not(target_os = "linux"))]
pub fn resident_mb() -> f32 {
    0.0
}

#[cfg(not(target_os = "linux"))]
pub fn peak_resident_mb() -> f32 {
    0.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────
