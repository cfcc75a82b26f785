//! Host hardware detection.

/// Detect total system memory in bytes.
///
/// # Platform Support
///
/// - **Linux**: Parses `/proc/meminfo`
/// - **Other platforms**: Returns fallback of 8GB
#[cfg(target_os = "linux")]
pub fn detect_total_memory() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|content| parse_meminfo(&content))
        .unwrap_or(FALLBACK_MEMORY)
}

#[cfg(not(target_os = "linux"))]
pub fn detect_total_memory() -> u64 {
    FALLBACK_MEMORY
}

/// Memory assumed when detection fails.
const FALLBACK_MEMORY: u64 = 8 * 1024 * 1024 * 1024;

/// Extract `MemTotal` from `/proc/meminfo` content, in bytes.
///
/// Format: `MemTotal:       16384000 kB`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_meminfo(content: &str) -> Option<u64> {
    let line = content.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Bytes corresponding to `fraction` of total system memory.
pub fn memory_fraction(fraction: f32) -> usize {
    (detect_total_memory() as f64 * fraction as f64) as usize
}
