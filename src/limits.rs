//! Process-wide resource overrides, applied once before any worker launches.

use anyhow::Result;
use log::{info, warn};

/// Raise the soft RLIMIT_NOFILE to `wanted`, capped at the hard limit.
/// Returns the soft limit now in effect.
#[cfg(unix)]
pub fn raise_open_files(wanted: u64) -> Result<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit struct.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let hard = limit.rlim_max as u64;
    let target = if limit.rlim_max == libc::RLIM_INFINITY {
        wanted
    } else {
        wanted.min(hard)
    };
    if target < wanted {
        warn!("Open file limit capped at hard limit {} (asked for {})", hard, wanted);
    }

    limit.rlim_cur = target as libc::rlim_t;
    // SAFETY: same struct, now carrying the new soft limit.
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &limit) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    info!("Open file limit set to {}", target);
    Ok(target)
}

#[cfg(not(unix))]
pub fn raise_open_files(wanted: u64) -> Result<u64> {
    warn!("Open file limit override ({}) is not supported on this platform", wanted);
    Ok(wanted)
}

/// Current soft RLIMIT_NOFILE, if the platform has one.
#[cfg(unix)]
pub fn open_files_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit struct.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return None;
    }
    Some(limit.rlim_cur as u64)
}

#[cfg(not(unix))]
pub fn open_files_limit() -> Option<u64> {
    None
}
