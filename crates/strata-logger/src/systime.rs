use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time in the format YYYY-MM-DD HH:MM:SS TZ
#[cfg(unix)]
pub fn now() -> String {
    use std::ffi::{CStr, CString};

    let secs = unix_timestamp() as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };

    unsafe {
        libc::localtime_r(&secs, &mut tm);
    }

    let mut buf = [0 as libc::c_char; 100];
    let fmt = match CString::new("%Y-%m-%d %H:%M:%S %Z") {
        Ok(fmt) => fmt,
        Err(_) => return secs.to_string(),
    };

    unsafe {
        let written = libc::strftime(buf.as_mut_ptr(), buf.len(), fmt.as_ptr(), &tm);
        if written == 0 {
            return secs.to_string();
        }
        CStr::from_ptr(buf.as_ptr()).to_string_lossy().to_string()
    }
}

/// Returns the current time as seconds since the epoch
#[cfg(not(unix))]
pub fn now() -> String {
    format!("{} UTC", unix_timestamp())
}

/// Returns the current Unix timestamp in seconds, 0 if the clock is before the epoch
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
