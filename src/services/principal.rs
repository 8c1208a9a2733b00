//! Best-effort lookup of the user the engine runs as, for audit lines

const UNKNOWN: &str = "unknown";

/// Name of the OS user owning this process.
#[must_use]
pub fn current_principal() -> String {
    platform_principal()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(unix)]
fn platform_principal() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .or_else(|| {
            let uid = rustix::process::getuid();
            Some(format!("uid:{}", uid.as_raw()))
        })
}

#[cfg(windows)]
fn platform_principal() -> Option<String> {
    use windows_sys::Win32::System::WindowsProgramming::GetUserNameW;

    // UNLEN + 1
    let mut buffer = [0u16; 257];
    let mut len = buffer.len() as u32;
    let ok = unsafe { GetUserNameW(buffer.as_mut_ptr(), &mut len) };

    if ok != 0 && len > 0 {
        // `len` includes the terminating NUL.
        let chars = (len as usize).saturating_sub(1).min(buffer.len());
        return Some(String::from_utf16_lossy(&buffer[..chars]));
    }

    log::debug!(
        "GetUserNameW failed: {}, falling back to USERNAME",
        std::io::Error::last_os_error()
    );
    std::env::var("USERNAME").ok()
}

#[cfg(not(any(unix, windows)))]
fn platform_principal() -> Option<String> {
    std::env::var("USER").ok()
}
