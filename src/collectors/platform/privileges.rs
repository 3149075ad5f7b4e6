use crate::collectors::source::SourceError;

/// Whether the process runs with an effective root user
pub fn is_elevated() -> bool {
    #[cfg(target_os = "linux")]
    {
        nix::unistd::geteuid().is_root()
    }

    #[cfg(target_os = "macos")]
    {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        false
    }
}

/// User-facing guidance for a source that could not be used
pub fn unavailable_hint(error: &SourceError) -> Option<String> {
    match error {
        SourceError::Unavailable { .. } if !cfg!(target_os = "linux") => Some(
            "The privileged source reads the Linux kernel counter table; use --source standard on this platform"
                .to_string(),
        ),
        SourceError::Unavailable { .. } if !is_elevated() => Some(
            "The kernel counter table is not readable by this user; run with elevated privileges or use --source standard"
                .to_string(),
        ),
        SourceError::Unavailable { .. } => Some(
            "The kernel counter table is missing; check the source.proc_net_dev setting".to_string(),
        ),
        _ => None,
    }
}
