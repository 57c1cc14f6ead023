use regex::Regex;
use reqwest::StatusCode;

/// Replace characters that are not allowed in file names.
pub fn sanitize(name: &str) -> String {
    Regex::new(r#"[/\\<>:"|?*]"#)
        .unwrap()
        .replace_all(name, "_")
        .into_owned()
}

/// Whether a failed request is worth another attempt.
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// Short description of a request error for logs.
pub fn describe(error: &reqwest::Error) -> String {
    let url = error
        .url()
        .map(|x| x.as_str().split('?').next().unwrap_or_default().to_owned())
        .unwrap_or_default();

    if error.is_connect() {
        return format!("{} (connection error)", url);
    } else if error.is_timeout() {
        return format!("{} (timeout)", url);
    }

    match error.status() {
        Some(StatusCode::TOO_MANY_REQUESTS) => format!("{} (too many requests)", url),
        Some(StatusCode::SERVICE_UNAVAILABLE) => format!("{} (service unavailable)", url),
        Some(status) => format!("{} (HTTP {})", url, status),
        None => format!("{} ({})", url, error),
    }
}

pub fn format_bytes(bytesval: usize) -> String {
    let mut val = bytesval as f32;

    for unit in ["bytes", "KiB", "MiB", "GiB"] {
        if val < 1024.0 {
            return format!("{:.2} {}", val, unit);
        }

        val /= 1024.0;
    }

    format!("{:.2} TiB", val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_are_replaced() {
        assert_eq!(sanitize("AC/DC: Live? <1991>"), "AC_DC_ Live_ _1991_");
        assert_eq!(sanitize(r#"a\b"c|d*e"#), "a_b_c_d_e");
        assert_eq!(sanitize("Kind of Blue"), "Kind of Blue");
    }

    #[test]
    fn byte_sizes_are_humanized() {
        assert_eq!(format_bytes(512), "512.00 bytes");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MiB");
    }
}
