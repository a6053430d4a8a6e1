/// Human-readable text for an SFTP status code (`SSH_FX_*`).
pub fn sftp_status_text(status: i32) -> &'static str {
    match status {
        0 => "OK",
        1 => "end of file",
        2 => "no such file",
        3 => "permission denied",
        4 => "failure",
        5 => "bad message",
        6 => "no connection",
        7 => "connection lost",
        8 => "operation unsupported",
        9 => "invalid handle",
        10 => "no such path",
        11 => "file already exists",
        12 => "write protected",
        13 => "no media",
        14 => "no space on filesystem",
        15 => "quota exceeded",
        16 => "unknown principal",
        17 => "lock conflict",
        18 => "directory not empty",
        19 => "not a directory",
        20 => "invalid filename",
        21 => "link loop",
        _ => "unknown SFTP status",
    }
}

#[cfg(test)]
mod tests {
    use super::sftp_status_text;

    #[test]
    fn known_codes_have_text() {
        assert_eq!(sftp_status_text(2), "no such file");
        assert_eq!(sftp_status_text(18), "directory not empty");
        assert_eq!(sftp_status_text(21), "link loop");
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(sftp_status_text(-1), "unknown SFTP status");
        assert_eq!(sftp_status_text(99), "unknown SFTP status");
    }
}
