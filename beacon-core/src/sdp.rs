//! SDP fixups applied before an offer is handed to the peer engine.

/// Removes `b=TIAS:<n>` bandwidth lines from an SDP body. Some SFU builds
/// emit both `b=TIAS` and `b=AS`; engines that only understand `b=AS` choke
/// on the former. Every other line is preserved verbatim, line endings
/// included.
pub fn strip_bandwidth_tias(sdp: &str) -> String {
    let mut out = String::with_capacity(sdp.len());
    for line in sdp.split_inclusive("\r\n") {
        if is_tias_line(line) {
            continue;
        }
        out.push_str(line);
    }
    out
}

fn is_tias_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("b=TIAS:") else {
        return false;
    };
    let Some(digits) = rest.strip_suffix("\r\n") else {
        return false;
    };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
