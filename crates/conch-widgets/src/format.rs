//! Human-readable durations and memory sizes.

/// Format `secs` as `N sec`, `N min`, or `N.N hour`.
///
/// Minutes and hours are rounded down; hours keep one decimal, dropped when
/// it is zero.
///
/// ```
/// use conch_widgets::format_duration;
///
/// assert_eq!(format_duration(42), "42 sec");
/// assert_eq!(format_duration(125), "2 min");
/// assert_eq!(format_duration(5400), "1.5 hour");
/// ```
#[must_use]
pub fn format_duration(secs: u64) -> String {
    if secs > 3600 {
        let tenths = secs / 360;
        if tenths % 10 == 0 {
            format!("{} hour", tenths / 10)
        } else {
            format!("{}.{} hour", tenths / 10, tenths % 10)
        }
    } else if secs > 60 {
        format!("{} min", secs / 60)
    } else {
        format!("{secs} sec")
    }
}

/// Format a byte count as `NB`, `NK`, `N.NM`, or `N.NG`.
///
/// Bytes and kilobytes are rounded down; megabytes and gigabytes keep one
/// rounded decimal.
///
/// ```
/// use conch_widgets::format_memory;
///
/// assert_eq!(format_memory(512), "512B");
/// assert_eq!(format_memory(2048), "2K");
/// assert_eq!(format_memory(3 * 1024 * 1024 / 2), "1.5M");
/// ```
#[must_use]
pub fn format_memory(bytes: u64) -> String {
    const K: u64 = 1 << 10;
    const M: u64 = 1 << 20;
    const G: u64 = 1 << 30;

    if bytes >= G {
        format!("{}G", tenths(bytes, G))
    } else if bytes >= M {
        format!("{}M", tenths(bytes, M))
    } else if bytes >= K {
        format!("{}K", bytes / K)
    } else {
        format!("{bytes}B")
    }
}

/// `value / unit` rounded to one decimal, always printed with it.
fn tenths(value: u64, unit: u64) -> String {
    let tenths = (u128::from(value) * 10 + u128::from(unit) / 2) / u128::from(unit);
    format!("{}.{}", tenths / 10, tenths % 10)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
