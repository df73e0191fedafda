//! Input validation helpers

/// Well-known placeholder values that mean "no hostname was configured".
const UNSET_HOSTNAMES: &[&str] = &[
    "(none)",
    "localhost",
    "localhost6",
    "localhost.localdomain",
    "localhost6.localdomain6",
];

/// Returns true if `hostname` names this particular host, as opposed to an
/// empty string or one of the well-known unset placeholders.
pub fn is_specific_hostname(hostname: &str) -> bool {
    !hostname.is_empty() && !UNSET_HOSTNAMES.contains(&hostname)
}
