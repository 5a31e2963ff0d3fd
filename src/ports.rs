use std::net::TcpListener;
use thiserror::Error;

/// First candidate for persistent SSH config stanzas.
pub const SSH_BASE_PORT: u16 = 6000;
/// First candidate for short-lived sync tunnels, kept well away from the
/// SSH stanza range.
pub const SYNC_BASE_PORT: u16 = 61000;

const PROBE_ATTEMPTS: u32 = 20;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("could not find a free port after checking {attempts} ports starting at {start}")]
    Exhausted { start: u16, attempts: u32 },
}

/// A port is "free" when we can exclusively bind a listener on it right
/// now. The listener is dropped immediately, so this is not a reservation:
/// an unrelated process can still grab the port before our tunnel does.
/// Callers must tolerate a later connection failure.
pub fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Pick a free local port: one past the highest already-claimed port (or
/// `base` when nothing is claimed), walking upward past busy ports for at
/// most 20 probes.
pub fn allocate_port(claimed: &[u16], base: u16) -> Result<u16, PortError> {
    allocate_port_with(claimed, base, port_is_free)
}

fn allocate_port_with<F>(claimed: &[u16], base: u16, mut probe: F) -> Result<u16, PortError>
where
    F: FnMut(u16) -> bool,
{
    let start = claimed
        .iter()
        .copied()
        .max()
        .map(|port| port.saturating_add(1))
        .unwrap_or(base);

    let mut candidate = u32::from(start);
    for _ in 0..PROBE_ATTEMPTS {
        if candidate > u32::from(u16::MAX) {
            break;
        }
        let port = candidate as u16;
        if probe(port) {
            return Ok(port);
        }
        candidate += 1;
    }

    Err(PortError::Exhausted {
        start,
        attempts: PROBE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn starts_at_base_when_nothing_is_claimed() {
        let port = allocate_port_with(&[], 6000, |_port| true).expect("allocate");
        assert_eq!(port, 6000);
    }

    #[test]
    fn starts_one_past_highest_claimed_port() {
        let port = allocate_port_with(&[6000, 6003, 6001], 6000, |_port| true).expect("allocate");
        assert_eq!(port, 6004);
    }

    #[test]
    fn skips_busy_candidates() {
        let port = allocate_port_with(&[], 6000, |port| port >= 6003).expect("allocate");
        assert_eq!(port, 6003);
    }

    #[test]
    fn fails_after_twenty_probes() {
        let mut probes = 0u32;
        let result = allocate_port_with(&[7000], 6000, |_port| {
            probes += 1;
            false
        });

        assert_eq!(probes, 20);
        let err = result.expect_err("expected exhaustion");
        let message = err.to_string();
        assert!(
            message.contains("could not find a free port after checking 20 ports"),
            "unexpected error text: {message}"
        );
        assert!(message.contains("7001"), "unexpected error text: {message}");
    }

    #[test]
    fn allocated_port_passes_a_real_bind_probe() {
        // Let the OS choose a port we know is free, then make sure the
        // allocator hands back something bindable next to it.
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let busy = listener.local_addr().expect("addr").port();

        let port = allocate_port(&[busy.saturating_sub(1)], SSH_BASE_PORT).expect("allocate");
        assert_ne!(port, busy);
        assert!(port_is_free(port));
    }
}
