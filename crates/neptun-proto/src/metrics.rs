use std::fmt;

/// Cumulative per-engine delivery counters, incremented from within `tick`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NeptunMetrics {
    pub packet_acks: u64,
    pub packet_drops: u64,
}

impl NeptunMetrics {
    pub fn inc_packet_acks(&mut self) {
        self.packet_acks += 1;
    }

    pub fn inc_packet_drops(&mut self) {
        self.packet_drops += 1;
    }
}

impl fmt::Display for NeptunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Neptun metrics")?;
        writeln!(f, "    packet_acks: {}", self.packet_acks)?;
        write!(f, "    packet_drops: {}", self.packet_drops)
    }
}
