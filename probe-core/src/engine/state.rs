use core::fmt;

/// Controller states with their register bit patterns.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeState {
    Idle,
    Armed,
    Firing,
    Cooldown,
    Fault,
}

impl ProbeState {
    pub const IDLE_CODE: u8 = 0b00_0000;
    pub const ARMED_CODE: u8 = 0b00_0001;
    pub const FIRING_CODE: u8 = 0b00_0010;
    pub const COOLDOWN_CODE: u8 = 0b00_0011;
    pub const FAULT_CODE: u8 = 0b11_1111;

    /// Six-bit state register encoding.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            ProbeState::Idle => Self::IDLE_CODE,
            ProbeState::Armed => Self::ARMED_CODE,
            ProbeState::Firing => Self::FIRING_CODE,
            ProbeState::Cooldown => Self::COOLDOWN_CODE,
            ProbeState::Fault => Self::FAULT_CODE,
        }
    }

    /// Decodes a state register value; unknown encodings yield `None`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            Self::IDLE_CODE => Some(ProbeState::Idle),
            Self::ARMED_CODE => Some(ProbeState::Armed),
            Self::FIRING_CODE => Some(ProbeState::Firing),
            Self::COOLDOWN_CODE => Some(ProbeState::Cooldown),
            Self::FAULT_CODE => Some(ProbeState::Fault),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ProbeState::Idle => "IDLE",
            ProbeState::Armed => "ARMED",
            ProbeState::Firing => "FIRING",
            ProbeState::Cooldown => "COOLDOWN",
            ProbeState::Fault => "FAULT",
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
