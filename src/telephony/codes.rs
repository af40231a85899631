//! Platform code values, as reported by the Android telephony stack.

/// `TelephonyManager.CALL_STATE_*`.
pub mod call_state {
    pub const IDLE: i32 = 0;
    pub const RINGING: i32 = 1;
    pub const OFFHOOK: i32 = 2;
}

/// `PreciseCallState.PRECISE_CALL_STATE_*`.
pub mod precise_call_state {
    pub const NOT_VALID: i32 = -1;
    pub const IDLE: i32 = 0;
    pub const ACTIVE: i32 = 1;
    pub const HOLDING: i32 = 2;
    pub const DIALING: i32 = 3;
    pub const ALERTING: i32 = 4;
    pub const INCOMING: i32 = 5;
    pub const WAITING: i32 = 6;
    pub const DISCONNECTED: i32 = 7;
    pub const DISCONNECTING: i32 = 8;
}

/// `DataConnectionRealTimeInfo.DC_POWER_STATE_*`.
pub mod dc_power_state {
    pub const LOW: i32 = 1;
    pub const MEDIUM: i32 = 2;
    pub const HIGH: i32 = 3;
    pub const UNKNOWN: i32 = i32::MAX;
}

/// `TelephonyManager.DATA_*`.
pub mod data_state {
    pub const UNKNOWN: i32 = -1;
    pub const DISCONNECTED: i32 = 0;
    pub const CONNECTING: i32 = 1;
    pub const CONNECTED: i32 = 2;
    pub const SUSPENDED: i32 = 3;
}

/// `ServiceState.STATE_*`.
pub mod service_state {
    pub const IN_SERVICE: i32 = 0;
    pub const OUT_OF_SERVICE: i32 = 1;
    pub const EMERGENCY_ONLY: i32 = 2;
    pub const POWER_OFF: i32 = 3;
}

/// `TelecomManager.TTY_MODE_*`.
pub mod tty_mode {
    pub const OFF: i32 = 0;
    pub const FULL: i32 = 1;
    pub const HCO: i32 = 2;
    pub const VCO: i32 = 3;
}

/// `PhoneAccount.CAPABILITY_*` bits used by the simulated platform.
pub mod account_capability {
    pub const CALL_PROVIDER: u32 = 0x2;
    pub const SIM_SUBSCRIPTION: u32 = 0x4;
}
