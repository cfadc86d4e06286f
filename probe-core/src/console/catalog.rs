//! Console command catalog.
//!
//! The parser and the `help` command both read this table, so keywords,
//! argument shapes and usage text stay in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Arm,
    Disarm,
    Enable,
    Trigger,
    Clear,
    Feedback,
    Set,
    Get,
    Config,
    Tick,
    Status,
    Reset,
    Check,
    Help,
}

/// Shape of the arguments following a command keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgSpec {
    None,
    /// Signed integer literal.
    Integer,
    /// Flag word (`on`/`off`, `true`/`false`) or `0`/`1`.
    Flag,
    /// Optional unsigned count, defaulting to `default`.
    Count { default: u32 },
    /// `<field>=<value>` where value is an integer or a flag word.
    Assignment,
    /// Configuration field name.
    Field,
    /// Optional free-form identifier.
    Topic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub args: ArgSpec,
    pub usage: &'static str,
    pub summary: &'static str,
}

const COMMANDS: [CommandSpec; 14] = [
    CommandSpec {
        name: "arm",
        tag: CommandTag::Arm,
        args: ArgSpec::None,
        usage: "arm",
        summary: "assert arm_enable and advance one tick",
    },
    CommandSpec {
        name: "disarm",
        tag: CommandTag::Disarm,
        args: ArgSpec::None,
        usage: "disarm",
        summary: "release arm_enable and advance one tick",
    },
    CommandSpec {
        name: "enable",
        tag: CommandTag::Enable,
        args: ArgSpec::Flag,
        usage: "enable <on|off>",
        summary: "drive global_enable and advance one tick",
    },
    CommandSpec {
        name: "trigger",
        tag: CommandTag::Trigger,
        args: ArgSpec::None,
        usage: "trigger",
        summary: "pulse ext_trigger_in high for one tick",
    },
    CommandSpec {
        name: "clear",
        tag: CommandTag::Clear,
        args: ArgSpec::None,
        usage: "clear",
        summary: "acknowledge a latched fault with a fault_clear edge",
    },
    CommandSpec {
        name: "feedback",
        tag: CommandTag::Feedback,
        args: ArgSpec::Integer,
        usage: "feedback <mV>",
        summary: "drive probe_monitor_feedback",
    },
    CommandSpec {
        name: "set",
        tag: CommandTag::Set,
        args: ArgSpec::Assignment,
        usage: "set <field>=<value>",
        summary: "write a configuration field",
    },
    CommandSpec {
        name: "get",
        tag: CommandTag::Get,
        args: ArgSpec::Field,
        usage: "get <field>",
        summary: "read a configuration field",
    },
    CommandSpec {
        name: "config",
        tag: CommandTag::Config,
        args: ArgSpec::None,
        usage: "config",
        summary: "list every configuration field",
    },
    CommandSpec {
        name: "tick",
        tag: CommandTag::Tick,
        args: ArgSpec::Count { default: 1 },
        usage: "tick [count]",
        summary: "advance the engine",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        args: ArgSpec::None,
        usage: "status",
        summary: "show state, outputs and fault",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        args: ArgSpec::None,
        usage: "reset",
        summary: "return the engine to IDLE",
    },
    CommandSpec {
        name: "check",
        tag: CommandTag::Check,
        args: ArgSpec::Topic,
        usage: "check [profile]",
        summary: "compare the configuration with a probe profile",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        args: ArgSpec::Topic,
        usage: "help [command]",
        summary: "list commands",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
