//! Built-in unit definitions.
//!
//! | Code | Unit | Access | Notes |
//! |------|------|--------|-------|
//! | `atrea-rd5` | Atrea RD5 | holding 10704–10706 | zero at 1070x, commit at 1070x+8 |
//! | `atrea-am` | Atrea aMotion | input 1001–1004 | holding writes at the same addresses |
//! | `xvent` | xVent | scripted, bitfield at `0x9C40` | FC 16 only |
//! | `meltem` | Meltem M-WRG | scripted, input 41020–41021 | edit 41120–41122, commit at 41132 |
//! | `korado` | Korado | scripted, holding 106 | coil 31 must be set within 30 s of a write |

use super::{
    Access, DeviceDefinition, EnumTable, ReadMap, RegisterRead, ScriptedAccess, Transform,
    WriteMap, WriteStep,
};

const RD5_MODES: EnumTable = &[
    (0, "Off"),
    (1, "Automatic"),
    (2, "Ventilation"),
    (3, "Circulation and ventilation"),
    (4, "Circulation"),
    (5, "Night precooling"),
    (6, "Disbalance"),
    (7, "Overpressure"),
];

// The RD5 ignores a commit unless the matching unlock register was zeroed
// first; the pause lets the controller latch the unlock.
const RD5_POWER: &[WriteStep] = &[
    WriteStep::constant(10700, 0).delay_ms(100),
    WriteStep::transform(10708, Transform::Round),
];
const RD5_MODE: &[WriteStep] = &[
    WriteStep::constant(10701, 0).delay_ms(100),
    WriteStep::transform(10709, Transform::Round),
];
const RD5_TEMPERATURE: &[WriteStep] = &[
    WriteStep::constant(10702, 0).delay_ms(100),
    WriteStep::transform(10710, Transform::Scale(10.0)),
];

/// Atrea RD5 controller.
pub static ATREA_RD5: DeviceDefinition = DeviceDefinition {
    code: "atrea-rd5",
    name: "Atrea RD5",
    manufacturer: "Atrea",
    modes: RD5_MODES,
    access: Access::Registers {
        read: ReadMap {
            power: RegisterRead::holding(10704),
            temperature: RegisterRead::holding(10706).scaled(0.1, 1),
            mode: RegisterRead::holding(10705),
        },
        write: WriteMap {
            power: Some(RD5_POWER),
            temperature: Some(RD5_TEMPERATURE),
            mode: Some(RD5_MODE),
        },
    },
};

const AM_MODES: EnumTable = &[
    (0, "Off"),
    (1, "Automatic"),
    (2, "Ventilation"),
    (3, "Night precooling"),
    (4, "Disbalance"),
];

const AM_POWER: &[WriteStep] = &[WriteStep::transform(1004, Transform::Round).input()];
const AM_MODE: &[WriteStep] = &[WriteStep::transform(1001, Transform::Round).input()];
const AM_TEMPERATURE: &[WriteStep] = &[WriteStep::transform(1002, Transform::Scale(10.0)).input()];

/// Atrea aMotion controller.
pub static ATREA_AM: DeviceDefinition = DeviceDefinition {
    code: "atrea-am",
    name: "Atrea aMotion",
    manufacturer: "Atrea",
    modes: AM_MODES,
    access: Access::Registers {
        read: ReadMap {
            power: RegisterRead::input(1004),
            temperature: RegisterRead::input(1002).scaled(0.1, 1),
            mode: RegisterRead::input(1001),
        },
        write: WriteMap {
            power: Some(AM_POWER),
            temperature: Some(AM_TEMPERATURE),
            mode: Some(AM_MODE),
        },
    },
};

// Front panel register: bit 0 power, bit 2 bypass, bit 4 boost, bits 6-9
// fan speed. The unit rejects FC 6, so every write goes through FC 16 and
// keeps the bits it does not own.
const XVENT_MODES: EnumTable = &[
    (0, "Off"),
    (1, "On"),
    (5, "Bypass"),
    (17, "Boost"),
    (21, "Boost with bypass"),
];

const XVENT_READ: &str = r#"[
    {"type": "assignment", "variable": "$raw", "value": {"function": "modbus_read_holding", "args": ["0x9C40"]}},
    {"type": "assignment", "variable": "$power", "value": {"function": "bit_and", "args": [{"function": "bit_rshift", "args": ["$raw", 6]}, 15]}},
    {"type": "assignment", "variable": "$mode", "value": {"function": "bit_and", "args": ["$raw", "0x15"]}}
]"#;

const XVENT_POWER: &str = r#"[
    {"type": "assignment", "variable": "$raw", "value": {"function": "modbus_read_holding", "args": ["0x9C40"]}},
    {"type": "assignment", "variable": "$speed", "value": {"function": "bit_and", "args": [{"function": "round", "args": ["$value"]}, 15]}},
    {"type": "assignment", "variable": "$next", "value": {"function": "bit_or", "args": [
        {"function": "bit_and", "args": ["$raw", "0xFC3F"]},
        {"function": "bit_lshift", "args": ["$speed", 6]}
    ]}},
    {"type": "action", "expression": {"function": "modbus_write_holding_multi", "args": ["0x9C40", "$next"]}}
]"#;

const XVENT_MODE: &str = r#"[
    {"type": "assignment", "variable": "$raw", "value": {"function": "modbus_read_holding", "args": ["0x9C40"]}},
    {"type": "assignment", "variable": "$flags", "value": {"function": "bit_and", "args": [{"function": "round", "args": ["$value"]}, "0x15"]}},
    {"type": "assignment", "variable": "$next", "value": {"function": "bit_or", "args": [
        {"function": "bit_and", "args": ["$raw", "0xFFEA"]},
        "$flags"
    ]}},
    {"type": "action", "expression": {"function": "modbus_write_holding_multi", "args": ["0x9C40", "$next"]}}
]"#;

/// xVent front-panel controller.
pub static XVENT: DeviceDefinition = DeviceDefinition {
    code: "xvent",
    name: "xVent",
    manufacturer: "xVent",
    modes: XVENT_MODES,
    access: Access::Scripted(ScriptedAccess {
        read: XVENT_READ,
        power: Some(XVENT_POWER),
        temperature: None,
        mode: Some(XVENT_MODE),
    }),
};

// Flows are set in half-m³/h steps: enter edit mode 4, stage supply and
// extract, then commit with 0.
const MELTEM_READ: &str = r#"[
    {"type": "assignment", "variable": "$power", "value": {"function": "modbus_read_input", "args": [41021]}}
]"#;

const MELTEM_POWER: &str = r#"[
    {"type": "assignment", "variable": "$flow", "value": {"function": "multiply", "args": [{"function": "round", "args": ["$value"]}, 2]}},
    {"type": "action", "expression": {"function": "modbus_write_holding", "args": [41120, 4]}},
    {"type": "action", "expression": {"function": "modbus_write_holding", "args": [41121, "$flow"]}},
    {"type": "action", "expression": {"function": "modbus_write_holding", "args": [41122, "$flow"]}},
    {"type": "action", "expression": {"function": "modbus_write_holding", "args": [41132, 0]}}
]"#;

/// Meltem M-WRG ventilation unit.
pub static MELTEM: DeviceDefinition = DeviceDefinition {
    code: "meltem",
    name: "Meltem M-WRG",
    manufacturer: "Meltem",
    modes: &[],
    access: Access::Scripted(ScriptedAccess {
        read: MELTEM_READ,
        power: Some(MELTEM_POWER),
        temperature: None,
        mode: None,
    }),
};

// Writes to 106 are ignored unless coil 31 was set in the last 30 s.
const KORADO_READ: &str = r#"[
    {"type": "assignment", "variable": "$power", "value": {"function": "modbus_read_holding", "args": [106]}}
]"#;

const KORADO_POWER: &str = r#"[
    {"type": "action", "expression": {"function": "modbus_write_coil", "args": [31, 1]}},
    {"type": "action", "expression": {"function": "modbus_write_holding", "args": [106, {"function": "round", "args": ["$value"]}]}}
]"#;

/// Korado ventilation unit.
pub static KORADO: DeviceDefinition = DeviceDefinition {
    code: "korado",
    name: "Korado",
    manufacturer: "Korado",
    modes: &[],
    access: Access::Scripted(ScriptedAccess {
        read: KORADO_READ,
        power: Some(KORADO_POWER),
        temperature: None,
        mode: None,
    }),
};

/// Every built-in definition.
pub static UNITS: &[&DeviceDefinition] = &[&ATREA_RD5, &ATREA_AM, &XVENT, &MELTEM, &KORADO];

/// Look a definition up by its code.
#[must_use]
pub fn find(code: &str) -> Option<&'static DeviceDefinition> {
    UNITS.iter().copied().find(|def| def.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Field, RegisterKind, ValueSource};

    fn write_map(definition: &DeviceDefinition) -> &WriteMap {
        match &definition.access {
            Access::Registers { write, .. } => write,
            Access::Scripted(_) => panic!("{} is scripted", definition.code),
        }
    }

    #[test]
    fn should_find_units_by_code() {
        assert_eq!(find("atrea-rd5").map(|d| d.name), Some("Atrea RD5"));
        assert_eq!(find("atrea-am").map(|d| d.name), Some("Atrea aMotion"));
        assert_eq!(find("xvent").map(|d| d.name), Some("xVent"));
        assert_eq!(find("meltem").map(|d| d.name), Some("Meltem M-WRG"));
        assert_eq!(find("korado").map(|d| d.name), Some("Korado"));
        assert!(find("unknown").is_none());
    }

    #[test]
    fn should_zero_before_commit_on_rd5() {
        let steps = write_map(&ATREA_RD5).get(Field::Power).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].address, 10700);
        assert_eq!(steps[0].value, ValueSource::Constant(0));
        assert_eq!(steps[1].address, 10708);
    }

    #[test]
    fn should_declare_am_writes_as_input_registers() {
        for field in [Field::Power, Field::Temperature, Field::Mode] {
            let steps = write_map(&ATREA_AM).get(field).unwrap();
            assert!(steps.iter().all(|s| s.kind == RegisterKind::Input));
        }
    }

    #[test]
    fn should_have_unique_codes() {
        for (i, a) in UNITS.iter().enumerate() {
            for b in &UNITS[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn should_roundtrip_every_catalog_mode_label() {
        for unit in UNITS {
            for (code, name) in unit.modes {
                assert_eq!(unit.mode_code(name), Some(*code));
                assert_eq!(unit.mode_label(*code), *name);
            }
        }
    }

    #[test]
    fn should_parse_every_unit_script() {
        for unit in UNITS {
            let Access::Scripted(scripts) = &unit.access else {
                continue;
            };
            assert!(!scripts.read_script().unwrap().statements.is_empty());
            for field in [Field::Power, Field::Temperature, Field::Mode] {
                scripts.write_script(field).unwrap();
            }
        }
    }

    #[test]
    fn should_leave_temperature_read_only_on_scripted_units() {
        for unit in [&XVENT, &MELTEM, &KORADO] {
            assert!(unit.is_writable(Field::Power));
            assert!(!unit.is_writable(Field::Temperature));
        }
        assert!(XVENT.is_writable(Field::Mode));
    }
}
