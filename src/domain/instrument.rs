//! Instrument modes and passbands.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// XRT operating modes indexed by their numeric code.
pub const XRT_MODES: [&str; 10] = [
    "Auto", "Null", "ShortIM", "LongIM", "PUPD", "LRPD", "WT", "PC", "Raw", "Bias",
];

/// UVOT filter of the day.
pub const UVOT_FILTER_OF_THE_DAY: i64 = 0x9999;

const PLANCK_KEV_S: f64 = 4.135_667_696e-18;
const SPEED_OF_LIGHT_NM_S: f64 = 2.997_924_58e17;

pub fn xrt_mode_name(code: i64) -> Option<&'static str> {
    usize::try_from(code).ok().and_then(|i| XRT_MODES.get(i).copied())
}

pub fn xrt_mode_code(name: &str) -> Option<i64> {
    XRT_MODES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name.trim()))
        .map(|i| i as i64)
}

/// BAT and UVOT modes are written as four digit hex.
pub fn hex_mode(code: i64) -> String {
    format!("0x{:04x}", code)
}

/// Parse an integer mode given as a number, a decimal string or `0x` hex.
pub fn parse_mode(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        }
        other => crate::utils::int(other),
    }
}

/// Render a mode value from the server as text: integers become hex for BAT
/// and UVOT, names for XRT.
pub fn render_mode(value: &Value, xrt: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => {
            let code = crate::utils::int(other)?;
            if xrt {
                xrt_mode_name(code).map(str::to_string)
            } else {
                Some(hex_mode(code))
            }
        }
    }
}

/// Serde adapter: XRT mode as a code or a name, kept as the name.
pub fn deserialize_xrt_mode<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(|v| render_mode(v, true)))
}

/// Serde adapter: BAT/UVOT mode as a code or hex text, kept as hex text.
pub fn deserialize_hex_mode<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(|v| render_mode(v, false)))
}

/// Serde adapter: a requested mode as a code, hex text or XRT name, kept as
/// the integer code.
pub fn deserialize_mode_code<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(|v| {
        parse_mode(v).or_else(|| v.as_str().and_then(xrt_mode_code))
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    pub fovtype: String,
    pub fovarea: f64,
    #[serde(default)]
    pub fovparam: Option<Value>,
    #[serde(default)]
    pub fovfile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub shortname: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    /// keV
    pub energy_low: f64,
    /// keV
    pub energy_high: f64,
    #[serde(default)]
    pub fov: Option<FieldOfView>,
}

impl Instrument {
    /// Hz
    pub fn frequency_low(&self) -> f64 {
        self.energy_low / PLANCK_KEV_S
    }

    /// Hz
    pub fn frequency_high(&self) -> f64 {
        self.energy_high / PLANCK_KEV_S
    }

    /// nm, from the high frequency edge.
    pub fn wavelength_low(&self) -> f64 {
        SPEED_OF_LIGHT_NM_S / self.frequency_high()
    }

    /// nm, from the low frequency edge.
    pub fn wavelength_high(&self) -> f64 {
        SPEED_OF_LIGHT_NM_S / self.frequency_low()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xrt_names() {
        assert_eq!(xrt_mode_name(7), Some("PC"));
        assert_eq!(xrt_mode_name(6), Some("WT"));
        assert_eq!(xrt_mode_name(10), None);
        assert_eq!(xrt_mode_code("pc"), Some(7));
    }

    #[test]
    fn test_hex_modes() {
        assert_eq!(hex_mode(0x9999), "0x9999");
        assert_eq!(hex_mode(0x30ed), "0x30ed");
        assert_eq!(parse_mode(&serde_json::json!("0x30ed")), Some(0x30ed));
        assert_eq!(parse_mode(&serde_json::json!(12525)), Some(12525));
        assert_eq!(parse_mode(&serde_json::json!("zz")), None);
    }

    #[test]
    fn test_render_mode() {
        assert_eq!(render_mode(&serde_json::json!(7), true), Some("PC".into()));
        assert_eq!(render_mode(&serde_json::json!(0x9999), false), Some("0x9999".into()));
        assert_eq!(render_mode(&serde_json::json!("WT"), true), Some("WT".into()));
    }

    #[test]
    fn test_passband() {
        let xrt = Instrument {
            name: "X-ray Telescope".into(),
            shortname: "XRT".into(),
            description: String::new(),
            website: None,
            energy_low: 0.3,
            energy_high: 10.0,
            fov: None,
        };
        assert!((xrt.frequency_low() - 7.254e16).abs() / 7.254e16 < 1e-3);
        // 1 keV is about 1.2398 nm
        let one_kev = Instrument {
            energy_low: 1.0,
            energy_high: 1.0,
            ..xrt
        };
        assert!((one_kev.wavelength_low() - 1.2398).abs() < 1e-3);
    }
}
